//! Pool operations for the Kydras storage engine.
//!
//! [`KydrasEngine`] owns the in-memory pool map and the shared replica
//! index, and exposes every pool-level operation: pool lifecycle,
//! two-phase replicated writes, self-healing reads, delete/exists/list,
//! and pool-wide rebalancing.

pub mod engine;
pub mod error;

mod heal;
mod rebalance;
mod write;

pub use engine::KydrasEngine;
pub use error::EngineError;

#[cfg(test)]
mod tests;
