//! Durable replica index for Kydras.
//!
//! [`ReplicaIndex`] persists one row per expected replica —
//! `(pool_id, rel_path, drive_root)` → `(size, sha256, modified)` — in a
//! SQLite sidecar database. The index is **advisory**: on-disk files are
//! authoritative for content; the index records what the engine intends
//! to exist and accelerates lookup on the read path.

mod error;
mod store;

pub use error::IndexError;
pub use store::ReplicaIndex;
