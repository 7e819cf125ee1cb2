//! Rule matching and drive scheduling for Kydras.
//!
//! Three pure pieces, no I/O:
//!
//! - [`glob_match`] — the rule-pattern glob (`*` within a segment, `**`
//!   across segments, case-insensitive).
//! - [`resolve_rule`] — first-match rule lookup for a relative path.
//! - [`score_drive`] / [`eligible_drives`] / [`rank_drives`] — the
//!   weighted scheduler that orders drives by suitability for a file.
//!
//! The scorer is deliberately exposed as a standalone function over
//! `(drive, rule)` so the rebalancer can rank an arbitrary holder set
//! for eviction with the same weights the write path uses.

mod glob;
mod rules;
mod score;

pub use glob::glob_match;
pub use rules::resolve_rule;
pub use score::{eligible_drives, rank_drives, score_drive};
