//! Filesystem primitives for Kydras.
//!
//! This crate owns everything that touches a drive directly:
//!
//! - [`hash_file`] — streaming SHA-256 of a file, uppercase hex.
//! - [`atomic_replace`], [`copy_with_replace`], [`stage_path`] — the
//!   temp-then-rename discipline used by the two-phase write coordinator
//!   and the self-heal copy path.
//! - [`probe_capacity`], [`refresh_drive`], [`guess_class`],
//!   [`check_drive_health`] — per-drive observation.
//!
//! Nothing here knows about pools or rules; callers hand in concrete paths.

mod atomic;
mod error;
mod hash;
mod probe;

pub use atomic::{atomic_replace, copy_with_replace, is_side_file, stage_path, unique_hex32};
pub use error::StoreError;
pub use hash::hash_file;
pub use probe::{check_drive_health, guess_class, probe_capacity, refresh_drive};
