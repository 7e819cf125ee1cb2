//! Error types for filesystem operations.

use std::path::PathBuf;

/// Errors returned by hashing, atomic file operations, and drive probing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The capacity probe for a drive root failed.
    #[error("capacity probe failed for {path}: {source}")]
    Probe {
        /// The drive root that was probed.
        path: PathBuf,
        /// The underlying OS error.
        source: std::io::Error,
    },
}
