//! Error types for pool operations.

use kydras_types::PathError;

/// Errors that can occur during pool operations.
///
/// An unknown pool ID is not an error: reads return `None`, predicates
/// return `false`, and mutating operations return `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The relative path was rejected by the sanitizer.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// A required argument was blank or empty.
    #[error("argument must not be empty: {0}")]
    ArgEmpty(&'static str),

    /// Fewer healthy eligible drives than the rule requires.
    #[error("insufficient replicas: need {required}, only {eligible} eligible drives")]
    InsufficientReplicas {
        /// Replica count the matching rule requires.
        required: usize,
        /// Eligible drives the scheduler produced.
        eligible: usize,
    },

    /// Staged replicas disagreed on content, or a copied replica did not
    /// hash back to its source.
    #[error("integrity mismatch for {rel_path}: {detail}")]
    IntegrityMismatch {
        /// The relative path being written or rebalanced.
        rel_path: String,
        /// What disagreed.
        detail: String,
    },

    /// Filesystem-layer failure.
    #[error("store error: {0}")]
    Store(#[from] kydras_store::StoreError),

    /// Replica index failure.
    #[error("index error: {0}")]
    Index(#[from] kydras_index::IndexError),

    /// Direct I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
