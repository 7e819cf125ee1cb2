//! Error types for the replica index.

/// Errors returned by [`ReplicaIndex`](crate::ReplicaIndex) operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error (e.g. creating the sidecar directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be decoded back into a replica record.
    #[error("corrupt index row: {0}")]
    CorruptRow(String),
}
