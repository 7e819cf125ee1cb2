//! Relative-path sanitizer.
//!
//! Every caller-supplied relative path passes through [`sanitize_rel_path`]
//! before it is used as a key anywhere in the engine or the index. The
//! sanitized form is the sole key shape downstream: separators normalized
//! to the host separator, no leading separator, no `..` segments.

use std::path::MAIN_SEPARATOR;

/// Why a relative path was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path was empty, or nothing remained after normalization.
    #[error("empty relative path")]
    Empty,

    /// The path contained a `..` segment.
    #[error("path escapes the drive root: {0}")]
    ParentTraversal(String),
}

/// Normalize and validate a caller-supplied relative path.
///
/// Both `/` and `\` are accepted as input separators and rewritten to the
/// host separator. Leading separators and empty segments are dropped.
/// Any `..` segment is rejected — a relative path must never be able to
/// escape its drive root.
pub fn sanitize_rel_path(raw: &str) -> Result<String, PathError> {
    let segments: Vec<&str> = raw
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    if segments.iter().any(|s| *s == "..") {
        return Err(PathError::ParentTraversal(raw.to_string()));
    }

    Ok(segments.join(MAIN_SEPARATOR.to_string().as_str()))
}
