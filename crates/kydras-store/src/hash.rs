//! Streaming SHA-256 file hashing.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::StoreError;

/// Read buffer size for hashing.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 of a file's content, returned as uppercase hex.
///
/// The file is streamed in 64 KiB reads; it is never loaded whole.
pub async fn hash_file(path: impl AsRef<Path>) -> Result<String, StoreError> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()).to_ascii_uppercase())
}
