//! Atomic file replacement and safe copying.
//!
//! All mutations of a replica's final path go through side files:
//!
//! - `<final>.<32-hex>.2pc` — staging file for two-phase writes.
//! - `<dst>.<32-hex>.tmp` — intermediate for [`copy_with_replace`].
//! - `<final>.bak_<32-hex>` — backup taken during [`atomic_replace`].
//!
//! Side files are cleaned on success. Stale ones left by a crash carry a
//! recognizable suffix ([`is_side_file`]) and are safe to delete on
//! discovery.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

/// Generate 32 hex characters of randomness for unique side-file names.
pub fn unique_hex32() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Staging side-file path for a final path: `<final>.<32-hex>.2pc`.
pub fn stage_path(final_path: &Path) -> PathBuf {
    suffixed(final_path, &format!(".{}.2pc", unique_hex32()))
}

/// True when a file name carries one of the engine's side-file suffixes.
pub fn is_side_file(name: &str) -> bool {
    name.ends_with(".2pc") || name.ends_with(".tmp") || name.contains(".bak_")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Atomically move `temp` onto `final_path`.
///
/// When `final_path` exists, the replace keeps a backup
/// (`<final>.bak_<32-hex>`) while the swap happens and deletes it after.
/// If the backup step fails, falls back to delete-then-rename, which
/// leaves a brief window with no file but never a half-written one.
pub async fn atomic_replace(temp: &Path, final_path: &Path) -> Result<(), StoreError> {
    if tokio::fs::metadata(final_path).await.is_ok() {
        let backup = suffixed(final_path, &format!(".bak_{}", unique_hex32()));

        match tokio::fs::rename(final_path, &backup).await {
            Ok(()) => {
                tokio::fs::rename(temp, final_path).await?;
                if let Err(e) = tokio::fs::remove_file(&backup).await {
                    // Stale backups are cleaned on discovery by the rebalancer.
                    warn!(backup = %backup.display(), %e, "failed to delete replace backup");
                }
            }
            Err(e) => {
                warn!(
                    path = %final_path.display(),
                    %e,
                    "backup rename failed, falling back to delete-then-move"
                );
                remove_if_exists(final_path).await?;
                tokio::fs::rename(temp, final_path).await?;
            }
        }
    } else {
        tokio::fs::rename(temp, final_path).await?;
    }

    debug!(path = %final_path.display(), "atomic replace complete");
    Ok(())
}

/// Copy `src` over `dst`, tolerating an existing `dst`.
///
/// The data lands in `<dst>.<32-hex>.tmp` first, then the temp is renamed
/// into place after any existing `dst` is removed. Returns the number of
/// bytes copied.
pub async fn copy_with_replace(src: &Path, dst: &Path) -> Result<u64, StoreError> {
    let tmp = suffixed(dst, &format!(".{}.tmp", unique_hex32()));

    let bytes = match tokio::fs::copy(src, &tmp).await {
        Ok(n) => n,
        Err(e) => {
            remove_if_exists(&tmp).await.ok();
            return Err(e.into());
        }
    };

    remove_if_exists(dst).await?;

    if let Err(e) = tokio::fs::rename(&tmp, dst).await {
        remove_if_exists(&tmp).await.ok();
        return Err(e.into());
    }

    debug!(src = %src.display(), dst = %dst.display(), bytes, "copy with replace complete");
    Ok(bytes)
}

/// Delete a file, treating NotFound as success.
pub(crate) async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
