//! Per-drive observation: capacity, class guess, health check.

use std::path::Path;

use chrono::Utc;
use kydras_types::{DriveClass, DriveHealth, PoolDrive};
use tracing::{debug, warn};

use crate::atomic::{remove_if_exists, unique_hex32};
use crate::error::StoreError;

/// Probe the total and free bytes of the volume holding `root`.
///
/// Free space is what an unprivileged writer can actually use
/// (`f_bavail`, not `f_bfree`). Returns `(0, 0)` on hosts without
/// `statvfs`.
pub async fn probe_capacity(root: impl AsRef<Path>) -> Result<(u64, u64), StoreError> {
    let path = root.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || statvfs(&path))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

/// Refresh a drive's observed size, free space, and probe timestamp.
///
/// Called after `AddDrive` and after each successful write or delete.
/// A failed probe leaves the previous numbers in place and downgrades
/// health to [`DriveHealth::Warning`].
pub async fn refresh_drive(drive: &mut PoolDrive) {
    match probe_capacity(&drive.root_path).await {
        Ok((total, free)) => {
            drive.total_size = total;
            drive.free_space = free;
            drive.last_health_check = Utc::now();
            debug!(
                root = %drive.root_path.display(),
                total,
                free,
                "refreshed drive capacity"
            );
        }
        Err(e) => {
            warn!(root = %drive.root_path.display(), %e, "capacity probe failed");
            drive.health = DriveHealth::Warning;
            drive.last_health_check = Utc::now();
        }
    }
}

/// Host-specific initial guess at a drive's device class.
///
/// UNC-style roots are network mounts; everything else is assumed to be
/// local solid state until the operator says otherwise.
pub fn guess_class(root: impl AsRef<Path>) -> DriveClass {
    let s = root.as_ref().to_string_lossy();
    if s.starts_with("\\\\") || s.starts_with("//") {
        DriveClass::Network
    } else {
        DriveClass::Ssd
    }
}

/// Probe a drive root by writing and deleting a uniquely named sentinel
/// file. Success means [`DriveHealth::Healthy`]; any failure, including a
/// nonexistent root, means [`DriveHealth::Warning`].
pub async fn check_drive_health(root: impl AsRef<Path>) -> DriveHealth {
    let root = root.as_ref();
    if !tokio::fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false) {
        return DriveHealth::Warning;
    }

    let sentinel = root.join(format!(".kydras_health_{}", unique_hex32()));
    match tokio::fs::write(&sentinel, b"kydras health probe").await {
        Ok(()) => {
            if let Err(e) = remove_if_exists(&sentinel).await {
                warn!(root = %root.display(), %e, "failed to delete health sentinel");
                return DriveHealth::Warning;
            }
            DriveHealth::Healthy
        }
        Err(e) => {
            warn!(root = %root.display(), %e, "health sentinel write failed");
            DriveHealth::Warning
        }
    }
}

/// Volume capacity via `libc::statvfs`: `(total_bytes, available_bytes)`.
#[cfg(unix)]
fn statvfs(path: &Path) -> Result<(u64, u64), StoreError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| StoreError::Probe {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;

    // SAFETY: `c_path` is a valid null-terminated C string and `stat` is a
    // zero-initialized out-parameter; libc::statvfs only reads the former
    // and writes the latter, both valid for the duration of the call.
    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(StoreError::Probe {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }

        let block_size = stat.f_frsize as u64;
        let total = stat.f_blocks as u64 * block_size;
        let available = stat.f_bavail as u64 * block_size;
        Ok((total, available))
    }
}

#[cfg(not(unix))]
fn statvfs(_path: &Path) -> Result<(u64, u64), StoreError> {
    // Unknown capacity; the scheduler treats free == 0 as "unknown, allow".
    Ok((0, 0))
}
