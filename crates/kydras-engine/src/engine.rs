//! [`KydrasEngine`] — pool lifecycle and the simple pool operations.
//!
//! The write coordinator, read self-healer, and rebalancer live in their
//! own modules; this one owns the pool map and everything that does not
//! need a multi-step protocol: create/add/remove/get/list, delete,
//! exists, native-glob listing, and drive health checks.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use kydras_index::ReplicaIndex;
use kydras_store::{check_drive_health, guess_class, is_side_file, refresh_drive};
use kydras_types::{
    DriveHealth, PoolDrive, PoolId, PoolRule, PoolType, StoragePool, mount_point_hint,
    sanitize_rel_path,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// The pool-level storage engine.
///
/// Pools live in memory for the process lifetime; only the replica index
/// is persisted. The engine is re-entrant per pool: operations snapshot
/// the pool under a read lock, do their I/O without holding it, and
/// re-acquire a write lock only to fold observations (free space,
/// timestamps) back in.
pub struct KydrasEngine {
    pools: RwLock<HashMap<PoolId, StoragePool>>,
    index: Arc<ReplicaIndex>,
}

impl KydrasEngine {
    /// Create an engine over an existing replica index.
    pub fn new(index: Arc<ReplicaIndex>) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            index,
        }
    }

    /// Create an engine with the index at its default sidecar location.
    pub fn open_default() -> Result<Self, EngineError> {
        Ok(Self::new(Arc::new(ReplicaIndex::open_default()?)))
    }

    /// The shared replica index.
    pub fn index(&self) -> &Arc<ReplicaIndex> {
        &self.index
    }

    // ------------------------------------------------------------------
    // Pool lifecycle
    // ------------------------------------------------------------------

    /// Create a pool over the given drive roots.
    ///
    /// Every root is probed for capacity and health before the pool is
    /// registered. Fails with [`EngineError::ArgEmpty`] when the name is
    /// blank or no drive paths are given.
    pub async fn create_pool(
        &self,
        name: &str,
        drive_paths: &[PathBuf],
        pool_type: PoolType,
    ) -> Result<StoragePool, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::ArgEmpty("pool name"));
        }
        if drive_paths.is_empty() {
            return Err(EngineError::ArgEmpty("drive paths"));
        }

        let mut drives = Vec::with_capacity(drive_paths.len());
        for path in drive_paths {
            drives.push(probe_new_drive(path).await);
        }

        let now = Utc::now();
        let pool = StoragePool {
            id: PoolId::new(),
            name: name.to_string(),
            pool_type,
            mount_point_hint: mount_point_hint(name),
            drives,
            rules: Vec::new(),
            created_utc: now,
            updated_utc: now,
        };

        info!(
            pool_id = %pool.id,
            name,
            drives = pool.drives.len(),
            "created pool"
        );

        self.pools.write().await.insert(pool.id, pool.clone());
        Ok(pool)
    }

    /// Add a drive to an existing pool. Returns `false` for an unknown
    /// pool or a root that is already a member.
    pub async fn add_drive(&self, pool_id: PoolId, drive_path: &Path) -> Result<bool, EngineError> {
        let drive = probe_new_drive(drive_path).await;

        let mut pools = self.pools.write().await;
        let Some(pool) = pools.get_mut(&pool_id) else {
            return Ok(false);
        };
        if pool.drive(drive_path).is_some() {
            debug!(pool_id = %pool_id, root = %drive_path.display(), "drive already in pool");
            return Ok(false);
        }

        pool.drives.push(drive);
        pool.updated_utc = Utc::now();
        info!(pool_id = %pool_id, root = %drive_path.display(), "added drive");
        Ok(true)
    }

    /// Remove a drive from a pool. Files on the drive are left in place.
    pub async fn remove_drive(
        &self,
        pool_id: PoolId,
        drive_path: &Path,
    ) -> Result<bool, EngineError> {
        let mut pools = self.pools.write().await;
        let Some(pool) = pools.get_mut(&pool_id) else {
            return Ok(false);
        };

        let before = pool.drives.len();
        pool.drives.retain(|d| d.root_path != drive_path);
        let removed = pool.drives.len() < before;
        if removed {
            pool.updated_utc = Utc::now();
            info!(pool_id = %pool_id, root = %drive_path.display(), "removed drive");
        }
        Ok(removed)
    }

    /// Append a placement rule to a pool's rule list. Rules are evaluated
    /// in insertion order; the first match wins.
    pub async fn add_rule(&self, pool_id: PoolId, rule: PoolRule) -> Result<bool, EngineError> {
        let mut pools = self.pools.write().await;
        let Some(pool) = pools.get_mut(&pool_id) else {
            return Ok(false);
        };
        pool.rules.push(rule);
        pool.updated_utc = Utc::now();
        Ok(true)
    }

    /// Fetch a snapshot of a pool by ID.
    pub async fn get_pool(&self, pool_id: PoolId) -> Option<StoragePool> {
        self.pools.read().await.get(&pool_id).cloned()
    }

    /// Snapshots of all pools, in no particular order.
    pub async fn list_pools(&self) -> Vec<StoragePool> {
        self.pools.read().await.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Simple file operations
    // ------------------------------------------------------------------

    /// Delete a relative path from every drive in the pool and drop its
    /// index rows. Per-drive failures are logged and skipped.
    pub async fn delete(&self, pool_id: PoolId, rel_path: &str) -> Result<bool, EngineError> {
        let rel = sanitize_rel_path(rel_path)?;
        let Some(pool) = self.get_pool(pool_id).await else {
            return Ok(false);
        };

        for drive in &pool.drives {
            let path = drive.root_path.join(&rel);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "deleted replica");
                    self.refresh_pool_drive(pool_id, &drive.root_path).await;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), %e, "failed to delete replica");
                }
            }
        }

        self.index.remove_all(pool_id, &rel)?;
        self.touch_pool(pool_id).await;
        Ok(true)
    }

    /// True when any drive in the pool holds the file, regardless of
    /// whether its content agrees with the index.
    pub async fn exists(&self, pool_id: PoolId, rel_path: &str) -> Result<bool, EngineError> {
        let rel = sanitize_rel_path(rel_path)?;
        let Some(pool) = self.get_pool(pool_id).await else {
            return Ok(false);
        };

        for drive in &pool.drives {
            let path = drive.root_path.join(&rel);
            if tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Union of relative paths across all drives matching a host-native
    /// glob pattern (default `*`).
    ///
    /// The walk is purely on-disk: a path present only in the index does
    /// not appear. Engine side files are excluded.
    pub async fn list(
        &self,
        pool_id: PoolId,
        pattern: Option<&str>,
    ) -> Result<Vec<String>, EngineError> {
        let Some(pool) = self.get_pool(pool_id).await else {
            return Ok(Vec::new());
        };
        let pattern = pattern.unwrap_or("*").to_string();
        let roots: Vec<PathBuf> = pool.drives.iter().map(|d| d.root_path.clone()).collect();

        let names = tokio::task::spawn_blocking(move || glob_union(&roots, &pattern))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
        Ok(names)
    }

    /// Probe a drive root's health by writing and deleting a sentinel file.
    pub async fn check_drive_health(&self, drive_path: &Path) -> DriveHealth {
        check_drive_health(drive_path).await
    }

    // ------------------------------------------------------------------
    // Shared internals
    // ------------------------------------------------------------------

    /// Snapshot a pool for an I/O operation, without holding the lock.
    pub(crate) async fn pool_snapshot(&self, pool_id: PoolId) -> Option<StoragePool> {
        self.pools.read().await.get(&pool_id).cloned()
    }

    /// Re-probe one drive's capacity inside the live pool map.
    pub(crate) async fn refresh_pool_drive(&self, pool_id: PoolId, root: &Path) {
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get_mut(&pool_id) {
            if let Some(drive) = pool.drive_mut(root) {
                refresh_drive(drive).await;
            }
        }
    }

    /// Bump a pool's update timestamp.
    pub(crate) async fn touch_pool(&self, pool_id: PoolId) {
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get_mut(&pool_id) {
            pool.updated_utc = Utc::now();
        }
    }
}

/// Build and probe a drive record for a root path.
async fn probe_new_drive(path: &Path) -> PoolDrive {
    let mut drive = PoolDrive::new(path, guess_class(path));
    refresh_drive(&mut drive).await;
    drive.health = check_drive_health(path).await;
    drive
}

/// Blocking host-native glob walk over each drive root; returns the
/// union of matching relative paths, sorted.
fn glob_union(roots: &[PathBuf], pattern: &str) -> Vec<String> {
    let mut union = BTreeSet::new();

    for root in roots {
        // Bare file patterns match at any depth (the root level needs its
        // own glob — `**` only covers subdirectories); patterns with their
        // own directory structure anchor at the root.
        let full_patterns = if pattern.contains(['/', '\\']) {
            vec![root.join(pattern)]
        } else {
            vec![root.join(pattern), root.join("**").join(pattern)]
        };

        for full in full_patterns {
            let Some(full) = full.to_str().map(str::to_owned) else {
                continue;
            };
            collect_matches(root, &full, &mut union);
        }
    }

    union.into_iter().collect()
}

/// Run one glob pattern and fold matching regular files into the union.
fn collect_matches(root: &Path, full: &str, union: &mut BTreeSet<String>) {
    let paths = match glob::glob(full) {
        Ok(paths) => paths,
        Err(e) => {
            warn!(pattern = %full, %e, "bad list pattern");
            return;
        }
    };

    for entry in paths {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, "unreadable entry during list");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_side_file(name) {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            union.insert(rel.to_string_lossy().into_owned());
        }
    }
}
