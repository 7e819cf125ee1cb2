//! Pool-wide rebalancing.
//!
//! Rebalance walks every drive's file set, and for each relative path
//! present anywhere in the pool converges the replica count to the
//! rule-required duplication level: under-replicated paths gain verified
//! copies on the best eligible drives, over-replicated paths lose their
//! lowest-scored holders. Stale engine side files found during the walk
//! are deleted on discovery.
//!
//! Rebalance takes no global locks; it assumes no concurrent external
//! mutation of the drive roots.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use kydras_placement::{rank_drives, resolve_rule, score_drive};
use kydras_store::{copy_with_replace, hash_file, is_side_file};
use kydras_types::{PoolDrive, PoolId, PoolRule, ReplicaRecord, StoragePool};
use tracing::{debug, info, warn};

use crate::engine::KydrasEngine;
use crate::error::EngineError;

impl KydrasEngine {
    /// Converge every relative path in the pool to its rule-required
    /// replica count. Returns `Ok(false)` for an unknown pool.
    ///
    /// Add-side copies are verified against the reference hash; a
    /// mismatch aborts the rebalance with
    /// [`EngineError::IntegrityMismatch`] (completed copies remain and
    /// are consistent). Evict-side delete failures are logged and
    /// skipped.
    pub async fn rebalance(&self, pool_id: PoolId) -> Result<bool, EngineError> {
        let Some(pool) = self.pool_snapshot(pool_id).await else {
            return Ok(false);
        };

        // Step 1: enumerate each drive's file set; the union is the
        // candidate set.
        let mut file_sets: Vec<BTreeSet<String>> = Vec::with_capacity(pool.drives.len());
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for drive in &pool.drives {
            let set = enumerate_drive(&drive.root_path).await;
            candidates.extend(set.iter().cloned());
            file_sets.push(set);
        }

        info!(
            pool_id = %pool_id,
            drives = pool.drives.len(),
            paths = candidates.len(),
            "rebalance: starting"
        );

        for rel in &candidates {
            self.rebalance_path(pool_id, &pool, &file_sets, rel).await?;
        }

        self.touch_pool(pool_id).await;
        info!(pool_id = %pool_id, "rebalance complete");
        Ok(true)
    }

    /// Converge one relative path to its required replica count.
    async fn rebalance_path(
        &self,
        pool_id: PoolId,
        pool: &StoragePool,
        file_sets: &[BTreeSet<String>],
        rel: &str,
    ) -> Result<(), EngineError> {
        let rule = resolve_rule(&pool.rules, rel).cloned();
        let required = rule
            .as_ref()
            .map(|r| r.duplication_level.max(1))
            .unwrap_or(1) as usize;

        let holders: Vec<&PoolDrive> = pool
            .drives
            .iter()
            .zip(file_sets)
            .filter(|(_, set)| set.contains(rel))
            .map(|(d, _)| d)
            .collect();

        // Reference: the first holder whose copy hashes successfully.
        let mut reference: Option<(PathBuf, String, u64)> = None;
        for holder in &holders {
            let path = holder.root_path.join(rel);
            match hash_file(&path).await {
                Ok(hash) => {
                    let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                    reference = Some((path, hash, size));
                    break;
                }
                Err(e) => {
                    warn!(path = %path.display(), %e, "rebalance: holder hash failed");
                }
            }
        }
        let Some((ref_path, ref_hash, ref_size)) = reference else {
            debug!(rel_path = %rel, "rebalance: no hashable holder, skipping");
            return Ok(());
        };

        if holders.len() < required {
            self.add_replicas(
                pool_id,
                pool,
                rel,
                rule.as_ref(),
                &holders,
                required - holders.len(),
                &ref_path,
                &ref_hash,
                ref_size,
            )
            .await?;
        } else if holders.len() > required {
            self.evict_replicas(pool_id, rel, rule.as_ref(), &holders, required)
                .await;
        }
        Ok(())
    }

    /// Copy the reference onto the best eligible non-holders, verifying
    /// each copy against the reference hash.
    #[allow(clippy::too_many_arguments)]
    async fn add_replicas(
        &self,
        pool_id: PoolId,
        pool: &StoragePool,
        rel: &str,
        rule: Option<&PoolRule>,
        holders: &[&PoolDrive],
        missing: usize,
        ref_path: &Path,
        ref_hash: &str,
        ref_size: u64,
    ) -> Result<(), EngineError> {
        let non_holders: Vec<PoolDrive> = pool
            .drives
            .iter()
            .filter(|d| !holders.iter().any(|h| h.root_path == d.root_path))
            .cloned()
            .collect();
        let targets: Vec<PoolDrive> = rank_drives(&non_holders, rule, ref_size)
            .into_iter()
            .take(missing)
            .cloned()
            .collect();

        for target in targets {
            let dst = target.root_path.join(rel);
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            copy_with_replace(ref_path, &dst).await?;

            let copied_hash = hash_file(&dst).await?;
            if copied_hash != ref_hash {
                return Err(EngineError::IntegrityMismatch {
                    rel_path: rel.to_string(),
                    detail: format!(
                        "copy to {} hashed {copied_hash}, expected {ref_hash}",
                        target.root_path.display()
                    ),
                });
            }

            self.index().upsert(&ReplicaRecord {
                pool_id,
                rel_path: rel.to_string(),
                drive_root: target.root_path.to_string_lossy().into_owned(),
                size_bytes: ref_size,
                sha256: copied_hash,
                modified_utc: Utc::now(),
            })?;
            self.refresh_pool_drive(pool_id, &target.root_path).await;

            info!(
                pool_id = %pool_id,
                rel_path = %rel,
                drive_root = %target.root_path.display(),
                "rebalance: added replica"
            );
        }
        Ok(())
    }

    /// Delete the lowest-scored surplus holders. Failures are logged and
    /// skipped; the index row is only dropped when the file is gone.
    async fn evict_replicas(
        &self,
        pool_id: PoolId,
        rel: &str,
        rule: Option<&PoolRule>,
        holders: &[&PoolDrive],
        required: usize,
    ) {
        // Same scorer as placement, stable on ties, best first.
        let mut ranked: Vec<&PoolDrive> = holders.to_vec();
        ranked.sort_by(|a, b| score_drive(b, rule).total_cmp(&score_drive(a, rule)));

        for evict in ranked.into_iter().skip(required) {
            let path = evict.root_path.join(rel);
            let removed = match tokio::fs::remove_file(&path).await {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
                Err(e) => {
                    warn!(path = %path.display(), %e, "rebalance: evict delete failed, skipping");
                    false
                }
            };
            if !removed {
                continue;
            }

            let root = evict.root_path.to_string_lossy();
            if let Err(e) = self.index().remove(pool_id, rel, &root) {
                warn!(rel_path = %rel, drive_root = %root, %e, "rebalance: index remove failed");
            }
            self.refresh_pool_drive(pool_id, &evict.root_path).await;
            info!(
                pool_id = %pool_id,
                rel_path = %rel,
                drive_root = %root,
                "rebalance: evicted replica"
            );
        }
    }
}

/// Recursively enumerate a drive root's relative file paths.
///
/// Stale engine side files (`.2pc`, `.tmp`, `.bak_*`) left by a crash are
/// deleted on discovery instead of being listed. Unreadable directories
/// are logged and skipped; a missing root yields an empty set.
async fn enumerate_drive(root: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if dir == root {
                    debug!(root = %root.display(), %e, "rebalance: drive root not readable");
                } else {
                    warn!(dir = %dir.display(), %e, "rebalance: directory not readable");
                }
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), %e, "rebalance: entry read failed");
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_side_file(&name) {
                warn!(path = %path.display(), "deleting stale side file");
                tokio::fs::remove_file(&path).await.ok();
                continue;
            }

            if let Ok(rel) = path.strip_prefix(root) {
                files.insert(rel.to_string_lossy().into_owned());
            }
        }
    }

    files
}
