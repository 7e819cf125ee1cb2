//! Two-phase replicated write coordinator.
//!
//! Phase 1 stages the content to a `.2pc` side file next to every target
//! replica path and hashes each staged file back through the OS. The
//! integrity gate requires all staged hashes to collapse to a single
//! digest. Phase 2 atomically promotes each side file onto its final
//! path and records the replica in the index.
//!
//! Phase-1 failures always clean their temporaries. Phase-2 partial
//! failures are deliberately not rolled back: promoted replicas remain,
//! and the read self-healer / rebalancer converge the rest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use kydras_placement::{rank_drives, resolve_rule};
use kydras_store::{atomic_replace, hash_file, stage_path};
use kydras_types::{PoolId, ReplicaRecord, sanitize_rel_path};
use tracing::{debug, info, warn};

use crate::engine::KydrasEngine;
use crate::error::EngineError;

/// One staged replica awaiting promotion.
struct StagedReplica {
    drive_root: PathBuf,
    final_path: PathBuf,
    temp_path: PathBuf,
    sha256: String,
    size_bytes: u64,
}

impl KydrasEngine {
    /// Write `data` to a relative path, replicated per the first matching
    /// rule.
    ///
    /// Returns `Ok(false)` for an unknown pool. Fails with
    /// [`EngineError::InsufficientReplicas`] when fewer eligible drives
    /// exist than the rule's duplication level, and with
    /// [`EngineError::IntegrityMismatch`] when the staged replicas do not
    /// agree on a single digest.
    pub async fn write(
        &self,
        pool_id: PoolId,
        rel_path: &str,
        data: &[u8],
    ) -> Result<bool, EngineError> {
        let rel = sanitize_rel_path(rel_path)?;
        let Some(pool) = self.pool_snapshot(pool_id).await else {
            return Ok(false);
        };

        let rule = resolve_rule(&pool.rules, &rel).cloned();
        let required = rule
            .as_ref()
            .map(|r| r.duplication_level.max(1))
            .unwrap_or(1) as usize;

        let ranked = rank_drives(&pool.drives, rule.as_ref(), data.len() as u64);
        if ranked.len() < required {
            return Err(EngineError::InsufficientReplicas {
                required,
                eligible: ranked.len(),
            });
        }
        let targets: Vec<PathBuf> = ranked
            .into_iter()
            .take(required)
            .map(|d| d.root_path.clone())
            .collect();

        debug!(
            pool_id = %pool_id,
            rel_path = %rel,
            replicas = required,
            bytes = data.len(),
            "write: staging"
        );

        // Phase 1 — stage to every target, hash each staged file.
        let mut staged: Vec<StagedReplica> = Vec::with_capacity(targets.len());
        for root in &targets {
            match stage_replica(root, &rel, data).await {
                Ok(replica) => staged.push(replica),
                Err(e) => {
                    cleanup_staged(&staged).await;
                    return Err(e);
                }
            }
        }

        // Integrity gate: every staged replica must carry the same digest.
        // This also rejects content that mutated between stagings.
        let distinct: HashSet<&str> = staged.iter().map(|s| s.sha256.as_str()).collect();
        if distinct.len() != 1 {
            warn!(
                pool_id = %pool_id,
                rel_path = %rel,
                distinct = distinct.len(),
                "write: staged hashes disagree, aborting"
            );
            cleanup_staged(&staged).await;
            return Err(EngineError::IntegrityMismatch {
                rel_path: rel,
                detail: format!("{} distinct staged hashes", distinct.len()),
            });
        }

        // Phase 2 — promote. Failures here are not rolled back: already
        // promoted replicas stay, later reads and rebalances converge.
        for replica in &staged {
            atomic_replace(&replica.temp_path, &replica.final_path).await?;
            self.refresh_pool_drive(pool_id, &replica.drive_root).await;
            self.index().upsert(&ReplicaRecord {
                pool_id,
                rel_path: rel.clone(),
                drive_root: replica.drive_root.to_string_lossy().into_owned(),
                size_bytes: replica.size_bytes,
                sha256: replica.sha256.clone(),
                modified_utc: Utc::now(),
            })?;
        }
        self.touch_pool(pool_id).await;

        info!(
            pool_id = %pool_id,
            rel_path = %rel,
            replicas = staged.len(),
            sha256 = %staged[0].sha256,
            "write committed"
        );
        Ok(true)
    }
}

/// Stage one replica: ensure the parent directory, write the `.2pc` side
/// file, hash it back through the OS.
async fn stage_replica(
    drive_root: &Path,
    rel: &str,
    data: &[u8],
) -> Result<StagedReplica, EngineError> {
    let final_path = drive_root.join(rel);
    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = stage_path(&final_path);
    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(e.into());
    }

    match hash_file(&temp_path).await {
        Ok(sha256) => Ok(StagedReplica {
            drive_root: drive_root.to_path_buf(),
            final_path,
            temp_path,
            sha256,
            size_bytes: data.len() as u64,
        }),
        Err(e) => {
            tokio::fs::remove_file(&temp_path).await.ok();
            Err(e.into())
        }
    }
}

/// Delete the side files of every staged replica.
async fn cleanup_staged(staged: &[StagedReplica]) {
    for replica in staged {
        if let Err(e) = tokio::fs::remove_file(&replica.temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(temp = %replica.temp_path.display(), %e, "failed to clean staged temp");
            }
        }
    }
}
