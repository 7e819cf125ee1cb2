//! Read path with self-healing.
//!
//! A read inspects every drive's copy, picks an authoritative source
//! (preferring the digest the index recorded first), repairs any replica
//! that is missing or divergent, and only then hands the caller an open
//! file on the source. Individual heal failures never fail the read.

use std::path::PathBuf;

use chrono::Utc;
use kydras_store::{copy_with_replace, hash_file};
use kydras_types::{PoolId, ReplicaRecord, sanitize_rel_path};
use tracing::{debug, info, warn};

use crate::engine::KydrasEngine;
use crate::error::EngineError;

/// One drive's view of a relative path during a read.
struct ReplicaProbe {
    drive_root: PathBuf,
    path: PathBuf,
    /// `None` when the file is missing or could not be hashed.
    sha256: Option<String>,
}

impl KydrasEngine {
    /// Read a relative path, healing divergent or missing replicas first.
    ///
    /// Returns `Ok(None)` for an unknown pool or when no drive holds a
    /// hashable copy. On success every other drive has been converged to
    /// the served content (failures to do so are logged and skipped), the
    /// source's index row is touched, and the returned
    /// [`tokio::fs::File`] reads the source replica.
    pub async fn read(
        &self,
        pool_id: PoolId,
        rel_path: &str,
    ) -> Result<Option<tokio::fs::File>, EngineError> {
        let rel = sanitize_rel_path(rel_path)?;
        let Some(pool) = self.pool_snapshot(pool_id).await else {
            return Ok(None);
        };

        // Probe every drive: does the file exist, and what does it hash to?
        let mut probes = Vec::with_capacity(pool.drives.len());
        for drive in &pool.drives {
            let path = drive.root_path.join(&rel);
            let present = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            let sha256 = if present {
                match hash_file(&path).await {
                    Ok(h) => Some(h),
                    Err(e) => {
                        // Unreadable counts as unknown, not as absent content.
                        warn!(path = %path.display(), %e, "replica hash failed during read");
                        None
                    }
                }
            } else {
                None
            };
            probes.push(ReplicaProbe {
                drive_root: drive.root_path.clone(),
                path,
                sha256,
            });
        }

        // The first recorded hash is the expectation, when one exists.
        let expected = self
            .index()
            .get_all(pool_id, &rel)?
            .first()
            .map(|r| r.sha256.clone());

        // Prefer a replica matching the expectation; otherwise any replica
        // that hashed at all.
        let source_idx = probes
            .iter()
            .position(|p| p.sha256.is_some() && p.sha256 == expected)
            .or_else(|| probes.iter().position(|p| p.sha256.is_some()));
        let Some(source_idx) = source_idx else {
            debug!(pool_id = %pool_id, rel_path = %rel, "read: no hashable replica");
            return Ok(None);
        };
        let source_hash = probes[source_idx]
            .sha256
            .clone()
            .unwrap_or_default();
        let source_path = probes[source_idx].path.clone();

        // Heal pass: converge every other drive onto the source content.
        for (i, probe) in probes.iter().enumerate() {
            if i == source_idx || probe.sha256.as_deref() == Some(source_hash.as_str()) {
                continue;
            }
            if let Err(e) = self
                .heal_replica(pool_id, &rel, &source_path, &source_hash, probe)
                .await
            {
                warn!(
                    pool_id = %pool_id,
                    rel_path = %rel,
                    drive_root = %probe.drive_root.display(),
                    %e,
                    "heal failed, skipping replica"
                );
            }
        }

        // Touch the source's own row to reflect the observation.
        let size_bytes = tokio::fs::metadata(&source_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        self.index().upsert(&ReplicaRecord {
            pool_id,
            rel_path: rel.clone(),
            drive_root: probes[source_idx].drive_root.to_string_lossy().into_owned(),
            size_bytes,
            sha256: source_hash,
            modified_utc: Utc::now(),
        })?;

        let file = tokio::fs::File::open(&source_path).await?;
        Ok(Some(file))
    }

    /// Copy the source replica over one missing or divergent replica and
    /// record the result.
    async fn heal_replica(
        &self,
        pool_id: PoolId,
        rel: &str,
        source_path: &std::path::Path,
        source_hash: &str,
        probe: &ReplicaProbe,
    ) -> Result<(), EngineError> {
        if let Some(parent) = probe.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        copy_with_replace(source_path, &probe.path).await?;

        let healed_hash = hash_file(&probe.path).await?;
        let size_bytes = tokio::fs::metadata(&probe.path).await.map(|m| m.len())?;
        self.index().upsert(&ReplicaRecord {
            pool_id,
            rel_path: rel.to_string(),
            drive_root: probe.drive_root.to_string_lossy().into_owned(),
            size_bytes,
            sha256: healed_hash,
            modified_utc: Utc::now(),
        })?;
        self.refresh_pool_drive(pool_id, &probe.drive_root).await;

        info!(
            pool_id = %pool_id,
            rel_path = %rel,
            drive_root = %probe.drive_root.display(),
            sha256 = %source_hash,
            "healed replica"
        );
        Ok(())
    }
}
