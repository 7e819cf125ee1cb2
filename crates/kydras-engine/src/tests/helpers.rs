//! Shared test utilities for kydras-engine tests.

use std::path::PathBuf;
use std::sync::Arc;

use kydras_index::ReplicaIndex;
use kydras_types::{PoolId, PoolRule, PoolType};
use tempfile::TempDir;

use crate::KydrasEngine;

/// An engine with one pool over `n` TempDir drive roots and a
/// TempDir-backed sidecar index.
pub struct TestPool {
    pub engine: KydrasEngine,
    pub pool_id: PoolId,
    pub roots: Vec<PathBuf>,
    _drive_dirs: Vec<TempDir>,
    _db_dir: TempDir,
}

impl TestPool {
    /// Append a placement rule to the test pool.
    pub async fn add_rule(&self, rule: PoolRule) {
        assert!(self.engine.add_rule(self.pool_id, rule).await.unwrap());
    }

    /// Absolute path of `rel` on drive `i`.
    pub fn replica_path(&self, i: usize, rel: &str) -> PathBuf {
        self.roots[i].join(rel)
    }

    /// How many drives currently hold `rel`.
    pub fn replica_count(&self, rel: &str) -> usize {
        self.roots.iter().filter(|r| r.join(rel).is_file()).count()
    }
}

/// Create a pool over `n` fresh TempDir drive roots.
pub async fn pool_with_drives(n: usize) -> TestPool {
    let db_dir = TempDir::new().unwrap();
    let index = Arc::new(ReplicaIndex::open_at(db_dir.path().join("kydras.db")).unwrap());
    let engine = KydrasEngine::new(index);

    let drive_dirs: Vec<TempDir> = (0..n).map(|_| TempDir::new().unwrap()).collect();
    let roots: Vec<PathBuf> = drive_dirs.iter().map(|d| d.path().to_path_buf()).collect();

    let pool = engine
        .create_pool("test-pool", &roots, PoolType::Mirror)
        .await
        .unwrap();

    TestPool {
        engine,
        pool_id: pool.id,
        roots,
        _drive_dirs: drive_dirs,
        _db_dir: db_dir,
    }
}

/// Uppercase hex SHA-256, the digest shape the engine records.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data)).to_ascii_uppercase()
}

/// Collect all file names under a root that carry an engine side-file
/// suffix. Used to assert temp hygiene.
pub fn side_files_under(root: &PathBuf) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if kydras_store::is_side_file(name) {
                    found.push(name.to_string());
                }
            }
        }
    }
    found
}

/// Read an engine-returned stream to a byte vector.
pub async fn read_stream(file: tokio::fs::File) -> Vec<u8> {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let mut file = file;
    file.read_to_end(&mut buf).await.unwrap();
    buf
}
