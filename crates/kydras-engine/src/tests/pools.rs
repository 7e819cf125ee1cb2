//! Pool lifecycle and drive membership tests.

use std::path::PathBuf;
use std::sync::Arc;

use kydras_index::ReplicaIndex;
use kydras_types::{DriveHealth, PoolId, PoolType};
use tempfile::TempDir;

use crate::{EngineError, KydrasEngine};

use super::helpers::pool_with_drives;

fn bare_engine() -> (KydrasEngine, TempDir) {
    let db_dir = TempDir::new().unwrap();
    let index = Arc::new(ReplicaIndex::open_at(db_dir.path().join("kydras.db")).unwrap());
    (KydrasEngine::new(index), db_dir)
}

#[tokio::test]
async fn test_create_pool_blank_name_fails() {
    let (engine, _db) = bare_engine();
    let dir = TempDir::new().unwrap();
    let result = engine
        .create_pool("   ", &[dir.path().to_path_buf()], PoolType::Jbod)
        .await;
    assert!(matches!(result, Err(EngineError::ArgEmpty("pool name"))));
}

#[tokio::test]
async fn test_create_pool_no_drives_fails() {
    let (engine, _db) = bare_engine();
    let result = engine.create_pool("p", &[], PoolType::Jbod).await;
    assert!(matches!(result, Err(EngineError::ArgEmpty("drive paths"))));
}

#[tokio::test]
async fn test_create_pool_probes_drives() {
    let pool = pool_with_drives(2).await;
    let snapshot = pool.engine.get_pool(pool.pool_id).await.unwrap();

    assert_eq!(snapshot.drives.len(), 2);
    for drive in &snapshot.drives {
        assert_eq!(drive.health, DriveHealth::Healthy);
        if cfg!(unix) {
            assert!(drive.total_size > 0, "statvfs should report a volume size");
        }
    }
}

#[tokio::test]
async fn test_mount_point_hint_shape() {
    let pool = pool_with_drives(1).await;
    let snapshot = pool.engine.get_pool(pool.pool_id).await.unwrap();
    if cfg!(windows) {
        assert_eq!(snapshot.mount_point_hint, "K:\\test-pool");
    } else {
        assert_eq!(snapshot.mount_point_hint, "/pools/test-pool");
    }
}

#[tokio::test]
async fn test_get_pool_unknown_is_none() {
    let (engine, _db) = bare_engine();
    assert!(engine.get_pool(PoolId::new()).await.is_none());
}

#[tokio::test]
async fn test_list_pools() {
    let (engine, _db) = bare_engine();
    let d1 = TempDir::new().unwrap();
    let d2 = TempDir::new().unwrap();

    engine
        .create_pool("one", &[d1.path().to_path_buf()], PoolType::Jbod)
        .await
        .unwrap();
    engine
        .create_pool("two", &[d2.path().to_path_buf()], PoolType::Archive)
        .await
        .unwrap();

    let mut names: Vec<String> = engine.list_pools().await.into_iter().map(|p| p.name).collect();
    names.sort();
    assert_eq!(names, vec!["one", "two"]);
}

#[tokio::test]
async fn test_add_drive() {
    let pool = pool_with_drives(1).await;
    let extra = TempDir::new().unwrap();

    assert!(pool.engine.add_drive(pool.pool_id, extra.path()).await.unwrap());
    let snapshot = pool.engine.get_pool(pool.pool_id).await.unwrap();
    assert_eq!(snapshot.drives.len(), 2);
}

#[tokio::test]
async fn test_add_drive_duplicate_is_false() {
    let pool = pool_with_drives(1).await;
    let root = pool.roots[0].clone();
    assert!(!pool.engine.add_drive(pool.pool_id, &root).await.unwrap());
}

#[tokio::test]
async fn test_add_drive_unknown_pool_is_false() {
    let (engine, _db) = bare_engine();
    let dir = TempDir::new().unwrap();
    assert!(!engine.add_drive(PoolId::new(), dir.path()).await.unwrap());
}

#[tokio::test]
async fn test_remove_drive_keeps_files() {
    let pool = pool_with_drives(2).await;
    let orphan = pool.replica_path(1, "keep.txt");
    std::fs::write(&orphan, b"still here").unwrap();

    let root = pool.roots[1].clone();
    assert!(pool.engine.remove_drive(pool.pool_id, &root).await.unwrap());

    let snapshot = pool.engine.get_pool(pool.pool_id).await.unwrap();
    assert_eq!(snapshot.drives.len(), 1);
    assert!(orphan.is_file(), "drive removal must not delete files");
}

#[tokio::test]
async fn test_remove_drive_absent_is_false() {
    let pool = pool_with_drives(1).await;
    let absent = PathBuf::from("/definitely/not/a/member");
    assert!(!pool.engine.remove_drive(pool.pool_id, &absent).await.unwrap());
}

#[tokio::test]
async fn test_check_drive_health() {
    let (engine, _db) = bare_engine();
    let dir = TempDir::new().unwrap();

    assert_eq!(engine.check_drive_health(dir.path()).await, DriveHealth::Healthy);
    assert_eq!(
        engine.check_drive_health(&dir.path().join("missing")).await,
        DriveHealth::Warning
    );
}

#[tokio::test]
async fn test_updated_timestamp_moves_on_mutation() {
    let pool = pool_with_drives(1).await;
    let before = pool.engine.get_pool(pool.pool_id).await.unwrap().updated_utc;

    let extra = TempDir::new().unwrap();
    pool.engine.add_drive(pool.pool_id, extra.path()).await.unwrap();

    let after = pool.engine.get_pool(pool.pool_id).await.unwrap().updated_utc;
    assert!(after >= before);
}
