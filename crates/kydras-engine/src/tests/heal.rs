//! Read-path self-healing tests.

use kydras_types::{PoolId, PoolRule};

use super::helpers::{pool_with_drives, read_stream, sha256_hex};

#[tokio::test]
async fn test_read_returns_written_content() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "docs/a.txt", b"hello").await.unwrap();

    let stream = pool.engine.read(pool.pool_id, "docs/a.txt").await.unwrap().unwrap();
    assert_eq!(read_stream(stream).await, b"hello");
}

#[tokio::test]
async fn test_read_restores_deleted_replica() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "docs/a.txt", b"hello").await.unwrap();

    // Out-of-band loss of one replica.
    std::fs::remove_file(pool.replica_path(1, "docs/a.txt")).unwrap();

    let stream = pool.engine.read(pool.pool_id, "docs/a.txt").await.unwrap().unwrap();
    assert_eq!(read_stream(stream).await, b"hello");

    // The lost replica is back, byte-identical.
    assert_eq!(
        std::fs::read(pool.replica_path(1, "docs/a.txt")).unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn test_read_repairs_divergent_replica_to_indexed_hash() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "docs/a.txt", b"hello").await.unwrap();

    // Out-of-band corruption of the second replica.
    std::fs::write(pool.replica_path(1, "docs/a.txt"), b"HELLO").unwrap();

    let stream = pool.engine.read(pool.pool_id, "docs/a.txt").await.unwrap().unwrap();
    // The index remembers "hello"; the divergent copy must not win.
    assert_eq!(read_stream(stream).await, b"hello");

    assert_eq!(
        std::fs::read(pool.replica_path(1, "docs/a.txt")).unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn test_read_converges_all_replicas() {
    let pool = pool_with_drives(3).await;
    pool.add_rule(PoolRule::new("**").with_duplication(3)).await;
    pool.engine.write(pool.pool_id, "f.bin", b"authoritative").await.unwrap();

    std::fs::write(pool.replica_path(1, "f.bin"), b"junk one").unwrap();
    std::fs::remove_file(pool.replica_path(2, "f.bin")).unwrap();

    let stream = pool.engine.read(pool.pool_id, "f.bin").await.unwrap().unwrap();
    assert_eq!(read_stream(stream).await, b"authoritative");

    for i in 0..3 {
        assert_eq!(
            std::fs::read(pool.replica_path(i, "f.bin")).unwrap(),
            b"authoritative",
            "replica {i} must match the served content"
        );
    }
}

#[tokio::test]
async fn test_read_missing_path_is_none() {
    let pool = pool_with_drives(2).await;
    assert!(pool.engine.read(pool.pool_id, "never/written").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_unknown_pool_is_none() {
    let pool = pool_with_drives(1).await;
    assert!(pool.engine.read(PoolId::new(), "a.txt").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_without_index_serves_any_replica() {
    let pool = pool_with_drives(2).await;

    // File appears out-of-band on one drive; the index knows nothing.
    std::fs::create_dir_all(pool.replica_path(0, "import")).unwrap();
    std::fs::write(pool.replica_path(0, "import/x.dat"), b"external").unwrap();

    let stream = pool.engine.read(pool.pool_id, "import/x.dat").await.unwrap().unwrap();
    assert_eq!(read_stream(stream).await, b"external");

    // Heal extends the replica to the other drive as well.
    assert_eq!(
        std::fs::read(pool.replica_path(1, "import/x.dat")).unwrap(),
        b"external"
    );
}

#[tokio::test]
async fn test_read_touches_source_index_row() {
    let pool = pool_with_drives(1).await;
    pool.engine.write(pool.pool_id, "t.txt", b"tick").await.unwrap();

    let before = pool.engine.index().get_all(pool.pool_id, "t.txt").unwrap()[0].modified_utc;
    let _ = pool.engine.read(pool.pool_id, "t.txt").await.unwrap().unwrap();
    let after = pool.engine.index().get_all(pool.pool_id, "t.txt").unwrap()[0].modified_utc;

    assert!(after >= before);
}

#[tokio::test]
async fn test_heal_records_replica_in_index() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "h.txt", b"heal me").await.unwrap();

    std::fs::remove_file(pool.replica_path(1, "h.txt")).unwrap();
    let _ = pool.engine.read(pool.pool_id, "h.txt").await.unwrap().unwrap();

    let rows = pool.engine.index().get_all(pool.pool_id, "h.txt").unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.sha256, sha256_hex(b"heal me"));
    }
}

#[tokio::test]
async fn test_read_when_all_replicas_diverged_from_index() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "d.txt", b"original").await.unwrap();

    // Both replicas mutate out-of-band to the same new content: the index
    // hash matches nothing, so any hashable replica is served.
    std::fs::write(pool.replica_path(0, "d.txt"), b"mutated").unwrap();
    std::fs::write(pool.replica_path(1, "d.txt"), b"mutated").unwrap();

    let stream = pool.engine.read(pool.pool_id, "d.txt").await.unwrap().unwrap();
    assert_eq!(read_stream(stream).await, b"mutated");
}
