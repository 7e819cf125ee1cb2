//! Pool-wide rebalance tests.

use kydras_store::unique_hex32;
use kydras_types::{PoolId, PoolRule};

use super::helpers::{pool_with_drives, sha256_hex};

#[tokio::test]
async fn test_rebalance_evicts_surplus_replica() {
    let pool = pool_with_drives(3).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;

    // File present on all three drives, out-of-band.
    for i in 0..3 {
        std::fs::write(pool.replica_path(i, "over.txt"), b"threefold").unwrap();
    }

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    assert_eq!(pool.replica_count("over.txt"), 2);
    for i in 0..3 {
        let path = pool.replica_path(i, "over.txt");
        if path.is_file() {
            assert_eq!(std::fs::read(&path).unwrap(), b"threefold");
        }
    }
}

#[tokio::test]
async fn test_rebalance_adds_missing_replicas() {
    let pool = pool_with_drives(3).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;

    std::fs::create_dir_all(pool.replica_path(0, "docs")).unwrap();
    std::fs::write(pool.replica_path(0, "docs/u.txt"), b"underneath").unwrap();

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    assert_eq!(pool.replica_count("docs/u.txt"), 2);

    // Every added replica was verified against the reference and indexed.
    let rel = format!("docs{}u.txt", std::path::MAIN_SEPARATOR);
    let rows = pool.engine.index().get_all(pool.pool_id, &rel).unwrap();
    assert_eq!(rows.len(), 1, "one row for the added copy");
    assert_eq!(rows[0].sha256, sha256_hex(b"underneath"));
}

#[tokio::test]
async fn test_rebalance_caps_at_eligible_drives() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(5)).await;

    std::fs::write(pool.replica_path(0, "capped.bin"), b"spread me").unwrap();

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    // Fewer eligible drives than required: every eligible drive holds one.
    assert_eq!(pool.replica_count("capped.bin"), 2);
}

#[tokio::test]
async fn test_rebalance_converged_pool_is_noop() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;
    pool.engine.write(pool.pool_id, "ok.txt", b"stable").await.unwrap();

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    assert_eq!(pool.replica_count("ok.txt"), 2);
    for i in 0..2 {
        assert_eq!(std::fs::read(pool.replica_path(i, "ok.txt")).unwrap(), b"stable");
    }
}

#[tokio::test]
async fn test_rebalance_removes_evicted_index_row() {
    let pool = pool_with_drives(3).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;

    // Replicas and index rows on all three drives.
    for i in 0..3 {
        std::fs::write(pool.replica_path(i, "evict.me"), b"surplus").unwrap();
        pool.engine
            .index()
            .upsert(&kydras_types::ReplicaRecord {
                pool_id: pool.pool_id,
                rel_path: "evict.me".to_string(),
                drive_root: pool.roots[i].to_string_lossy().into_owned(),
                size_bytes: 7,
                sha256: sha256_hex(b"surplus"),
                modified_utc: chrono::Utc::now(),
            })
            .unwrap();
    }

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    assert_eq!(pool.replica_count("evict.me"), 2);
    let rows = pool.engine.index().get_all(pool.pool_id, "evict.me").unwrap();
    assert_eq!(rows.len(), 2, "evicted replica's row must be gone");
    for row in rows {
        let root = std::path::PathBuf::from(&row.drive_root);
        assert!(root.join("evict.me").is_file(), "index row without a file");
    }
}

#[tokio::test]
async fn test_rebalance_unknown_pool_is_false() {
    let pool = pool_with_drives(1).await;
    assert!(!pool.engine.rebalance(PoolId::new()).await.unwrap());
}

#[tokio::test]
async fn test_rebalance_deletes_stale_side_files() {
    let pool = pool_with_drives(2).await;

    let stale_2pc = pool.replica_path(0, &format!("a.txt.{}.2pc", unique_hex32()));
    let stale_tmp = pool.replica_path(0, &format!("b.txt.{}.tmp", unique_hex32()));
    let stale_bak = pool.replica_path(1, &format!("c.txt.bak_{}", unique_hex32()));
    for p in [&stale_2pc, &stale_tmp, &stale_bak] {
        std::fs::write(p, b"crash leftovers").unwrap();
    }

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());

    assert!(!stale_2pc.exists());
    assert!(!stale_tmp.exists());
    assert!(!stale_bak.exists());
}

#[tokio::test]
async fn test_rebalance_skips_unreadable_paths() {
    let pool = pool_with_drives(2).await;
    pool.add_rule(PoolRule::new("**").with_duplication(2)).await;

    // A directory that looks like a file path holder on only one drive.
    std::fs::write(pool.replica_path(0, "fine.txt"), b"fine").unwrap();

    assert!(pool.engine.rebalance(pool.pool_id).await.unwrap());
    assert_eq!(pool.replica_count("fine.txt"), 2);
}
