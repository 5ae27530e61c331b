use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use trustledger_db::{
    allocate, create_pool, issued, run_migrations, write_transaction, DbRuntimeSettings, Sequence,
};

#[test]
fn db_initialization_works() {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 1,
        },
    )
    .expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert_eq!(applied, 5);

    assert_eq!(issued(&conn, Sequence::AgentId).unwrap(), 0);
}

#[test]
fn concurrent_allocations_never_collide() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("sequences.db");
    let pool = create_pool(
        path.to_str().expect("utf-8 path"),
        DbRuntimeSettings {
            busy_timeout_ms: 10_000,
            pool_max_size: 8,
        },
    )
    .expect("failed to create pool");
    run_migrations(&pool.get().expect("failed to get connection"))
        .expect("failed to run migrations");

    let pool = Arc::new(pool);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut claimed = Vec::new();
                for _ in 0..10 {
                    let mut conn = pool.get().expect("failed to get connection");
                    let tx = write_transaction(&mut conn).expect("failed to begin");
                    let id = allocate(&tx, Sequence::ValidationRequestId)
                        .expect("failed to allocate");
                    tx.commit().expect("failed to commit");
                    claimed.push(id);
                }
                claimed
            })
        })
        .collect();

    let mut all = BTreeSet::new();
    for handle in handles {
        for id in handle.join().expect("worker panicked") {
            assert!(all.insert(id), "id {id} was handed out twice");
        }
    }

    let expected: BTreeSet<u64> = (0..80).collect();
    assert_eq!(all, expected);
}
