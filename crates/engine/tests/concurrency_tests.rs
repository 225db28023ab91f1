//! Coordinator Concurrency Tests
//!
//! Many callers driving the same transaction id at once:
//! - Shared transactions see one session and one owner
//! - Racing finalizers release the session exactly once
//! - Independent auto-commit requests never leak sessions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use strata_core::testing::MemorySessionFactory;
use strata_engine::{RequestStatus, TransactionCoordinator, TransactionRequest};

fn setup() -> (Arc<TransactionCoordinator>, Arc<MemorySessionFactory>) {
    let sessions = Arc::new(MemorySessionFactory::new());
    let coordinator = Arc::new(TransactionCoordinator::new(sessions.clone()).unwrap());
    (coordinator, sessions)
}

#[test]
fn test_concurrent_prepares_share_one_session() {
    let (coordinator, sessions) = setup();
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..25 {
                    let request = TransactionRequest::new(
                        RequestStatus::Prepare,
                        "shared",
                        format!("caller-{}", i),
                    )
                    .with_sql(format!("INSERT INTO t VALUES ({}, {})", i, n));
                    let response = coordinator.do_transaction(&request);
                    assert!(response.is_ok(), "{}", response.error);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = sessions.log();
    assert_eq!(log.opened(), 1);
    assert_eq!(log.begins(), 1);
    assert_eq!(log.statements().len(), num_threads * 25);

    let status = coordinator.factory().lookup("shared").unwrap();
    let owner = status.owner_id().unwrap();
    let commit = coordinator.do_transaction(&TransactionRequest::new(
        RequestStatus::Commit,
        "shared",
        owner,
    ));
    assert!(commit.is_ok());
    assert_eq!(log.commits(), 1);
    assert_eq!(log.closed(), 1);
}

#[test]
fn test_racing_rollbacks_release_once() {
    let (coordinator, sessions) = setup();
    coordinator.do_transaction(
        &TransactionRequest::new(RequestStatus::Prepare, "tx1", "A").with_sql("UPDATE t SET a = 1"),
    );

    let num_threads = 6;
    let barrier = Arc::new(Barrier::new(num_threads));
    let successes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            let successes = Arc::clone(&successes);
            thread::spawn(move || {
                barrier.wait();
                let request =
                    TransactionRequest::new(RequestStatus::Rollback, "tx1", format!("r{}", i));
                if coordinator.do_transaction(&request).is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = sessions.log();
    assert!(successes.load(Ordering::SeqCst) >= 1);
    assert_eq!(log.double_closes(), 0);
    assert_eq!(log.closed(), log.opened());
    assert!(coordinator.active_transactions().is_empty());
}

#[test]
fn test_auto_commit_requests_never_leak_sessions() {
    let (coordinator, sessions) = setup();
    let num_threads = 4;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..50 {
                    let id = format!("auto-{}-{}", i, n);
                    let request = TransactionRequest::new(RequestStatus::None, id, "worker")
                        .with_sql("UPDATE counters SET n = n + 1");
                    assert!(coordinator.do_transaction(&request).is_ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = sessions.log();
    assert_eq!(log.opened(), 200);
    assert_eq!(log.commits(), 200);
    assert_eq!(log.closed(), 200);
    assert!(coordinator.active_transactions().is_empty());
    assert_eq!(coordinator.metrics().total_committed, 200);
}
