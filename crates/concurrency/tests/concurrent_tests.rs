//! Concurrent/Multi-threaded Tests for strata-concurrency
//!
//! These tests verify correct behavior under actual concurrent execution:
//!
//! 1. **Single Creation** - Racing first references open exactly one session
//! 2. **Exactly-Once Release** - Racing flushes close the session once
//! 3. **Timer vs Finalize** - A commit racing the reclamation timer never
//!    double-releases
//! 4. **Owner Claim** - Exactly one racer begins and owns a new transaction
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! cargo test --test concurrent_tests -- --nocapture --test-threads=1  # sequential for debugging
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use strata_concurrency::{FlushScheduler, TransactionFactory, DEFAULT_QUEUE_DEPTH};
use strata_core::testing::MemorySessionFactory;

// ============================================================================
// Test Helpers
// ============================================================================

fn create_env() -> (Arc<TransactionFactory>, Arc<MemorySessionFactory>) {
    let sessions = Arc::new(MemorySessionFactory::new());
    let factory = Arc::new(TransactionFactory::new(sessions.clone()));
    (factory, sessions)
}

fn run_parallel<F>(threads: usize, f: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(threads));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                barrier.wait();
                f(i);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// SECTION 1: Single Creation
// ============================================================================

mod single_creation {
    use super::*;

    #[test]
    fn test_racing_first_references_open_one_session() {
        let (factory, sessions) = create_env();
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let f = Arc::clone(&factory);
        let s = Arc::clone(&seen);
        run_parallel(16, move |_| {
            let status = f.get_transaction_status("shared").unwrap();
            s.lock().insert(Arc::as_ptr(&status) as usize);
        });

        assert_eq!(seen.lock().len(), 1, "all threads must see one status");
        assert_eq!(sessions.log().opened(), 1);
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_distinct_ids_do_not_interfere() {
        let (factory, sessions) = create_env();

        let f = Arc::clone(&factory);
        run_parallel(8, move |i| {
            for round in 0..10 {
                let id = format!("tx-{}-{}", i, round);
                let status = f.get_transaction_status(&id).unwrap();
                assert!(status.is_new_transaction());
            }
        });

        assert_eq!(factory.len(), 80);
        assert_eq!(sessions.log().opened(), 80);
    }
}

// ============================================================================
// SECTION 2: Exactly-Once Release
// ============================================================================

mod exactly_once_release {
    use super::*;

    #[test]
    fn test_racing_flushes_close_once() {
        let (factory, sessions) = create_env();
        let status = factory.get_transaction_status("tx1").unwrap();
        status.begin_if_new("owner").unwrap();
        let released = Arc::new(AtomicUsize::new(0));

        let st = Arc::clone(&status);
        let r = Arc::clone(&released);
        run_parallel(12, move |_| {
            if st.flush() {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        let log = sessions.log();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(log.closed(), 1);
        assert_eq!(log.double_closes(), 0);
        assert_eq!(log.rollbacks(), 1);
        assert!(factory.is_empty());
    }

    #[test]
    fn test_flush_all_races_with_individual_flushes() {
        let (factory, sessions) = create_env();
        for i in 0..20 {
            factory.get_transaction_status(&format!("tx{}", i)).unwrap();
        }

        let f = Arc::clone(&factory);
        run_parallel(4, move |i| {
            if i == 0 {
                f.flush_all();
            } else {
                for id in f.ids() {
                    if let Some(status) = f.lookup(&id) {
                        status.flush();
                    }
                }
            }
        });

        assert!(factory.is_empty());
        assert_eq!(sessions.log().closed(), 20);
        assert_eq!(sessions.log().double_closes(), 0);
    }
}

// ============================================================================
// SECTION 3: Timer vs Finalize
// ============================================================================

mod timer_vs_finalize {
    use super::*;

    #[test]
    fn test_commit_racing_timer_never_double_releases() {
        let (factory, sessions) = create_env();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();

        for i in 0..50 {
            let id = format!("tx{}", i);
            let status = factory.get_transaction_status(&id).unwrap();
            status.begin_if_new("owner").unwrap();
            status
                .delay_flush(&scheduler, Duration::from_millis(1))
                .unwrap();

            // Whichever wins, the session is released once
            if status.commit().is_ok() {
                status.flush();
            }
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !factory.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let log = sessions.log();
        assert!(factory.is_empty());
        assert_eq!(log.closed(), 50);
        assert_eq!(log.double_closes(), 0);
        assert_eq!(log.commits() + log.rollbacks(), 50);
        assert_eq!(scheduler.pending(), 0);
    }
}

// ============================================================================
// SECTION 4: Owner Claim
// ============================================================================

mod owner_claim {
    use super::*;

    #[test]
    fn test_exactly_one_racer_begins() {
        let (factory, sessions) = create_env();
        let winners = Arc::new(Mutex::new(Vec::new()));

        let f = Arc::clone(&factory);
        let w = Arc::clone(&winners);
        run_parallel(10, move |i| {
            let owner = format!("caller-{}", i);
            let status = f.get_transaction_status("tx1").unwrap();
            if status.begin_if_new(&owner).unwrap() {
                w.lock().push(owner);
            }
        });

        let winners = winners.lock();
        assert_eq!(winners.len(), 1);
        let status = factory.lookup("tx1").unwrap();
        assert_eq!(status.owner_id().as_ref(), Some(&winners[0]));
        assert_eq!(sessions.log().begins(), 1);
    }
}
