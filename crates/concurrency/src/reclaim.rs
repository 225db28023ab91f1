//! Delayed reclamation of unattended transactions.
//!
//! One worker thread sleeps until the earliest deadline in a min-heap, then
//! asks the target status to expire the ticket that fired. Timers hold only a
//! weak reference, so a status that was flushed and dropped is skipped.
//!
//! Cancellation and expiry both run under the status lock, which makes them
//! mutually exclusive: whichever gets the lock first wins.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use strata_core::error::{Error, Result};
use tracing::{debug, error, info};

use crate::status::TransactionStatus;

/// Default number of timers that may be armed at once
pub const DEFAULT_QUEUE_DEPTH: usize = 4096;

struct Timer {
    deadline: Instant,
    ticket: u64,
    target: Weak<TransactionStatus>,
}

impl Eq for Timer {}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.ticket == other.ticket
    }
}

// Earliest deadline first, then oldest ticket
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.ticket.cmp(&self.ticket))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct SchedulerInner {
    queue: Mutex<BinaryHeap<Timer>>,
    timer_ready: Condvar,
    shutdown: AtomicBool,
    next_ticket: AtomicU64,
    max_queue_depth: usize,
    scheduled: AtomicU64,
    reclaimed: AtomicU64,
}

/// Cancellable reference to an armed timer
#[derive(Debug)]
pub struct ReclaimHandle {
    ticket: u64,
    txn_id: String,
    scheduler: Weak<SchedulerInner>,
}

impl ReclaimHandle {
    /// Ticket number, unique per scheduler
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Transaction the timer was armed for
    pub fn txn_id(&self) -> &str {
        &self.txn_id
    }

    /// Remove the timer from the queue
    ///
    /// Returns `false` if it already fired or the scheduler is gone.
    pub fn cancel(self) -> bool {
        let Some(inner) = self.scheduler.upgrade() else {
            return false;
        };
        let mut queue = inner.queue.lock();
        let before = queue.len();
        queue.retain(|timer| timer.ticket != self.ticket);
        let removed = queue.len() < before;
        if removed {
            debug!(target: "strata::reclaim", txn_id = %self.txn_id, ticket = self.ticket, "Reclamation cancelled");
        }
        removed
    }
}

/// Timer wheel for transaction timeouts
///
/// The worker thread is named `strata-reclaim` and stops on
/// [`shutdown`](Self::shutdown) or drop. Timers still pending at shutdown
/// are discarded.
pub struct FlushScheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    /// Start a scheduler that holds at most `max_queue_depth` timers
    ///
    /// # Errors
    ///
    /// Returns `Error::Scheduler` if the worker thread cannot be spawned.
    pub fn new(max_queue_depth: usize) -> Result<Self> {
        let inner = Arc::new(SchedulerInner {
            queue: Mutex::new(BinaryHeap::new()),
            timer_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_ticket: AtomicU64::new(1),
            max_queue_depth,
            scheduled: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        });

        let worker_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("strata-reclaim".to_string())
            .spawn(move || worker_loop(&worker_inner))
            .map_err(|e| Error::scheduler(format!("failed to spawn reclaim worker: {}", e)))?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Arm a timer that expires `target` after `delay`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the queue is full, the scheduler has been
    /// shut down, or the deadline overflows.
    pub fn schedule(&self, target: &Arc<TransactionStatus>, delay: Duration) -> Result<ReclaimHandle> {
        let txn_id = target.id();
        if self.inner.shutdown.load(AtomicOrdering::Acquire) {
            return Err(Error::invalid_state(txn_id, "reclaim scheduler is shut down"));
        }
        let deadline = Instant::now()
            .checked_add(delay)
            .ok_or_else(|| Error::invalid_state(txn_id, "reclaim timeout is too large"))?;

        let ticket = {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.max_queue_depth {
                return Err(Error::invalid_state(
                    txn_id,
                    format!("reclaim queue is full ({} pending)", queue.len()),
                ));
            }
            let ticket = self.inner.next_ticket.fetch_add(1, AtomicOrdering::Relaxed);
            queue.push(Timer {
                deadline,
                ticket,
                target: Arc::downgrade(target),
            });
            self.inner.timer_ready.notify_one();
            ticket
        };
        self.inner.scheduled.fetch_add(1, AtomicOrdering::Relaxed);

        Ok(ReclaimHandle {
            ticket,
            txn_id: txn_id.to_string(),
            scheduler: Arc::downgrade(&self.inner),
        })
    }

    /// Timers currently armed
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Timers armed since creation
    pub fn scheduled(&self) -> u64 {
        self.inner.scheduled.load(AtomicOrdering::Relaxed)
    }

    /// Transactions flushed by a firing timer
    pub fn reclaimed(&self) -> u64 {
        self.inner.reclaimed.load(AtomicOrdering::Relaxed)
    }

    /// True once shut down
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(AtomicOrdering::Acquire)
    }

    /// Stop the worker and discard pending timers
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, AtomicOrdering::Release);
        {
            let mut queue = self.inner.queue.lock();
            queue.clear();
            self.inner.timer_ready.notify_all();
        }

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        let _ = handle.join();
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &SchedulerInner) {
    let mut queue = inner.queue.lock();
    loop {
        if inner.shutdown.load(AtomicOrdering::Acquire) {
            return;
        }
        let next_deadline = queue.peek().map(|timer| timer.deadline);
        match next_deadline {
            None => {
                inner.timer_ready.wait(&mut queue);
            }
            Some(deadline) if deadline > Instant::now() => {
                inner.timer_ready.wait_until(&mut queue, deadline);
            }
            Some(_) => {
                if let Some(timer) = queue.pop() {
                    MutexGuard::unlocked(&mut queue, || fire(inner, timer));
                }
            }
        }
    }
}

fn fire(inner: &SchedulerInner, timer: Timer) {
    let Some(status) = timer.target.upgrade() else {
        return;
    };
    let ticket = timer.ticket;
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| status.expire(ticket))) {
        Ok(true) => {
            inner.reclaimed.fetch_add(1, AtomicOrdering::Relaxed);
            info!(target: "strata::reclaim", txn_id = status.id(), ticket, "Reclaimed unattended transaction");
        }
        Ok(false) => {}
        Err(e) => {
            error!(
                target: "strata::reclaim",
                txn_id = status.id(),
                "reclaim task panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::TransactionFactory;
    use strata_core::testing::MemorySessionFactory;

    fn setup() -> (TransactionFactory, Arc<MemorySessionFactory>) {
        let sessions = Arc::new(MemorySessionFactory::new());
        (TransactionFactory::new(sessions.clone()), sessions)
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_timer_flushes_unattended_transaction() {
        let (factory, sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let status = factory.get_transaction_status("tx1").unwrap();
        status.begin_if_new("A").unwrap();
        status
            .delay_flush(&scheduler, Duration::from_millis(20))
            .unwrap();

        assert!(wait_for(|| status.is_flushed()));
        assert!(wait_for(|| scheduler.reclaimed() == 1));
        assert!(!factory.contains("tx1"));
        assert_eq!(sessions.log().rollbacks(), 1);
        assert_eq!(sessions.log().closed(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_commit_cancels_timer() {
        let (factory, sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let status = factory.get_transaction_status("tx1").unwrap();
        status.begin_if_new("A").unwrap();
        status
            .delay_flush(&scheduler, Duration::from_millis(30))
            .unwrap();
        assert_eq!(scheduler.pending(), 1);

        status.commit().unwrap();
        assert_eq!(scheduler.pending(), 0);
        assert!(!status.has_pending_flush());

        std::thread::sleep(Duration::from_millis(80));
        assert!(!status.is_flushed());
        assert_eq!(scheduler.reclaimed(), 0);
        assert_eq!(sessions.log().closed(), 0);
    }

    #[test]
    fn test_rearm_replaces_previous_timer() {
        let (factory, _sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let status = factory.get_transaction_status("tx1").unwrap();
        status
            .delay_flush(&scheduler, Duration::from_secs(60))
            .unwrap();
        status
            .delay_flush(&scheduler, Duration::from_secs(60))
            .unwrap();
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.scheduled(), 2);
        assert!(status.cancel_delay_flush());
        assert!(!status.cancel_delay_flush());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_queue_depth_limit() {
        let (factory, _sessions) = setup();
        let scheduler = FlushScheduler::new(1).unwrap();
        let a = factory.get_transaction_status("a").unwrap();
        let b = factory.get_transaction_status("b").unwrap();
        a.delay_flush(&scheduler, Duration::from_secs(60)).unwrap();
        let err = b.delay_flush(&scheduler, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, Error::InvalidState { ref id, .. } if id == "b"));
    }

    #[test]
    fn test_schedule_after_shutdown_rejected() {
        let (factory, _sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let status = factory.get_transaction_status("tx1").unwrap();
        status
            .delay_flush(&scheduler, Duration::from_secs(60))
            .unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        assert_eq!(scheduler.pending(), 0);
        assert!(status
            .delay_flush(&scheduler, Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn test_timer_for_dropped_status_is_skipped() {
        let (factory, sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let status = factory.get_transaction_status("tx1").unwrap();
        let handle = scheduler
            .schedule(&status, Duration::from_millis(10))
            .unwrap();
        assert_eq!(handle.txn_id(), "tx1");
        status.flush();
        drop(status);

        assert!(wait_for(|| scheduler.pending() == 0));
        assert_eq!(scheduler.reclaimed(), 0);
        assert_eq!(sessions.log().closed(), 1);
    }

    #[test]
    fn test_earliest_deadline_fires_first() {
        let (factory, _sessions) = setup();
        let scheduler = FlushScheduler::new(DEFAULT_QUEUE_DEPTH).unwrap();
        let slow = factory.get_transaction_status("slow").unwrap();
        let fast = factory.get_transaction_status("fast").unwrap();
        slow.delay_flush(&scheduler, Duration::from_secs(60)).unwrap();
        fast.delay_flush(&scheduler, Duration::from_millis(10)).unwrap();

        assert!(wait_for(|| fast.is_flushed()));
        assert!(!slow.is_flushed());
        assert_eq!(scheduler.pending(), 1);
    }
}
