// Worker coordination primitives
//
// Shutdown: one flag every worker checks at each wait boundary.
// FrameSignal: sequence numbers pairing "something was written" with
// "a frame containing it was drawn", so callers can block until output is
// visible.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cooperative stop signal shared by a set of workers
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    cvar: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *lock(&self.triggered) = true;
        self.cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *lock(&self.triggered)
    }

    /// Sleep up to `timeout`, waking early on shutdown.
    /// Returns true if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock(&self.triggered);
        let (guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Block until shutdown is requested
    pub fn wait(&self) {
        let guard = lock(&self.triggered);
        let _guard = self
            .cvar
            .wait_while(guard, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

#[derive(Debug, Default)]
struct FrameSeq {
    requested: u64,
    drawn: u64,
}

/// Pairs write requests with drawn frames
#[derive(Debug, Default)]
pub struct FrameSignal {
    seq: Mutex<FrameSeq>,
    cvar: Condvar,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending write; the returned ticket is drawn once a frame
    /// started after this call completes.
    pub fn request(&self) -> u64 {
        let mut seq = lock(&self.seq);
        seq.requested += 1;
        seq.requested
    }

    /// Latest requested ticket, read by the render loop before drawing
    pub fn requested(&self) -> u64 {
        lock(&self.seq).requested
    }

    /// Mark every ticket up to `ticket` as visible
    pub fn mark_drawn(&self, ticket: u64) {
        let mut seq = lock(&self.seq);
        if ticket > seq.drawn {
            seq.drawn = ticket;
        }
        drop(seq);
        self.cvar.notify_all();
    }

    /// Wait until `ticket` has been drawn. Returns false on timeout.
    pub fn wait_drawn(&self, ticket: u64, timeout: Duration) -> bool {
        let guard = lock(&self.seq);
        let (guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |seq| seq.drawn < ticket)
            .unwrap_or_else(PoisonError::into_inner);
        guard.drawn >= ticket
    }
}

/// Join a worker, giving up after `timeout`.
///
/// A worker that does not stop in time is detached and logged; the process
/// carries on without it.
pub fn join_bounded(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(worker = name, ?timeout, "Worker did not stop in time, abandoning");
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    if handle.join().is_err() {
        warn!(worker = name, "Worker panicked before stopping");
    } else {
        debug!(worker = name, "Worker stopped");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_shutdown_wakes_waiter() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = shutdown.clone();
            std::thread::spawn(move || shutdown.wait_timeout(Duration::from_secs(10)))
        };
        std::thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(waiter.join().unwrap());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_wait_timeout_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_frame_signal_tickets() {
        let frames = FrameSignal::new();
        let first = frames.request();
        let second = frames.request();
        assert!(second > first);

        frames.mark_drawn(first);
        assert!(frames.wait_drawn(first, Duration::ZERO));
        assert!(!frames.wait_drawn(second, Duration::from_millis(5)));

        frames.mark_drawn(frames.requested());
        assert!(frames.wait_drawn(second, Duration::ZERO));
    }

    #[test]
    fn test_join_bounded_abandons_stuck_worker() {
        let stuck = std::thread::spawn(|| std::thread::sleep(Duration::from_millis(500)));
        assert!(!join_bounded(stuck, Duration::from_millis(10), "stuck"));

        let quick = std::thread::spawn(|| {});
        assert!(join_bounded(quick, Duration::from_secs(1), "quick"));
    }
}
