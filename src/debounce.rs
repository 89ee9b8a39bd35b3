//! Leading-edge debouncer with a quiescence window.
//!
//! Rate-limiting discipline for range queries: the first call of a burst
//! fires immediately and opens a quiescence window; calls arriving inside the
//! window are remembered but not fired, and once the window elapses the most
//! recent remembered parameters fire as the trailing edge (opening a fresh
//! window of their own). At most one fire happens per quiescence window.
//!
//! The debouncer never reads the clock itself: callers pass `now` in, and the
//! driver polls [`deadline`](Debouncer::deadline) to learn when it must call
//! [`poll`](Debouncer::poll). That keeps the type deterministic under test
//! and lets the async driver source time from the tokio clock.

use std::time::{Duration, Instant};

/// Coalesces bursts of calls into leading + trailing fires.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    /// End of the current quiescence window, if one is open.
    until: Option<Instant>,
    /// Most recent parameters deferred inside the current window.
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiescence window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            until: None,
            pending: None,
        }
    }

    /// Submit parameters. Returns `Some` when the caller should fire them
    /// right now (leading edge); otherwise the parameters are remembered for
    /// the trailing edge and `None` is returned.
    pub fn submit(&mut self, value: T, now: Instant) -> Option<T> {
        match self.until {
            Some(until) if now < until => {
                // Inside the window: remember the latest parameters and push
                // the quiescence deadline out.
                self.pending = Some(value);
                self.until = Some(now + self.window);
                None
            }
            _ => {
                // Quiescent (or the window lapsed unserviced): fire on the
                // leading edge and open a new window.
                self.pending = None;
                self.until = Some(now + self.window);
                Some(value)
            }
        }
    }

    /// The instant at which [`poll`](Debouncer::poll) must be called, if a
    /// trailing fire is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and(self.until)
    }

    /// Fire the trailing edge if its deadline has passed. A trailing fire
    /// opens a fresh quiescence window.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let until = self.until?;
        if now < until {
            return None;
        }
        match self.pending.take() {
            Some(value) => {
                self.until = Some(now + self.window);
                Some(value)
            }
            None => {
                self.until = None;
                None
            }
        }
    }
}
