#![forbid(unsafe_code)]

//! Single-deadline coalescing timer.
//!
//! [`CoalescingTimer`] drives debounced change notification and the
//! submit-shortcut settle delay in quickedit widgets.
//!
//! The timer does not run callbacks. The owner polls it from the host loop
//! and performs the timed action itself when [`poll`](CoalescingTimer::poll)
//! reports that the deadline elapsed.
//!
//! # Invariants
//!
//! 1. At most one deadline is outstanding. [`schedule`](CoalescingTimer::schedule)
//!    replaces any pending deadline (trailing edge).
//! 2. A deadline is consumed exactly once: either by `poll` reporting it due,
//!    by `flush`, or by `cancel`. After any of those, `poll` reports nothing
//!    until the next `schedule`.
//! 3. `flush` and `poll` cannot both observe the same deadline, so a flushed
//!    emission is never followed by a duplicate timed emission.

use crate::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescingTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl CoalescingTimer {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Arm (or re-arm) the timer to fire `interval` after `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Disarm without firing. Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Consume the pending deadline immediately. Returns whether the owner
    /// should perform the timed action now.
    pub fn flush(&mut self) -> bool {
        self.cancel()
    }

    /// Whether the pending deadline has elapsed at `now`, without consuming it.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Consume the deadline if it elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending deadline elapses.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, zero if already due.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
