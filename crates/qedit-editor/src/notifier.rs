#![forbid(unsafe_code)]

//! Debounced outbound change notification.
//!
//! The editing widget reports every buffer mutation. [`ContentNotifier`]
//! turns that stream into at most one "value changed" emission per quiet
//! period, measured from the last raw event, and never emits text equal to
//! the last emitted (or externally pushed) text.
//!
//! Emission methods take a reader closure instead of the text itself so the
//! buffer is only read when an emission is actually due.

use qedit_core::{CoalescingTimer, Duration, Instant};

#[derive(Debug, Clone)]
pub struct ContentNotifier {
    timer: CoalescingTimer,
    last_emitted: String,
}

impl ContentNotifier {
    #[must_use]
    pub fn new(quiescence: Duration, baseline: impl Into<String>) -> Self {
        Self {
            timer: CoalescingTimer::new(quiescence),
            last_emitted: baseline.into(),
        }
    }

    /// Record one raw buffer mutation.
    pub fn on_raw_change(&mut self, now: Instant) {
        self.timer.schedule(now);
    }

    /// Whether a timed emission is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.timer.is_due(now)
    }

    /// Emit if the quiet period elapsed and the text changed.
    pub fn poll(&mut self, now: Instant, read: impl FnOnce() -> Option<String>) -> Option<String> {
        if !self.timer.poll(now) {
            return None;
        }
        self.emit_if_changed(read)
    }

    /// Emit any pending change immediately and disarm the timer. Does nothing
    /// when no raw change is pending.
    pub fn flush(&mut self, read: impl FnOnce() -> Option<String>) -> Option<String> {
        if !self.timer.flush() {
            return None;
        }
        self.emit_if_changed(read)
    }

    /// Drop any pending emission without reading the buffer.
    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }

    /// Treat `text` as already known to the owner. Used when the owner itself
    /// pushes content into the buffer.
    pub fn sync_baseline(&mut self, text: &str) {
        if self.last_emitted != text {
            self.last_emitted.clear();
            self.last_emitted.push_str(text);
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// When the pending emission falls due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    #[must_use]
    pub fn last_emitted(&self) -> &str {
        &self.last_emitted
    }

    fn emit_if_changed(&mut self, read: impl FnOnce() -> Option<String>) -> Option<String> {
        let text = read()?;
        if text == self.last_emitted {
            return None;
        }
        self.last_emitted.clone_from(&text);
        Some(text)
    }
}
