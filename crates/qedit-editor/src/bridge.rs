#![forbid(unsafe_code)]

//! Two-way bridge between a structured value and its editable text.
//!
//! The owner of the value and the person typing into the buffer both change
//! the same document. [`Bridge`] decides, for every event on either side,
//! whether the displayed text is replaced, kept, or committed upstream.
//!
//! # State machine
//!
//! ```text
//!              text diverges                 apply(ok)
//!     Idle ─────────────────▶ Editing ────────────────────▶ Suppressed{until}
//!      ▲  ◀───────────────────  │                                │
//!      │     text matches again │ apply(err): stays Editing      │ guard expires
//!      │                        ▼                                ▼
//!      └──────────── reset() from any state ◀──────── Idle, or Editing if the
//!                                                     buffer diverged meanwhile
//! ```
//!
//! | Upstream value change in | [`SuppressionMode::GuardWindow`] | [`SuppressionMode::OriginTagged`] |
//! |--------------------------|----------------------------------|-----------------------------------|
//! | `Idle`                   | redisplay                        | redisplay                         |
//! | `Editing`                | deferred                         | deferred                          |
//! | `Suppressed`             | skipped                          | skipped if equal to the commit, otherwise redisplay unless the buffer diverged |
//!
//! A value change that is structurally equal to the stored value never
//! redisplays. A value that was stored without being shown is redisplayed as
//! soon as the bridge is back in `Idle`: when the guard expires, or when the
//! user types the buffer back to its last text.

use qedit_core::{Duration, Instant};
use serde_json::Value;

use crate::config::{EditorConfig, SuppressionMode};
use crate::error::EditorError;
use crate::format::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// The buffer shows the serialized value.
    Idle,
    /// The buffer holds uncommitted edits.
    Editing,
    /// A commit just went upstream; its echo must not overwrite the buffer.
    Suppressed { until: Instant },
}

impl BridgeState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Editing => "editing",
            Self::Suppressed { .. } => "suppressed",
        }
    }
}

/// Outcome of an upstream value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redisplay {
    /// The buffer must show this text.
    Restored(String),
    /// Recognized as the echo of a commit.
    Suppressed,
    /// Stored but not shown; the buffer has edits in flight.
    Deferred,
    /// Equal to the stored value.
    Unchanged,
}

/// Outcome of a format selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSwitch {
    Unchanged,
    /// Switched; the buffer must show this text.
    Switched(String),
    /// Remembered until the edits are committed or reset.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct Bridge {
    state: BridgeState,
    format: Format,
    pending_format: Option<Format>,
    value: Value,
    /// Text last produced by serialization or accepted by a commit.
    text: String,
    /// Last committed value while its echo may still arrive.
    origin: Option<Value>,
    mode: SuppressionMode,
    guard: Duration,
    buffer_dirty: bool,
    /// The stored value arrived while the buffer could not show it.
    stale: bool,
}

impl Bridge {
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if `value` cannot be rendered in `format`.
    pub fn new(value: Value, format: Format, config: &EditorConfig) -> Result<Self, EditorError> {
        let text = format.serialize(&value)?;
        Ok(Self {
            state: BridgeState::Idle,
            format,
            pending_format: None,
            value,
            text,
            origin: None,
            mode: config.suppression_mode,
            guard: config.suppression_guard,
            buffer_dirty: false,
            stale: false,
        })
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Format the buffer is currently in.
    #[inline]
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Format the user last selected, possibly not applied yet.
    #[must_use]
    pub fn selected_format(&self) -> Format {
        self.pending_format.unwrap_or(self.format)
    }

    #[must_use]
    pub fn pending_format(&self) -> Option<Format> {
        self.pending_format
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn origin(&self) -> Option<&Value> {
        self.origin.as_ref()
    }

    /// Whether the buffer differs from [`text`](Self::text).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.buffer_dirty
    }

    /// End of the post-commit guard, if one is running.
    #[must_use]
    pub fn guard_deadline(&self) -> Option<Instant> {
        match self.state {
            BridgeState::Suppressed { until } => Some(until),
            BridgeState::Idle | BridgeState::Editing => None,
        }
    }

    /// Whether the stored value has not been displayed yet.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Serialize the stored value for display, completing a deferred format
    /// switch.
    ///
    /// # Errors
    ///
    /// [`EditorError::EditsInFlight`] outside `Idle`;
    /// [`EditorError::Serialize`] if rendering fails.
    pub fn restore(&mut self) -> Result<&str, EditorError> {
        if self.state != BridgeState::Idle {
            return Err(EditorError::EditsInFlight {
                state: self.state.name(),
            });
        }
        let format = self.selected_format();
        self.text = format.serialize(&self.value)?;
        self.format = format;
        self.pending_format = None;
        self.buffer_dirty = false;
        self.stale = false;
        self.origin = None;
        Ok(&self.text)
    }

    /// Discard edits, complete a deferred format switch, and redisplay.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if rendering fails.
    pub fn reset(&mut self) -> Result<&str, EditorError> {
        self.state = BridgeState::Idle;
        self.restore()
    }

    /// The buffer now holds `text`.
    ///
    /// Returns the text the buffer must show instead when typing back to the
    /// last text lands a value or format change that was held back.
    pub fn text_changed(&mut self, text: &str) -> Option<String> {
        self.buffer_dirty = text != self.text;
        self.state = match self.state {
            BridgeState::Idle | BridgeState::Editing if self.buffer_dirty => BridgeState::Editing,
            BridgeState::Idle | BridgeState::Editing => BridgeState::Idle,
            suppressed @ BridgeState::Suppressed { .. } => suppressed,
        };
        self.land_held_back()
    }

    /// Parse `text` and commit it as the new value. Returns the value for the
    /// caller to hand upstream.
    ///
    /// A deferred format switch completes here and [`text`](Self::text)
    /// becomes the committed value rendered in the new format.
    ///
    /// # Errors
    ///
    /// [`EditorError::Parse`] on malformed text; nothing changes.
    pub fn apply(&mut self, text: &str, now: Instant) -> Result<Value, EditorError> {
        let value = self.format.deserialize(text)?;
        self.text = text.to_string();
        if let Some(format) = self.pending_format {
            match format.serialize(&value) {
                Ok(rendered) => {
                    self.format = format;
                    self.pending_format = None;
                    self.text = rendered;
                }
                Err(err) => tracing::warn!(%err, %format, "deferred format switch failed"),
            }
        }
        self.value = value.clone();
        self.origin = Some(value.clone());
        self.buffer_dirty = false;
        self.stale = false;
        self.state = BridgeState::Suppressed {
            until: now + self.guard,
        };
        tracing::debug!(format = %self.format, "value committed");
        Ok(value)
    }

    /// The owner supplied `value`.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if a redisplay fails to render.
    pub fn value_changed(&mut self, value: Value, now: Instant) -> Result<Redisplay, EditorError> {
        self.expire_guard(now);
        if value == self.value && !(self.stale && self.state == BridgeState::Idle) {
            return Ok(Redisplay::Unchanged);
        }
        let is_echo = self.origin.as_ref() == Some(&value);
        self.value = value;

        let outcome = match (self.state, self.mode) {
            (BridgeState::Idle, _) => Redisplay::Restored(self.restore()?.to_string()),
            (BridgeState::Editing, _) => Redisplay::Deferred,
            (BridgeState::Suppressed { .. }, SuppressionMode::GuardWindow) => {
                tracing::trace!("upstream change inside guard window skipped");
                Redisplay::Suppressed
            }
            (BridgeState::Suppressed { .. }, SuppressionMode::OriginTagged) => {
                if is_echo {
                    Redisplay::Suppressed
                } else if self.buffer_dirty {
                    self.state = BridgeState::Editing;
                    Redisplay::Deferred
                } else {
                    self.state = BridgeState::Idle;
                    Redisplay::Restored(self.restore()?.to_string())
                }
            }
        };
        if matches!(outcome, Redisplay::Deferred | Redisplay::Suppressed) {
            self.stale = true;
        }
        Ok(outcome)
    }

    /// Expire the post-commit guard. When that lands a deferred format
    /// switch or a skipped value, returns the text the buffer must now show.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        if !self.expire_guard(now) {
            return None;
        }
        self.land_held_back()
    }

    /// Redisplay once back in `Idle` if a value or format change was held
    /// back while edits were in flight.
    fn land_held_back(&mut self) -> Option<String> {
        if self.state != BridgeState::Idle || !(self.stale || self.pending_format.is_some()) {
            return None;
        }
        match self.restore().map(str::to_string) {
            Ok(text) => {
                tracing::debug!(format = %self.format, "held back change redisplayed");
                Some(text)
            }
            Err(err) => {
                tracing::warn!(%err, format = %self.selected_format(), "redisplay failed");
                None
            }
        }
    }

    /// The user picked `format`.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if the value cannot be rendered in `format`.
    pub fn set_format(&mut self, format: Format) -> Result<FormatSwitch, EditorError> {
        if format == self.format {
            let cancelled = self.pending_format.take().is_some();
            if cancelled {
                tracing::debug!(%format, "deferred format switch cancelled");
            }
            return Ok(FormatSwitch::Unchanged);
        }
        if self.state != BridgeState::Idle {
            self.pending_format = Some(format);
            return Ok(FormatSwitch::Deferred);
        }
        let text = format.serialize(&self.value)?;
        self.format = format;
        self.pending_format = None;
        self.text.clone_from(&text);
        self.buffer_dirty = false;
        self.stale = false;
        Ok(FormatSwitch::Switched(text))
    }

    /// Returns whether the guard expired at `now`.
    fn expire_guard(&mut self, now: Instant) -> bool {
        match self.state {
            BridgeState::Suppressed { until } if now >= until => {
                self.state = if self.buffer_dirty {
                    BridgeState::Editing
                } else {
                    BridgeState::Idle
                };
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bridge(value: Value, format: Format) -> Bridge {
        Bridge::new(value, format, &EditorConfig::default()).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn idle_format_switch_reserializes() {
        let mut b = bridge(json!({"a": 1}), Format::Json);
        assert_eq!(b.text(), "{\n  \"a\": 1\n}");
        let switched = b.set_format(Format::Yaml).unwrap();
        assert_eq!(switched, FormatSwitch::Switched("a: 1\n".into()));
        assert_eq!(b.value(), &json!({"a": 1}));
        assert_eq!(b.state(), BridgeState::Idle);
    }

    #[test]
    fn typing_moves_between_idle_and_editing() {
        let mut b = bridge(json!(1), Format::Json);
        b.text_changed("12");
        assert_eq!(b.state(), BridgeState::Editing);
        b.text_changed("1");
        assert_eq!(b.state(), BridgeState::Idle);
    }

    #[test]
    fn malformed_apply_changes_nothing() {
        let t0 = Instant::now();
        let mut b = bridge(json!({"a": 1}), Format::Json);
        b.text_changed("{not valid");
        let err = b.apply("{not valid", t0).unwrap_err();
        assert!(err.is_parse());
        assert_eq!(b.state(), BridgeState::Editing);
        assert_eq!(b.value(), &json!({"a": 1}));
        assert!(b.origin().is_none());
    }

    #[test]
    fn guard_window_skips_echo_then_expires() {
        let t0 = Instant::now();
        let mut b = bridge(json!({"a": 1}), Format::Json);
        b.text_changed("{\"a\": 2}");
        let value = b.apply("{\"a\": 2}", t0).unwrap();
        assert_eq!(value, json!({"a": 2}));
        assert_eq!(b.state(), BridgeState::Suppressed { until: t0 + ms(200) });

        let echo = b.value_changed(json!({"a": 2}), t0 + ms(10)).unwrap();
        assert_eq!(echo, Redisplay::Unchanged);
        let normalized = b.value_changed(json!({"a": 2, "b": null}), t0 + ms(20)).unwrap();
        assert_eq!(normalized, Redisplay::Suppressed);

        assert!(b.is_stale());
        assert_eq!(
            b.poll(t0 + ms(200)),
            Some("{\n  \"a\": 2,\n  \"b\": null\n}".into())
        );
        assert_eq!(b.state(), BridgeState::Idle);
        assert!(!b.is_stale());
        let later = b.value_changed(json!({"a": 3}), t0 + ms(300)).unwrap();
        assert_eq!(later, Redisplay::Restored("{\n  \"a\": 3\n}".into()));
    }

    #[test]
    fn new_commit_replaces_pending_guard() {
        let t0 = Instant::now();
        let mut b = bridge(json!(0), Format::Json);
        b.apply("1", t0).unwrap();
        b.apply("2", t0 + ms(150)).unwrap();
        assert_eq!(b.state(), BridgeState::Suppressed { until: t0 + ms(350) });
        b.poll(t0 + ms(250));
        assert!(matches!(b.state(), BridgeState::Suppressed { .. }));
    }

    #[test]
    fn editing_defers_upstream_and_restore_is_refused() {
        let t0 = Instant::now();
        let mut b = bridge(json!([1]), Format::Json);
        b.text_changed("[1, 2");
        assert_eq!(b.value_changed(json!([9]), t0).unwrap(), Redisplay::Deferred);
        assert_eq!(
            b.restore().unwrap_err(),
            EditorError::EditsInFlight { state: "editing" }
        );
        assert_eq!(b.reset().unwrap(), "[\n  9\n]");
        assert_eq!(b.state(), BridgeState::Idle);
    }

    #[test]
    fn typing_back_lands_deferred_upstream_value() {
        let t0 = Instant::now();
        let mut b = bridge(json!({"a": 1}), Format::Json);
        let original = b.text().to_string();
        assert_eq!(b.text_changed("{\"a\": 1,"), None);
        assert_eq!(b.value_changed(json!({"a": 9}), t0).unwrap(), Redisplay::Deferred);
        assert!(b.is_stale());

        let shown = b.text_changed(&original);
        assert_eq!(shown, Some("{\n  \"a\": 9\n}".into()));
        assert_eq!(b.state(), BridgeState::Idle);
        assert_eq!(b.text(), "{\n  \"a\": 9\n}");
        assert!(!b.is_stale());
    }

    #[test]
    fn typing_back_completes_deferred_format_switch() {
        let mut b = bridge(json!({"a": 1}), Format::Json);
        let original = b.text().to_string();
        b.text_changed("{");
        assert_eq!(b.set_format(Format::Yaml).unwrap(), FormatSwitch::Deferred);
        assert_eq!(b.text_changed(&original), Some("a: 1\n".into()));
        assert_eq!(b.format(), Format::Yaml);
    }

    #[test]
    fn deferred_format_completes_on_commit() {
        let t0 = Instant::now();
        let mut b = bridge(json!({"a": 1}), Format::Json);
        b.text_changed("{\"a\": 5}");
        assert_eq!(b.set_format(Format::Yaml).unwrap(), FormatSwitch::Deferred);
        assert_eq!(b.format(), Format::Json);
        assert_eq!(b.selected_format(), Format::Yaml);
        b.apply("{\"a\": 5}", t0).unwrap();
        assert_eq!(b.format(), Format::Yaml);
        assert_eq!(b.text(), "a: 5\n");
    }

    #[test]
    fn deferred_format_completes_on_guard_expiry() {
        let t0 = Instant::now();
        let mut b = bridge(json!({"a": 1}), Format::Json);
        b.apply("{\"a\": 1}", t0).unwrap();
        assert_eq!(b.set_format(Format::Yaml).unwrap(), FormatSwitch::Deferred);
        assert_eq!(b.poll(t0 + ms(200)), Some("a: 1\n".into()));
        assert_eq!(b.format(), Format::Yaml);
    }

    #[test]
    fn reselecting_active_format_cancels_deferred_switch() {
        let mut b = bridge(json!(1), Format::Json);
        b.text_changed("2");
        b.set_format(Format::Yaml).unwrap();
        assert_eq!(b.set_format(Format::Json).unwrap(), FormatSwitch::Unchanged);
        assert_eq!(b.pending_format(), None);
    }

    #[test]
    fn origin_tagged_shows_foreign_change_during_guard() {
        let t0 = Instant::now();
        let config = EditorConfig::default().suppression_mode(SuppressionMode::OriginTagged);
        let mut b = Bridge::new(json!(0), Format::Json, &config).unwrap();
        b.apply("1", t0).unwrap();

        let other = b.value_changed(json!(7), t0 + ms(5)).unwrap();
        assert_eq!(other, Redisplay::Restored("7".into()));
        assert_eq!(b.state(), BridgeState::Idle);

        assert!(b.origin().is_none());

        b.apply("1", t0 + ms(10)).unwrap();
        let echo = b.value_changed(json!(1), t0 + ms(11)).unwrap();
        assert_eq!(echo, Redisplay::Unchanged);
    }

    #[test]
    fn origin_tagged_defers_foreign_change_over_dirty_buffer() {
        let t0 = Instant::now();
        let config = EditorConfig::default().suppression_mode(SuppressionMode::OriginTagged);
        let mut b = Bridge::new(json!({"n": 0}), Format::Json, &config).unwrap();
        b.apply("{\"n\": 1}", t0).unwrap();
        b.text_changed("{\"n\": 1, \"x\"");
        let upstream = b.value_changed(json!({"n": 2}), t0 + ms(5)).unwrap();
        assert_eq!(upstream, Redisplay::Deferred);
        assert_eq!(b.state(), BridgeState::Editing);
    }
}
