#![forbid(unsafe_code)]

//! Host input events routed into quickedit widgets.
//!
//! The host adapter (DOM bindings, a native shell, or a test harness)
//! translates platform events into these types. Widgets never see raw
//! platform events.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        /// Command on macOS, Windows key elsewhere.
        const META  = 0b1000;
    }
}

/// Logical key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Enter,
    Escape,
    Tab,
    Backspace,
    Char(char),
}

/// Key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Release,
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// A key press without modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
        }
    }

    /// Set the modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the event kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn is_press(&self) -> bool {
        self.kind == KeyEventKind::Press
    }

    /// `Alt+Enter` or `Meta+Enter`, the commit gesture used by editors.
    #[must_use]
    pub fn is_submit_shortcut(&self) -> bool {
        self.is_press()
            && self.code == KeyCode::Enter
            && self.modifiers.intersects(Modifiers::ALT | Modifiers::META)
    }
}

/// Opaque hit-test tag attached to a clickable region by the widget that
/// rendered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTarget(u32);

impl HitTarget {
    #[must_use]
    pub const fn new(tag: u32) -> Self {
        Self(tag)
    }

    #[inline]
    #[must_use]
    pub const fn tag(self) -> u32 {
        self.0
    }
}

/// Top-level host event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    /// Primary-button click that landed on `target`.
    Click { target: HitTarget },
}

impl From<KeyEvent> for Event {
    fn from(key: KeyEvent) -> Self {
        Self::Key(key)
    }
}
