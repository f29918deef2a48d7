#![forbid(unsafe_code)]

//! Configuration snapshots for a text binding and the pure diff between two
//! snapshots.
//!
//! [`diff`] only classifies. Deciding what each change costs (a buffer
//! replacement, an in-place update, or a layout pass) is the binding's job,
//! expressed through the [`PropChanges`] helpers.
//!
//! # Invariants
//!
//! 1. `diff(a, a)` is empty for every snapshot `a`.
//! 2. `diff` is deterministic and symmetric: `diff(a, b) == diff(b, a)`.
//! 3. A field is reported iff its values differ under `PartialEq`.

use std::fmt;

use bitflags::bitflags;

/// CSS size of the editor container. Numbers map to pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Auto,
    Px(u32),
    /// Any other CSS length, e.g. `"100%"` or `"40vh"`.
    Css(String),
}

impl Dimension {
    /// The inline style value; `None` leaves the property unset.
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self {
            Self::Auto => None,
            Self::Px(px) => Some(format!("{px}px")),
            Self::Css(css) => Some(css.clone()),
        }
    }
}

impl From<u32> for Dimension {
    fn from(px: u32) -> Self {
        Self::Px(px)
    }
}

impl From<&str> for Dimension {
    fn from(css: &str) -> Self {
        if css.is_empty() {
            Self::Auto
        } else {
            Self::Css(css.to_string())
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_css() {
            Some(css) => f.write_str(&css),
            None => f.write_str("auto"),
        }
    }
}

/// Declarative description of a text binding, supplied on every render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorProps {
    /// Text the caller wants displayed.
    pub content: String,
    /// Path-like token distinguishing independent documents.
    pub identity: String,
    /// Language/format tag of the buffer.
    pub language: String,
    pub class_name: String,
    pub width: Dimension,
    pub height: Dimension,
}

impl EditorProps {
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        identity: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            identity: identity.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    #[must_use]
    pub fn width(mut self, width: impl Into<Dimension>) -> Self {
        self.width = width.into();
        self
    }

    #[must_use]
    pub fn height(mut self, height: impl Into<Dimension>) -> Self {
        self.height = height.into();
        self
    }
}

bitflags! {
    /// Fields that differ between two [`EditorProps`] snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropChanges: u8 {
        const CONTENT    = 1 << 0;
        const IDENTITY   = 1 << 1;
        const LANGUAGE   = 1 << 2;
        const CLASS_NAME = 1 << 3;
        const WIDTH      = 1 << 4;
        const HEIGHT     = 1 << 5;

        const SIZE = Self::WIDTH.bits() | Self::HEIGHT.bits();
        const PRESENTATION = Self::SIZE.bits() | Self::CLASS_NAME.bits();
    }
}

impl PropChanges {
    /// A new buffer must be created and bound.
    #[must_use]
    pub fn needs_rebind(self) -> bool {
        self.contains(Self::IDENTITY)
    }

    /// The buffer text must be replaced.
    #[must_use]
    pub fn needs_content_push(self) -> bool {
        self.contains(Self::CONTENT)
    }

    /// The live buffer's language must be changed in place. A rebind already
    /// creates the new buffer with the new language.
    #[must_use]
    pub fn needs_language_update(self) -> bool {
        self.contains(Self::LANGUAGE) && !self.needs_rebind()
    }

    /// The container size changed and the widget must recompute its layout.
    #[must_use]
    pub fn needs_layout(self) -> bool {
        self.intersects(Self::SIZE)
    }

    /// Only container styling changed; the buffer is untouched.
    #[must_use]
    pub fn is_presentational_only(self) -> bool {
        !self.is_empty() && Self::PRESENTATION.contains(self)
    }
}

/// Compare two snapshots field by field.
#[must_use]
pub fn diff(prev: &EditorProps, next: &EditorProps) -> PropChanges {
    let mut changes = PropChanges::empty();
    changes.set(PropChanges::CONTENT, prev.content != next.content);
    changes.set(PropChanges::IDENTITY, prev.identity != next.identity);
    changes.set(PropChanges::LANGUAGE, prev.language != next.language);
    changes.set(PropChanges::CLASS_NAME, prev.class_name != next.class_name);
    changes.set(PropChanges::WIDTH, prev.width != next.width);
    changes.set(PropChanges::HEIGHT, prev.height != next.height);
    changes
}
