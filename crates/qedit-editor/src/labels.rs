#![forbid(unsafe_code)]

//! User-visible strings of the structured editor.
//!
//! Two built-in sets exist: English and Simplified Chinese. Any locale whose
//! primary language is `zh` gets the Chinese set, everything else English.

use qedit_core::locale::{current_locale, language_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    /// Shown while the widget runtime loads.
    pub loading: &'static str,
    pub reset: &'static str,
    /// Submit button text, including the shortcut hint.
    pub submit: &'static str,
}

impl Labels {
    #[must_use]
    pub const fn en() -> Self {
        Self {
            loading: "Loading editor...",
            reset: "Reset",
            submit: "Submit (Alt+Enter)",
        }
    }

    #[must_use]
    pub const fn zh_cn() -> Self {
        Self {
            loading: "载入编辑器中...",
            reset: "重置",
            submit: "提交 (Alt+Enter)",
        }
    }

    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        match language_of(locale).as_str() {
            "zh" => Self::zh_cn(),
            _ => Self::en(),
        }
    }

    /// Labels for the process locale (see [`qedit_core::locale`]).
    #[must_use]
    pub fn detect() -> Self {
        Self::for_locale(&current_locale())
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::en()
    }
}
