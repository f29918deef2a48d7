#![forbid(unsafe_code)]

//! Editor timing and presentation settings.
//!
//! ```
//! use qedit_editor::config::{EditorConfig, SuppressionMode};
//! use qedit_core::Duration;
//!
//! let config = EditorConfig::default()
//!     .quiescence(Duration::from_millis(300))
//!     .suppression_mode(SuppressionMode::OriginTagged);
//! assert_eq!(config.quiescence, Duration::from_millis(300));
//!
//! let from_json: EditorConfig =
//!     serde_json::from_str(r#"{ "quiescence_ms": 250, "font_size": 12 }"#).unwrap();
//! assert_eq!(from_json.quiescence, Duration::from_millis(250));
//! assert_eq!(from_json.submit_delay, Duration::from_millis(100));
//! ```

use qedit_core::Duration;
use serde::{Deserialize, Deserializer};

/// Quiet period after the last raw edit before change notification.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(500);
/// Redisplay guard after a successful commit.
pub const DEFAULT_SUPPRESSION_GUARD: Duration = Duration::from_millis(200);
/// Delay between the submit shortcut and the commit, letting the widget
/// finish its own key handling.
pub const DEFAULT_SUBMIT_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_FONT_SIZE: u16 = 14;
/// Language used when a binding is given none.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// How the structured editor recognizes its own commits coming back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// Skip every automatic redisplay for a fixed window after a commit.
    #[default]
    GuardWindow,
    /// Skip redisplay only for values equal to the last committed value,
    /// however late they arrive. Other upstream changes are shown at once
    /// unless the user has uncommitted edits.
    OriginTagged,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    #[serde(rename = "quiescence_ms", deserialize_with = "millis")]
    pub quiescence: Duration,
    #[serde(rename = "suppression_guard_ms", deserialize_with = "millis")]
    pub suppression_guard: Duration,
    #[serde(rename = "submit_delay_ms", deserialize_with = "millis")]
    pub submit_delay: Duration,
    pub suppression_mode: SuppressionMode,
    pub font_size: u16,
    pub default_language: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            quiescence: DEFAULT_QUIESCENCE,
            suppression_guard: DEFAULT_SUPPRESSION_GUARD,
            submit_delay: DEFAULT_SUBMIT_DELAY,
            suppression_mode: SuppressionMode::default(),
            font_size: DEFAULT_FONT_SIZE,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn quiescence(mut self, value: Duration) -> Self {
        self.quiescence = value;
        self
    }

    pub fn suppression_guard(mut self, value: Duration) -> Self {
        self.suppression_guard = value;
        self
    }

    pub fn submit_delay(mut self, value: Duration) -> Self {
        self.submit_delay = value;
        self
    }

    pub fn suppression_mode(mut self, mode: SuppressionMode) -> Self {
        self.suppression_mode = mode;
        self
    }

    pub fn font_size(mut self, size: u16) -> Self {
        self.font_size = size;
        self
    }

    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
