#![forbid(unsafe_code)]

//! Textual formats for structured values.
//!
//! Both formats render the same [`serde_json::Value`] tree. JSON output is
//! pretty-printed with two-space indentation; YAML output is block style.
//! The formats do not agree on whitespace or key presentation, so text is
//! never converted between them directly: it is always parsed back into a
//! value first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EditorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Every supported format, in toolbar order.
    pub const ALL: [Format; 2] = [Format::Json, Format::Yaml];

    /// Language tag handed to the editing widget; also the file extension
    /// used in identity tokens.
    #[must_use]
    pub const fn language(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Toolbar caption.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    /// Render `value` as text.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if the serializer rejects the value.
    pub fn serialize(self, value: &Value) -> Result<String, EditorError> {
        let rendered = match self {
            Self::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| EditorError::Serialize {
            format: self,
            message,
        })
    }

    /// Parse `text` into a value.
    ///
    /// # Errors
    ///
    /// [`EditorError::Parse`] with the parser's message on malformed input.
    pub fn deserialize(self, text: &str) -> Result<Value, EditorError> {
        let parsed = match self {
            Self::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| EditorError::Parse {
            format: self,
            message,
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.language())
    }
}

/// Unrecognized format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format '{0}', expected json or yaml")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}
