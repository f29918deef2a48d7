#![forbid(unsafe_code)]

//! Error types for the editor crate.
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`RuntimeLoadError`] | runtime loader | Binding stays in its loading state; no retry |
//! | [`EditorError::Parse`] | `apply` / submit | Reported to the user; edits and buffer untouched |
//! | [`EditorError::Serialize`] | `restore` | Returned to the caller |
//! | [`EditorError::EditsInFlight`] | `restore` outside `Idle` | Returned to the caller |
//! | [`RuntimeError`] | widget runtime calls | Logged; swallowed during teardown |

use crate::format::Format;
use thiserror::Error;

/// Failure reported by the external widget runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("unknown model {0}")]
    UnknownModel(u64),
    #[error("unknown editor {0}")]
    UnknownEditor(u64),
    #[error("{0} was already disposed")]
    AlreadyDisposed(String),
    #[error("widget runtime failure: {0}")]
    Other(String),
}

/// The widget runtime never became usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeLoadError {
    /// Fetching or evaluating the runtime failed.
    #[error("failed to load editor runtime: {0}")]
    Fetch(String),
    /// The runtime loaded but creating the initial model or editor failed.
    #[error("failed to initialize editor: {0}")]
    Init(#[from] RuntimeError),
}

/// Errors surfaced by user-facing editor operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    /// Text is not valid in the active format.
    #[error("invalid {format}: {message}")]
    Parse { format: Format, message: String },
    /// The value could not be rendered in the active format.
    #[error("cannot render value as {format}: {message}")]
    Serialize { format: Format, message: String },
    /// Redisplay was requested while the buffer holds uncommitted edits.
    #[error("cannot restore while {state}")]
    EditsInFlight { state: &'static str },
}

impl EditorError {
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_format() {
        let err = EditorError::Parse {
            format: Format::Json,
            message: "EOF while parsing an object at line 1 column 10".into(),
        };
        assert!(err.to_string().starts_with("invalid json: EOF"));
        assert!(err.is_parse());
    }

    #[test]
    fn init_error_wraps_runtime_error() {
        let err: RuntimeLoadError = RuntimeError::UnknownModel(3).into();
        assert_eq!(
            err.to_string(),
            "failed to initialize editor: unknown model 3"
        );
    }
}
