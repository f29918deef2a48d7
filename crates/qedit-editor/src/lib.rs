#![forbid(unsafe_code)]

//! Code-editor bindings for quickedit.
//!
//! - [`TextBinding`] owns one editor widget and its text buffer and applies
//!   declarative [`EditorProps`] snapshots with minimal runtime mutations.
//! - [`ContentNotifier`] debounces buffer edits into change notifications.
//! - [`Bridge`] keeps a structured value and its JSON/YAML text in step.
//! - [`StructuredEditor`] composes the two into a value editor with a
//!   toolbar and a submit shortcut.
//!
//! The widget runtime itself is reached through [`EditorRuntime`], loaded
//! once per thread by [`RuntimeLoader`]. [`MemoryRuntime`] is an in-memory
//! implementation for headless use.

pub mod binding;
pub mod bridge;
pub mod config;
pub mod error;
pub mod format;
pub mod labels;
pub mod memory;
pub mod notifier;
pub mod props;
pub mod runtime;
pub mod structured;

pub use binding::{BindingPhase, ContainerView, TextBinding};
pub use bridge::{Bridge, BridgeState, FormatSwitch, Redisplay};
pub use config::{EditorConfig, SuppressionMode};
pub use error::{EditorError, RuntimeError, RuntimeLoadError};
pub use format::Format;
pub use labels::Labels;
pub use memory::{MemoryRuntime, MemoryWindow, RuntimeOp};
pub use notifier::ContentNotifier;
pub use props::{Dimension, EditorProps, PropChanges, diff};
pub use runtime::{
    EditorEvent, EditorId, EditorRuntime, HostWindow, ListenerId, ModelId, MountPoint,
    RuntimeFetcher, RuntimeHandle, RuntimeLoader, RuntimeSource,
};
pub use structured::{EditorView, StructuredEditor, StructuredProps, Toolbar, ToolbarItem};
