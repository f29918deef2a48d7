#![forbid(unsafe_code)]

//! Structured-value editor: a [`Bridge`] driving a [`TextBinding`].
//!
//! The editor shows a JSON-compatible value as JSON or YAML text, lets the
//! user edit it, and commits on the submit button or `Alt+Enter` /
//! `Meta+Enter`. Commits go to the `on_change` callback; the owner feeds the
//! resulting value back through [`StructuredEditor::set_props`] (or an
//! [`Observable`] bound with [`StructuredEditor::bind_observable`]).
//!
//! ```
//! use std::rc::Rc;
//! use qedit_core::ManualClock;
//! use qedit_editor::{EditorConfig, Format, StructuredEditor, StructuredProps};
//! use serde_json::json;
//!
//! let clock = ManualClock::new();
//! let editor = StructuredEditor::new(
//!     StructuredProps::new(json!({"a": 1})),
//!     EditorConfig::default(),
//!     Rc::new(clock.clone()),
//! )
//! .unwrap();
//! assert_eq!(editor.text(), "{\n  \"a\": 1\n}");
//!
//! editor.select_format(Format::Yaml).unwrap();
//! assert_eq!(editor.text(), "a: 1\n");
//! assert_eq!(editor.value(), json!({"a": 1}));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use qedit_core::reactive::{BindingScope, Observable};
use qedit_core::{Clock, CoalescingTimer, Instant, KeyEvent};
use serde_json::Value;

use crate::binding::{ContainerView, TextBinding};
use crate::bridge::{Bridge, BridgeState, FormatSwitch, Redisplay};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::format::Format;
use crate::labels::Labels;
use crate::props::EditorProps;
use crate::runtime::{HostWindow, MountPoint, RuntimeLoader};

/// CSS class of the editor root element.
pub const EDITOR_CLASS: &str = "jsonEditor";

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Buffer identity for editor `uid` showing `format`.
#[must_use]
pub fn identity_token(uid: u64, format: Format) -> String {
    format!("inmemory://model/{uid}.{}", format.language())
}

/// Inputs supplied by the owner on every render.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredProps {
    pub value: Value,
    pub format: Format,
    pub class_name: String,
    /// Host entries appended to the toolbar.
    pub toolbar_items: Vec<ToolbarItem>,
}

impl StructuredProps {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            format: Format::default(),
            class_name: String::new(),
            toolbar_items: Vec::new(),
        }
    }

    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    #[must_use]
    pub fn toolbar_item(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.toolbar_items.push(ToolbarItem {
            id: id.into(),
            label: label.into(),
        });
        self
    }
}

/// Host-supplied toolbar button. Clicks are reported to the host by `id`;
/// the editor never acts on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarItem {
    pub id: String,
    pub label: String,
}

/// One entry of the format radio group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChoice {
    pub format: Format,
    pub label: &'static str,
    pub selected: bool,
}

/// Toolbar contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolbar {
    pub reset_label: &'static str,
    pub submit_label: &'static str,
    pub formats: Vec<FormatChoice>,
    /// Rendered after the format group, in props order.
    pub items: Vec<ToolbarItem>,
}

/// What the host renders for the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorView {
    pub class: String,
    pub container: ContainerView,
    /// Shown instead of the widget while it loads.
    pub loading_label: Option<&'static str>,
}

type ValueCallback = Box<dyn FnMut(&Value)>;
type ErrorCallback = Box<dyn FnMut(&EditorError)>;

struct Shared {
    bridge: RefCell<Bridge>,
    binding: TextBinding,
    uid: u64,
    class_name: RefCell<String>,
    toolbar_items: RefCell<Vec<ToolbarItem>>,
    /// Format last supplied through props.
    prop_format: RefCell<Format>,
    /// Last known buffer text.
    display: RefCell<String>,
    submit_timer: RefCell<CoalescingTimer>,
    on_change: RefCell<Option<ValueCallback>>,
    on_error: RefCell<Option<ErrorCallback>>,
    scope: RefCell<BindingScope>,
    clock: Rc<dyn Clock>,
    labels: Cell<Labels>,
}

/// JSON/YAML editor for a structured value.
pub struct StructuredEditor {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for StructuredEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredEditor")
            .field("uid", &self.shared.uid)
            .field("bridge", &*self.shared.bridge.borrow())
            .field("binding", &self.shared.binding)
            .finish()
    }
}

impl StructuredEditor {
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if the initial value cannot be rendered.
    pub fn new(
        props: StructuredProps,
        config: EditorConfig,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, EditorError> {
        let bridge = Bridge::new(props.value, props.format, &config)?;
        let uid = NEXT_UID.fetch_add(1, Ordering::Relaxed);
        let display = bridge.text().to_string();
        let binding = TextBinding::new(
            editor_props(uid, props.format, &display),
            config.clone(),
            Rc::clone(&clock),
        );

        let shared = Rc::new(Shared {
            bridge: RefCell::new(bridge),
            binding,
            uid,
            class_name: RefCell::new(props.class_name),
            toolbar_items: RefCell::new(props.toolbar_items),
            prop_format: RefCell::new(props.format),
            display: RefCell::new(display),
            submit_timer: RefCell::new(CoalescingTimer::new(config.submit_delay)),
            on_change: RefCell::new(None),
            on_error: RefCell::new(None),
            scope: RefCell::new(BindingScope::new()),
            clock,
            labels: Cell::new(Labels::detect()),
        });

        let weak = Rc::downgrade(&shared);
        shared.binding.set_on_change(move |text| {
            if let Some(shared) = weak.upgrade() {
                shared.text_changed(text);
            }
        });
        let weak = Rc::downgrade(&shared);
        shared.binding.set_key_handler(move |key: &KeyEvent| {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            if !key.is_submit_shortcut() {
                return false;
            }
            shared.submit_timer.borrow_mut().schedule(shared.clock.now());
            true
        });

        Ok(Self { shared })
    }

    /// Replace the label set (defaults to the process locale's).
    #[must_use]
    pub fn with_labels(self, labels: Labels) -> Self {
        self.shared.labels.set(labels);
        self
    }

    /// Called with every committed value.
    pub fn set_on_change(&self, callback: impl FnMut(&Value) + 'static) {
        *self.shared.on_change.borrow_mut() = Some(Box::new(callback));
    }

    /// Called when a commit is rejected. Without a sink the error is logged.
    pub fn set_on_error(&self, callback: impl FnMut(&EditorError) + 'static) {
        *self.shared.on_error.borrow_mut() = Some(Box::new(callback));
    }

    pub fn mount(
        &self,
        loader: &RuntimeLoader,
        window: Rc<dyn HostWindow>,
        mount_point: MountPoint,
    ) {
        self.shared.binding.mount(loader, window, mount_point);
    }

    pub fn unmount(&self) {
        self.shared.binding.unmount();
        self.shared.submit_timer.borrow_mut().cancel();
        self.shared.scope.borrow_mut().clear();
    }

    /// Apply a new set of owner props.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if a redisplay fails to render.
    pub fn set_props(&self, props: StructuredProps) -> Result<(), EditorError> {
        *self.shared.class_name.borrow_mut() = props.class_name;
        *self.shared.toolbar_items.borrow_mut() = props.toolbar_items;
        let redisplay = self.shared.value_changed(props.value);
        let format_changed = {
            let mut prop_format = self.shared.prop_format.borrow_mut();
            let changed = *prop_format != props.format;
            *prop_format = props.format;
            changed
        };
        if format_changed {
            self.select_format(props.format)?;
        }
        redisplay.map(|_| ())
    }

    /// The owner's value changed.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if a redisplay fails to render.
    pub fn set_value(&self, value: Value) -> Result<Redisplay, EditorError> {
        self.shared.value_changed(value)
    }

    /// Format radio selection.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if the value cannot be rendered in `format`.
    pub fn select_format(&self, format: Format) -> Result<FormatSwitch, EditorError> {
        self.shared.binding.flush();
        let switch = self.shared.bridge.borrow_mut().set_format(format)?;
        if let FormatSwitch::Switched(text) = &switch {
            tracing::debug!(%format, "format switched");
            self.shared.show(text.clone());
        }
        Ok(switch)
    }

    /// Discard edits and show the current value.
    ///
    /// # Errors
    ///
    /// [`EditorError::Serialize`] if the value cannot be rendered.
    pub fn reset(&self) -> Result<(), EditorError> {
        self.shared.submit_timer.borrow_mut().cancel();
        self.shared.binding.flush();
        let text = self.shared.bridge.borrow_mut().reset()?.to_string();
        self.shared.show(text);
        Ok(())
    }

    /// Commit the buffer text.
    ///
    /// # Errors
    ///
    /// [`EditorError::Parse`] if the text is malformed. The error is also
    /// reported to the `on_error` sink, and nothing else changes.
    pub fn submit(&self) -> Result<Value, EditorError> {
        self.shared.submit()
    }

    /// Drive debounced notification, the submit delay, and the post-commit
    /// guard. Call from the host loop.
    pub fn poll(&self) {
        self.shared.binding.poll();
        let now = self.shared.clock.now();
        let submit_due = self.shared.submit_timer.borrow_mut().poll(now);
        if submit_due {
            if let Err(err) = self.shared.submit() {
                tracing::debug!(%err, "shortcut submit rejected");
            }
        }
        let redisplay = self.shared.bridge.borrow_mut().poll(now);
        if let Some(text) = redisplay {
            self.shared.show(text);
        }
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do. `None`
    /// while nothing is scheduled.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Instant> {
        let submit = self.shared.submit_timer.borrow().deadline();
        let guard = self.shared.bridge.borrow().guard_deadline();
        [self.shared.binding.next_deadline(), submit, guard]
            .into_iter()
            .flatten()
            .min()
    }

    /// Commits update `source`; changes of `source` flow back in. Replaces
    /// any `on_change` callback.
    pub fn bind_observable(&self, source: &Observable<Value>) {
        let sink = source.clone();
        self.set_on_change(move |value| sink.set(value.clone()));
        let weak = Rc::downgrade(&self.shared);
        self.shared
            .scope
            .borrow_mut()
            .subscribe(source, move |value: &Value| {
                if let Some(shared) = weak.upgrade() {
                    if let Err(err) = shared.value_changed(value.clone()) {
                        shared.report(&err);
                    }
                }
            });
        if let Err(err) = self.shared.value_changed(source.get()) {
            self.shared.report(&err);
        }
    }

    #[must_use]
    pub fn toolbar(&self) -> Toolbar {
        let selected = self.shared.bridge.borrow().selected_format();
        let labels = self.shared.labels.get();
        Toolbar {
            reset_label: labels.reset,
            submit_label: labels.submit,
            formats: Format::ALL
                .into_iter()
                .map(|format| FormatChoice {
                    format,
                    label: format.label(),
                    selected: format == selected,
                })
                .collect(),
            items: self.shared.toolbar_items.borrow().clone(),
        }
    }

    #[must_use]
    pub fn view(&self) -> EditorView {
        let class_name = self.shared.class_name.borrow();
        let class = if class_name.is_empty() {
            EDITOR_CLASS.to_string()
        } else {
            format!("{EDITOR_CLASS} {class_name}")
        };
        EditorView {
            class,
            container: self.shared.binding.container(),
            loading_label: self
                .shared
                .binding
                .is_loading()
                .then_some(self.shared.labels.get().loading),
        }
    }

    /// Stored value (last committed or supplied).
    #[must_use]
    pub fn value(&self) -> Value {
        self.shared.bridge.borrow().value().clone()
    }

    /// Last known buffer text.
    #[must_use]
    pub fn text(&self) -> String {
        self.shared.display.borrow().clone()
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.shared.bridge.borrow().format()
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.shared.bridge.borrow().state()
    }

    #[must_use]
    pub fn uid(&self) -> u64 {
        self.shared.uid
    }

    /// Current buffer identity token.
    #[must_use]
    pub fn identity(&self) -> String {
        identity_token(self.shared.uid, self.format())
    }

    #[must_use]
    pub fn binding(&self) -> &TextBinding {
        &self.shared.binding
    }
}

impl Shared {
    fn text_changed(&self, text: &str) {
        *self.display.borrow_mut() = text.to_string();
        let redisplay = self.bridge.borrow_mut().text_changed(text);
        match redisplay {
            Some(text) => self.show(text),
            None => self.sync_binding(),
        }
    }

    fn value_changed(&self, value: Value) -> Result<Redisplay, EditorError> {
        // Pending keystrokes decide whether the buffer counts as edited.
        self.binding.flush();
        let now = self.clock.now();
        let outcome = self.bridge.borrow_mut().value_changed(value, now)?;
        if let Redisplay::Restored(text) = &outcome {
            self.show(text.clone());
        }
        Ok(outcome)
    }

    fn submit(&self) -> Result<Value, EditorError> {
        self.submit_timer.borrow_mut().cancel();
        self.binding.flush();
        let text = self.binding.value();
        let now = self.clock.now();
        let applied = self.bridge.borrow_mut().apply(&text, now);
        match applied {
            Ok(value) => {
                let shown = self.bridge.borrow().text().to_string();
                self.show(shown);
                self.notify_change(&value);
                Ok(value)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    fn show(&self, text: String) {
        *self.display.borrow_mut() = text;
        self.sync_binding();
    }

    fn sync_binding(&self) {
        let format = self.bridge.borrow().format();
        let props = editor_props(self.uid, format, &self.display.borrow());
        self.binding.update(props);
    }

    fn notify_change(&self, value: &Value) {
        let callback = self.on_change.borrow_mut().take();
        let Some(mut callback) = callback else {
            return;
        };
        callback(value);
        let mut slot = self.on_change.borrow_mut();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }

    fn report(&self, err: &EditorError) {
        let callback = self.on_error.borrow_mut().take();
        let Some(mut callback) = callback else {
            tracing::warn!(%err, "editor error");
            return;
        };
        callback(err);
        let mut slot = self.on_error.borrow_mut();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }
}

fn editor_props(uid: u64, format: Format, text: &str) -> EditorProps {
    EditorProps::new(text, identity_token(uid, format), format.language()).height("100%")
}
