#![forbid(unsafe_code)]

//! Lifecycle of one editor instance and its text buffer.
//!
//! A [`TextBinding`] owns exactly one editor and the buffer currently bound
//! to it. The host supplies a fresh [`EditorProps`] snapshot on every render
//! through [`update`](TextBinding::update); the binding applies only the
//! fields that differ from the last applied snapshot.
//!
//! # Lifecycle
//!
//! ```text
//!   Unmounted ──mount──▶ Loading ──runtime ready──▶ Ready ──unmount──▶ Disposed
//!                           │                                  ▲
//!                           └──load failed──▶ Failed ──────────┘
//! ```
//!
//! Props updated while loading are kept; the buffer is created from the
//! latest snapshot once the runtime arrives. A binding unmounted before the
//! runtime is ready never creates anything: the pending load completion only
//! holds a weak reference.
//!
//! # Reconciliation order
//!
//! One pass per [`update`](TextBinding::update), fields evaluated
//! independently:
//!
//! 1. identity changed: create a new buffer holding the current in-widget
//!    text with the new language and identity, bind it, dispose the old one;
//! 2. content changed: replace the buffer text (the new buffer, after a
//!    rebind); the outbound notifier treats the pushed text as already sent;
//! 3. language changed without a rebind: update the buffer in place;
//! 4. size changed: recompute layout.
//!
//! Class name changes never touch the runtime.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use qedit_core::{Clock, Instant, KeyEvent};

use crate::config::EditorConfig;
use crate::error::{RuntimeError, RuntimeLoadError};
use crate::notifier::ContentNotifier;
use crate::props::{EditorProps, PropChanges, diff};
use crate::runtime::{
    EditorEvent, EditorId, EditorOptions, HostWindow, ListenerId, ModelId, MountPoint,
    RuntimeHandle, RuntimeLoader,
};

/// CSS class carried by every editor container.
pub const CONTAINER_CLASS: &str = "x-monaco-editor";

/// Externally visible lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    Unmounted,
    Loading,
    Ready,
    Failed,
    Disposed,
}

/// Presentation of the editor container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerView {
    pub class: String,
    pub width: Option<String>,
    pub height: Option<String>,
    /// Render the loading indicator instead of the widget.
    pub loading: bool,
}

struct Live {
    runtime: RuntimeHandle,
    editor: EditorId,
    model: ModelId,
    listener: ListenerId,
}

enum Phase {
    Unmounted,
    Loading,
    Ready(Live),
    Failed(RuntimeLoadError),
    Disposed,
}

impl Phase {
    fn public(&self) -> BindingPhase {
        match self {
            Self::Unmounted => BindingPhase::Unmounted,
            Self::Loading => BindingPhase::Loading,
            Self::Ready(_) => BindingPhase::Ready,
            Self::Failed(_) => BindingPhase::Failed,
            Self::Disposed => BindingPhase::Disposed,
        }
    }

    fn live(&self) -> Option<(RuntimeHandle, EditorId, ModelId)> {
        match self {
            Self::Ready(live) => Some((Rc::clone(&live.runtime), live.editor, live.model)),
            _ => None,
        }
    }
}

struct BindingState {
    phase: Phase,
    /// Latest snapshot from the host.
    requested: EditorProps,
    /// Snapshot the runtime currently reflects.
    applied: EditorProps,
    mount_point: MountPoint,
    window: Option<Rc<dyn HostWindow>>,
    resize_listener: Option<ListenerId>,
}

type ChangeCallback = Box<dyn FnMut(&str)>;
type ReadyCallback = Box<dyn FnMut(EditorId)>;
type KeyHandler = Box<dyn FnMut(&KeyEvent) -> bool>;

struct BindingShared {
    state: RefCell<BindingState>,
    // Kept apart from `state` so runtime events raised during a
    // reconciliation pass can still reach it.
    notifier: RefCell<ContentNotifier>,
    on_change: RefCell<Option<ChangeCallback>>,
    on_ready: RefCell<Option<ReadyCallback>>,
    key_handler: RefCell<Option<KeyHandler>>,
    clock: Rc<dyn Clock>,
    config: EditorConfig,
}

/// Owner of one editor widget and its bound text buffer.
pub struct TextBinding {
    shared: Rc<BindingShared>,
}

impl fmt::Debug for TextBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("TextBinding")
            .field("phase", &state.phase.public())
            .field("applied", &state.applied)
            .field("requested", &state.requested)
            .finish()
    }
}

impl TextBinding {
    #[must_use]
    pub fn new(props: EditorProps, config: EditorConfig, clock: Rc<dyn Clock>) -> Self {
        let props = with_default_language(props, &config);
        let notifier = ContentNotifier::new(config.quiescence, props.content.clone());
        Self {
            shared: Rc::new(BindingShared {
                state: RefCell::new(BindingState {
                    phase: Phase::Unmounted,
                    requested: props.clone(),
                    applied: props,
                    mount_point: MountPoint::default(),
                    window: None,
                    resize_listener: None,
                }),
                notifier: RefCell::new(notifier),
                on_change: RefCell::new(None),
                on_ready: RefCell::new(None),
                key_handler: RefCell::new(None),
                clock,
                config,
            }),
        }
    }

    /// Called with the buffer text after each debounced or flushed change.
    pub fn set_on_change(&self, callback: impl FnMut(&str) + 'static) {
        *self.shared.on_change.borrow_mut() = Some(Box::new(callback));
    }

    /// Called once the editor exists.
    pub fn set_on_ready(&self, callback: impl FnMut(EditorId) + 'static) {
        *self.shared.on_ready.borrow_mut() = Some(Box::new(callback));
    }

    /// Sees every key press inside the editor. Returning `true` consumes it.
    pub fn set_key_handler(&self, handler: impl FnMut(&KeyEvent) -> bool + 'static) {
        *self.shared.key_handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Start the binding: listen for window resizes and request the runtime.
    pub fn mount(
        &self,
        loader: &RuntimeLoader,
        window: Rc<dyn HostWindow>,
        mount_point: MountPoint,
    ) {
        {
            let mut state = self.shared.state.borrow_mut();
            if !matches!(state.phase, Phase::Unmounted) {
                tracing::warn!(phase = ?state.phase.public(), "binding already mounted; ignoring");
                return;
            }
            state.phase = Phase::Loading;
            state.mount_point = mount_point;
        }

        let weak = Rc::downgrade(&self.shared);
        let resize = window.add_resize_listener(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.layout();
            }
        }));
        {
            let mut state = self.shared.state.borrow_mut();
            state.window = Some(window);
            state.resize_listener = Some(resize);
        }

        let weak = Rc::downgrade(&self.shared);
        loader.request(move |outcome| match weak.upgrade() {
            Some(shared) => BindingShared::attach(&shared, outcome),
            None => tracing::debug!("binding dropped before the runtime arrived"),
        });
    }

    /// Reconcile the runtime against `next`.
    pub fn update(&self, next: EditorProps) {
        let next = with_default_language(next, &self.shared.config);
        self.shared.reconcile(next);
    }

    /// Flush pending notification and release every runtime resource.
    /// Safe to call more than once and before the runtime arrived.
    pub fn unmount(&self) {
        self.shared.flush();
        self.shared.teardown();
    }

    /// Drive the debounce timer. Call from the host loop.
    pub fn poll(&self) {
        let now = self.shared.clock.now();
        let emitted = {
            let Ok(mut notifier) = self.shared.notifier.try_borrow_mut() else {
                return;
            };
            notifier.poll(now, || self.shared.read_buffer())
        };
        if let Some(text) = emitted {
            self.shared.emit(&text);
        }
    }

    /// Emit any pending change now.
    pub fn flush(&self) {
        self.shared.flush();
    }

    /// Recompute the widget layout.
    pub fn layout(&self) {
        self.shared.layout();
    }

    /// Current in-widget text; the requested content until the widget exists.
    #[must_use]
    pub fn value(&self) -> String {
        self.shared
            .read_buffer()
            .unwrap_or_else(|| self.shared.state.borrow().requested.content.clone())
    }

    #[must_use]
    pub fn phase(&self) -> BindingPhase {
        self.shared.state.borrow().phase.public()
    }

    /// Whether the loading indicator is shown. A failed load keeps showing it.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase(),
            BindingPhase::Unmounted | BindingPhase::Loading | BindingPhase::Failed
        )
    }

    #[must_use]
    pub fn load_error(&self) -> Option<RuntimeLoadError> {
        match &self.shared.state.borrow().phase {
            Phase::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn editor_id(&self) -> Option<EditorId> {
        self.shared.state.borrow().phase.live().map(|(_, editor, _)| editor)
    }

    #[must_use]
    pub fn model_id(&self) -> Option<ModelId> {
        self.shared.state.borrow().phase.live().map(|(_, _, model)| model)
    }

    /// Whether a debounced notification is waiting.
    #[must_use]
    pub fn has_pending_change(&self) -> bool {
        self.shared.notifier.borrow().is_pending()
    }

    /// When the next debounced notification falls due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.notifier.borrow().deadline()
    }

    /// Snapshot the runtime currently reflects.
    #[must_use]
    pub fn applied(&self) -> EditorProps {
        self.shared.state.borrow().applied.clone()
    }

    #[must_use]
    pub fn container(&self) -> ContainerView {
        let state = self.shared.state.borrow();
        let props = &state.requested;
        let class = if props.class_name.is_empty() {
            CONTAINER_CLASS.to_string()
        } else {
            format!("{CONTAINER_CLASS} {}", props.class_name)
        };
        ContainerView {
            class,
            width: props.width.to_css(),
            height: props.height.to_css(),
            loading: !matches!(state.phase, Phase::Ready(_)),
        }
    }
}

impl Drop for TextBinding {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl BindingShared {
    fn attach(this: &Rc<Self>, outcome: Result<RuntimeHandle, RuntimeLoadError>) {
        let runtime = match outcome {
            Ok(runtime) => runtime,
            Err(err) => {
                let mut state = this.state.borrow_mut();
                if matches!(state.phase, Phase::Loading) {
                    tracing::warn!(%err, "editor runtime unavailable");
                    state.phase = Phase::Failed(err);
                }
                return;
            }
        };

        let (props, mount_point) = {
            let state = this.state.borrow();
            if !matches!(state.phase, Phase::Loading) {
                tracing::debug!(phase = ?state.phase.public(), "runtime arrived after unmount");
                return;
            }
            (state.requested.clone(), state.mount_point.clone())
        };

        let live = match Self::create_live(this, runtime, &props, &mount_point) {
            Ok(live) => live,
            Err(err) => {
                tracing::warn!(%err, "failed to create editor");
                this.state.borrow_mut().phase = Phase::Failed(err.into());
                return;
            }
        };
        let editor = live.editor;
        tracing::debug!(editor = editor.get(), identity = %props.identity, "editor ready");

        this.notifier.borrow_mut().sync_baseline(&props.content);
        {
            let mut state = this.state.borrow_mut();
            state.phase = Phase::Ready(live);
            state.applied = props;
        }

        let callback = this.on_ready.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(editor);
            let mut slot = this.on_ready.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    fn create_live(
        this: &Rc<Self>,
        runtime: RuntimeHandle,
        props: &EditorProps,
        mount_point: &MountPoint,
    ) -> Result<Live, RuntimeError> {
        let model = runtime.create_model(&props.content, &props.language, &props.identity)?;
        let options = EditorOptions {
            font_size: this.config.font_size,
        };
        let editor = match runtime.create_editor(mount_point, model, &options) {
            Ok(editor) => editor,
            Err(err) => {
                log_dispose("model", runtime.dispose_model(model));
                return Err(err);
            }
        };
        let weak: Weak<Self> = Rc::downgrade(this);
        let subscribed = runtime.subscribe(
            editor,
            Box::new(move |event: &EditorEvent| {
                weak.upgrade()
                    .is_some_and(|shared| shared.handle_event(event))
            }),
        );
        let listener = match subscribed {
            Ok(listener) => listener,
            Err(err) => {
                log_dispose("editor", runtime.dispose_editor(editor));
                log_dispose("model", runtime.dispose_model(model));
                return Err(err);
            }
        };
        Ok(Live {
            runtime,
            editor,
            model,
            listener,
        })
    }

    fn handle_event(&self, event: &EditorEvent) -> bool {
        match event {
            EditorEvent::ContentChanged => {
                if let Ok(mut notifier) = self.notifier.try_borrow_mut() {
                    notifier.on_raw_change(self.clock.now());
                }
                false
            }
            EditorEvent::BlurText => {
                self.flush();
                false
            }
            EditorEvent::KeyDown(key) => {
                let handler = self.key_handler.borrow_mut().take();
                let Some(mut handler) = handler else {
                    return false;
                };
                let consumed = handler(key);
                let mut slot = self.key_handler.borrow_mut();
                if slot.is_none() {
                    *slot = Some(handler);
                }
                consumed
            }
        }
    }

    fn reconcile(&self, next: EditorProps) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.requested = next.clone();
        let Phase::Ready(live) = &mut state.phase else {
            return;
        };
        let changes = diff(&state.applied, &next);
        if changes.is_empty() {
            return;
        }
        let _span = tracing::debug_span!("editor.reconcile", ?changes).entered();

        let runtime = Rc::clone(&live.runtime);
        let applied = &mut state.applied;

        if changes.needs_rebind() {
            let current = runtime
                .model_value(live.model)
                .unwrap_or_else(|_| applied.content.clone());
            match rebind(&runtime, live, &current, &next) {
                Ok(()) => {
                    applied.identity.clone_from(&next.identity);
                    applied.language.clone_from(&next.language);
                }
                Err(err) => tracing::warn!(%err, identity = %next.identity, "rebind failed"),
            }
        }

        if changes.needs_content_push() {
            self.notifier.borrow_mut().sync_baseline(&next.content);
            let current = runtime.model_value(live.model).ok();
            if current.as_deref() == Some(next.content.as_str()) {
                applied.content.clone_from(&next.content);
            } else {
                // Raises a content event that reaches the notifier only.
                match runtime.set_model_value(live.model, &next.content) {
                    Ok(()) => applied.content.clone_from(&next.content),
                    Err(err) => tracing::warn!(%err, "content push failed"),
                }
            }
        }

        if changes.needs_language_update() {
            match runtime.set_model_language(live.model, &next.language) {
                Ok(()) => applied.language.clone_from(&next.language),
                Err(err) => tracing::warn!(%err, language = %next.language, "language update failed"),
            }
        }

        if changes.needs_layout() {
            if let Err(err) = runtime.layout(live.editor) {
                tracing::debug!(%err, "layout failed");
            }
        }

        if changes.intersects(PropChanges::PRESENTATION) {
            applied.class_name.clone_from(&next.class_name);
            applied.width = next.width.clone();
            applied.height = next.height.clone();
        }
    }

    fn read_buffer(&self) -> Option<String> {
        let (runtime, _, model) = self.state.try_borrow().ok()?.phase.live()?;
        match runtime.model_value(model) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(%err, "cannot read editor buffer");
                None
            }
        }
    }

    fn flush(&self) {
        let emitted = match self.notifier.try_borrow_mut() {
            Ok(mut notifier) => notifier.flush(|| self.read_buffer()),
            Err(_) => None,
        };
        if let Some(text) = emitted {
            self.emit(&text);
        }
    }

    fn emit(&self, text: &str) {
        let callback = self.on_change.borrow_mut().take();
        let Some(mut callback) = callback else {
            return;
        };
        callback(text);
        let mut slot = self.on_change.borrow_mut();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }

    fn layout(&self) {
        let Some((runtime, editor, _)) = self.state.borrow().phase.live() else {
            return;
        };
        if let Err(err) = runtime.layout(editor) {
            tracing::debug!(%err, "layout after resize failed");
        }
    }

    fn teardown(&self) {
        let (phase, window, resize) = {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                tracing::warn!("teardown during reconciliation; skipped");
                return;
            };
            if matches!(state.phase, Phase::Disposed) {
                return;
            }
            let phase = std::mem::replace(&mut state.phase, Phase::Disposed);
            (phase, state.window.take(), state.resize_listener.take())
        };
        if let Ok(mut notifier) = self.notifier.try_borrow_mut() {
            notifier.cancel();
        }

        if let Phase::Ready(live) = phase {
            if let Err(err) = live.runtime.unsubscribe(live.listener) {
                tracing::warn!(%err, "failed to remove editor listener");
            }
            log_dispose("editor", live.runtime.dispose_editor(live.editor));
            log_dispose("model", live.runtime.dispose_model(live.model));
            tracing::debug!(editor = live.editor.get(), "editor disposed");
        }

        if let (Some(window), Some(resize)) = (window, resize) {
            window.remove_resize_listener(resize);
        }
    }
}

fn rebind(
    runtime: &RuntimeHandle,
    live: &mut Live,
    text: &str,
    next: &EditorProps,
) -> Result<(), RuntimeError> {
    let model = runtime.create_model(text, &next.language, &next.identity)?;
    if let Err(err) = runtime.set_model(live.editor, model) {
        log_dispose("model", runtime.dispose_model(model));
        return Err(err);
    }
    let old = std::mem::replace(&mut live.model, model);
    log_dispose("model", runtime.dispose_model(old));
    Ok(())
}

fn log_dispose(what: &'static str, result: Result<(), RuntimeError>) {
    if let Err(err) = result {
        tracing::warn!(%err, what, "disposal failed");
    }
}

fn with_default_language(mut props: EditorProps, config: &EditorConfig) -> EditorProps {
    if props.language.is_empty() {
        props.language.clone_from(&config.default_language);
    }
    props
}
