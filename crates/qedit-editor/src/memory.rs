#![forbid(unsafe_code)]

//! In-memory widget runtime.
//!
//! [`MemoryRuntime`] implements [`EditorRuntime`] without a browser: models
//! are plain strings, editors are records pointing at a model, and events are
//! raised by the simulation helpers ([`type_text`](MemoryRuntime::type_text),
//! [`blur`](MemoryRuntime::blur), [`key_down`](MemoryRuntime::key_down)).
//! Every mutating call is appended to an operation log so callers can assert
//! exactly which runtime mutations a reconciliation performed.
//!
//! Listeners are invoked with no internal borrow held, so a listener may call
//! back into the runtime. A listener that is already running is skipped if an
//! event re-enters it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use qedit_core::KeyEvent;

use crate::error::RuntimeError;
use crate::runtime::{
    EditorEvent, EditorId, EditorListener, EditorOptions, EditorRuntime, HostWindow, ListenerId,
    ModelId, MountPoint, RuntimeHandle,
};

/// A mutating runtime call, as recorded in the operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOp {
    CreateModel {
        model: ModelId,
        identity: String,
        language: String,
    },
    CreateEditor {
        editor: EditorId,
        model: ModelId,
    },
    SetModel {
        editor: EditorId,
        model: ModelId,
    },
    SetValue {
        model: ModelId,
    },
    SetLanguage {
        model: ModelId,
        language: String,
    },
    Subscribe {
        editor: EditorId,
        listener: ListenerId,
    },
    Unsubscribe {
        listener: ListenerId,
    },
    Layout {
        editor: EditorId,
    },
    DisposeModel {
        model: ModelId,
    },
    DisposeEditor {
        editor: EditorId,
    },
}

#[derive(Debug)]
struct ModelRecord {
    text: String,
    language: String,
    identity: String,
    disposed: bool,
}

#[derive(Debug)]
struct EditorRecord {
    mount: MountPoint,
    model: ModelId,
    options: EditorOptions,
    disposed: bool,
}

struct ListenerRecord {
    editor: EditorId,
    /// `None` while the callback is running.
    callback: Option<EditorListener>,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    models: BTreeMap<u64, ModelRecord>,
    editors: BTreeMap<u64, EditorRecord>,
    listeners: BTreeMap<u64, ListenerRecord>,
    ops: Vec<RuntimeOp>,
    fail_dispose: bool,
}

impl MemoryState {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn model(&self, id: ModelId) -> Result<&ModelRecord, RuntimeError> {
        match self.models.get(&id.get()) {
            Some(record) if record.disposed => {
                Err(RuntimeError::AlreadyDisposed(format!("model {}", id.get())))
            }
            Some(record) => Ok(record),
            None => Err(RuntimeError::UnknownModel(id.get())),
        }
    }

    fn model_mut(&mut self, id: ModelId) -> Result<&mut ModelRecord, RuntimeError> {
        match self.models.get_mut(&id.get()) {
            Some(record) if record.disposed => {
                Err(RuntimeError::AlreadyDisposed(format!("model {}", id.get())))
            }
            Some(record) => Ok(record),
            None => Err(RuntimeError::UnknownModel(id.get())),
        }
    }

    fn editor(&self, id: EditorId) -> Result<&EditorRecord, RuntimeError> {
        match self.editors.get(&id.get()) {
            Some(record) if record.disposed => {
                Err(RuntimeError::AlreadyDisposed(format!("editor {}", id.get())))
            }
            Some(record) => Ok(record),
            None => Err(RuntimeError::UnknownEditor(id.get())),
        }
    }

    fn editor_mut(&mut self, id: EditorId) -> Result<&mut EditorRecord, RuntimeError> {
        match self.editors.get_mut(&id.get()) {
            Some(record) if record.disposed => {
                Err(RuntimeError::AlreadyDisposed(format!("editor {}", id.get())))
            }
            Some(record) => Ok(record),
            None => Err(RuntimeError::UnknownEditor(id.get())),
        }
    }

    fn listeners_of(&self, editors: &[u64]) -> Vec<u64> {
        self.listeners
            .iter()
            .filter(|(_, l)| editors.contains(&l.editor.get()))
            .map(|(id, _)| *id)
            .collect()
    }

    fn editors_showing(&self, model: ModelId) -> Vec<u64> {
        self.editors
            .iter()
            .filter(|(_, e)| !e.disposed && e.model == model)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// In-memory [`EditorRuntime`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRuntime {
    state: Rc<RefCell<MemoryState>>,
}

impl std::fmt::Debug for MemoryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryRuntime")
            .field("models", &state.models)
            .field("editors", &state.editors)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl MemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This runtime as a shared trait object, for
    /// [`RuntimeLoader::resolve`](crate::runtime::RuntimeLoader::resolve).
    #[must_use]
    pub fn handle(&self) -> RuntimeHandle {
        Rc::new(self.clone())
    }

    /// Make every subsequent dispose call fail.
    pub fn fail_dispose(&self, fail: bool) {
        self.state.borrow_mut().fail_dispose = fail;
    }

    #[must_use]
    pub fn ops(&self) -> Vec<RuntimeOp> {
        self.state.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }

    /// Models that were created and not yet disposed.
    #[must_use]
    pub fn live_models(&self) -> Vec<ModelId> {
        self.state
            .borrow()
            .models
            .iter()
            .filter(|(_, m)| !m.disposed)
            .map(|(id, _)| ModelId::new(*id))
            .collect()
    }

    /// Editors that were created and not yet disposed.
    #[must_use]
    pub fn live_editors(&self) -> Vec<EditorId> {
        self.state
            .borrow()
            .editors
            .iter()
            .filter(|(_, e)| !e.disposed)
            .map(|(id, _)| EditorId::new(*id))
            .collect()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    #[must_use]
    pub fn model_text(&self, model: ModelId) -> Option<String> {
        self.state.borrow().model(model).ok().map(|m| m.text.clone())
    }

    #[must_use]
    pub fn model_language(&self, model: ModelId) -> Option<String> {
        self.state
            .borrow()
            .model(model)
            .ok()
            .map(|m| m.language.clone())
    }

    #[must_use]
    pub fn model_identity(&self, model: ModelId) -> Option<String> {
        self.state
            .borrow()
            .model(model)
            .ok()
            .map(|m| m.identity.clone())
    }

    /// The model an editor currently shows.
    #[must_use]
    pub fn editor_model(&self, editor: EditorId) -> Option<ModelId> {
        self.state.borrow().editor(editor).ok().map(|e| e.model)
    }

    #[must_use]
    pub fn editor_mount(&self, editor: EditorId) -> Option<MountPoint> {
        self.state
            .borrow()
            .editor(editor)
            .ok()
            .map(|e| e.mount.clone())
    }

    #[must_use]
    pub fn editor_font_size(&self, editor: EditorId) -> Option<u16> {
        self.state
            .borrow()
            .editor(editor)
            .ok()
            .map(|e| e.options.font_size)
    }

    /// The single live editor, if exactly one exists.
    #[must_use]
    pub fn sole_editor(&self) -> Option<EditorId> {
        match self.live_editors().as_slice() {
            [editor] => Some(*editor),
            _ => None,
        }
    }

    /// Simulate the user replacing the editor's text.
    ///
    /// # Errors
    ///
    /// Fails if the editor or its model is gone.
    pub fn type_text(&self, editor: EditorId, text: &str) -> Result<(), RuntimeError> {
        let model = {
            let mut state = self.state.borrow_mut();
            let model = state.editor(editor)?.model;
            state.model_mut(model)?.text = text.to_string();
            model
        };
        self.dispatch_to_model(model, &EditorEvent::ContentChanged);
        Ok(())
    }

    /// Simulate the text area losing focus.
    ///
    /// # Errors
    ///
    /// Fails if the editor is gone.
    pub fn blur(&self, editor: EditorId) -> Result<(), RuntimeError> {
        self.state.borrow().editor(editor)?;
        self.dispatch(&[editor.get()], &EditorEvent::BlurText);
        Ok(())
    }

    /// Simulate a key press. Returns whether a listener consumed it.
    ///
    /// # Errors
    ///
    /// Fails if the editor is gone.
    pub fn key_down(&self, editor: EditorId, key: KeyEvent) -> Result<bool, RuntimeError> {
        self.state.borrow().editor(editor)?;
        Ok(self.dispatch(&[editor.get()], &EditorEvent::KeyDown(key)))
    }

    fn dispatch_to_model(&self, model: ModelId, event: &EditorEvent) -> bool {
        let editors = self.state.borrow().editors_showing(model);
        self.dispatch(&editors, event)
    }

    fn dispatch(&self, editors: &[u64], event: &EditorEvent) -> bool {
        let ids = self.state.borrow().listeners_of(editors);
        let mut consumed = false;
        for id in ids {
            let callback = {
                let mut state = self.state.borrow_mut();
                state
                    .listeners
                    .get_mut(&id)
                    .and_then(|record| record.callback.take())
            };
            let Some(mut callback) = callback else {
                continue;
            };
            consumed |= callback(event);
            if let Some(record) = self.state.borrow_mut().listeners.get_mut(&id) {
                record.callback = Some(callback);
            }
        }
        consumed
    }

    fn log(&self, op: RuntimeOp) {
        self.state.borrow_mut().ops.push(op);
    }
}

impl EditorRuntime for MemoryRuntime {
    fn create_model(
        &self,
        content: &str,
        language: &str,
        identity: &str,
    ) -> Result<ModelId, RuntimeError> {
        let model = {
            let mut state = self.state.borrow_mut();
            let id = state.alloc();
            state.models.insert(
                id,
                ModelRecord {
                    text: content.to_string(),
                    language: language.to_string(),
                    identity: identity.to_string(),
                    disposed: false,
                },
            );
            ModelId::new(id)
        };
        self.log(RuntimeOp::CreateModel {
            model,
            identity: identity.to_string(),
            language: language.to_string(),
        });
        Ok(model)
    }

    fn create_editor(
        &self,
        mount: &MountPoint,
        model: ModelId,
        options: &EditorOptions,
    ) -> Result<EditorId, RuntimeError> {
        let editor = {
            let mut state = self.state.borrow_mut();
            state.model(model)?;
            let id = state.alloc();
            state.editors.insert(
                id,
                EditorRecord {
                    mount: mount.clone(),
                    model,
                    options: options.clone(),
                    disposed: false,
                },
            );
            EditorId::new(id)
        };
        self.log(RuntimeOp::CreateEditor { editor, model });
        Ok(editor)
    }

    fn set_model(&self, editor: EditorId, model: ModelId) -> Result<(), RuntimeError> {
        {
            let mut state = self.state.borrow_mut();
            state.model(model)?;
            state.editor_mut(editor)?.model = model;
        }
        self.log(RuntimeOp::SetModel { editor, model });
        Ok(())
    }

    fn model_value(&self, model: ModelId) -> Result<String, RuntimeError> {
        Ok(self.state.borrow().model(model)?.text.clone())
    }

    fn set_model_value(&self, model: ModelId, text: &str) -> Result<(), RuntimeError> {
        let changed = {
            let mut state = self.state.borrow_mut();
            let record = state.model_mut(model)?;
            let changed = record.text != text;
            if changed {
                record.text = text.to_string();
            }
            changed
        };
        self.log(RuntimeOp::SetValue { model });
        if changed {
            self.dispatch_to_model(model, &EditorEvent::ContentChanged);
        }
        Ok(())
    }

    fn set_model_language(&self, model: ModelId, language: &str) -> Result<(), RuntimeError> {
        self.state.borrow_mut().model_mut(model)?.language = language.to_string();
        self.log(RuntimeOp::SetLanguage {
            model,
            language: language.to_string(),
        });
        Ok(())
    }

    fn subscribe(
        &self,
        editor: EditorId,
        listener: EditorListener,
    ) -> Result<ListenerId, RuntimeError> {
        let id = {
            let mut state = self.state.borrow_mut();
            state.editor(editor)?;
            let id = state.alloc();
            state.listeners.insert(
                id,
                ListenerRecord {
                    editor,
                    callback: Some(listener),
                },
            );
            ListenerId::new(id)
        };
        self.log(RuntimeOp::Subscribe {
            editor,
            listener: id,
        });
        Ok(id)
    }

    fn unsubscribe(&self, listener: ListenerId) -> Result<(), RuntimeError> {
        let removed = self.state.borrow_mut().listeners.remove(&listener.get());
        if removed.is_none() {
            return Err(RuntimeError::Other(format!(
                "unknown listener {}",
                listener.get()
            )));
        }
        self.log(RuntimeOp::Unsubscribe { listener });
        Ok(())
    }

    fn layout(&self, editor: EditorId) -> Result<(), RuntimeError> {
        self.state.borrow().editor(editor)?;
        self.log(RuntimeOp::Layout { editor });
        Ok(())
    }

    fn dispose_model(&self, model: ModelId) -> Result<(), RuntimeError> {
        {
            let mut state = self.state.borrow_mut();
            if state.fail_dispose {
                return Err(RuntimeError::Other(format!(
                    "dispose of model {} failed",
                    model.get()
                )));
            }
            state.model_mut(model)?.disposed = true;
        }
        self.log(RuntimeOp::DisposeModel { model });
        Ok(())
    }

    fn dispose_editor(&self, editor: EditorId) -> Result<(), RuntimeError> {
        {
            let mut state = self.state.borrow_mut();
            if state.fail_dispose {
                return Err(RuntimeError::Other(format!(
                    "dispose of editor {} failed",
                    editor.get()
                )));
            }
            state.editor_mut(editor)?.disposed = true;
            state.listeners.retain(|_, l| l.editor != editor);
        }
        self.log(RuntimeOp::DisposeEditor { editor });
        Ok(())
    }
}

#[derive(Default)]
struct WindowState {
    next_id: u64,
    listeners: BTreeMap<u64, Option<Box<dyn FnMut()>>>,
}

/// In-memory [`HostWindow`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryWindow {
    state: Rc<RefCell<WindowState>>,
}

impl std::fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl MemoryWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Run every resize listener once.
    pub fn trigger_resize(&self) {
        let ids: Vec<u64> = self.state.borrow().listeners.keys().copied().collect();
        for id in ids {
            let callback = self
                .state
                .borrow_mut()
                .listeners
                .get_mut(&id)
                .and_then(Option::take);
            let Some(mut callback) = callback else {
                continue;
            };
            callback();
            if let Some(slot) = self.state.borrow_mut().listeners.get_mut(&id) {
                *slot = Some(callback);
            }
        }
    }
}

impl HostWindow for MemoryWindow {
    fn add_resize_listener(&self, listener: Box<dyn FnMut()>) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.listeners.insert(id, Some(listener));
        ListenerId::new(id)
    }

    fn remove_resize_listener(&self, listener: ListenerId) {
        self.state.borrow_mut().listeners.remove(&listener.get());
    }
}
