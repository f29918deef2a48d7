#![forbid(unsafe_code)]

//! Boundary to the external editing-widget runtime.
//!
//! The widget itself (a code editor loaded over the network) is not part of
//! this crate. Hosts implement [`EditorRuntime`] over it, and [`HostWindow`]
//! over the window the widget lives in. [`MemoryRuntime`](crate::memory::MemoryRuntime)
//! is an in-memory implementation for headless hosts and tests.
//!
//! # Loading
//!
//! The runtime is loaded once per process (per UI thread) through the
//! [`RuntimeLoader`] singleton and is never unloaded. Every binding that asks
//! for it before the load finishes waits on the same pending load.
//!
//! ```text
//!   Idle ──request──▶ Loading(waiters) ──resolve(Ok)──▶ Ready(runtime)
//!                             │
//!                             └──────resolve(Err)─────▶ Failed(error)
//! ```
//!
//! Requests made after the load settled are answered immediately with the
//! cached outcome. A failed load is not retried.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use qedit_core::KeyEvent;

use crate::error::{RuntimeError, RuntimeLoadError};

/// CDN root the widget runtime is served from.
pub const DEFAULT_RUNTIME_BASE_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/monaco-editor/0.20.0/min";

macro_rules! runtime_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }
    };
}

runtime_id!(
    /// A text buffer ("model") owned by the runtime.
    ModelId
);
runtime_id!(
    /// An editor instance owned by the runtime.
    EditorId
);
runtime_id!(
    /// A registered event listener.
    ListenerId
);

/// Events raised by an editor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The bound model's text changed (by the user or programmatically).
    ContentChanged,
    /// The text area lost focus.
    BlurText,
    /// A key went down inside the editor.
    KeyDown(KeyEvent),
}

/// Listener for [`EditorEvent`]s. Returns `true` to consume the event
/// (stop propagation and prevent the widget's default handling).
pub type EditorListener = Box<dyn FnMut(&EditorEvent) -> bool>;

/// Where the editor is mounted, e.g. a DOM element id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MountPoint(pub String);

impl MountPoint {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Construction options for an editor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOptions {
    pub font_size: u16,
}

/// Capabilities of the loaded widget runtime.
///
/// All calls happen on the UI thread. Implementations may raise
/// [`EditorEvent::ContentChanged`] synchronously from
/// [`set_model_value`](Self::set_model_value); listeners are written to
/// tolerate that.
pub trait EditorRuntime {
    fn create_model(
        &self,
        content: &str,
        language: &str,
        identity: &str,
    ) -> Result<ModelId, RuntimeError>;

    fn create_editor(
        &self,
        mount: &MountPoint,
        model: ModelId,
        options: &EditorOptions,
    ) -> Result<EditorId, RuntimeError>;

    /// Bind `editor` to a different model.
    fn set_model(&self, editor: EditorId, model: ModelId) -> Result<(), RuntimeError>;

    fn model_value(&self, model: ModelId) -> Result<String, RuntimeError>;

    fn set_model_value(&self, model: ModelId, text: &str) -> Result<(), RuntimeError>;

    fn set_model_language(&self, model: ModelId, language: &str) -> Result<(), RuntimeError>;

    fn subscribe(
        &self,
        editor: EditorId,
        listener: EditorListener,
    ) -> Result<ListenerId, RuntimeError>;

    fn unsubscribe(&self, listener: ListenerId) -> Result<(), RuntimeError>;

    /// Recompute layout after the container changed size.
    fn layout(&self, editor: EditorId) -> Result<(), RuntimeError>;

    fn dispose_model(&self, model: ModelId) -> Result<(), RuntimeError>;

    fn dispose_editor(&self, editor: EditorId) -> Result<(), RuntimeError>;
}

/// Shared handle to the loaded runtime.
pub type RuntimeHandle = Rc<dyn EditorRuntime>;

/// The browser window (or equivalent) hosting the editors.
pub trait HostWindow {
    fn add_resize_listener(&self, listener: Box<dyn FnMut()>) -> ListenerId;
    fn remove_resize_listener(&self, listener: ListenerId);
}

/// Where and how the runtime is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSource {
    base_url: String,
}

impl RuntimeSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The AMD loader script to inject first.
    #[must_use]
    pub fn loader_script_url(&self) -> String {
        format!("{}/vs/loader.js", self.base_url)
    }

    /// Module path mapping for the AMD loader: `("vs", "<base>/vs")`.
    #[must_use]
    pub fn module_path(&self) -> (&'static str, String) {
        ("vs", format!("{}/vs", self.base_url))
    }

    /// Entry module that loads the editor API.
    #[must_use]
    pub fn main_module(&self) -> &'static str {
        "vs/editor/editor.main"
    }

    /// Source of the same-origin worker bootstrap. Cross-origin worker
    /// scripts cannot be started directly, so the host wraps this text in a
    /// blob URL and returns it for every worker label.
    #[must_use]
    pub fn worker_bootstrap_script(&self) -> String {
        let base = js_string(&format!("{}/", self.base_url));
        let main = js_string(&format!("{}/vs/base/worker/workerMain.js", self.base_url));
        format!("self.MonacoEnvironment = {{ baseUrl:{base}}};importScripts({main});")
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_BASE_URL)
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

/// Starts fetching the runtime. The fetcher (or whatever it hands the
/// completer to) finishes the load by calling [`RuntimeLoader::resolve`].
pub trait RuntimeFetcher {
    fn start(&self, source: &RuntimeSource, completer: RuntimeLoader);
}

type Waiter = Box<dyn FnOnce(Result<RuntimeHandle, RuntimeLoadError>)>;

enum LoadState {
    Idle,
    Loading(Vec<Waiter>),
    Ready(RuntimeHandle),
    Failed(RuntimeLoadError),
}

impl LoadState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading(_) => "loading",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

struct LoaderInner {
    state: RefCell<LoadState>,
    source: RefCell<RuntimeSource>,
    fetcher: RefCell<Option<Rc<dyn RuntimeFetcher>>>,
    fetches: Cell<u32>,
}

thread_local! {
    static GLOBAL_LOADER: RuntimeLoader = RuntimeLoader::new(RuntimeSource::default());
}

/// One-time loader for the widget runtime. Clones share state.
#[derive(Clone)]
pub struct RuntimeLoader {
    inner: Rc<LoaderInner>,
}

impl fmt::Debug for RuntimeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeLoader")
            .field("state", &self.inner.state.borrow().name())
            .field("source", &*self.inner.source.borrow())
            .field("fetches", &self.inner.fetches.get())
            .finish()
    }
}

impl RuntimeLoader {
    /// A private loader. Most code should use [`global`](Self::global).
    #[must_use]
    pub fn new(source: RuntimeSource) -> Self {
        Self {
            inner: Rc::new(LoaderInner {
                state: RefCell::new(LoadState::Idle),
                source: RefCell::new(source),
                fetcher: RefCell::new(None),
                fetches: Cell::new(0),
            }),
        }
    }

    /// The loader shared by every binding on this thread.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_LOADER.with(Clone::clone)
    }

    /// Install the fetcher used when the first request arrives. Without one,
    /// the load stays pending until the host calls [`resolve`](Self::resolve).
    pub fn set_fetcher(&self, fetcher: impl RuntimeFetcher + 'static) {
        *self.inner.fetcher.borrow_mut() = Some(Rc::new(fetcher));
    }

    /// Change where the runtime is fetched from. Ignored once loading began.
    pub fn set_source(&self, source: RuntimeSource) {
        if matches!(*self.inner.state.borrow(), LoadState::Idle) {
            *self.inner.source.borrow_mut() = source;
        } else {
            tracing::warn!("runtime source change ignored: load already started");
        }
    }

    #[must_use]
    pub fn source(&self) -> RuntimeSource {
        self.inner.source.borrow().clone()
    }

    /// Ask for the runtime. `waiter` runs exactly once: immediately when the
    /// load already settled, otherwise when it does.
    pub fn request(&self, waiter: impl FnOnce(Result<RuntimeHandle, RuntimeLoadError>) + 'static) {
        let mut state = self.inner.state.borrow_mut();
        let outcome = match &mut *state {
            LoadState::Ready(runtime) => Ok(Rc::clone(runtime)),
            LoadState::Failed(err) => Err(err.clone()),
            LoadState::Loading(waiters) => {
                waiters.push(Box::new(waiter));
                return;
            }
            LoadState::Idle => {
                *state = LoadState::Loading(vec![Box::new(waiter)]);
                // A fetcher may resolve synchronously.
                drop(state);
                self.start_fetch();
                return;
            }
        };
        drop(state);
        waiter(outcome);
    }

    /// Complete the pending load. Only the first completion counts.
    pub fn resolve(&self, outcome: Result<RuntimeHandle, RuntimeLoadError>) {
        let waiters = {
            let mut state = self.inner.state.borrow_mut();
            if matches!(*state, LoadState::Ready(_) | LoadState::Failed(_)) {
                tracing::warn!(state = state.name(), "runtime already settled; completion ignored");
                return;
            }
            let next = match &outcome {
                Ok(runtime) => LoadState::Ready(Rc::clone(runtime)),
                Err(err) => LoadState::Failed(err.clone()),
            };
            match std::mem::replace(&mut *state, next) {
                LoadState::Loading(waiters) => waiters,
                _ => Vec::new(),
            }
        };
        match &outcome {
            Ok(_) => tracing::debug!(waiters = waiters.len(), "editor runtime ready"),
            Err(err) => tracing::warn!(%err, waiters = waiters.len(), "editor runtime failed to load"),
        }
        for waiter in waiters {
            waiter(outcome.clone());
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.state.borrow(), LoadState::Ready(_))
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(*self.inner.state.borrow(), LoadState::Loading(_))
    }

    /// Number of waiters still pending.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        match &*self.inner.state.borrow() {
            LoadState::Loading(waiters) => waiters.len(),
            _ => 0,
        }
    }

    /// How many times a fetch was started. At most one per loader.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.inner.fetches.get()
    }

    fn start_fetch(&self) {
        self.inner.fetches.set(self.inner.fetches.get() + 1);
        let fetcher = self.inner.fetcher.borrow().clone();
        let source = self.source();
        match fetcher {
            Some(fetcher) => {
                tracing::debug!(url = %source.loader_script_url(), "fetching editor runtime");
                fetcher.start(&source, self.clone());
            }
            None => tracing::debug!("no runtime fetcher installed; awaiting host resolve"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRuntime;

    #[test]
    fn source_urls() {
        let source = RuntimeSource::new("https://cdn.example/min/");
        assert_eq!(source.base_url(), "https://cdn.example/min");
        assert_eq!(source.loader_script_url(), "https://cdn.example/min/vs/loader.js");
        assert_eq!(
            source.module_path(),
            ("vs", "https://cdn.example/min/vs".to_string())
        );
        assert_eq!(
            source.worker_bootstrap_script(),
            "self.MonacoEnvironment = { baseUrl:\"https://cdn.example/min/\"};\
             importScripts(\"https://cdn.example/min/vs/base/worker/workerMain.js\");"
        );
    }

    #[test]
    fn default_source_points_at_cdn() {
        assert_eq!(RuntimeSource::default().base_url(), DEFAULT_RUNTIME_BASE_URL);
    }

    #[test]
    fn waiters_share_one_load() {
        let loader = RuntimeLoader::new(RuntimeSource::default());
        let hits = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let h = Rc::clone(&hits);
            loader.request(move |res| {
                assert!(res.is_ok());
                h.set(h.get() + 1);
            });
        }
        assert_eq!(loader.fetch_count(), 1);
        assert_eq!(loader.pending_waiters(), 3);
        assert_eq!(hits.get(), 0);

        loader.resolve(Ok(MemoryRuntime::new().handle()));
        assert_eq!(hits.get(), 3);
        assert!(loader.is_ready());

        let h = Rc::clone(&hits);
        loader.request(move |res| {
            assert!(res.is_ok());
            h.set(h.get() + 1);
        });
        assert_eq!(hits.get(), 4);
        assert_eq!(loader.fetch_count(), 1);
    }

    #[test]
    fn first_request_waits_for_resolve_and_runs_once() {
        let loader = RuntimeLoader::new(RuntimeSource::default());
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        loader.request(move |res| {
            assert!(res.is_ok());
            c.set(c.get() + 1);
        });
        assert!(loader.is_loading());
        assert_eq!(loader.pending_waiters(), 1);
        assert_eq!(calls.get(), 0);

        loader.resolve(Ok(MemoryRuntime::new().handle()));
        assert_eq!(calls.get(), 1);
        assert_eq!(loader.pending_waiters(), 0);

        loader.resolve(Ok(MemoryRuntime::new().handle()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failure_is_cached_and_not_retried() {
        let loader = RuntimeLoader::new(RuntimeSource::default());
        loader.request(|res| assert!(res.is_err()));
        loader.resolve(Err(RuntimeLoadError::Fetch("network".into())));
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        loader.request(move |res| *s.borrow_mut() = res.err());
        assert_eq!(
            *seen.borrow(),
            Some(RuntimeLoadError::Fetch("network".into()))
        );
        assert_eq!(loader.fetch_count(), 1);

        loader.resolve(Ok(MemoryRuntime::new().handle()));
        assert!(!loader.is_ready());
    }

    struct ImmediateFetcher(MemoryRuntime);

    impl RuntimeFetcher for ImmediateFetcher {
        fn start(&self, _source: &RuntimeSource, completer: RuntimeLoader) {
            completer.resolve(Ok(self.0.handle()));
        }
    }

    #[test]
    fn fetcher_may_complete_synchronously() {
        let loader = RuntimeLoader::new(RuntimeSource::default());
        loader.set_fetcher(ImmediateFetcher(MemoryRuntime::new()));
        let ready = Rc::new(Cell::new(false));
        let r = Rc::clone(&ready);
        loader.request(move |res| r.set(res.is_ok()));
        assert!(ready.get());
        assert_eq!(loader.fetch_count(), 1);
    }

    #[test]
    fn source_is_frozen_once_loading() {
        let loader = RuntimeLoader::new(RuntimeSource::default());
        loader.set_source(RuntimeSource::new("https://a.example"));
        loader.request(|_| {});
        loader.set_source(RuntimeSource::new("https://b.example"));
        assert_eq!(loader.source().base_url(), "https://a.example");
    }
}
