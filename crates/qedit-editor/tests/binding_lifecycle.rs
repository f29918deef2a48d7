use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use qedit_core::ManualClock;
use qedit_editor::{
    BindingPhase, EditorConfig, EditorProps, MemoryRuntime, MemoryWindow,
    MountPoint, RuntimeLoadError, RuntimeLoader, RuntimeOp, RuntimeSource, TextBinding,
};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

struct Harness {
    binding: TextBinding,
    runtime: MemoryRuntime,
    window: MemoryWindow,
    clock: ManualClock,
    loader: RuntimeLoader,
    changes: Rc<RefCell<Vec<String>>>,
}

impl Harness {
    fn pending(props: EditorProps) -> Self {
        let clock = ManualClock::new();
        let binding = TextBinding::new(props, EditorConfig::default(), Rc::new(clock.clone()));
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        binding.set_on_change(move |text| sink.borrow_mut().push(text.to_string()));
        let loader = RuntimeLoader::new(RuntimeSource::default());
        let window = MemoryWindow::new();
        binding.mount(&loader, Rc::new(window.clone()), MountPoint::new("editor"));
        Self {
            binding,
            runtime: MemoryRuntime::new(),
            window,
            clock,
            loader,
            changes,
        }
    }

    fn ready(props: EditorProps) -> Self {
        let h = Self::pending(props);
        h.loader.resolve(Ok(h.runtime.handle()));
        h
    }

    fn editor(&self) -> qedit_editor::EditorId {
        self.binding.editor_id().expect("editor exists")
    }

    fn model(&self) -> qedit_editor::ModelId {
        self.binding.model_id().expect("model exists")
    }

    fn changes(&self) -> Vec<String> {
        self.changes.borrow().clone()
    }
}

fn json_props(content: &str) -> EditorProps {
    EditorProps::new(content, "inmemory://model/1.json", "json")
}

#[test]
fn unchanged_props_cause_no_runtime_mutation() {
    let h = Harness::ready(json_props("{}").width(400));
    h.runtime.clear_ops();
    for _ in 0..3 {
        h.binding.update(json_props("{}").width(400));
    }
    assert!(h.runtime.ops().is_empty());
}

#[test]
fn identity_change_keeps_in_widget_text() {
    let h = Harness::ready(json_props("{}"));
    let old_model = h.model();
    h.runtime.type_text(h.editor(), "{\"typed\": true}").unwrap();
    h.runtime.clear_ops();

    h.binding
        .update(json_props("{}").identity("inmemory://model/1.yaml").language("yaml"));

    let new_model = h.model();
    assert_ne!(new_model, old_model);
    assert_eq!(h.runtime.editor_model(h.editor()), Some(new_model));
    assert_eq!(
        h.runtime.model_text(new_model).as_deref(),
        Some("{\"typed\": true}")
    );
    assert_eq!(h.runtime.model_language(new_model).as_deref(), Some("yaml"));
    assert_eq!(
        h.runtime.ops(),
        vec![
            RuntimeOp::CreateModel {
                model: new_model,
                identity: "inmemory://model/1.yaml".into(),
                language: "yaml".into(),
            },
            RuntimeOp::SetModel {
                editor: h.editor(),
                model: new_model,
            },
            RuntimeOp::DisposeModel { model: old_model },
        ]
    );
    assert_eq!(h.runtime.live_models(), vec![new_model]);
}

#[test]
fn simultaneous_switch_lands_new_text_without_echo() {
    let h = Harness::ready(json_props("{\n  \"a\": 1\n}"));
    h.binding.update(EditorProps::new(
        "a: 1\n",
        "inmemory://model/1.yaml",
        "yaml",
    ));
    let model = h.model();
    assert_eq!(h.runtime.model_text(model).as_deref(), Some("a: 1\n"));
    assert_eq!(h.runtime.model_language(model).as_deref(), Some("yaml"));

    h.clock.advance_ms(600);
    h.binding.poll();
    assert!(h.changes().is_empty());
}

#[test]
fn language_change_is_applied_in_place() {
    let h = Harness::ready(json_props("1"));
    h.runtime.clear_ops();
    h.binding.update(json_props("1").language("yaml"));
    assert_eq!(
        h.runtime.ops(),
        vec![RuntimeOp::SetLanguage {
            model: h.model(),
            language: "yaml".into(),
        }]
    );
}

#[test]
fn content_equal_to_buffer_is_not_pushed() {
    let h = Harness::ready(json_props("1"));
    h.runtime.type_text(h.editor(), "12").unwrap();
    h.runtime.clear_ops();
    h.binding.update(json_props("12"));
    assert!(h.runtime.ops().is_empty());
    assert_eq!(h.binding.applied().content, "12");
}

#[test]
fn rapid_edits_coalesce_into_one_notification() {
    let h = Harness::ready(json_props(""));
    let editor = h.editor();
    for text in ["a", "ab", "abc", "abcd", "abcde"] {
        h.runtime.type_text(editor, text).unwrap();
        h.clock.advance_ms(100);
        h.binding.poll();
    }
    assert!(h.changes().is_empty());
    h.clock.advance_ms(400);
    h.binding.poll();
    assert_eq!(h.changes(), vec!["abcde".to_string()]);
}

#[test]
fn spaced_edits_notify_each_time() {
    let h = Harness::ready(json_props(""));
    let editor = h.editor();
    for text in ["a", "ab", "abc"] {
        h.runtime.type_text(editor, text).unwrap();
        h.clock.advance_ms(600);
        h.binding.poll();
    }
    assert_eq!(h.changes(), vec!["a", "ab", "abc"]);
}

#[test]
fn blur_flushes_immediately_and_once() {
    let h = Harness::ready(json_props(""));
    h.runtime.type_text(h.editor(), "x").unwrap();
    h.runtime.blur(h.editor()).unwrap();
    assert_eq!(h.changes(), vec!["x".to_string()]);
    h.clock.advance_ms(600);
    h.binding.poll();
    assert_eq!(h.changes().len(), 1);
}

#[test]
fn runtime_is_fetched_once_for_many_bindings() {
    let clock = ManualClock::new();
    let loader = RuntimeLoader::new(RuntimeSource::default());
    let window = MemoryWindow::new();
    let bindings: Vec<TextBinding> = (0..3)
        .map(|i| {
            let binding = TextBinding::new(
                EditorProps::new("", format!("inmemory://model/{i}.json"), "json"),
                EditorConfig::default(),
                Rc::new(clock.clone()),
            );
            binding.mount(&loader, Rc::new(window.clone()), MountPoint::new(format!("e{i}")));
            binding
        })
        .collect();
    assert_eq!(loader.fetch_count(), 1);
    assert!(bindings.iter().all(TextBinding::is_loading));

    let runtime = MemoryRuntime::new();
    loader.resolve(Ok(runtime.handle()));
    assert!(bindings.iter().all(|b| b.phase() == BindingPhase::Ready));
    assert_eq!(runtime.live_editors().len(), 3);
    assert_eq!(loader.fetch_count(), 1);
}

#[test]
fn props_updated_while_loading_are_used_at_creation() {
    let h = Harness::pending(json_props("early"));
    h.binding.update(json_props("late").language("yaml"));
    assert_eq!(h.binding.value(), "late");
    h.loader.resolve(Ok(h.runtime.handle()));
    assert_eq!(h.runtime.model_text(h.model()).as_deref(), Some("late"));
    assert_eq!(h.runtime.model_language(h.model()).as_deref(), Some("yaml"));
}

#[test]
fn on_ready_receives_the_editor() {
    let h = Harness::pending(json_props(""));
    let seen = Rc::new(RefCell::new(None));
    let s = Rc::clone(&seen);
    h.binding.set_on_ready(move |editor| *s.borrow_mut() = Some(editor));
    h.loader.resolve(Ok(h.runtime.handle()));
    assert_eq!(*seen.borrow(), h.binding.editor_id());
    assert_eq!(h.runtime.editor_font_size(h.editor()), Some(14));
    assert_eq!(
        h.runtime.editor_mount(h.editor()),
        Some(MountPoint::new("editor"))
    );
}

#[test]
fn unmount_before_ready_creates_nothing() {
    let h = Harness::pending(json_props(""));
    assert_eq!(h.window.listener_count(), 1);
    h.binding.unmount();
    assert_eq!(h.window.listener_count(), 0);
    h.loader.resolve(Ok(h.runtime.handle()));
    assert!(h.runtime.live_models().is_empty());
    assert!(h.runtime.live_editors().is_empty());
    assert_eq!(h.binding.phase(), BindingPhase::Disposed);
}

#[test]
fn dropped_binding_ignores_late_runtime() {
    let h = Harness::pending(json_props(""));
    let Harness {
        binding,
        runtime,
        loader,
        ..
    } = h;
    drop(binding);
    loader.resolve(Ok(runtime.handle()));
    assert!(runtime.live_models().is_empty());
}

#[test]
fn failed_load_keeps_showing_loading() {
    let h = Harness::pending(json_props("1"));
    h.loader
        .resolve(Err(RuntimeLoadError::Fetch("script blocked".into())));
    assert_eq!(h.binding.phase(), BindingPhase::Failed);
    assert!(h.binding.is_loading());
    assert!(h.binding.container().loading);
    assert_eq!(
        h.binding.load_error(),
        Some(RuntimeLoadError::Fetch("script blocked".into()))
    );
    h.binding.update(json_props("2"));
    h.binding.poll();
    h.binding.unmount();
    assert_eq!(h.window.listener_count(), 0);
}

#[test]
fn resize_recomputes_layout_until_unmounted() {
    let h = Harness::ready(json_props(""));
    let editor = h.editor();
    h.runtime.clear_ops();
    h.window.trigger_resize();
    assert_eq!(h.runtime.ops(), vec![RuntimeOp::Layout { editor }]);
    h.binding.unmount();
    h.runtime.clear_ops();
    h.window.trigger_resize();
    assert!(h.runtime.ops().is_empty());
}

#[test]
fn unmount_flushes_and_disposes_once() {
    let h = Harness::ready(json_props(""));
    let (editor, model) = (h.editor(), h.model());
    h.runtime.type_text(editor, "pending").unwrap();
    h.binding.unmount();
    h.binding.unmount();
    assert_eq!(h.changes(), vec!["pending".to_string()]);
    let disposals: Vec<RuntimeOp> = h
        .runtime
        .ops()
        .into_iter()
        .filter(|op| {
            matches!(
                op,
                RuntimeOp::DisposeEditor { .. } | RuntimeOp::DisposeModel { .. }
            )
        })
        .collect();
    assert_eq!(
        disposals,
        vec![
            RuntimeOp::DisposeEditor { editor },
            RuntimeOp::DisposeModel { model },
        ]
    );
    assert_eq!(h.runtime.listener_count(), 0);
}

#[derive(Clone, Default)]
struct DisposalWarnings(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for DisposalWarnings {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if msg.message.as_deref() == Some("disposal failed") {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn disposal_errors_are_logged_and_swallowed() {
    let warnings = DisposalWarnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    tracing::subscriber::with_default(subscriber, || {
        let h = Harness::ready(json_props(""));
        h.runtime.fail_dispose(true);
        h.binding.unmount();
        h.binding.unmount();
        assert_eq!(h.binding.phase(), BindingPhase::Disposed);
        assert_eq!(h.window.listener_count(), 0);
        assert_eq!(h.runtime.listener_count(), 0);
    });
    assert_eq!(warnings.0.load(Ordering::SeqCst), 2);
}
