#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qedit_core::{Duration, Instant};
use qedit_editor::{
    Bridge, BridgeState, EditorConfig, Format, FormatSwitch, Redisplay, SuppressionMode,
};
use serde_json::json;

#[derive(Arbitrary, Debug)]
enum Op {
    Type(String),
    Apply,
    Reset,
    Restore,
    Upstream(u8),
    SelectYaml(bool),
    Advance(u16),
}

#[derive(Arbitrary, Debug)]
struct Script {
    origin_tagged: bool,
    ops: Vec<Op>,
}

fuzz_target!(|script: Script| {
    let mode = if script.origin_tagged {
        SuppressionMode::OriginTagged
    } else {
        SuppressionMode::GuardWindow
    };
    let config = EditorConfig::default().suppression_mode(mode);
    let Ok(mut bridge) = Bridge::new(json!({"n": 0}), Format::Json, &config) else {
        return;
    };
    let mut now = Instant::now();
    // Buffer contents as last typed; `None` while the buffer shows `text()`.
    let mut typed: Option<String> = None;

    for op in script.ops.into_iter().take(64) {
        match op {
            Op::Type(text) => {
                let shown = bridge.text_changed(&text);
                typed = if shown.is_some() { None } else { Some(text) };
            }
            Op::Apply => {
                let text = typed.clone().unwrap_or_else(|| bridge.text().to_owned());
                if bridge.apply(&text, now).is_ok() {
                    typed = None;
                }
            }
            Op::Reset => {
                if bridge.reset().is_ok() {
                    typed = None;
                }
            }
            Op::Restore => {
                if bridge.restore().is_ok() {
                    typed = None;
                }
            }
            Op::Upstream(n) => {
                if let Ok(Redisplay::Restored(_)) = bridge.value_changed(json!({ "n": n }), now) {
                    typed = None;
                }
            }
            Op::SelectYaml(yaml) => {
                let format = if yaml { Format::Yaml } else { Format::Json };
                if let Ok(FormatSwitch::Switched(_)) = bridge.set_format(format) {
                    typed = None;
                }
            }
            Op::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms));
                if bridge.poll(now).is_some() {
                    typed = None;
                }
            }
        }

        // Outside the guard window, Editing means exactly "buffer differs".
        if !matches!(bridge.state(), BridgeState::Suppressed { .. }) {
            assert_eq!(bridge.state() == BridgeState::Editing, bridge.is_dirty());
        }
        // An idle buffer shows the stored value in the active format.
        if bridge.state() == BridgeState::Idle {
            let shown = bridge
                .format()
                .deserialize(bridge.text())
                .expect("idle buffer parses");
            assert_eq!(&shown, bridge.value());
        }
    }
});
