#![no_main]

use libfuzzer_sys::fuzz_target;
use qedit_editor::Format;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for format in Format::ALL {
        if let Ok(value) = format.deserialize(text) {
            // Anything that parses must serialize and parse back to itself.
            let shown = format.serialize(&value).expect("parsed value serializes");
            let back = format.deserialize(&shown).expect("serialized text parses");
            assert_eq!(back, value);
        }
    }
});
