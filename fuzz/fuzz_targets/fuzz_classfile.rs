#![no_main]

use libfuzzer_sys::fuzz_target;

// Capped to avoid OOM on pathological inputs.
const MAX_INPUT_SIZE: usize = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    let cap = data.len().min(MAX_INPUT_SIZE);
    if let Ok(class) = graft_classfile::ClassFile::parse(&data[..cap]) {
        // Anything that parses must encode back and re-parse to the same model.
        if let Ok(bytes) = class.encode() {
            let reparsed =
                graft_classfile::ClassFile::parse(&bytes).expect("re-parse of encoded image");
            assert_eq!(reparsed, class);
        }
    }
});
