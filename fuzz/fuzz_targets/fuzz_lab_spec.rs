//! Fuzz target: lab spec parsing.
//!
//! Lab specs come from lab repositories. Errors are expected; panics are not.

#![no_main]

use labvz_manager::LabSpec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(spec) = LabSpec::parse(text) {
            let _ = spec.to_string();
        }
    }
});
