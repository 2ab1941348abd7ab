//! Fuzz target: VM identifier validation.
//!
//! Anything the validator accepts must be a plain decimal in range whose
//! canonical form validates to the same id.

#![no_main]

use labvz_core::{IdentifierValidator, MIN_VM_ID_EXCLUSIVE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let validator = IdentifierValidator::default();
    if let Ok(id) = validator.validate(raw) {
        assert!(id.get() > MIN_VM_ID_EXCLUSIVE);
        assert!(id.get() <= validator.max_id());
        assert!(raw.trim().bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(validator.validate(&id.to_string()).ok(), Some(id));
    }
});
