//! Fuzz target: live listing parser.
//!
//! The listing is tool output and must never make the parser panic. Every
//! parsed row's addresses must show up in the used-address set.

#![no_main]

use labvz_executor::Listing;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let listing = Listing::parse(&text);
    let used = listing.used_addresses();
    for entry in listing.entries() {
        for address in &entry.addresses {
            assert!(used.contains(address));
        }
    }
});
