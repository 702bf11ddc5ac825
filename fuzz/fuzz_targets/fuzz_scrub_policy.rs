//! Fuzz target for harness policy JSON parsing.
//!
//! Parsing and validating arbitrary input must never panic, only return an
//! error.

#![no_main]

use cmu_scrub::ScrubPolicy;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(policy) = serde_json::from_slice::<ScrubPolicy>(data) {
        let _ = policy.validate();
        let _ = serde_json::to_string(&policy);
    }
});
