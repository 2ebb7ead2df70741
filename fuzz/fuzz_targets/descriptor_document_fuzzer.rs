//! Fuzz target for descriptor documents
//!
//! Clients parse descriptors served by a possibly hostile server. Arbitrary
//! bytes go through `PipelineDescriptor::from_json` and, when accepted,
//! through compilation.
//!
//! # Invariants
//!
//! - Parsing and compiling NEVER panic
//! - An accepted descriptor re-serializes to a document that parses to the
//!   same descriptor

#![no_main]

use chrono::DateTime;
use libfuzzer_sys::fuzz_target;
use sealpipe_core::PipelineEvaluator;
use sealpipe_proto::PipelineDescriptor;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(descriptor) = PipelineDescriptor::from_json(text) else {
        return;
    };

    let json = descriptor.to_json().expect("accepted descriptor serializes");
    assert_eq!(PipelineDescriptor::from_json(&json).ok(), Some(descriptor.clone()));

    let _ = PipelineEvaluator::new().compile(&descriptor, DateTime::UNIX_EPOCH);
});
