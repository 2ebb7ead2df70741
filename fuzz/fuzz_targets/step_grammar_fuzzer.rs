//! Fuzz target for the step grammar
//!
//! Feeds arbitrary text to `PipelineStep::from_str`.
//!
//! # Invariants
//!
//! - Parsing NEVER panics
//! - A parsed step displays back to exactly the input
//! - A displayed step parses back to the same step

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealpipe_proto::PipelineStep;

fuzz_target!(|data: &str| {
    let Ok(step) = data.parse::<PipelineStep>() else {
        return;
    };

    let displayed = step.to_string();
    assert_eq!(displayed, data, "grammar is canonical");
    assert_eq!(displayed.parse::<PipelineStep>().ok(), Some(step));
});
