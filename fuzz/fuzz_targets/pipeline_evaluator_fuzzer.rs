//! Fuzz target for the pipeline evaluator
//!
//! Starts from a genuine descriptor and applies arbitrary step edits:
//! inserts, removals, renamed operations, retargeted slots and changed
//! priorities or arities.
//!
//! # Invariants
//!
//! - Compilation and evaluation NEVER panic
//! - Any output the evaluator does produce is a transport string the route
//!   can attempt to open without panicking

#![no_main]

use arbitrary::Arbitrary;
use chrono::{Duration, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sealpipe_core::{
    DescriptorBuilder, PipelineEvaluator, RouteRecord, SEAL_FUNCTION, SEALED_BOX_ALGORITHM,
    WhitelistRegistry, decrypt_payload,
};
use sealpipe_crypto::RouteIdentity;
use sealpipe_proto::{PipelineStep, TargetSelector};
use serde_json::Value;

#[derive(Debug, Arbitrary)]
enum Edit {
    Remove { index: u8 },
    Insert { operation: u8, input: bool, index: u8, priority: i8, arity: u8 },
    Rename { index: u8, operation: u8 },
    Reprioritize { index: u8, priority: i8 },
    Rearity { index: u8, arity: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    message: String,
    edits: Vec<Edit>,
    seed: u64,
}

fuzz_target!(|input: Input| {
    let registry = WhitelistRegistry::new();
    let names: Vec<&str> = registry.names().collect();
    let name = |pick: u8| names.get(usize::from(pick)).copied().unwrap_or("not_whitelisted");

    let route = RouteRecord::new(RouteIdentity {
        secret: "fuzz-secret".to_string(),
        last_modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        owner_login: "fuzz".to_string(),
        owner_email: "fuzz@example.com".to_string(),
        slug: "fuzz".to_string(),
        algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
    });
    let now = route.identity.last_modified_at + Duration::seconds(30);
    let mut descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
    let channel = descriptor.channel().unwrap_or("pv").to_string();

    for edit in input.edits.into_iter().take(16) {
        let len = descriptor.steps.len();
        match edit {
            Edit::Remove { index } if len > 0 => {
                descriptor.steps.remove(usize::from(index) % len);
            },
            Edit::Insert { operation, input, index, priority, arity } => {
                let target = if input {
                    TargetSelector::input(SEAL_FUNCTION, index % 3)
                } else {
                    TargetSelector::output(SEAL_FUNCTION, index % 2)
                };
                if let Ok(step) = PipelineStep::new(
                    channel.clone(),
                    target,
                    name(operation),
                    i32::from(priority),
                    arity % 4,
                ) {
                    descriptor.steps.push(step);
                }
            },
            Edit::Rename { index, operation } if len > 0 => {
                descriptor.steps[usize::from(index) % len].operation = name(operation).to_string();
            },
            Edit::Reprioritize { index, priority } if len > 0 => {
                descriptor.steps[usize::from(index) % len].priority = i32::from(priority);
            },
            Edit::Rearity { index, arity } if len > 0 => {
                descriptor.steps[usize::from(index) % len].arity = arity % 4;
            },
            _ => {},
        }
    }

    let mut rng = ChaCha20Rng::seed_from_u64(input.seed);
    let message = Value::String(input.message);
    let Ok(pipeline) = PipelineEvaluator::new().compile(&descriptor, now) else {
        return;
    };

    if let Ok(output) = pipeline.run(&message, &mut rng) {
        let _ = decrypt_payload(&output.value, &route.identity);
    }
});
