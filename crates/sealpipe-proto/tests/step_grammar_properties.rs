//! Property-based tests for the step grammar
//!
//! The step encoding is a wire format shared with clients written in other
//! languages, so display and parse must agree exactly and every deviation must
//! be rejected rather than repaired.

use proptest::prelude::*;
use sealpipe_proto::{PipelineStep, ProtocolError, Role, TargetSelector};

/// Strategy for generating arbitrary valid steps
fn arbitrary_step() -> impl Strategy<Value = PipelineStep> {
    (
        "[A-Za-z0-9_-]{1,64}",        // channel
        prop_oneof![Just(Role::Input), Just(Role::Output)],
        "[A-Za-z_][A-Za-z0-9_]{0,63}", // function
        any::<u8>(),                   // argument index
        "[A-Za-z_][A-Za-z0-9_]{0,63}", // operation
        any::<i32>(),                  // priority
        1u8..=8,                       // arity
    )
        .prop_map(|(channel, role, function, argument_index, operation, priority, arity)| {
            PipelineStep {
                channel,
                target: TargetSelector { role, function, argument_index },
                operation,
                priority,
                arity,
            }
        })
}

#[test]
fn prop_display_parse_roundtrip() {
    proptest!(|(step in arbitrary_step())| {
        let encoded = step.to_string();
        let decoded: PipelineStep = encoded.parse().expect("valid step must parse");

        // PROPERTY: parse is the exact inverse of display
        prop_assert_eq!(decoded, step);
    });
}

#[test]
fn prop_inserted_whitespace_is_rejected() {
    proptest!(|(step in arbitrary_step(), at in any::<prop::sample::Index>(), ws in prop_oneof![Just(' '), Just('\t'), Just('\n')])| {
        let mut encoded = step.to_string();
        let position = at.index(encoded.len() + 1);
        encoded.insert(position, ws);

        // PROPERTY: no whitespace anywhere is tolerated
        let is_malformed = matches!(
            encoded.parse::<PipelineStep>(),
            Err(ProtocolError::MalformedStep { .. })
        );
        prop_assert!(is_malformed);
    });
}

#[test]
fn prop_truncation_is_rejected() {
    proptest!(|(step in arbitrary_step(), cut in any::<prop::sample::Index>())| {
        let encoded = step.to_string();
        let cut = cut.index(encoded.len());

        // PROPERTY: every strict prefix is invalid (the arity digit is last)
        prop_assert!(encoded[..cut].parse::<PipelineStep>().is_err());
    });
}

#[test]
fn prop_parse_never_panics() {
    proptest!(|(input in ".{0,200}")| {
        let _ = input.parse::<PipelineStep>();
    });
}

#[test]
fn prop_error_position_is_in_bounds() {
    proptest!(|(input in "[a-z0-9\\[\\]:.,-]{0,80}")| {
        if let Err(ProtocolError::MalformedStep { position, .. }) = input.parse::<PipelineStep>() {
            prop_assert!(position <= input.len());
        }
    });
}
