//! Executes pipeline descriptors.
//!
//! Evaluation is split in two phases. [`PipelineEvaluator::compile`] checks
//! the whole descriptor against the whitelist and resolves every step
//! without touching any value. Only a fully valid plan is executed, so a
//! rejected descriptor never consumes randomness or produces partial
//! output.
//!
//! # Slots
//!
//! State is a map keyed by [`TargetSelector`]. The invoked function is
//! always the seal function. Its input slots are seeded from `inputs`,
//! which must be exactly `message` (the caller's value) then `publickey`
//! (the descriptor key); each input chain transforms its slot,
//! the function consumes the input slots positionally and its result lands
//! in output slot 0, which the output chain transforms into the final value.
//!
//! A step of arity `k` receives its slot's value followed by the first
//! `k - 1` other input slots' values, in index order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use sealpipe_proto::{INPUT_MESSAGE, INPUT_PUBLIC_KEY, PipelineDescriptor, Role, TargetSelector};
use serde_json::Value;
use tracing::trace;

use crate::{
    Datum, ProcedureError, Result,
    registry::{Operation, SEAL_FUNCTION, WhitelistRegistry},
};

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Request parameter the value belongs in
    pub param: String,
    /// Encrypted message in transport form
    pub value: String,
}

/// One resolved step.
#[derive(Debug, Clone, Copy)]
struct ResolvedStep {
    operation: Operation,
    priority: i32,
}

/// A validated descriptor, ready to run.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    invoke: Operation,
    seeds: Vec<Seed>,
    chains: BTreeMap<TargetSelector, Vec<ResolvedStep>>,
    output: TargetSelector,
    public_key: String,
    param: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seed {
    Message,
    PublicKey,
}

/// Seed sources of the seal function's arguments, in order.
const SEAL_SEEDS: [Seed; 2] = [Seed::Message, Seed::PublicKey];

impl CompiledPipeline {
    fn input(&self, index: usize) -> TargetSelector {
        TargetSelector::input(self.invoke.name(), index as u8)
    }

    /// Run the plan on `message`.
    pub fn run<R: RngCore + CryptoRng>(&self, message: &Value, rng: &mut R) -> Result<PipelineOutput> {
        let mut state: BTreeMap<TargetSelector, Datum> = BTreeMap::new();
        for (index, seed) in self.seeds.iter().enumerate() {
            let datum = match seed {
                Seed::Message => Datum::Value(message.clone()),
                Seed::PublicKey => Datum::text(self.public_key.clone()),
            };
            state.insert(self.input(index), datum);
        }

        for index in 0..self.seeds.len() {
            let selector = self.input(index);
            self.run_chain(&selector, &mut state, rng)?;
        }

        let args = (0..self.seeds.len())
            .map(|index| {
                let selector = self.input(index);
                state.get(&selector).cloned().ok_or_else(|| ProcedureError::MissingInputSlot {
                    selector: selector.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let result = self.invoke.apply(args, rng)?;
        trace!(function = self.invoke.name(), "invoked function");
        state.insert(self.output.clone(), result);

        self.run_chain(&self.output, &mut state, rng)?;

        let value = state
            .remove(&self.output)
            .ok_or_else(|| ProcedureError::MissingInputSlot { selector: self.output.to_string() })?
            .into_text(self.invoke.name())?;

        Ok(PipelineOutput { param: self.param.clone(), value })
    }

    fn run_chain<R: RngCore + CryptoRng>(
        &self,
        selector: &TargetSelector,
        state: &mut BTreeMap<TargetSelector, Datum>,
        rng: &mut R,
    ) -> Result<()> {
        let Some(chain) = self.chains.get(selector) else {
            return Ok(());
        };

        for step in chain {
            let current = state
                .remove(selector)
                .ok_or_else(|| ProcedureError::MissingInputSlot { selector: selector.to_string() })?;

            let mut args = Vec::with_capacity(step.operation.arity());
            args.push(current);
            args.extend(
                (0..self.seeds.len())
                    .map(|index| self.input(index))
                    .filter(|other| other != selector)
                    .filter_map(|other| state.get(&other).cloned())
                    .take(step.operation.arity() - 1),
            );

            let next = step.operation.apply(args, rng)?;
            trace!(
                selector = %selector,
                operation = step.operation.name(),
                priority = step.priority,
                kind = next.kind(),
                "applied step"
            );
            state.insert(selector.clone(), next);
        }

        Ok(())
    }
}

/// Evaluates descriptors against the whitelist.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineEvaluator {
    registry: WhitelistRegistry,
}

impl PipelineEvaluator {
    /// Evaluator using the standard whitelist.
    pub fn new() -> Self {
        Self { registry: WhitelistRegistry::new() }
    }

    /// Validate `descriptor` at `now` and resolve every step.
    ///
    /// # Errors
    ///
    /// - `MalformedDescriptor`: structural invariants violated
    /// - `DescriptorExpired`: `now` is at or past `expires_at`
    /// - `UnknownOperation`: a step is not whitelisted, or the invoked
    ///   function is not the seal function
    /// - `ArityMismatch`: declared and registered arities differ
    /// - `MissingInputSlot`: a step targets a slot the function lacks, or
    ///   the inputs are not `[message, publickey]`
    pub fn compile(&self, descriptor: &PipelineDescriptor, now: DateTime<Utc>) -> Result<CompiledPipeline> {
        descriptor.validate()?;
        if descriptor.is_expired(now) {
            return Err(ProcedureError::DescriptorExpired { expires_at: descriptor.expires_at, now });
        }

        let invoke = self.registry.resolve(&descriptor.invoke)?;
        if invoke.name() != SEAL_FUNCTION {
            return Err(ProcedureError::UnknownOperation { name: descriptor.invoke.clone() });
        }

        let seeds = descriptor
            .inputs
            .iter()
            .enumerate()
            .map(|(index, source)| match source.as_str() {
                INPUT_MESSAGE => Ok(Seed::Message),
                INPUT_PUBLIC_KEY => Ok(Seed::PublicKey),
                _ => Err(ProcedureError::MissingInputSlot {
                    selector: TargetSelector::input(invoke.name(), index as u8).to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        if seeds.len() != invoke.arity() {
            return Err(ProcedureError::ArityMismatch {
                operation: invoke.name(),
                expected: invoke.arity(),
                got: seeds.len(),
            });
        }
        if let Some(index) = SEAL_SEEDS.iter().zip(&seeds).position(|(want, got)| want != got) {
            return Err(ProcedureError::MissingInputSlot {
                selector: TargetSelector::input(invoke.name(), index as u8).to_string(),
            });
        }

        let output = TargetSelector::output(invoke.name(), 0);
        let mut chains: BTreeMap<TargetSelector, Vec<ResolvedStep>> = BTreeMap::new();

        for step in &descriptor.steps {
            let operation = self.registry.resolve(&step.operation)?;
            if usize::from(step.arity) != operation.arity() {
                return Err(ProcedureError::ArityMismatch {
                    operation: operation.name(),
                    expected: operation.arity(),
                    got: usize::from(step.arity),
                });
            }

            let target = &step.target;
            let in_range = match target.role {
                Role::Input => usize::from(target.argument_index) < seeds.len(),
                Role::Output => *target == output,
            };
            if target.function != invoke.name() || !in_range {
                return Err(ProcedureError::MissingInputSlot { selector: target.to_string() });
            }

            chains
                .entry(target.clone())
                .or_default()
                .push(ResolvedStep { operation, priority: step.priority });
        }

        for chain in chains.values_mut() {
            chain.sort_by_key(|step| step.priority);
        }

        Ok(CompiledPipeline {
            invoke,
            seeds,
            chains,
            output,
            public_key: descriptor.public_key.clone(),
            param: descriptor.message_param.clone(),
        })
    }

    /// Evaluate `descriptor` on `message` at `now`.
    pub fn evaluate<R: RngCore + CryptoRng>(
        &self,
        descriptor: &PipelineDescriptor,
        message: &Value,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<PipelineOutput> {
        self.compile(descriptor, now)?.run(message, rng)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use sealpipe_crypto::RouteIdentity;
    use sealpipe_proto::{MessageFormat, PipelineStep};
    use serde_json::json;
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::{
        DescriptorBuilder, decrypt_payload,
        registry::SEAL_FUNCTION,
        route::{RouteConfig, RouteRecord},
        service::SEALED_BOX_ALGORITHM,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn route(format: MessageFormat) -> RouteRecord {
        RouteRecord {
            identity: RouteIdentity {
                secret: "s3cr3t-32-chars".to_string(),
                last_modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                owner_login: "admin".to_string(),
                owner_email: "a@b.com".to_string(),
                slug: "my-route".to_string(),
                algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
            },
            config: RouteConfig { message_format: format, ..RouteConfig::default() },
        }
    }

    fn descriptor(format: MessageFormat) -> PipelineDescriptor {
        DescriptorBuilder::new().build(&route(format), now()).unwrap()
    }

    fn evaluate(descriptor: &PipelineDescriptor, message: &Value) -> Result<PipelineOutput> {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        PipelineEvaluator::new().evaluate(descriptor, message, now(), &mut rng)
    }

    fn channel(descriptor: &PipelineDescriptor) -> String {
        descriptor.channel().unwrap().to_string()
    }

    #[test]
    fn built_pipeline_decrypts_to_message() {
        let descriptor = descriptor(MessageFormat::Raw);
        let output = evaluate(&descriptor, &json!("hello")).unwrap();

        assert_eq!(output.param, "payload");
        assert_eq!(decrypt_payload(&output.value, &route(MessageFormat::Raw).identity).unwrap(), json!("hello"));
    }

    #[test]
    fn object_pipeline_preserves_structure() {
        let message = json!({"name": "a", "tags": [1, 2]});
        let output = evaluate(&descriptor(MessageFormat::Object), &message).unwrap();

        assert_eq!(decrypt_payload(&output.value, &route(MessageFormat::Object).identity).unwrap(), message);
    }

    #[test]
    fn json_pipeline_seals_json_text() {
        let message = json!({"a": 1});
        let output = evaluate(&descriptor(MessageFormat::Json), &message).unwrap();

        assert_eq!(
            decrypt_payload(&output.value, &route(MessageFormat::Json).identity).unwrap(),
            json!(r#"{"a":1}"#)
        );
    }

    #[test]
    fn raw_pipeline_rejects_structured_message() {
        assert!(matches!(
            evaluate(&descriptor(MessageFormat::Raw), &json!({"a": 1})),
            Err(ProcedureError::TypeMismatch { operation: SEAL_FUNCTION, .. })
        ));
    }

    #[test]
    fn steps_sort_by_priority_then_insertion() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.steps.reverse();

        let output = evaluate(&descriptor, &json!("hello")).unwrap();
        assert_eq!(decrypt_payload(&output.value, &route(MessageFormat::Raw).identity).unwrap(), json!("hello"));
    }

    #[test]
    fn equal_priority_steps_keep_insertion_order() {
        let with_output = |operations: &[&str]| {
            let mut descriptor = descriptor(MessageFormat::Raw);
            let channel = channel(&descriptor);
            descriptor.steps.retain(|step| step.target.role == Role::Input);
            for operation in operations {
                let step = PipelineStep::new(&channel, TargetSelector::output(SEAL_FUNCTION, 0), *operation, 10, 1);
                descriptor.steps.push(step.unwrap());
            }
            evaluate(&descriptor, &json!("hello")).unwrap().value
        };

        let encoded = with_output(&["base64_encode"]);
        let hashed_encoding = with_output(&["base64_encode", "sha256"]);
        let encoded_hash = with_output(&["sha256", "base64_encode"]);

        assert_eq!(hashed_encoding, hex::encode(Sha256::digest(encoded.as_bytes())));
        assert_ne!(hashed_encoding, encoded_hash);
    }

    #[test]
    fn array_pipeline_preserves_elements() {
        let message = json!([1, "two", null, {"three": [3]}]);
        let descriptor = descriptor(MessageFormat::Array);
        assert!(descriptor.steps.iter().any(|step| step.operation == "serialize"));

        let output = evaluate(&descriptor, &message).unwrap();
        assert_eq!(decrypt_payload(&output.value, &route(MessageFormat::Array).identity).unwrap(), message);
    }

    #[test]
    fn unknown_operation_fails_before_execution() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        let step = PipelineStep::new(
            channel(&descriptor),
            TargetSelector::input(SEAL_FUNCTION, 0),
            "eval",
            0,
            1,
        )
        .unwrap();
        descriptor.steps.push(step);

        assert_eq!(
            PipelineEvaluator::new().compile(&descriptor, now()).err(),
            Some(ProcedureError::UnknownOperation { name: "eval".to_string() })
        );
    }

    #[test]
    fn unknown_invoked_function_is_rejected() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.invoke = "structured_encode".to_string();
        assert!(matches!(
            evaluate(&descriptor, &json!("x")),
            Err(ProcedureError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn whitelisted_two_argument_function_cannot_be_invoked() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.invoke = "sprintf".to_string();
        for step in &mut descriptor.steps {
            step.target.function = "sprintf".to_string();
        }

        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(
            PipelineEvaluator::new().evaluate(&descriptor, &json!("%s"), now(), &mut rng),
            Err(ProcedureError::UnknownOperation { name: "sprintf".to_string() })
        );
        assert_eq!(rng.next_u64(), ChaCha20Rng::seed_from_u64(3).next_u64());
    }

    #[test]
    fn inputs_must_be_message_then_key() {
        let seal_input = |index| TargetSelector::input(SEAL_FUNCTION, index).to_string();
        let cases = [
            (vec![INPUT_MESSAGE, INPUT_MESSAGE], seal_input(1)),
            (vec![INPUT_PUBLIC_KEY, INPUT_PUBLIC_KEY], seal_input(0)),
            (vec![INPUT_PUBLIC_KEY, INPUT_MESSAGE], seal_input(0)),
        ];

        for (inputs, selector) in cases {
            let mut descriptor = descriptor(MessageFormat::Raw);
            descriptor.inputs = inputs.into_iter().map(str::to_string).collect();
            assert_eq!(
                PipelineEvaluator::new().compile(&descriptor, now()).err(),
                Some(ProcedureError::MissingInputSlot { selector })
            );
        }
    }

    #[test]
    fn declared_arity_must_match_registry() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.steps[0].arity = 2;
        assert!(matches!(
            evaluate(&descriptor, &json!("x")),
            Err(ProcedureError::ArityMismatch { expected: 1, got: 2, .. })
        ));

        let mut descriptor = self::descriptor(MessageFormat::Raw);
        descriptor.inputs.pop();
        assert_eq!(
            evaluate(&descriptor, &json!("x")),
            Err(ProcedureError::ArityMismatch { operation: SEAL_FUNCTION, expected: 2, got: 1 })
        );
    }

    #[test]
    fn selectors_must_name_existing_slots() {
        let targets = [
            TargetSelector::input(SEAL_FUNCTION, 2),
            TargetSelector::output(SEAL_FUNCTION, 1),
            TargetSelector::input("sha256", 0),
        ];

        for target in targets {
            let mut descriptor = descriptor(MessageFormat::Raw);
            let selector = target.to_string();
            descriptor.steps.push(
                PipelineStep::new(channel(&descriptor), target, "sha256", 10, 1).unwrap(),
            );
            assert_eq!(
                evaluate(&descriptor, &json!("x")),
                Err(ProcedureError::MissingInputSlot { selector })
            );
        }
    }

    #[test]
    fn unknown_input_source_is_missing_slot() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.inputs[1] = "env".to_string();
        assert!(matches!(
            evaluate(&descriptor, &json!("x")),
            Err(ProcedureError::MissingInputSlot { .. })
        ));
    }

    #[test]
    fn expired_descriptor_is_rejected() {
        let descriptor = descriptor(MessageFormat::Raw);
        let mut rng = ChaCha20Rng::seed_from_u64(0);

        let at_expiry = PipelineEvaluator::new().evaluate(&descriptor, &json!("x"), descriptor.expires_at, &mut rng);
        assert_eq!(
            at_expiry,
            Err(ProcedureError::DescriptorExpired {
                expires_at: descriptor.expires_at,
                now: descriptor.expires_at,
            })
        );

        let before = descriptor.expires_at - Duration::seconds(1);
        assert!(PipelineEvaluator::new().evaluate(&descriptor, &json!("x"), before, &mut rng).is_ok());
    }

    #[test]
    fn failed_compile_consumes_no_randomness() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.steps[0].operation = "exec".to_string();

        let mut rng = ChaCha20Rng::seed_from_u64(5);
        assert!(PipelineEvaluator::new().evaluate(&descriptor, &json!("x"), now(), &mut rng).is_err());
        assert_eq!(rng.next_u64(), ChaCha20Rng::seed_from_u64(5).next_u64());
    }

    #[test]
    fn output_must_be_text() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        descriptor.steps.retain(|step| step.target.role == Role::Input);

        assert!(matches!(
            evaluate(&descriptor, &json!("x")),
            Err(ProcedureError::TypeMismatch { expected: "utf-8 text", .. })
        ));
    }

    #[test]
    fn two_argument_step_receives_context_slot() {
        let mut descriptor = descriptor(MessageFormat::Raw);
        let channel = channel(&descriptor);
        descriptor.steps.insert(
            0,
            PipelineStep::new(channel, TargetSelector::input(SEAL_FUNCTION, 0), "sprintf", 5, 2)
                .unwrap(),
        );

        // "%s" with the encoded public key as its argument yields the key text
        let output = evaluate(&descriptor, &json!("%s")).unwrap();
        assert_eq!(
            decrypt_payload(&output.value, &route(MessageFormat::Raw).identity).unwrap(),
            json!(descriptor.public_key)
        );
    }
}
