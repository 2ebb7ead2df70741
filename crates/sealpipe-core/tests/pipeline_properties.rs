//! Property-based tests for descriptors and their evaluation
//!
//! The central property: a descriptor built for a route, evaluated anywhere
//! before it expires, yields a ciphertext the route opens to the original
//! message. Everything else here guards the edges of that contract.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealpipe_core::{
    DescriptorBuilder, DescriptorCache, MemoryDescriptorCache, PipelineEvaluator, ProcedureError,
    RouteConfig, RouteRecord, SEAL_FUNCTION, SEALED_BOX_ALGORITHM, ValidityWindow,
    WhitelistRegistry, codec, decrypt_payload, encrypt_payload, store::CacheKey,
};
use sealpipe_crypto::RouteIdentity;
use sealpipe_proto::{MessageFormat, PipelineStep, TargetSelector};
use serde_json::Value;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Strategy for generating routes with arbitrary identity and window length
fn arbitrary_route() -> impl Strategy<Value = RouteRecord> {
    (
        "[a-zA-Z0-9]{8,32}",     // secret
        0i64..2_000_000_000,     // last modified
        "[a-z0-9-]{1,24}",       // slug
        1u32..200_000,           // ttl
    )
        .prop_map(|(secret, modified, slug, ttl_secs)| RouteRecord {
            identity: RouteIdentity {
                secret,
                last_modified_at: at(modified),
                owner_login: "owner".to_string(),
                owner_email: "owner@example.com".to_string(),
                slug,
                algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
            },
            config: RouteConfig { ttl_secs, ..RouteConfig::default() },
        })
}

fn arbitrary_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::String),
    ]
}

fn arbitrary_array() -> impl Strategy<Value = Value> {
    prop::collection::vec(arbitrary_leaf(), 0..6).prop_map(Value::Array)
}

fn arbitrary_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,8}", arbitrary_leaf(), 0..6)
        .prop_map(|entries| Value::Object(entries.into_iter().collect()))
}

#[test]
fn prop_pipeline_matches_direct_encryption_for_text() {
    proptest!(|(
        route in arbitrary_route(),
        message in "\\PC{0,64}",
        offset in 0i64..1_000_000,
        rng_seed in any::<u64>(),
    )| {
        let now = route.identity.last_modified_at + Duration::seconds(offset);
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(rng_seed);

        let output = PipelineEvaluator::new()
            .evaluate(&descriptor, &Value::String(message.clone()), now, &mut rng)
            .unwrap();
        let direct = encrypt_payload(&Value::String(message.clone()), &route.identity, &mut rng).unwrap();

        // PROPERTY: both paths open to the same message under the same key
        prop_assert_eq!(output.param, "payload");
        prop_assert_eq!(decrypt_payload(&output.value, &route.identity).unwrap(), Value::String(message.clone()));
        prop_assert_eq!(decrypt_payload(&direct, &route.identity).unwrap(), Value::String(message));
    });
}

#[test]
fn prop_pipeline_preserves_objects() {
    proptest!(|(route in arbitrary_route(), message in arbitrary_object(), rng_seed in any::<u64>())| {
        let route = RouteRecord {
            config: RouteConfig { message_format: MessageFormat::Object, ..route.config.clone() },
            ..route
        };
        let now = route.identity.last_modified_at;
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(rng_seed);

        let output = PipelineEvaluator::new().evaluate(&descriptor, &message, now, &mut rng).unwrap();

        // PROPERTY: structured messages survive the pipeline unchanged
        prop_assert_eq!(decrypt_payload(&output.value, &route.identity).unwrap(), message);
    });
}

#[test]
fn prop_pipeline_preserves_arrays() {
    proptest!(|(route in arbitrary_route(), message in arbitrary_array(), rng_seed in any::<u64>())| {
        let route = RouteRecord {
            config: RouteConfig { message_format: MessageFormat::Array, ..route.config.clone() },
            ..route
        };
        let now = route.identity.last_modified_at;
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(rng_seed);

        let output = PipelineEvaluator::new().evaluate(&descriptor, &message, now, &mut rng).unwrap();

        // PROPERTY: element order and values survive the pipeline
        prop_assert_eq!(decrypt_payload(&output.value, &route.identity).unwrap(), message);
    });
}

#[test]
fn prop_descriptor_survives_wire_roundtrip() {
    proptest!(|(route in arbitrary_route(), offset in 0i64..1_000_000)| {
        let now = route.identity.last_modified_at + Duration::seconds(offset);
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();

        let parsed = sealpipe_proto::PipelineDescriptor::from_json(&descriptor.to_json().unwrap()).unwrap();

        // PROPERTY: serving and re-parsing a descriptor is lossless
        prop_assert_eq!(parsed, descriptor);
    });
}

#[test]
fn prop_any_bit_flip_is_detected() {
    proptest!(|(route in arbitrary_route(), message in "[ -~]{1,32}", flip in any::<prop::sample::Index>())| {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let ciphertext = encrypt_payload(&Value::String(message), &route.identity, &mut rng).unwrap();

        let mut raw = codec::decode_transport(&ciphertext).unwrap();
        let bit = flip.index(raw.len() * 8);
        raw[bit / 8] ^= 1 << (bit % 8);
        let tampered = codec::encode_transport(&raw);

        // PROPERTY: a single flipped bit never opens
        let is_rejected = matches!(
            decrypt_payload(&tampered, &route.identity),
            Err(ProcedureError::DecryptionFailed { .. })
        );
        prop_assert!(is_rejected);
    });
}

#[test]
fn prop_non_whitelisted_names_never_run() {
    let registry = WhitelistRegistry::new();

    proptest!(|(name in "[a-z_][a-z0-9_]{0,24}", rng_seed in any::<u64>())| {
        prop_assume!(!registry.contains(&name));

        prop_assert_eq!(
            registry.resolve(&name).err(),
            Some(ProcedureError::UnknownOperation { name: name.clone() })
        );

        let route = RouteRecord::new(RouteIdentity {
            secret: "secret".to_string(),
            last_modified_at: at(1_704_067_200),
            owner_login: String::new(),
            owner_email: String::new(),
            slug: "route".to_string(),
            algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
        });
        let now = route.identity.last_modified_at;
        let mut descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
        let channel = descriptor.channel().unwrap().to_string();
        descriptor.steps.push(
            PipelineStep::new(channel, TargetSelector::input(SEAL_FUNCTION, 0), name.clone(), 15, 1).unwrap(),
        );

        let mut rng = ChaCha20Rng::seed_from_u64(rng_seed);
        let result = PipelineEvaluator::new().evaluate(&descriptor, &Value::String("m".to_string()), now, &mut rng);

        // PROPERTY: unknown operations fail closed without side effects
        prop_assert_eq!(result, Err(ProcedureError::UnknownOperation { name }));
        prop_assert_eq!(rng.next_u64(), ChaCha20Rng::seed_from_u64(rng_seed).next_u64());
    });
}

#[test]
fn prop_window_is_anchored() {
    proptest!(|(route in arbitrary_route(), offset in -1_000_000i64..10_000_000, later in 0i64..200_000)| {
        let now = route.identity.last_modified_at + Duration::seconds(offset);
        let window = ValidityWindow::containing(&route, now).unwrap();
        let ttl = i64::from(route.config.ttl_secs);

        // PROPERTY: the window contains now, has length ttl and sits on the
        // lastModified grid
        prop_assert!(window.start <= now && now < window.expires);
        prop_assert_eq!((window.expires - window.start).num_seconds(), ttl);
        prop_assert_eq!((window.expires - route.identity.last_modified_at).num_seconds().rem_euclid(ttl), 0);

        // PROPERTY: every instant inside the window maps to the same window
        let inside = window.start + Duration::seconds(later % ttl);
        prop_assert_eq!(ValidityWindow::containing(&route, inside).unwrap(), window);
    });
}

#[test]
fn prop_descriptor_expires_after_issue() {
    proptest!(|(route in arbitrary_route(), offset in -1_000_000i64..10_000_000)| {
        let now = route.identity.last_modified_at + Duration::seconds(offset);
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();

        // PROPERTY: issued <= now < expires
        prop_assert!(descriptor.issued_at <= now);
        prop_assert!(descriptor.expires_at > descriptor.issued_at);
        prop_assert!(!descriptor.is_expired(now));
    });
}

#[test]
fn prop_cache_never_serves_expired() {
    proptest!(|(route in arbitrary_route(), offset in 0i64..1_000_000, elapsed in 0i64..400_000)| {
        let now = route.identity.last_modified_at + Duration::seconds(offset);
        let descriptor = DescriptorBuilder::new().build(&route, now).unwrap();
        let key = CacheKey {
            route: descriptor.route.clone(),
            last_modified: route.identity.last_modified_at,
            expires: descriptor.expires_at,
        };

        let cache = MemoryDescriptorCache::new();
        cache.put(key.clone(), descriptor.clone());

        let lookup_at = now + Duration::seconds(elapsed);
        let hit = cache.get(&key, lookup_at);

        // PROPERTY: a hit is identical to the stored build and never expired
        if descriptor.is_expired(lookup_at) {
            prop_assert!(hit.is_none());
        } else {
            prop_assert_eq!(hit, Some(descriptor));
        }
    });
}
