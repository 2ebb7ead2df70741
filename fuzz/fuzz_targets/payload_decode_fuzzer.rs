//! Fuzz target for submitted payload decoding
//!
//! Submissions carry attacker-chosen text. Arbitrary input goes through the
//! transport decoder, the structured decoder and a full decrypt attempt.
//!
//! # Invariants
//!
//! - Decoding NEVER panics, including on deeply nested or oversized CBOR
//! - Arbitrary text never decrypts for a route

#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use sealpipe_core::{ProcedureError, SEALED_BOX_ALGORITHM, codec, decrypt_payload};
use sealpipe_crypto::RouteIdentity;

fuzz_target!(|data: &[u8]| {
    let _ = codec::decode_structured(data);
    let _ = codec::base64_decode(data);
    let _ = codec::raw_url_decode(data);

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = codec::decode_transport(text);

    let identity = RouteIdentity {
        secret: "fuzz-secret".to_string(),
        last_modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        owner_login: "fuzz".to_string(),
        owner_email: "fuzz@example.com".to_string(),
        slug: "fuzz".to_string(),
        algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
    };
    assert!(matches!(
        decrypt_payload(text, &identity),
        Err(ProcedureError::DecryptionFailed { .. })
    ));
});
