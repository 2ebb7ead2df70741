//! Byte-level encodings shared by the cipher and the whitelisted operations.
//!
//! Two layers:
//!
//! - Structured codec: turns a payload value into plaintext bytes. Strings
//!   pass through as their UTF-8 bytes; every other value is CBOR prefixed
//!   with the self-describe tag `d9 d9 f7`. `0xd9` can never start valid
//!   UTF-8, so decoding is unambiguous.
//! - Transport encoding: base64 (standard alphabet, padded) followed by
//!   RFC 3986 percent-encoding, so ciphertexts survive query strings and
//!   form bodies untouched.

use base64::{
    Engine as _, alphabet,
    engine::{
        DecodePaddingMode,
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, STANDARD_NO_PAD},
    },
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode};
use serde_json::Value;
use thiserror::Error;

/// CBOR self-describe tag marking structured plaintext.
pub const STRUCTURED_TAG: [u8; 3] = [0xd9, 0xd9, 0xf7];

/// Everything except RFC 3986 unreserved characters.
const RAW_URL: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Standard alphabet, accepts input with or without padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// CBOR encoding or decoding failed.
    #[error("cbor: {0}")]
    Cbor(String),

    /// Untagged plaintext is not UTF-8.
    #[error("plaintext is neither tagged nor utf-8")]
    Utf8,

    /// Invalid base64.
    #[error("base64: {0}")]
    Base64(String),
}

/// Encode a value as plaintext bytes.
pub fn encode_structured(value: &Value) -> Result<Vec<u8>, CodecError> {
    if let Value::String(text) = value {
        return Ok(text.as_bytes().to_vec());
    }

    let mut out = STRUCTURED_TAG.to_vec();
    ciborium::into_writer(value, &mut out).map_err(|e| CodecError::Cbor(e.to_string()))?;
    Ok(out)
}

/// Decode plaintext bytes produced by [`encode_structured`].
pub fn decode_structured(bytes: &[u8]) -> Result<Value, CodecError> {
    match bytes.strip_prefix(STRUCTURED_TAG.as_slice()) {
        Some(body) => ciborium::from_reader(body).map_err(|e| CodecError::Cbor(e.to_string())),
        None => std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|_| CodecError::Utf8),
    }
}

/// Padded standard base64.
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Unpadded standard base64 (descriptor public keys).
pub fn base64_encode_unpadded(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Standard base64, padding optional.
pub fn base64_decode(text: &[u8]) -> Result<Vec<u8>, CodecError> {
    LENIENT.decode(text).map_err(|e| CodecError::Base64(e.to_string()))
}

/// RFC 3986 percent-encoding of arbitrary bytes.
pub fn raw_url_encode(bytes: &[u8]) -> String {
    percent_encoding::percent_encode(bytes, RAW_URL).to_string()
}

/// Inverse of [`raw_url_encode`]. Malformed escapes pass through verbatim.
pub fn raw_url_decode(text: &[u8]) -> Vec<u8> {
    percent_decode(text).collect()
}

/// Transport form of a ciphertext.
pub fn encode_transport(ciphertext: &[u8]) -> String {
    raw_url_encode(base64_encode(ciphertext).as_bytes())
}

/// Ciphertext bytes from their transport form.
pub fn decode_transport(text: &str) -> Result<Vec<u8>, CodecError> {
    base64_decode(&raw_url_decode(text.as_bytes()))
}
