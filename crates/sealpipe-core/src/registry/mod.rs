//! The closed set of operations a descriptor may name.
//!
//! Descriptors are data supplied by the server and evaluated by clients (and
//! re-evaluated by tests). The whitelist is the only path from an operation
//! name to executable behavior, so a descriptor can never reach anything
//! outside it.
//!
//! # Invariants
//!
//! - Every whitelisted name resolves to exactly one implementation
//! - Substitute implementation names are not themselves resolvable
//! - The set is versioned: adding or removing a name bumps
//!   [`REGISTRY_VERSION`]

mod printf;

use rand::{CryptoRng, RngCore};
use sealpipe_crypto::public_key_from_bytes;
use sha2::{Digest, Sha256};

use crate::{Datum, ProcedureError, Result, codec};

/// Version of the whitelist.
pub const REGISTRY_VERSION: u32 = 1;

/// Canonical name of the sealing function every built descriptor invokes.
pub const SEAL_FUNCTION: &str = "sodium_crypto_box_seal";

/// Canonical operation names, in registry order.
const WHITELIST: [&str; 12] = [
    "sha256",
    "sprintf",
    "vsprintf",
    "serialize",
    "unserialize",
    "base64_encode",
    "base64_decode",
    "json_encode",
    "json_decode",
    "rawurlencode",
    "rawurldecode",
    SEAL_FUNCTION,
];

/// Canonical names executed through a substitute implementation.
const ALTERNATES: [(&str, &str); 2] =
    [("serialize", "structured_encode"), ("unserialize", "structured_decode")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Primitive {
    Sha256,
    Sprintf,
    Vsprintf,
    StructuredEncode,
    StructuredDecode,
    Base64Encode,
    Base64Decode,
    JsonEncode,
    JsonDecode,
    RawUrlEncode,
    RawUrlDecode,
    CryptoBoxSeal,
}

impl Primitive {
    /// Implementation lookup by implementation name.
    fn by_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "sha256" => Self::Sha256,
            "sprintf" => Self::Sprintf,
            "vsprintf" => Self::Vsprintf,
            "structured_encode" => Self::StructuredEncode,
            "structured_decode" => Self::StructuredDecode,
            "base64_encode" => Self::Base64Encode,
            "base64_decode" => Self::Base64Decode,
            "json_encode" => Self::JsonEncode,
            "json_decode" => Self::JsonDecode,
            "rawurlencode" => Self::RawUrlEncode,
            "rawurldecode" => Self::RawUrlDecode,
            SEAL_FUNCTION => Self::CryptoBoxSeal,
            _ => return None,
        };
        Some(primitive)
    }

    fn arity(self) -> usize {
        match self {
            Self::Sprintf | Self::Vsprintf | Self::CryptoBoxSeal => 2,
            _ => 1,
        }
    }
}

/// A resolved, executable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    name: &'static str,
    primitive: Primitive,
}

impl Operation {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of positional arguments.
    pub fn arity(&self) -> usize {
        self.primitive.arity()
    }

    /// Apply the operation.
    ///
    /// `rng` is only drawn from by the sealing function.
    pub fn apply<R: RngCore + CryptoRng>(&self, args: Vec<Datum>, rng: &mut R) -> Result<Datum> {
        let op = self.name;

        match self.primitive {
            Primitive::Sha256 => {
                let [input] = take(op, args)?;
                Ok(Datum::text(hex::encode(Sha256::digest(input.into_bytes(op)?))))
            },
            Primitive::Sprintf => {
                let [template, arg] = take(op, args)?;
                let rendered = printf::render(op, &template.into_text(op)?, &[arg.into_value(op)?])?;
                Ok(Datum::text(rendered))
            },
            Primitive::Vsprintf => {
                let [template, list] = take(op, args)?;
                let serde_json::Value::Array(values) = list.into_value(op)? else {
                    return Err(ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "array of arguments",
                        found: "non-array",
                    });
                };
                Ok(Datum::text(printf::render(op, &template.into_text(op)?, &values)?))
            },
            Primitive::StructuredEncode => {
                let [input] = take(op, args)?;
                let value = input.into_value(op)?;
                codec::encode_structured(&value).map(Datum::Bytes).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "encodable value",
                        found: crate::datum::value_kind(&value),
                    }
                })
            },
            Primitive::StructuredDecode => {
                let [input] = take(op, args)?;
                codec::decode_structured(&input.into_bytes(op)?).map(Datum::Value).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "structured plaintext",
                        found: "bytes",
                    }
                })
            },
            Primitive::Base64Encode => {
                let [input] = take(op, args)?;
                Ok(Datum::text(codec::base64_encode(&input.into_bytes(op)?)))
            },
            Primitive::Base64Decode => {
                let [input] = take(op, args)?;
                codec::base64_decode(&input.into_bytes(op)?).map(Datum::Bytes).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "base64 text",
                        found: "malformed base64",
                    }
                })
            },
            Primitive::JsonEncode => {
                let [input] = take(op, args)?;
                let json = serde_json::to_string(&input.into_value(op)?).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "json value",
                        found: "unserializable value",
                    }
                })?;
                Ok(Datum::text(json))
            },
            Primitive::JsonDecode => {
                let [input] = take(op, args)?;
                serde_json::from_str(&input.into_text(op)?).map(Datum::Value).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "json text",
                        found: "malformed json",
                    }
                })
            },
            Primitive::RawUrlEncode => {
                let [input] = take(op, args)?;
                Ok(Datum::text(codec::raw_url_encode(&input.into_bytes(op)?)))
            },
            Primitive::RawUrlDecode => {
                let [input] = take(op, args)?;
                Ok(Datum::Bytes(codec::raw_url_decode(&input.into_bytes(op)?)))
            },
            Primitive::CryptoBoxSeal => {
                let [message, key] = take(op, args)?;
                let key = public_key_from_bytes(&key.into_bytes(op)?).map_err(|_| {
                    ProcedureError::TypeMismatch {
                        operation: op,
                        expected: "32-byte public key",
                        found: "key of other length",
                    }
                })?;
                let sealed = sealpipe_crypto::seal(&message.into_bytes(op)?, &key, rng)?;
                Ok(Datum::Bytes(sealed))
            },
        }
    }
}

fn take<const N: usize>(operation: &'static str, args: Vec<Datum>) -> Result<[Datum; N]> {
    let got = args.len();
    <[Datum; N]>::try_from(args).map_err(|_| ProcedureError::ArityMismatch {
        operation,
        expected: N,
        got,
    })
}

/// Resolves operation names against the whitelist.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitelistRegistry;

impl WhitelistRegistry {
    /// The registry.
    pub fn new() -> Self {
        Self
    }

    /// Whitelist version.
    pub fn version(&self) -> u32 {
        REGISTRY_VERSION
    }

    /// Canonical names, in registry order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        WHITELIST.into_iter()
    }

    /// True if `name` is a canonical whitelisted name.
    pub fn contains(&self, name: &str) -> bool {
        WHITELIST.contains(&name)
    }

    /// Substitute implementation name for a canonical name, if it has one.
    pub fn alternate_for(&self, name: &str) -> Option<&'static str> {
        ALTERNATES.iter().find(|(canonical, _)| *canonical == name).map(|(_, alternate)| *alternate)
    }

    /// Resolve a canonical name to its implementation.
    pub fn resolve(&self, name: &str) -> Result<Operation> {
        let unknown = || ProcedureError::UnknownOperation { name: name.to_string() };

        let canonical = WHITELIST.into_iter().find(|candidate| *candidate == name).ok_or_else(unknown)?;
        let implementation = self.alternate_for(canonical).unwrap_or(canonical);
        let primitive = Primitive::by_name(implementation).ok_or_else(unknown)?;

        Ok(Operation { name: canonical, primitive })
    }
}
