//! Opening submitted payloads.
//!
//! A submission is the request a client sends after evaluating a
//! descriptor: the encrypted message under the route's message parameter
//! plus any declared arguments. Only declared arguments are forwarded.

use serde_json::{Map, Value};

use crate::{
    ProcedureError, Result, TypeValidator, datum::value_kind, route::RouteRecord,
    service::ServiceRegistry,
};

/// A decrypted, validated submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedPayload {
    /// Route id
    pub route: String,
    /// Decrypted message
    pub payload: Value,
    /// Declared arguments that were present
    pub args: Map<String, Value>,
}

/// Downstream consumer of accepted payloads.
pub trait PayloadHandler {
    /// Handler result.
    type Output;

    /// Handler failure.
    type Error: std::error::Error;

    /// Act on an accepted payload.
    fn handle(&self, accepted: AcceptedPayload) -> std::result::Result<Self::Output, Self::Error>;
}

/// Check, decrypt and validate a submission for `route`.
///
/// # Errors
///
/// - `MissingParameter`: message or a required argument is absent
/// - `PayloadTypeMismatch`: the message is not a string, or a value does not
///   match its declared format
/// - `UnsupportedAlgorithm`: the route names an unregistered service
/// - `DecryptionFailed`, `KeyDerivationUnavailable`: from decryption
pub fn open_submission(
    route: &RouteRecord,
    services: &ServiceRegistry,
    params: &Map<String, Value>,
) -> Result<AcceptedPayload> {
    let config = &route.config;

    let ciphertext = match params.get(&config.message_param) {
        None | Some(Value::Null) => {
            return Err(ProcedureError::MissingParameter { name: config.message_param.clone() });
        },
        Some(Value::String(ciphertext)) => ciphertext,
        Some(other) => {
            return Err(ProcedureError::PayloadTypeMismatch {
                field: config.message_param.clone(),
                expected: sealpipe_proto::MessageFormat::String,
                found: value_kind(other),
            });
        },
    };

    let mut args = Map::new();
    for spec in &config.args {
        match params.get(&spec.name) {
            None | Some(Value::Null) if spec.required => {
                return Err(ProcedureError::MissingParameter { name: spec.name.clone() });
            },
            None | Some(Value::Null) => {},
            Some(value) => {
                TypeValidator::validate(&spec.name, value, spec.kind)?;
                args.insert(spec.name.clone(), value.clone());
            },
        }
    }

    let service = services.get(&route.identity.algorithm_name)?;
    let payload = service.decrypt(ciphertext, &route.identity)?;
    TypeValidator::validate(&config.message_param, &payload, config.message_format)?;

    Ok(AcceptedPayload { route: route.id().to_string(), payload, args })
}
