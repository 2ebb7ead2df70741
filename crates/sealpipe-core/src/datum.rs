//! Values flowing between pipeline steps.

use serde_json::Value;

use crate::{ProcedureError, Result};

/// A slot value: raw bytes or a structured value.
///
/// Text is carried as `Value::String` until an operation produces bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Opaque bytes (ciphertexts, decoded base64, digests)
    Bytes(Vec<u8>),
    /// Structured value (the raw message, decoded JSON)
    Value(Value),
}

impl Datum {
    /// Text datum.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Value(Value::String(text.into()))
    }

    /// Short name of the datum's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Value(value) => value_kind(value),
        }
    }

    /// Byte view for byte-oriented operations.
    ///
    /// Scalars coerce to their canonical text: numbers in JSON notation,
    /// booleans as `true`/`false`. Null, arrays and objects have no byte form.
    pub fn into_bytes(self, operation: &'static str) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Value(Value::String(text)) => Ok(text.into_bytes()),
            Self::Value(Value::Number(number)) => Ok(number.to_string().into_bytes()),
            Self::Value(Value::Bool(flag)) => Ok(flag.to_string().into_bytes()),
            Self::Value(other) => Err(ProcedureError::TypeMismatch {
                operation,
                expected: "bytes or scalar",
                found: value_kind(&other),
            }),
        }
    }

    /// Text view; bytes must be UTF-8.
    pub fn into_text(self, operation: &'static str) -> Result<String> {
        match self {
            Self::Value(Value::String(text)) => Ok(text),
            other => String::from_utf8(other.into_bytes(operation)?).map_err(|_| {
                ProcedureError::TypeMismatch { operation, expected: "utf-8 text", found: "bytes" }
            }),
        }
    }

    /// Structured view; UTF-8 bytes become a string value.
    pub fn into_value(self, operation: &'static str) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Bytes(bytes) => String::from_utf8(bytes).map(Value::String).map_err(|_| {
                ProcedureError::TypeMismatch { operation, expected: "utf-8 text", found: "bytes" }
            }),
        }
    }
}

/// Short name of a JSON value's kind.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
