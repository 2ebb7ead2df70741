//! Pipeline descriptors and their JSON document form.
//!
//! A [`PipelineDescriptor`] is the typed view used by builders and
//! evaluators. [`DescriptorDocument`] is the exact JSON shape served to
//! clients:
//!
//! ```json
//! {
//!   "route": "my-route",
//!   "publickey": "<base64, unpadded>",
//!   "for": "encryption",
//!   "type": "sealedbox-x25519xsalsa20poly1305",
//!   "format": "base64",
//!   "issued": 1704067200,
//!   "expires": 1704070800,
//!   "method": "POST",
//!   "args": [{ "name": "email", "type": "string", "required": true }],
//!   "data": {
//!     "for": "procedural-value",
//!     "input": ["message", "publickey"],
//!     "output": "sodium_crypto_box_seal",
//!     "value": "payload",
//!     "format": "object",
//!     "filter": ["pv…[input:sodium_crypto_box_seal.0],serialize,10,1", "…"]
//!   }
//! }
//! ```
//!
//! # Invariants
//!
//! - `expires > issued`
//! - Every `filter` entry parses under the step grammar
//! - All steps share a single channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HttpMethod, MessageFormat, PipelineStep, ProtocolError, Result};

/// Value of the document's top-level `for` field.
pub const DOCUMENT_PURPOSE: &str = "encryption";

/// Value of the document's `format` field (public key encoding).
pub const PUBLIC_KEY_FORMAT: &str = "base64";

/// Value of the `data.for` field.
pub const DATA_PURPOSE: &str = "procedural-value";

/// Input source naming the caller's raw message.
pub const INPUT_MESSAGE: &str = "message";

/// Input source naming the descriptor's public key.
pub const INPUT_PUBLIC_KEY: &str = "publickey";

/// Extra named parameter a submission may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgumentSpec {
    /// Parameter name
    pub name: String,
    /// Declared shape
    #[serde(rename = "type")]
    pub kind: MessageFormat,
    /// Whether a submission must carry it
    #[serde(default)]
    pub required: bool,
}

/// Typed pipeline descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescriptor {
    /// Route id
    pub route: String,
    /// Encryption service name
    pub algorithm: String,
    /// Issue instant
    pub issued_at: DateTime<Utc>,
    /// First instant at which the descriptor is no longer valid
    pub expires_at: DateTime<Utc>,
    /// Route public key, base64 without padding
    pub public_key: String,
    /// Request parameter that receives the pipeline result
    pub message_param: String,
    /// Declared payload shape
    pub message_format: MessageFormat,
    /// HTTP method for submission
    pub method: HttpMethod,
    /// Extra submission parameters
    pub arguments: Vec<ArgumentSpec>,
    /// Seed sources of the invoked function's positional inputs
    pub inputs: Vec<String>,
    /// Canonical name of the invoked function
    pub invoke: String,
    /// Steps in insertion order
    pub steps: Vec<PipelineStep>,
}

impl PipelineDescriptor {
    /// Channel shared by all steps, if any.
    pub fn channel(&self) -> Option<&str> {
        self.steps.first().map(|step| step.channel.as_str())
    }

    /// True once `now` has reached `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.expires_at <= self.issued_at {
            return Err(ProtocolError::InvalidDescriptor(
                "expires must be later than issued".to_string(),
            ));
        }
        if self.inputs.is_empty() {
            return Err(ProtocolError::InvalidDescriptor("no pipeline inputs".to_string()));
        }
        if self.message_param.is_empty() {
            return Err(ProtocolError::InvalidDescriptor("empty message parameter".to_string()));
        }
        if self.invoke.is_empty() {
            return Err(ProtocolError::InvalidDescriptor("empty invoked function".to_string()));
        }

        if let Some(expected) = self.channel() {
            if let Some(other) = self.steps.iter().find(|step| step.channel != expected) {
                return Err(ProtocolError::ChannelMismatch {
                    expected: expected.to_string(),
                    found: other.channel.clone(),
                });
            }
        }

        Ok(())
    }

    /// Wire document for this descriptor.
    pub fn to_document(&self) -> DescriptorDocument {
        DescriptorDocument {
            route: self.route.clone(),
            publickey: self.public_key.clone(),
            purpose: DOCUMENT_PURPOSE.to_string(),
            algorithm: self.algorithm.clone(),
            format: PUBLIC_KEY_FORMAT.to_string(),
            issued: self.issued_at,
            expires: self.expires_at,
            method: self.method,
            args: self.arguments.clone(),
            data: DescriptorData {
                purpose: DATA_PURPOSE.to_string(),
                input: self.inputs.clone(),
                output: self.invoke.clone(),
                value: self.message_param.clone(),
                format: self.message_format,
                filter: self.steps.iter().map(ToString::to_string).collect(),
            },
        }
    }

    /// Parse and validate a wire document.
    pub fn from_document(document: DescriptorDocument) -> Result<Self> {
        expect_constant("for", &document.purpose, DOCUMENT_PURPOSE)?;
        expect_constant("format", &document.format, PUBLIC_KEY_FORMAT)?;
        expect_constant("data.for", &document.data.purpose, DATA_PURPOSE)?;

        let steps = document
            .data
            .filter
            .iter()
            .map(|entry| entry.parse::<PipelineStep>())
            .collect::<Result<Vec<_>>>()?;

        let descriptor = Self {
            route: document.route,
            algorithm: document.algorithm,
            issued_at: document.issued,
            expires_at: document.expires,
            public_key: document.publickey,
            message_param: document.data.value,
            message_format: document.data.format,
            method: document.method,
            arguments: document.args,
            inputs: document.data.input,
            invoke: document.data.output,
            steps,
        };
        descriptor.validate()?;

        Ok(descriptor)
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Parse from the JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: DescriptorDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }
}

fn expect_constant(field: &str, found: &str, expected: &str) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ProtocolError::InvalidDescriptor(format!(
            "field `{field}` must be \"{expected}\", found \"{found}\""
        )))
    }
}

/// JSON document served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorDocument {
    /// Route id
    pub route: String,
    /// Route public key, base64 without padding
    pub publickey: String,
    /// Always `"encryption"`
    #[serde(rename = "for")]
    pub purpose: String,
    /// Encryption service name
    #[serde(rename = "type")]
    pub algorithm: String,
    /// Always `"base64"`
    pub format: String,
    /// Issue instant (unix seconds)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued: DateTime<Utc>,
    /// Expiry instant (unix seconds)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires: DateTime<Utc>,
    /// Submission HTTP method
    pub method: HttpMethod,
    /// Extra submission parameters
    pub args: Vec<ArgumentSpec>,
    /// Pipeline section
    pub data: DescriptorData,
}

/// Pipeline section of a [`DescriptorDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorData {
    /// Always `"procedural-value"`
    #[serde(rename = "for")]
    pub purpose: String,
    /// Seed sources for the invoked function's positional inputs
    pub input: Vec<String>,
    /// Canonical name of the invoked function
    pub output: String,
    /// Request parameter receiving the result
    pub value: String,
    /// Declared payload shape
    #[serde(default)]
    pub format: MessageFormat,
    /// Encoded steps
    pub filter: Vec<String>,
}
