//! Message format tags and HTTP methods.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Declared shape of a route's payload (or of a declared argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Anything; never validated
    #[default]
    Raw,
    /// Text
    String,
    /// Boolean
    Boolean,
    /// Integral number
    Integer,
    /// Any finite number
    Number,
    /// Sequence
    Array,
    /// Map
    Object,
    /// Comma separated values
    Csv,
    /// JSON text
    Json,
    /// Absolute http(s) URL
    Url,
    /// Well-formed XML document
    Xml,
}

impl MessageFormat {
    /// All format tags, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Raw,
        Self::String,
        Self::Boolean,
        Self::Integer,
        Self::Number,
        Self::Array,
        Self::Object,
        Self::Csv,
        Self::Json,
        Self::Url,
        Self::Xml,
    ];

    /// Wire tag of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Array => "array",
            Self::Object => "object",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Url => "url",
            Self::Xml => "xml",
        }
    }

    /// True for formats whose messages are structured values (not text).
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownFormat(s.to_string()))
    }
}

/// HTTP method a client must use to submit the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    #[default]
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ProtocolError::UnknownMethod(s.to_string())),
        }
    }
}
