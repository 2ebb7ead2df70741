//! Route records and their descriptor configuration.

use sealpipe_crypto::RouteIdentity;
use sealpipe_proto::{ArgumentSpec, HttpMethod, MessageFormat, step::is_ident};
use serde::{Deserialize, Serialize};

use crate::{ProcedureError, Result};

/// Default descriptor lifetime in seconds.
pub const DEFAULT_TTL_SECS: u32 = 3600;

/// Default name of the parameter that receives the encrypted message.
pub const DEFAULT_MESSAGE_PARAM: &str = "payload";

/// How a descriptor's `issued` timestamp is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssuanceMode {
    /// `issued` is the request time
    #[default]
    Instant,
    /// `issued` is the start of the current validity window, so every
    /// descriptor built within one window is identical
    WindowAligned,
}

/// Descriptor settings of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RouteConfig {
    /// Submission HTTP method
    pub method: HttpMethod,
    /// Parameter receiving the encrypted message
    pub message_param: String,
    /// Declared shape of the message
    pub message_format: MessageFormat,
    /// Extra submission parameters
    pub args: Vec<ArgumentSpec>,
    /// Validity window length in seconds
    pub ttl_secs: u32,
    /// `issued` policy
    pub issuance: IssuanceMode,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            method: HttpMethod::default(),
            message_param: DEFAULT_MESSAGE_PARAM.to_string(),
            message_format: MessageFormat::default(),
            args: Vec::new(),
            ttl_secs: DEFAULT_TTL_SECS,
            issuance: IssuanceMode::default(),
        }
    }
}

impl RouteConfig {
    /// Check that the config can produce a valid descriptor.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ProcedureError::InvalidRouteConfig("ttl must be positive".to_string()));
        }
        if !is_ident(&self.message_param) {
            return Err(ProcedureError::InvalidRouteConfig(format!(
                "message parameter `{}` is not an identifier",
                self.message_param
            )));
        }

        for (i, arg) in self.args.iter().enumerate() {
            if !is_ident(&arg.name) || arg.name == self.message_param {
                return Err(ProcedureError::InvalidRouteConfig(format!(
                    "argument `{}` is not a distinct identifier",
                    arg.name
                )));
            }
            if self.args[..i].iter().any(|earlier| earlier.name == arg.name) {
                return Err(ProcedureError::InvalidRouteConfig(format!(
                    "argument `{}` declared twice",
                    arg.name
                )));
            }
        }

        Ok(())
    }
}

/// A route as stored: identity plus descriptor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    /// Key derivation inputs
    pub identity: RouteIdentity,
    /// Descriptor settings
    #[serde(default)]
    pub config: RouteConfig,
}

impl RouteRecord {
    /// Route with default settings.
    pub fn new(identity: RouteIdentity) -> Self {
        Self { identity, config: RouteConfig::default() }
    }

    /// Route id (the slug).
    pub fn id(&self) -> &str {
        &self.identity.slug
    }
}
