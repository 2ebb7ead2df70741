//! Builds pipeline descriptors for routes.
//!
//! A descriptor is everything a remote client needs to reproduce
//! [`encrypt_payload`](crate::encrypt_payload) with nothing but the
//! whitelist: the route public key, the chain of steps around the sealing
//! function, the submission parameter and the validity window.
//!
//! ```text
//! message ─(serialize | json_encode)─┐
//!                                    ├─ sodium_crypto_box_seal ─ base64_encode ─ rawurlencode ─▶ param
//! publickey ─ rawurldecode ─ base64_decode ─┘
//! ```
//!
//! # Validity windows
//!
//! Windows are anchored to the route's last-modified time, not to the
//! request: with `k = floor((now - lastModified) / ttl) + 1` the descriptor
//! expires at `lastModified + k * ttl`. Two requests inside one window see
//! the same expiry, and editing the route (which rotates its keys) starts a
//! new window series.

use chrono::{DateTime, Utc};
use sealpipe_crypto::get_public_key;
use sealpipe_proto::{
    INPUT_MESSAGE, INPUT_PUBLIC_KEY, MessageFormat, PipelineDescriptor, PipelineStep,
    TargetSelector,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    ProcedureError, Result, codec,
    registry::{SEAL_FUNCTION, WhitelistRegistry},
    route::{IssuanceMode, RouteRecord},
    service::ServiceRegistry,
};

/// Priority of the first step of each chain.
const FIRST: i32 = 10;

/// Priority of the second step of each chain.
const SECOND: i32 = 20;

/// Channel prefix.
const CHANNEL_PREFIX: &str = "pv";

/// Current validity window of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidityWindow {
    /// Window start (`expires - ttl`)
    pub start: DateTime<Utc>,
    /// Window end, exclusive
    pub expires: DateTime<Utc>,
}

impl ValidityWindow {
    /// Window of `route` containing `now`.
    pub fn containing(route: &RouteRecord, now: DateTime<Utc>) -> Result<Self> {
        let ttl = i64::from(route.config.ttl_secs);
        if ttl == 0 {
            return Err(ProcedureError::InvalidRouteConfig("ttl must be positive".to_string()));
        }

        let anchor = route.identity.last_modified_at.timestamp();
        let k = (now.timestamp() - anchor).div_euclid(ttl) + 1;
        let out_of_range = || ProcedureError::InvalidRouteConfig("validity window out of range".to_string());

        let expires = k.checked_mul(ttl).and_then(|span| anchor.checked_add(span)).ok_or_else(out_of_range)?;
        let start = DateTime::from_timestamp(expires - ttl, 0).ok_or_else(out_of_range)?;
        let expires = DateTime::from_timestamp(expires, 0).ok_or_else(out_of_range)?;

        Ok(Self { start, expires })
    }
}

/// Channel name for a route and issue instant.
///
/// `pv` followed by the first 16 hex digits of
/// `SHA-256(route ‖ 0x00 ‖ issued unix seconds, big endian)`.
pub fn channel_for(route_id: &str, issued_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(route_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(issued_at.timestamp().to_be_bytes());

    let digest = hex::encode(hasher.finalize());
    format!("{CHANNEL_PREFIX}{}", &digest[..16])
}

/// Builds descriptors for sealed-box routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorBuilder {
    registry: WhitelistRegistry,
}

impl DescriptorBuilder {
    /// Builder using the standard whitelist.
    pub fn new() -> Self {
        Self { registry: WhitelistRegistry::new() }
    }

    /// Build the descriptor of `route` as observed at `now`.
    ///
    /// # Errors
    ///
    /// - `KeyDerivationUnavailable`: identity lacks secret, slug or algorithm
    /// - `UnsupportedAlgorithm`: no registered service handles the route
    /// - `InvalidRouteConfig`: zero TTL, bad parameter names
    pub fn build(&self, route: &RouteRecord, now: DateTime<Utc>) -> Result<PipelineDescriptor> {
        let config = &route.config;
        config.validate()?;

        let public = get_public_key(&route.identity)?;
        ServiceRegistry::builtin().get(&route.identity.algorithm_name)?;

        let window = ValidityWindow::containing(route, now)?;
        let issued_at = match config.issuance {
            IssuanceMode::Instant => DateTime::from_timestamp(now.timestamp(), 0)
                .ok_or_else(|| ProcedureError::InvalidRouteConfig("time out of range".to_string()))?,
            IssuanceMode::WindowAligned => window.start,
        };

        let channel = channel_for(route.id(), issued_at);
        let steps = self.steps(&channel, config.message_format)?;

        let descriptor = PipelineDescriptor {
            route: route.id().to_string(),
            algorithm: route.identity.algorithm_name.clone(),
            issued_at,
            expires_at: window.expires,
            public_key: codec::base64_encode_unpadded(public.as_bytes()),
            message_param: config.message_param.clone(),
            message_format: config.message_format,
            method: config.method,
            arguments: config.args.clone(),
            inputs: vec![INPUT_MESSAGE.to_string(), INPUT_PUBLIC_KEY.to_string()],
            invoke: SEAL_FUNCTION.to_string(),
            steps,
        };
        descriptor.validate()?;

        debug!(
            route = route.id(),
            issued = issued_at.timestamp(),
            expires = window.expires.timestamp(),
            "built descriptor"
        );
        Ok(descriptor)
    }

    fn steps(&self, channel: &str, format: MessageFormat) -> Result<Vec<PipelineStep>> {
        let message = TargetSelector::input(SEAL_FUNCTION, 0);
        let key = TargetSelector::input(SEAL_FUNCTION, 1);
        let output = TargetSelector::output(SEAL_FUNCTION, 0);

        let mut plan = Vec::with_capacity(5);
        if format.is_structured() {
            plan.push((message, "serialize", FIRST));
        } else if format == MessageFormat::Json {
            plan.push((message, "json_encode", FIRST));
        }
        plan.extend([
            (key.clone(), "rawurldecode", FIRST),
            (key, "base64_decode", SECOND),
            (output.clone(), "base64_encode", FIRST),
            (output, "rawurlencode", SECOND),
        ]);

        plan.into_iter()
            .map(|(target, operation, priority)| {
                let arity = self.registry.resolve(operation)?.arity();
                Ok(PipelineStep::new(channel, target, operation, priority, arity as u8)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use sealpipe_crypto::RouteIdentity;

    use super::*;
    use crate::{route::RouteConfig, service::SEALED_BOX_ALGORITHM};

    fn lm() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn route(config: RouteConfig) -> RouteRecord {
        RouteRecord {
            identity: RouteIdentity {
                secret: "s3cr3t-32-chars".to_string(),
                last_modified_at: lm(),
                owner_login: "admin".to_string(),
                owner_email: "a@b.com".to_string(),
                slug: "my-route".to_string(),
                algorithm_name: SEALED_BOX_ALGORITHM.to_string(),
            },
            config,
        }
    }

    fn operations(descriptor: &PipelineDescriptor) -> Vec<&str> {
        descriptor.steps.iter().map(|step| step.operation.as_str()).collect()
    }

    #[test]
    fn window_is_anchored_to_last_modified() {
        let route = route(RouteConfig::default());

        let now = lm() + Duration::seconds(5_000);
        let window = ValidityWindow::containing(&route, now).unwrap();
        assert_eq!(window.expires, lm() + Duration::seconds(7_200));
        assert_eq!(window.start, lm() + Duration::seconds(3_600));

        let boundary = ValidityWindow::containing(&route, lm() + Duration::seconds(3_600)).unwrap();
        assert_eq!(boundary.expires, lm() + Duration::seconds(7_200));
    }

    #[test]
    fn window_handles_clock_behind_last_modified() {
        let route = route(RouteConfig::default());
        let now = lm() - Duration::seconds(10);

        let window = ValidityWindow::containing(&route, now).unwrap();
        assert_eq!(window.expires, lm());
        assert!(window.expires > now);
    }

    #[test]
    fn raw_route_has_no_message_step() {
        let descriptor = DescriptorBuilder::new().build(&route(RouteConfig::default()), lm()).unwrap();

        assert_eq!(
            operations(&descriptor),
            ["rawurldecode", "base64_decode", "base64_encode", "rawurlencode"]
        );
        assert_eq!(descriptor.invoke, SEAL_FUNCTION);
        assert_eq!(descriptor.inputs, [INPUT_MESSAGE, INPUT_PUBLIC_KEY]);
        assert_eq!(descriptor.public_key.len(), 43, "32 bytes, unpadded base64");
    }

    #[test]
    fn structured_and_json_formats_add_a_message_step() {
        let object = RouteConfig { message_format: MessageFormat::Object, ..RouteConfig::default() };
        let descriptor = DescriptorBuilder::new().build(&route(object), lm()).unwrap();
        assert_eq!(descriptor.steps[0].to_string().split(',').nth(1), Some("serialize"));
        assert_eq!(descriptor.steps[0].target, TargetSelector::input(SEAL_FUNCTION, 0));

        let json = RouteConfig { message_format: MessageFormat::Json, ..RouteConfig::default() };
        let descriptor = DescriptorBuilder::new().build(&route(json), lm()).unwrap();
        assert_eq!(operations(&descriptor)[0], "json_encode");
    }

    #[test]
    fn every_step_is_whitelisted_and_shares_a_channel() {
        let registry = WhitelistRegistry::new();
        for format in MessageFormat::ALL {
            let config = RouteConfig { message_format: format, ..RouteConfig::default() };
            let descriptor = DescriptorBuilder::new().build(&route(config), lm()).unwrap();

            let channel = channel_for("my-route", descriptor.issued_at);
            for step in &descriptor.steps {
                assert!(registry.contains(&step.operation));
                assert_eq!(step.channel, channel);
            }
        }
    }

    #[test]
    fn issuance_modes() {
        let now = lm() + Duration::seconds(4_000);

        let instant = DescriptorBuilder::new().build(&route(RouteConfig::default()), now).unwrap();
        assert_eq!(instant.issued_at, now);
        assert_eq!(instant.expires_at, lm() + Duration::seconds(7_200));

        let aligned = RouteConfig { issuance: IssuanceMode::WindowAligned, ..RouteConfig::default() };
        let first = DescriptorBuilder::new().build(&route(aligned.clone()), now).unwrap();
        let second =
            DescriptorBuilder::new().build(&route(aligned), now + Duration::seconds(100)).unwrap();
        assert_eq!(first.issued_at, lm() + Duration::seconds(3_600));
        assert_eq!(first, second);
    }

    #[test]
    fn issued_is_truncated_to_seconds() {
        let now = lm() + Duration::milliseconds(1_500);
        let descriptor = DescriptorBuilder::new().build(&route(RouteConfig::default()), now).unwrap();
        assert_eq!(descriptor.issued_at, lm() + Duration::seconds(1));

        let parsed = PipelineDescriptor::from_json(&descriptor.to_json().unwrap()).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn channel_differs_per_route_and_instant() {
        let a = channel_for("my-route", lm());
        assert!(a.starts_with("pv"));
        assert_eq!(a.len(), 18);
        assert_ne!(a, channel_for("other-route", lm()));
        assert_ne!(a, channel_for("my-route", lm() + Duration::seconds(1)));
    }

    #[test]
    fn rejects_incomplete_identity_and_foreign_algorithm() {
        let mut incomplete = route(RouteConfig::default());
        incomplete.identity.secret.clear();
        assert_eq!(
            DescriptorBuilder::new().build(&incomplete, lm()),
            Err(ProcedureError::KeyDerivationUnavailable { missing: "secret" })
        );

        let mut foreign = route(RouteConfig::default());
        foreign.identity.algorithm_name = "aes-gcm".to_string();
        assert_eq!(
            DescriptorBuilder::new().build(&foreign, lm()),
            Err(ProcedureError::UnsupportedAlgorithm { name: "aes-gcm".to_string() })
        );
    }
}
