//! Provider configuration.
//!
//! The provider block carries the API key and either a Coralogix environment
//! name or an explicit domain. Each falls back to an environment variable when
//! left out of configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::types::TfValue;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "CORALOGIX_API_KEY";
/// Environment variable holding the Coralogix environment name.
pub const ENV_ENV: &str = "CORALOGIX_ENV";
/// Environment variable holding the Coralogix domain.
pub const ENV_DOMAIN: &str = "CORALOGIX_DOMAIN";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Coralogix environments and the domain each one is served from.
///
/// Several environments have a legacy alias.
const ENVIRONMENTS: &[(&[&str], &str)] = &[
    (&["EU1", "EUROPE"], "coralogix.com"),
    (&["EU2", "EUROPE2"], "eu2.coralogix.com"),
    (&["US1", "USA"], "coralogix.us"),
    (&["US2"], "cx498.coralogix.com"),
    (&["AP1", "INDIA"], "coralogix.in"),
    (&["AP2", "SINGAPORE"], "coralogixsg.com"),
    (&["AP3"], "ap3.coralogix.com"),
];

/// The provider block as it arrives from the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfigModel {
    /// API key used for every request.
    pub api_key: TfValue<String>,
    /// Coralogix environment, e.g. `EU1`.
    pub env: TfValue<String>,
    /// Coralogix domain, e.g. `coralogix.com`.
    pub domain: TfValue<String>,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: TfValue<i64>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: TfValue<i64>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// API key used for every request.
    pub api_key: String,
    /// Domain the management API is served from.
    pub domain: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve configuration, falling back to the process environment.
    pub fn resolve(model: &ProviderConfigModel) -> Result<Self, ProviderError> {
        Self::resolve_with(model, |name| std::env::var(name).ok())
    }

    /// Resolve configuration with a custom environment lookup.
    pub fn resolve_with(
        model: &ProviderConfigModel,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let pick = |value: &TfValue<String>, var: &str| {
            value
                .as_known()
                .cloned()
                .or_else(|| lookup(var))
                .filter(|v| !v.is_empty())
        };

        let api_key = pick(&model.api_key, ENV_API_KEY).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "api_key must be set in the provider block or through {}",
                ENV_API_KEY
            ))
        })?;

        let env = pick(&model.env, ENV_ENV);
        let domain = pick(&model.domain, ENV_DOMAIN);
        let domain = match (env, domain) {
            (Some(env), None) => domain_for_env(&env)?.to_string(),
            (None, Some(domain)) => domain,
            (Some(_), Some(_)) => {
                return Err(ProviderError::Configuration(format!(
                    "only one of env ({}) or domain ({}) may be set",
                    ENV_ENV, ENV_DOMAIN
                )))
            },
            (None, None) => {
                return Err(ProviderError::Configuration(format!(
                    "one of env ({}) or domain ({}) must be set",
                    ENV_ENV, ENV_DOMAIN
                )))
            },
        };

        let timeout = |value: &TfValue<i64>, default: u64, name: &str| match value {
            TfValue::Known(secs) if *secs <= 0 => Err(ProviderError::Configuration(format!(
                "{} must be positive, got {}",
                name, secs
            ))),
            TfValue::Known(secs) => Ok(Duration::from_secs(*secs as u64)),
            _ => Ok(Duration::from_secs(default)),
        };

        Ok(Self {
            api_key,
            domain,
            connect_timeout: timeout(
                &model.connect_timeout_secs,
                DEFAULT_CONNECT_TIMEOUT_SECS,
                "connect_timeout_secs",
            )?,
            request_timeout: timeout(
                &model.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT_SECS,
                "request_timeout_secs",
            )?,
        })
    }

    /// The management API endpoint for this domain.
    pub fn endpoint(&self) -> String {
        format!("https://ng-api-grpc.{}:443", self.domain)
    }
}

/// Look up the domain for an environment name or alias (case-insensitive).
pub fn domain_for_env(env: &str) -> Result<&'static str, ProviderError> {
    let wanted = env.to_ascii_uppercase();
    ENVIRONMENTS
        .iter()
        .find(|(names, _)| names.contains(&wanted.as_str()))
        .map(|(_, domain)| *domain)
        .ok_or_else(|| {
            ProviderError::Configuration(format!(
                "unknown env \"{}\", expected one of [{}]",
                env,
                env_names().join(", ")
            ))
        })
}

fn env_names() -> Vec<&'static str> {
    ENVIRONMENTS
        .iter()
        .flat_map(|(names, _)| names.iter().copied())
        .collect()
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix provider configuration.")
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!(
                    "API key for the Coralogix management API. Falls back to {}.",
                    ENV_API_KEY
                )),
        )
        .with_attribute(
            "env",
            Attribute::optional_string()
                .with_validator(Validator::one_of(
                    env_names()
                        .into_iter()
                        .flat_map(|n| [n.to_string(), n.to_ascii_lowercase()]),
                ))
                .with_description(format!(
                    "Coralogix environment. Conflicts with domain. Falls back to {}.",
                    ENV_ENV
                )),
        )
        .with_attribute(
            "domain",
            Attribute::optional_string().with_description(format!(
                "Coralogix domain. Conflicts with env. Falls back to {}.",
                ENV_DOMAIN
            )),
        )
        .with_attribute(
            "connect_timeout_secs",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_CONNECT_TIMEOUT_SECS))
                .with_description("Connection timeout in seconds."),
        )
        .with_attribute(
            "request_timeout_secs",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_REQUEST_TIMEOUT_SECS))
                .with_description("Per-request timeout in seconds."),
        )
}
