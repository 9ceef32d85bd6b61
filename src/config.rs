//! Configuration types and payload decoding for the rewrite filter.

use serde::{Deserialize, Serialize};

/// Declarative form of a rewrite rule.
///
/// The host hands the filter an opaque byte payload at startup; decoding it
/// yields this pair, which [`RewriteRule::compile`] turns into the runtime
/// form exactly once per instance lifetime.
///
/// [`RewriteRule::compile`]: crate::rewrite::RewriteRule::compile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Regular expression matched against the request path, e.g.
    /// `banana/([0-9]*)`.
    pub pattern: String,
    /// Replacement text applied to every occurrence; `$1`, `$2`, ...
    /// reference capture groups, e.g. `status/$1`.
    pub replacement: String,
}

impl RewriteConfig {
    /// Decode a JSON payload.
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::EmptyPayload);
        }
        Ok(serde_json::from_slice(raw)?)
    }

    /// Decode a YAML payload.
    pub fn from_yaml(raw: &[u8]) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::EmptyPayload);
        }
        Ok(serde_yaml::from_slice(raw)?)
    }
}

/// Decodes the host's opaque configuration payload into a [`RewriteConfig`].
///
/// The payload is decoded as-is: nothing is defaulted or invented, and any
/// structural problem is reported as a [`ConfigError`] so the instance stays
/// unready.
pub trait ConfigDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<RewriteConfig, ConfigError>;
}

/// JSON payload decoder; the default for host-pushed configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ConfigDecoder for JsonDecoder {
    fn decode(&self, raw: &[u8]) -> Result<RewriteConfig, ConfigError> {
        RewriteConfig::from_json(raw)
    }
}

/// YAML payload decoder, used by file-based tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDecoder;

impl ConfigDecoder for YamlDecoder {
    fn decode(&self, raw: &[u8]) -> Result<RewriteConfig, ConfigError> {
        RewriteConfig::from_yaml(raw)
    }
}

/// Errors raised while decoding or compiling a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("empty configuration payload")]
    EmptyPayload,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
