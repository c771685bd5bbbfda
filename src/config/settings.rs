//! Typed configuration

use std::path::PathBuf;
use std::time::Duration;

use codefix_protocol::Profile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::effective::ConfigError;
use crate::bundle::ArtifactPackager;
use crate::host::HttpConfig;
use crate::job::ReferencePolicy;
use crate::poll::PollPolicy;

/// Default artifact size limit (10 MiB)
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 10 * 1024 * 1024;

/// Merged configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodefixConfig {
    pub service: ServiceSettings,
    pub poll: PollSettings,
    pub artifact: ArtifactSettings,
    pub references: ReferenceSettings,
    pub telemetry: TelemetrySettings,
}

/// Remote service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Endpoint receiving request envelopes
    pub endpoint: String,
    pub region: String,
    /// Profile attached to every call; none when unset
    pub profile_arn: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub request_timeout_seconds: u64,
    pub user_agent: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            profile_arn: None,
            token_env: "CODEFIX_TOKEN".to_string(),
            request_timeout_seconds: 30,
            user_agent: None,
        }
    }
}

/// Status polling cadence and budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_factor: f64,
    pub max_attempts: u32,
    pub timeout_seconds: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_interval_ms: 5000,
            backoff_factor: 1.5,
            max_attempts: 300,
            timeout_seconds: 600,
        }
    }
}

/// Local artifact staging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Staging directory; the system temp dir when unset
    pub staging_dir: Option<PathBuf>,
    /// Archive size limit in bytes (0 = unlimited)
    pub max_bytes: u64,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            staging_dir: None,
            max_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    pub include_suggestions_with_code_references: bool,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            include_suggestions_with_code_references: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Append events as JSON lines to this file
    pub events_path: Option<PathBuf>,
}

impl CodefixConfig {
    /// Built-in defaults as a merge layer
    pub fn builtin_layer() -> Result<Value, ConfigError> {
        serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::ParseError(format!("builtin defaults: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll_policy()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("poll: {}", e)))?;

        if self.service.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "service.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.service.token_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service.token_env must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll.interval_ms),
            max_interval: Duration::from_millis(self.poll.max_interval_ms),
            backoff_factor: self.poll.backoff_factor,
            max_attempts: self.poll.max_attempts,
            timeout: Duration::from_secs(self.poll.timeout_seconds),
        }
    }

    pub fn reference_policy(&self) -> ReferencePolicy {
        ReferencePolicy::from_setting(self.references.include_suggestions_with_code_references)
    }

    /// Profile context for remote calls
    pub fn profile(&self) -> Option<Profile> {
        self.service
            .profile_arn
            .as_ref()
            .map(|arn| Profile::new(arn.clone(), self.service.region.clone()))
    }

    pub fn packager(&self) -> ArtifactPackager {
        let staging = self
            .artifact
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        ArtifactPackager::new(staging).with_max_bytes(self.artifact.max_bytes)
    }

    /// HTTP transport settings, with the token read from the environment
    pub fn http_config(&self) -> Result<HttpConfig, ConfigError> {
        if self.service.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service.endpoint is required (set it in config or pass --endpoint)".to_string(),
            ));
        }

        let defaults = HttpConfig::default();
        Ok(HttpConfig {
            endpoint: self.service.endpoint.clone(),
            token: std::env::var(&self.service.token_env)
                .ok()
                .filter(|t| !t.is_empty()),
            request_timeout: Duration::from_secs(self.service.request_timeout_seconds),
            user_agent: self.service.user_agent.clone().unwrap_or(defaults.user_agent),
        })
    }
}
