//! Pipeline configuration with documented constants
//!
//! All tunables are collected here with explanations of their purpose.
//! A TOML file may override any subset of them; missing keys keep the defaults.

use crate::core::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the command pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub resolver: ResolverConfig,
    pub approval: ApprovalConfig,
    pub workflow: WorkflowConfig,
}

/// Settings for the generation backend and its retry loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model name sent with every completion request
    pub model: String,

    /// Sampling temperature
    ///
    /// Plans are structured output, so this stays low.
    pub temperature: f32,

    /// Upper bound on generated tokens per request
    pub max_tokens: u32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Total backend calls before giving up (first call included)
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on every further retry
    pub base_delay_ms: u64,

    /// Ceiling for a single backoff delay
    pub max_delay_ms: u64,

    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,

    /// Synthesize a rule-based plan when the backend stays unreachable
    pub fallback_enabled: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.1,
            max_tokens: 2048,
            top_p: 0.9,
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            request_timeout_ms: 20_000,
            fallback_enabled: true,
        }
    }
}

impl GenerationConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for action identifier resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum normalized similarity for a fuzzy match to be accepted
    ///
    /// 0.6 tolerates two or three typos in a typical `category.verb` identifier
    /// without pulling in unrelated actions.
    pub fuzzy_threshold: f32,

    /// Safety cap on repetition counts coming from user text
    pub max_repeat: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.6,
            max_repeat: 10,
        }
    }
}

/// Settings for the confirmation gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// How long a proposal waits for the requester before expiring
    pub window_secs: u64,

    /// Force approval for any plan containing a destructive capability
    pub require_for_destructive: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            window_secs: 30,
            require_for_destructive: true,
        }
    }
}

impl ApprovalConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Settings for the workflow registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Finished workflow records kept for status queries
    ///
    /// The oldest finished record is evicted once this many are retained.
    /// Running workflows are never evicted.
    pub max_retained: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { max_retained: 256 }
    }
}

impl PipelineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.max_attempts == 0 {
            return Err(PipelineError::Config(
                "generation.max_attempts must be at least 1".into(),
            ));
        }
        if generation.base_delay_ms > generation.max_delay_ms {
            return Err(PipelineError::Config(format!(
                "generation.base_delay_ms ({}) should be <= max_delay_ms ({})",
                generation.base_delay_ms, generation.max_delay_ms
            )));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(PipelineError::Config(format!(
                "generation.temperature ({}) must be within 0.0..=2.0",
                generation.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.resolver.fuzzy_threshold) {
            return Err(PipelineError::Config(format!(
                "resolver.fuzzy_threshold ({}) must be within 0.0..=1.0",
                self.resolver.fuzzy_threshold
            )));
        }
        if self.resolver.max_repeat == 0 {
            return Err(PipelineError::Config(
                "resolver.max_repeat must be at least 1".into(),
            ));
        }
        if self.approval.window_secs == 0 {
            return Err(PipelineError::Config(
                "approval.window_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.base_delay(), Duration::from_secs(1));
        assert_eq!(config.approval.window(), Duration::from_secs(30));
        assert!((config.resolver.fuzzy_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [generation]
            max_attempts = 5

            [approval]
            window_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.base_delay_ms, 1_000);
        assert_eq!(config.approval.window_secs, 10);
        assert_eq!(config.resolver.max_repeat, 10);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = PipelineConfig::from_toml("[generation]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let mut config = PipelineConfig::default();
        config.generation.base_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_toml_error() {
        let result = PipelineConfig::from_toml("[generation\n");
        assert!(matches!(result, Err(PipelineError::TomlError(_))));
    }
}
