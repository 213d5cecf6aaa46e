//! Kernel configuration.
//!
//! Every tunable the reasoning loop consults lives here, with the defaults
//! the rest of the crate is calibrated against. The config is serde-friendly
//! (it rides inside snapshots) and can be loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DoxaResult, KernelError, SnapshotError};

/// Verbosity for the tracing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `tracing_subscriber` filter directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Tunables for the reasoning kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Activation/belief decay factor per maintenance step.
    pub decay: f32,
    /// Budget attenuation applied to derived conclusions.
    pub budget_decay: f32,
    /// Minimum budget total required to apply a derivation conclusion.
    pub inference_threshold: f32,
    /// Maximum propagation hops for one wave.
    pub max_path_length: u32,
    /// Maximum beliefs kept per edge (adjusted dynamically).
    pub belief_capacity: usize,
    /// Maximum hops followed by temporal prediction.
    pub temporal_horizon: u32,
    /// Minimum event priority to process on dequeue.
    pub budget_threshold: f32,
    /// Maximum rule-firing depth recorded on one derivation path.
    pub max_derivation_depth: u32,
    /// Wall-clock bound for one query evaluation, in milliseconds.
    pub expression_timeout_ms: u64,
    /// Bound on the derivation/path caches.
    pub derivation_cache_size: usize,
    /// Default question deadline, in milliseconds.
    pub question_timeout_ms: u64,
    /// Steps between question-resolver sweeps.
    pub question_resolution_interval: u64,
    /// Steps between maintenance passes.
    pub memory_maintenance_interval: u64,
    /// Frequency gap that counts as a contradiction.
    pub contradiction_threshold: f32,
    /// Retention below which a sampled edge may be deleted.
    pub forgetting_threshold: f32,
    /// Hypergraph size at which forgetting activates.
    pub min_concepts_for_forgetting: usize,
    /// Edges sampled per forgetting pass.
    pub forgetting_check_sample_size: usize,
    /// Verbosity for the tracing layer.
    pub log_level: LogLevel,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            decay: 0.1,
            budget_decay: 0.8,
            inference_threshold: 0.3,
            max_path_length: 15,
            belief_capacity: 8,
            temporal_horizon: 3,
            budget_threshold: 0.05,
            max_derivation_depth: 5,
            expression_timeout_ms: 500,
            derivation_cache_size: 1000,
            question_timeout_ms: 3000,
            question_resolution_interval: 10,
            memory_maintenance_interval: 100,
            contradiction_threshold: 0.7,
            forgetting_threshold: 0.1,
            min_concepts_for_forgetting: 1000,
            forgetting_check_sample_size: 200,
            log_level: LogLevel::Info,
        }
    }
}

impl KernelConfig {
    /// Validate ranges that the loop depends on.
    pub fn validate(&self) -> DoxaResult<()> {
        if self.belief_capacity == 0 {
            return Err(KernelError::InvalidConfig {
                message: "belief_capacity must be at least 1".into(),
            }
            .into());
        }
        if self.memory_maintenance_interval == 0 || self.question_resolution_interval == 0 {
            return Err(KernelError::InvalidConfig {
                message: "maintenance and question intervals must be nonzero".into(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.contradiction_threshold) {
            return Err(KernelError::InvalidConfig {
                message: "contradiction_threshold must be in [0, 1]".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> DoxaResult<Self> {
        let config: KernelConfig =
            toml::from_str(text).map_err(|e| SnapshotError::Corrupt {
                message: format!("config parse error: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> DoxaResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| SnapshotError::Io { source })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = KernelConfig::from_toml_str(
            r#"
            belief_capacity = 4
            question_timeout_ms = 500
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.belief_capacity, 4);
        assert_eq!(config.question_timeout_ms, 500);
        assert_eq!(config.log_level, LogLevel::Debug);
        // Untouched fields keep their defaults.
        assert_eq!(config.max_path_length, 15);
    }

    #[test]
    fn invalid_capacity_rejected() {
        assert!(KernelConfig::from_toml_str("belief_capacity = 0").is_err());
    }

    #[test]
    fn garbage_toml_rejected() {
        assert!(KernelConfig::from_toml_str("belief_capacity = \"many\"").is_err());
    }
}
