//! Configuration loading: env > file > defaults.

use crate::env::{apply_env_overrides, load_env_overrides};
use crate::schema::{ConfigError, OrchestratorConfig};
use std::path::Path;

/// Load configuration from `path` (if it exists), then apply environment
/// overrides, then validate. Missing file is not an error: defaults apply.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let mut config = if path.exists() {
        load_from_file(path)?
    } else {
        OrchestratorConfig::default()
    };

    apply_env_overrides(&mut config, &load_env_overrides());
    validate_config(&config)?;
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Validate internal consistency of a loaded configuration.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if config.bus.heartbeat_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "bus.heartbeat_interval_ms must be > 0".into(),
        ));
    }
    if config.bus.max_queue_size == 0 {
        return Err(ConfigError::ValidationError(
            "bus.max_queue_size must be > 0".into(),
        ));
    }
    if !(0.0..=1.0).contains(&config.decision.signature_threshold) {
        return Err(ConfigError::ValidationError(
            "decision.signature_threshold must be in [0, 1]".into(),
        ));
    }
    if config.election.failing >= config.election.poor
        || config.election.poor >= config.election.good
        || config.election.good >= config.election.excellent
    {
        return Err(ConfigError::ValidationError(
            "election thresholds must satisfy failing < poor < good < excellent".into(),
        ));
    }
    if config.team.max_agents == 0 {
        return Err(ConfigError::ValidationError(
            "team.max_agents must be > 0".into(),
        ));
    }
    Ok(())
}
