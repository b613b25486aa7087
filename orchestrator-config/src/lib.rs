//! orchestrator-config — TOML configuration with environment overrides.
//!
//! Loading hierarchy: environment variables > config file > built-in defaults.

pub mod config;
pub mod env;
pub mod schema;

pub use config::load_config;
pub use schema::{
    AccountabilitySection, AgentSection, BusSection, ConfigError, DecisionSection,
    ElectionSection, OrchestratorConfig, TeamSection,
};
