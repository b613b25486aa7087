//! Configuration schema and defaults.
//!
//! Field names and defaults follow `spec.md` §6 "Configuration" exactly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub decision: DecisionSection,
    #[serde(default)]
    pub accountability: AccountabilitySection,
    #[serde(default)]
    pub election: ElectionSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub team: TeamSection,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bus: BusSection::default(),
            decision: DecisionSection::default(),
            accountability: AccountabilitySection::default(),
            election: ElectionSection::default(),
            agent: AgentSection::default(),
            team: TeamSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusSection {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_timeout_threshold_ticks")]
    pub timeout_threshold_ticks: u64,
    #[serde(default)]
    pub enable_compression: bool,
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
}

fn default_heartbeat_interval_ms() -> u64 {
    4000
}
fn default_max_queue_size() -> usize {
    1000
}
fn default_timeout_threshold_ticks() -> u64 {
    3
}
fn default_compression_threshold_bytes() -> usize {
    1024
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_queue_size: default_max_queue_size(),
            timeout_threshold_ticks: default_timeout_threshold_ticks(),
            enable_compression: false,
            compression_threshold_bytes: default_compression_threshold_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionSection {
    #[serde(default = "default_signature_threshold")]
    pub signature_threshold: f64,
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_reminders: bool,
}

fn default_signature_threshold() -> f64 {
    0.67
}
fn default_decision_timeout_ms() -> u64 {
    300_000
}
fn default_true() -> bool {
    true
}

impl Default for DecisionSection {
    fn default() -> Self {
        Self {
            signature_threshold: default_signature_threshold(),
            decision_timeout_ms: default_decision_timeout_ms(),
            enable_reminders: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountabilitySection {
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_warning_threshold() -> u32 {
    3
}
fn default_failure_threshold() -> u32 {
    1
}

impl Default for AccountabilitySection {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElectionSection {
    #[serde(default = "default_interval_ticks")]
    pub interval_ticks: u64,
    #[serde(default = "default_excellent")]
    pub excellent: u32,
    #[serde(default = "default_good")]
    pub good: u32,
    #[serde(default = "default_poor")]
    pub poor: u32,
    #[serde(default = "default_failing")]
    pub failing: u32,
}

fn default_interval_ticks() -> u64 {
    50
}
fn default_excellent() -> u32 {
    80
}
fn default_good() -> u32 {
    60
}
fn default_poor() -> u32 {
    40
}
fn default_failing() -> u32 {
    20
}

impl Default for ElectionSection {
    fn default() -> Self {
        Self {
            interval_ticks: default_interval_ticks(),
            excellent: default_excellent(),
            good: default_good(),
            poor: default_poor(),
            failing: default_failing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamSection {
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
}

fn default_max_agents() -> usize {
    50
}

impl Default for TeamSection {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("configuration file not found at {0}")]
    FileNotFound(String),
    #[error("failed to read configuration file: {0}")]
    IoError(String),
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}
