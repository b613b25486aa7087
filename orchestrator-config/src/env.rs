//! Environment variable overrides.
//!
//! Format: `ORCH_<SECTION>_<KEY>`, e.g. `ORCH_BUS_HEARTBEAT_INTERVAL_MS=2000`.
//! Env values always win over the file and over defaults.

use crate::schema::OrchestratorConfig;
use std::collections::BTreeMap;
use std::env;

const PREFIX: &str = "ORCH_";

/// Collect all `ORCH_`-prefixed environment variables, normalized to
/// lowercase `section_key` form.
pub fn load_env_overrides() -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for (key, value) in env::vars() {
        if let Some(rest) = key.strip_prefix(PREFIX) {
            found.insert(rest.to_lowercase(), value);
        }
    }
    found
}

/// Apply collected overrides onto a loaded configuration in place.
pub fn apply_env_overrides(config: &mut OrchestratorConfig, overrides: &BTreeMap<String, String>) {
    for (key, value) in overrides {
        let Some((section, field)) = key.split_once('_').map(|(s, f)| (s, f.to_string())) else {
            continue;
        };
        match (section, field.as_str()) {
            ("bus", "heartbeat_interval_ms") => assign_u64(&mut config.bus.heartbeat_interval_ms, value),
            ("bus", "max_queue_size") => assign_usize(&mut config.bus.max_queue_size, value),
            ("bus", "timeout_threshold_ticks") => {
                assign_u64(&mut config.bus.timeout_threshold_ticks, value)
            }
            ("bus", "enable_compression") => assign_bool(&mut config.bus.enable_compression, value),
            ("bus", "compression_threshold_bytes") => {
                assign_usize(&mut config.bus.compression_threshold_bytes, value)
            }
            ("decision", "signature_threshold") => {
                assign_f64(&mut config.decision.signature_threshold, value)
            }
            ("decision", "decision_timeout_ms") => {
                assign_u64(&mut config.decision.decision_timeout_ms, value)
            }
            ("decision", "enable_reminders") => {
                assign_bool(&mut config.decision.enable_reminders, value)
            }
            ("accountability", "warning_threshold") => {
                assign_u32(&mut config.accountability.warning_threshold, value)
            }
            ("accountability", "failure_threshold") => {
                assign_u32(&mut config.accountability.failure_threshold, value)
            }
            ("election", "interval_ticks") => assign_u64(&mut config.election.interval_ticks, value),
            ("agent", "max_retries") => assign_u32(&mut config.agent.max_retries, value),
            ("agent", "timeout_ms") => assign_u64(&mut config.agent.timeout_ms, value),
            ("team", "max_agents") => assign_usize(&mut config.team.max_agents, value),
            _ => {}
        }
    }
}

fn assign_u64(target: &mut u64, raw: &str) {
    if let Ok(v) = raw.parse() {
        *target = v;
    }
}
fn assign_u32(target: &mut u32, raw: &str) {
    if let Ok(v) = raw.parse() {
        *target = v;
    }
}
fn assign_usize(target: &mut usize, raw: &str) {
    if let Ok(v) = raw.parse() {
        *target = v;
    }
}
fn assign_f64(target: &mut f64, raw: &str) {
    if let Ok(v) = raw.parse() {
        *target = v;
    }
}
fn assign_bool(target: &mut bool, raw: &str) {
    if let Ok(v) = raw.parse() {
        *target = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse_into_sections() {
        let mut config = OrchestratorConfig::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("bus_heartbeat_interval_ms".to_string(), "2500".to_string());
        overrides.insert("election_interval_ticks".to_string(), "25".to_string());
        apply_env_overrides(&mut config, &overrides);

        assert_eq!(config.bus.heartbeat_interval_ms, 2500);
        assert_eq!(config.election.interval_ticks, 25);
    }

    #[test]
    fn malformed_values_are_ignored() {
        let mut config = OrchestratorConfig::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "bus_heartbeat_interval_ms".to_string(),
            "not-a-number".to_string(),
        );
        apply_env_overrides(&mut config, &overrides);
        assert_eq!(config.bus.heartbeat_interval_ms, 4000);
    }
}
