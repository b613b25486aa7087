//! Periodic layer-wide performance reclassification. See `spec.md` §4.10.

use crate::agent::Layer;
use crate::ids::{AgentId, ElectionId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionThresholds {
    pub excellent: u32,
    pub good: u32,
    pub poor: u32,
    pub failing: u32,
}

impl Default for ElectionThresholds {
    fn default() -> Self {
        Self { excellent: 80, good: 60, poor: 40, failing: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionAction {
    Promote,
    Maintain,
    Demote,
    Dismiss,
}

/// Decides the election action for one agent's score, per the layer-aware
/// thresholds table in `spec.md` §4.10.
pub fn decide_action(score: u32, layer: Layer, thresholds: ElectionThresholds) -> ElectionAction {
    if score < thresholds.failing {
        ElectionAction::Dismiss
    } else if score < thresholds.poor {
        if layer == Layer::Mid {
            ElectionAction::Demote
        } else {
            ElectionAction::Dismiss
        }
    } else if score >= thresholds.excellent && layer == Layer::Bottom {
        ElectionAction::Promote
    } else {
        ElectionAction::Maintain
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionOutcome {
    pub agent_id: AgentId,
    pub score: u32,
    pub action: ElectionAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionRound {
    pub id: ElectionId,
    pub task_id: TaskId,
    pub layer: Layer,
    pub round: u64,
    pub outcomes: Vec<ElectionOutcome>,
    pub created_at: DateTime<Utc>,
}

/// Runs one election round over `(agent_id, score)` pairs for a single
/// layer, sorted descending by score as `spec.md` requires, and returns the
/// persisted-shape round record. Callers dispatch each outcome's action to
/// Accountability or the promotion handler.
pub fn run_round(
    task_id: TaskId,
    layer: Layer,
    round: u64,
    mut scored: Vec<(AgentId, u32)>,
    thresholds: ElectionThresholds,
) -> ElectionRound {
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let outcomes = scored
        .into_iter()
        .map(|(agent_id, score)| ElectionOutcome { agent_id, score, action: decide_action(score, layer, thresholds) })
        .collect();

    ElectionRound { id: ElectionId::new(), task_id, layer, round, outcomes, created_at: Utc::now() }
}
