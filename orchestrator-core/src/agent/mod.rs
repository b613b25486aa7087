//! Agent records: identity, layer-specific attributes, metrics, config.
//! See `spec.md` §3. Tick-loop behavior lives in [`runtime`] and
//! [`behavior`].

pub mod behavior;
pub mod runtime;

use crate::ids::{AgentId, TaskId};
use crate::state::AgentState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Closed capability vocabulary, see GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Plan,
    Execute,
    Reflect,
    ToolCall,
    CodeGen,
    TestExec,
    Review,
    Coordinate,
    Delegate,
    Arbitrate,
}

/// One of the three top-layer signature-authority labels, partitioned so no
/// single top agent can approve every decision type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerKind {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAttributes {
    pub power_kind: PowerKind,
    pub vote_weight: u32,
    pub signature_authority: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidAttributes {
    pub domain: String,
    pub max_subordinates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottomAttributes {
    pub tools: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LayerAttributes {
    Top(TopAttributes),
    Mid(MidAttributes),
    Bottom(BottomAttributes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    Top,
    Mid,
    Bottom,
}

impl LayerAttributes {
    pub fn layer(&self) -> Layer {
        match self {
            LayerAttributes::Top(_) => Layer::Top,
            LayerAttributes::Mid(_) => Layer::Mid,
            LayerAttributes::Bottom(_) => Layer::Bottom,
        }
    }
}

/// Mutable per-agent counters. Invariant: `heartbeats_responded +
/// heartbeats_missed` never decreases; `warnings_received` is monotonic
/// until dismissal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub avg_task_duration_ms: f64,
    pub messages_processed: u64,
    pub heartbeats_responded: u64,
    pub heartbeats_missed: u64,
    pub warnings_received: u32,
    pub last_active_tick: u64,
    pub performance_score: u32,
    /// Ambient convenience for the election dashboard; not scored, not
    /// part of any invariant.
    pub last_warning_tick: Option<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            avg_task_duration_ms: 0.0,
            messages_processed: 0,
            heartbeats_responded: 0,
            heartbeats_missed: 0,
            warnings_received: 0,
            last_active_tick: 0,
            performance_score: 0,
            last_warning_tick: None,
        }
    }
}

impl Metrics {
    /// Incremental mean update for `avg_task_duration_ms`.
    pub fn record_task_duration(&mut self, duration_ms: f64) {
        let n = self.tasks_completed + self.tasks_failed;
        if n == 0 {
            self.avg_task_duration_ms = duration_ms;
        } else {
            self.avg_task_duration_ms += (duration_ms - self.avg_task_duration_ms) / (n as f64 + 1.0);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self { max_retries: 3, timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub task_id: TaskId,
    pub name: String,
    pub role: String,
    pub supervisor: Option<AgentId>,
    pub subordinates: HashSet<AgentId>,
    pub capabilities: HashSet<Capability>,
    pub attributes: LayerAttributes,
    pub status: AgentState,
    pub metrics: Metrics,
    pub retry_count: u32,
    pub config: AgentRuntimeConfig,
}

impl Agent {
    pub fn new(
        task_id: TaskId,
        name: impl Into<String>,
        role: impl Into<String>,
        attributes: LayerAttributes,
        capabilities: HashSet<Capability>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            task_id,
            name: name.into(),
            role: role.into(),
            supervisor: None,
            subordinates: HashSet::new(),
            capabilities,
            attributes,
            status: AgentState::Initializing,
            metrics: Metrics::default(),
            retry_count: 0,
            config: AgentRuntimeConfig::default(),
        }
    }

    pub fn layer(&self) -> Layer {
        self.attributes.layer()
    }

    /// Builds the blackboard-facing identity for this agent. Kept as a
    /// conversion rather than a shared type so the blackboard stays
    /// agent-graph-agnostic (see `blackboard::RequesterLayer`).
    pub fn as_requester(&self) -> crate::blackboard::Requester {
        use crate::blackboard::RequesterLayer;
        let layer = match self.layer() {
            Layer::Top => RequesterLayer::Top,
            Layer::Mid => RequesterLayer::Mid,
            Layer::Bottom => RequesterLayer::Bottom,
        };
        crate::blackboard::Requester { id: self.id, layer, supervisor: self.supervisor }
    }

    /// This agent's own-layer blackboard scope.
    pub fn own_scope(&self) -> crate::blackboard::Scope {
        use crate::blackboard::Scope;
        match self.layer() {
            Layer::Top => Scope::Top,
            Layer::Mid => Scope::Mid(self.id),
            Layer::Bottom => Scope::Bottom(self.id),
        }
    }
}
