//! Task and audit-event types shared across the accountability, election,
//! decision, and team-lifecycle modules. See `spec.md` §3.

use crate::ids::{AgentId, AuditId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskMode {
    Auto,
    SemiAuto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub mode: TaskMode,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(description: impl Into<String>, mode: TaskMode) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            status: TaskStatus::Pending,
            mode,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    Warning,
    Demotion,
    Dismissal,
    Promotion,
    Veto,
    Decision,
    Appeal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditId,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub event_type: AuditEventType,
    pub reason: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        task_id: TaskId,
        agent_id: AgentId,
        event_type: AuditEventType,
        reason: impl Into<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: AuditId::new(),
            task_id,
            agent_id,
            event_type,
            reason: reason.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}
