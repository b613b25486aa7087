//! `sled`-backed implementation of `orchestrator_core::repo`'s narrow
//! repository traits, grounded on `knhk-lockchain::storage::LockchainStorage`
//! (`sled::Db`, one key namespace per logical table; the Git-backed audit
//! log from the teacher is dropped — the kernel has its own `audits` table,
//! see DESIGN.md). Entities are JSON-encoded rather than bincode-encoded:
//! several carry an embedded `serde_json::Value` payload (message content,
//! decision content, audit metadata), and bincode's non-self-describing
//! format can't round-trip `Value`'s `deserialize_any`-based impl.

use async_trait::async_trait;
use orchestrator_core::agent::Agent;
use orchestrator_core::bus::MessageSink;
use orchestrator_core::decision::{Appeal, Decision};
use orchestrator_core::domain::{AuditEvent, Task};
use orchestrator_core::election::ElectionRound;
use orchestrator_core::error::{KernelError, KernelResult};
use orchestrator_core::ids::{AgentId, AppealId, DecisionId, TaskId};
use orchestrator_core::message::Message;
use orchestrator_core::repo::{AgentRepository, AppealRepository, AuditRepository, DecisionRepository, ElectionRepository, TaskRepository};
use sled::Tree;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for KernelError {
    fn from(e: StorageError) -> Self {
        KernelError::Persistence(e.to_string())
    }
}

/// One `sled` tree per logical table from `spec.md` §6, keyed by the
/// entity's uuid bytes, value JSON-encoded.
pub struct SledRepositories {
    tasks: Tree,
    agents: Tree,
    messages: Tree,
    decisions: Tree,
    audits: Tree,
    elections: Tree,
    appeals: Tree,
}

impl SledRepositories {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let root = sled::open(path)?;
        Ok(Self {
            tasks: root.open_tree("tasks")?,
            agents: root.open_tree("agents")?,
            messages: root.open_tree("messages")?,
            decisions: root.open_tree("decisions")?,
            audits: root.open_tree("audits")?,
            elections: root.open_tree("elections")?,
            appeals: root.open_tree("appeals")?,
        })
    }

    fn put<K: AsRef<[u8]>, V: serde::Serialize>(tree: &Tree, key: K, value: &V) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key, bytes)?;
        Ok(())
    }

    fn get<K: AsRef<[u8]>, V: serde::de::DeserializeOwned>(tree: &Tree, key: K) -> Result<Option<V>, StorageError> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskRepository for SledRepositories {
    #[instrument(skip(self, task))]
    async fn save_task(&self, task: &Task) -> KernelResult<()> {
        Self::put(&self.tasks, task.id.0.as_bytes(), task).map_err(Into::into)
    }

    async fn get_task(&self, id: TaskId) -> KernelResult<Option<Task>> {
        Self::get(&self.tasks, id.0.as_bytes()).map_err(Into::into)
    }
}

#[async_trait]
impl AgentRepository for SledRepositories {
    #[instrument(skip(self, agent))]
    async fn save_agent(&self, agent: &Agent) -> KernelResult<()> {
        Self::put(&self.agents, agent.id.0.as_bytes(), agent).map_err(Into::into)
    }

    async fn get_agent(&self, id: AgentId) -> KernelResult<Option<Agent>> {
        Self::get(&self.agents, id.0.as_bytes()).map_err(Into::into)
    }

    async fn list_agents(&self, task_id: TaskId) -> KernelResult<Vec<Agent>> {
        let mut out = Vec::new();
        for entry in self.agents.iter() {
            let (_key, value) = entry.map_err(StorageError::Database)?;
            let agent: Agent = serde_json::from_slice(&value).map_err(StorageError::Serialization)?;
            if agent.task_id == task_id {
                out.push(agent);
            }
        }
        Ok(out)
    }
}

/// Messages are append-only; keyed by `(tick, message id)` so iteration is
/// insertion-ordered, matching `spec.md` §6's append-only policy.
#[async_trait]
impl MessageSink for SledRepositories {
    #[instrument(skip(self, message))]
    async fn save_message(&self, message: &Message, tick: u64) -> KernelResult<()> {
        let mut key = tick.to_be_bytes().to_vec();
        key.extend_from_slice(message.id.0.as_bytes());
        Self::put(&self.messages, key, message).map_err(Into::into)
    }
}

#[async_trait]
impl DecisionRepository for SledRepositories {
    #[instrument(skip(self, decision))]
    async fn save_decision(&self, decision: &Decision) -> KernelResult<()> {
        Self::put(&self.decisions, decision.id.0.as_bytes(), decision).map_err(Into::into)
    }

    async fn get_decision(&self, id: DecisionId) -> KernelResult<Option<Decision>> {
        Self::get(&self.decisions, id.0.as_bytes()).map_err(Into::into)
    }
}

/// Audit rows are append-only; keyed by `(agent id, audit id)` so a range
/// scan over one agent's prefix is cheap.
#[async_trait]
impl AuditRepository for SledRepositories {
    #[instrument(skip(self, event))]
    async fn append_audit(&self, event: &AuditEvent) -> KernelResult<()> {
        let mut key = event.agent_id.0.as_bytes().to_vec();
        key.extend_from_slice(event.id.0.as_bytes());
        Self::put(&self.audits, key, event).map_err(Into::into)
    }

    async fn list_audits(&self, agent_id: AgentId) -> KernelResult<Vec<AuditEvent>> {
        let prefix = agent_id.0.as_bytes().to_vec();
        let mut out = Vec::new();
        for entry in self.audits.scan_prefix(prefix) {
            let (_key, value) = entry.map_err(StorageError::Database)?;
            out.push(serde_json::from_slice(&value).map_err(StorageError::Serialization)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ElectionRepository for SledRepositories {
    #[instrument(skip(self, round))]
    async fn save_round(&self, round: &ElectionRound) -> KernelResult<()> {
        Self::put(&self.elections, round.id.0.as_bytes(), round).map_err(Into::into)
    }
}

#[async_trait]
impl AppealRepository for SledRepositories {
    #[instrument(skip(self, appeal))]
    async fn save_appeal(&self, appeal: &Appeal) -> KernelResult<()> {
        Self::put(&self.appeals, appeal.id.0.as_bytes(), appeal).map_err(Into::into)
    }

    async fn get_appeal(&self, id: AppealId) -> KernelResult<Option<Appeal>> {
        Self::get(&self.appeals, id.0.as_bytes()).map_err(Into::into)
    }
}
