//! Narrow persistence seams over tasks/agents/decisions/audits/elections/
//! appeals, per `spec.md` §6. Message persistence is `bus::MessageSink`.
//!
//! Each trait is intentionally small so an embedder can swap in a real
//! backend (see `orchestrator-storage`) without adopting a god-object
//! "repository of everything". An in-memory implementation is provided for
//! tests and for embedders who don't need durability across restarts.

use crate::agent::Agent;
use crate::bus::MessageSink;
use crate::decision::{Appeal, Decision};
use crate::domain::{AuditEvent, Task};
use crate::election::ElectionRound;
use crate::error::KernelResult;
use crate::ids::{AgentId, AppealId, DecisionId, TaskId};
use crate::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save_task(&self, task: &Task) -> KernelResult<()>;
    async fn get_task(&self, id: TaskId) -> KernelResult<Option<Task>>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn save_agent(&self, agent: &Agent) -> KernelResult<()>;
    async fn get_agent(&self, id: AgentId) -> KernelResult<Option<Agent>>;
    async fn list_agents(&self, task_id: TaskId) -> KernelResult<Vec<Agent>>;
}

#[async_trait]
pub trait DecisionRepository: Send + Sync {
    async fn save_decision(&self, decision: &Decision) -> KernelResult<()>;
    async fn get_decision(&self, id: DecisionId) -> KernelResult<Option<Decision>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, event: &AuditEvent) -> KernelResult<()>;
    async fn list_audits(&self, agent_id: AgentId) -> KernelResult<Vec<AuditEvent>>;
}

#[async_trait]
pub trait ElectionRepository: Send + Sync {
    async fn save_round(&self, round: &ElectionRound) -> KernelResult<()>;
}

#[async_trait]
pub trait AppealRepository: Send + Sync {
    async fn save_appeal(&self, appeal: &Appeal) -> KernelResult<()>;
    async fn get_appeal(&self, id: AppealId) -> KernelResult<Option<Appeal>>;
}

/// The full set of repositories the kernel depends on, bundled for
/// convenient wiring into `TeamLifecycle`.
#[derive(Clone)]
pub struct Repositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub messages: Arc<dyn MessageSink>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub audits: Arc<dyn AuditRepository>,
    pub elections: Arc<dyn ElectionRepository>,
    pub appeals: Arc<dyn AppealRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::default());
        Self {
            tasks: store.clone(),
            agents: store.clone(),
            messages: store.clone(),
            decisions: store.clone(),
            audits: store.clone(),
            elections: store.clone(),
            appeals: store,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
    agents: Mutex<HashMap<AgentId, Agent>>,
    messages: Mutex<Vec<(Message, u64)>>,
    decisions: Mutex<HashMap<DecisionId, Decision>>,
    audits: Mutex<Vec<AuditEvent>>,
    elections: Mutex<Vec<ElectionRound>>,
    appeals: Mutex<HashMap<AppealId, Appeal>>,
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn save_task(&self, task: &Task) -> KernelResult<()> {
        self.tasks.lock().await.insert(task.id, task.clone());
        Ok(())
    }
    async fn get_task(&self, id: TaskId) -> KernelResult<Option<Task>> {
        Ok(self.tasks.lock().await.get(&id).cloned())
    }
}

#[async_trait]
impl AgentRepository for InMemoryStore {
    async fn save_agent(&self, agent: &Agent) -> KernelResult<()> {
        self.agents.lock().await.insert(agent.id, agent.clone());
        Ok(())
    }
    async fn get_agent(&self, id: AgentId) -> KernelResult<Option<Agent>> {
        Ok(self.agents.lock().await.get(&id).cloned())
    }
    async fn list_agents(&self, task_id: TaskId) -> KernelResult<Vec<Agent>> {
        Ok(self
            .agents
            .lock()
            .await
            .values()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageSink for InMemoryStore {
    async fn save_message(&self, message: &Message, tick: u64) -> KernelResult<()> {
        self.messages.lock().await.push((message.clone(), tick));
        Ok(())
    }
}

#[async_trait]
impl DecisionRepository for InMemoryStore {
    async fn save_decision(&self, decision: &Decision) -> KernelResult<()> {
        self.decisions.lock().await.insert(decision.id, decision.clone());
        Ok(())
    }
    async fn get_decision(&self, id: DecisionId) -> KernelResult<Option<Decision>> {
        Ok(self.decisions.lock().await.get(&id).cloned())
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn append_audit(&self, event: &AuditEvent) -> KernelResult<()> {
        self.audits.lock().await.push(event.clone());
        Ok(())
    }
    async fn list_audits(&self, agent_id: AgentId) -> KernelResult<Vec<AuditEvent>> {
        Ok(self
            .audits
            .lock()
            .await
            .iter()
            .filter(|a| a.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ElectionRepository for InMemoryStore {
    async fn save_round(&self, round: &ElectionRound) -> KernelResult<()> {
        self.elections.lock().await.push(round.clone());
        Ok(())
    }
}

#[async_trait]
impl AppealRepository for InMemoryStore {
    async fn save_appeal(&self, appeal: &Appeal) -> KernelResult<()> {
        self.appeals.lock().await.insert(appeal.id, appeal.clone());
        Ok(())
    }
    async fn get_appeal(&self, id: AppealId) -> KernelResult<Option<Appeal>> {
        Ok(self.appeals.lock().await.get(&id).cloned())
    }
}
