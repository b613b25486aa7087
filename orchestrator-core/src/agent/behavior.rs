//! Layer-specific default behaviors. See `spec.md` §4.6. The kernel treats
//! these as the contractual defaults; embedders may substitute their own
//! `Behavior` impl per agent.

use super::Agent;
use crate::blackboard::{Blackboard, Document};
use crate::decision::DecisionType;
use crate::domain::Task;
use crate::ids::AgentId;
use crate::message::{Message, MessageKind, Priority, Recipient};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::warn;

/// A message the kernel should route on the sender's behalf once
/// `on_process` returns. Kept as data, not a direct bus call, so behaviors
/// stay unit-testable without a running bus (`spec.md` §9's narrow
/// dependency-set note).
#[derive(Debug, Clone)]
pub struct Outbound {
    pub recipient: Recipient,
    pub kind: MessageKind,
    pub content: Value,
    pub priority: Priority,
}

impl Outbound {
    pub fn new(recipient: Recipient, kind: MessageKind, content: Value) -> Self {
        Self { recipient, kind, content, priority: Priority::Normal }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// The read-only blackboard snapshot `AgentRuntime` hands each tick: the
/// agent's own-layer document plus the global document.
#[derive(Debug, Clone)]
pub struct BlackboardView {
    pub own_layer: Document,
    pub global: Document,
}

/// The opaque work callback the kernel has no opinion on, per `spec.md`
/// §1's "LLM or tool-execution backend ... out of scope".
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task, view: &BlackboardView) -> Result<Value, String>;
}

/// External task decomposer a mid-layer behavior may consult; falls back
/// to round-robin over subordinates when absent or declining, per
/// `spec.md` §4.6.
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, task: &Task, subordinates: &[AgentId]) -> Option<HashMap<AgentId, Task>>;
}

#[derive(Debug, Clone)]
pub enum SignatureDecision {
    Approve,
    Veto(String),
}

/// The policy a top-layer behavior consults to review a pending signature
/// request, per `spec.md` §4.6 ("review pending signature_requests via the
/// Decision Engine"). The engine's own mutation logic lives in
/// `crate::decision`; this trait is the opinion-forming step upstream of
/// it.
#[async_trait]
pub trait SignaturePolicy: Send + Sync {
    async fn review(&self, decision_type: DecisionType, content: &Value) -> SignatureDecision;
}

/// A layer-specific per-tick behavior. `on_process` receives the drained
/// inbox and the blackboard view `AgentRuntime` prepared for this tick, and
/// may also write directly to the blackboard (e.g. aggregation, status
/// reports) since writes are not part of the cached read-only view.
#[async_trait]
pub trait Behavior: Send + Sync {
    async fn on_process(
        &self,
        agent: &mut Agent,
        messages: &[Message],
        view: &BlackboardView,
        blackboard: &Blackboard,
    ) -> Result<Vec<Outbound>, String>;

    async fn on_init(&self, _agent: &mut Agent) {}
    async fn on_shutdown(&self, _agent: &mut Agent) {}
}

/// Bottom-layer default behavior: executes at most one task at a time.
pub struct BottomBehavior {
    executor: std::sync::Arc<dyn Executor>,
    current_task: Mutex<Option<Task>>,
}

impl BottomBehavior {
    pub fn new(executor: std::sync::Arc<dyn Executor>) -> Self {
        Self { executor, current_task: Mutex::new(None) }
    }
}

#[async_trait]
impl Behavior for BottomBehavior {
    async fn on_process(
        &self,
        agent: &mut Agent,
        messages: &[Message],
        view: &BlackboardView,
        blackboard: &Blackboard,
    ) -> Result<Vec<Outbound>, String> {
        let mut outbound = Vec::new();
        let mut current = self.current_task.lock().await;

        for msg in messages {
            match msg.kind {
                MessageKind::TaskAssign if current.is_none() => match serde_json::from_value::<Task>(msg.content.clone()) {
                    Ok(task) => *current = Some(task),
                    Err(e) => warn!(error = %e, "task_assign with unparseable content"),
                },
                MessageKind::PeerHelpRequest => {
                    if current.is_none() {
                        outbound.push(Outbound::new(
                            Recipient::Agent(msg.sender),
                            MessageKind::PeerHelpResponse,
                            json!({"accepted": true}),
                        ));
                    } else {
                        outbound.push(Outbound::new(
                            Recipient::Agent(msg.sender),
                            MessageKind::PeerHelpResponse,
                            json!({"accepted": false, "section": view.own_layer.content}),
                        ));
                    }
                }
                MessageKind::StatusQuery => {
                    outbound.push(Outbound::new(
                        Recipient::Agent(msg.sender),
                        MessageKind::StatusReport,
                        json!({"status": agent.status.to_string(), "has_task": current.is_some()}),
                    ));
                }
                _ => {}
            }
        }

        if let Some(task) = current.clone() {
            let started = Instant::now();
            match self.executor.execute(&task, view).await {
                Ok(result) => {
                    let _ = blackboard
                        .write(
                            agent.own_scope(),
                            &agent.as_requester(),
                            format!("Completed `{}`: {result}", task.description),
                            view.own_layer.version,
                        )
                        .await;
                    agent.metrics.tasks_completed += 1;
                    agent.metrics.record_task_duration(started.elapsed().as_millis() as f64);
                    let supervisor = agent.supervisor.unwrap_or(agent.id);
                    outbound.push(Outbound::new(
                        Recipient::Agent(supervisor),
                        MessageKind::ProgressReport,
                        json!({"task_id": task.id, "status": "completed", "result": result}),
                    ));
                    *current = None;
                }
                Err(e) => {
                    agent.metrics.tasks_failed += 1;
                    let supervisor = agent.supervisor.unwrap_or(agent.id);
                    outbound.push(Outbound::new(
                        Recipient::Agent(supervisor),
                        MessageKind::ProgressReport,
                        json!({"task_id": task.id, "status": "failed", "error": e.clone()}),
                    ));
                    return Err(e);
                }
            }
        }

        Ok(outbound)
    }
}

/// Mid-layer default behavior: decomposes, delegates, aggregates, escalates.
pub struct MidBehavior {
    decomposer: Option<std::sync::Arc<dyn Decomposer>>,
    status_by_subordinate: Mutex<HashMap<AgentId, Value>>,
}

impl MidBehavior {
    pub fn new(decomposer: Option<std::sync::Arc<dyn Decomposer>>) -> Self {
        Self { decomposer, status_by_subordinate: Mutex::new(HashMap::new()) }
    }

    fn round_robin(task: &Task, subordinates: &[AgentId]) -> HashMap<AgentId, Task> {
        subordinates.iter().map(|s| (*s, task.clone())).collect()
    }
}

#[async_trait]
impl Behavior for MidBehavior {
    async fn on_process(
        &self,
        agent: &mut Agent,
        messages: &[Message],
        view: &BlackboardView,
        blackboard: &Blackboard,
    ) -> Result<Vec<Outbound>, String> {
        let mut outbound = Vec::new();
        let mut any_failed = false;
        let mut any_blocked = false;

        for msg in messages {
            match msg.kind {
                MessageKind::TaskAssign => {
                    let Ok(task) = serde_json::from_value::<Task>(msg.content.clone()) else {
                        warn!("task_assign with unparseable content");
                        continue;
                    };
                    let subordinates: Vec<AgentId> = agent.subordinates.iter().copied().collect();
                    let assignment = match &self.decomposer {
                        Some(d) => d.decompose(&task, &subordinates).await.unwrap_or_else(|| Self::round_robin(&task, &subordinates)),
                        None => Self::round_robin(&task, &subordinates),
                    };
                    for (subordinate, subtask) in assignment {
                        let content = serde_json::to_value(&subtask).map_err(|e| e.to_string())?;
                        outbound.push(Outbound::new(Recipient::Agent(subordinate), MessageKind::TaskAssign, content));
                    }
                }
                MessageKind::ProgressReport => {
                    let status = msg.content.get("status").and_then(Value::as_str).unwrap_or("");
                    any_failed |= status == "failed";
                    any_blocked |= status == "blocked";
                    self.status_by_subordinate.lock().await.insert(msg.sender, msg.content.clone());
                }
                MessageKind::PeerCoordination => {
                    outbound.push(Outbound::new(Recipient::Agent(msg.sender), MessageKind::PeerCoordinationResponse, json!({"ack": true})));
                }
                _ => {}
            }
        }

        if !self.status_by_subordinate.lock().await.is_empty() {
            let snapshot = self.status_by_subordinate.lock().await.clone();
            let summary = serde_json::to_string_pretty(&snapshot).unwrap_or_default();
            let _ = blackboard
                .append(agent.own_scope(), &agent.as_requester(), summary, view.own_layer.version)
                .await;
        }

        if any_failed || any_blocked {
            let severity = if any_failed { "high" } else { "medium" };
            if let Some(supervisor) = agent.supervisor {
                outbound.push(Outbound::new(
                    Recipient::Agent(supervisor),
                    MessageKind::IssueEscalation,
                    json!({"severity": severity}),
                ));
            }
        }

        // `heartbeats_responded` is incremented by the runtime after this
        // call returns, so the tick this summary fires on is the +1 value
        // (see `spec.md` §9's documented "drifts on missed ticks" note).
        if (agent.metrics.heartbeats_responded + 1) % 10 == 0 {
            if let Some(supervisor) = agent.supervisor {
                let snapshot = self.status_by_subordinate.lock().await.clone();
                outbound.push(Outbound::new(
                    Recipient::Agent(supervisor),
                    MessageKind::ProgressReport,
                    json!({"summary": snapshot}),
                ));
            }
        }

        Ok(outbound)
    }
}

/// Top-layer default behavior: signature review, progress aggregation,
/// conflict arbitration.
pub struct TopBehavior {
    policy: std::sync::Arc<dyn SignaturePolicy>,
}

impl TopBehavior {
    pub fn new(policy: std::sync::Arc<dyn SignaturePolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Behavior for TopBehavior {
    async fn on_process(
        &self,
        agent: &mut Agent,
        messages: &[Message],
        view: &BlackboardView,
        blackboard: &Blackboard,
    ) -> Result<Vec<Outbound>, String> {
        let mut outbound = Vec::new();

        for msg in messages {
            match msg.kind {
                MessageKind::SignatureRequest => {
                    let Some(decision_id) = msg.content.get("decision_id") else { continue };
                    let decision_type = msg
                        .content
                        .get("decision_type")
                        .and_then(Value::as_str)
                        .unwrap_or("technical_proposal");
                    let dt = match decision_type {
                        "task_allocation" => DecisionType::TaskAllocation,
                        "resource_adjustment" => DecisionType::ResourceAdjustment,
                        "milestone_confirmation" => DecisionType::MilestoneConfirmation,
                        _ => DecisionType::TechnicalProposal,
                    };
                    let decision = self.policy.review(dt, &msg.content).await;
                    let (kind, content) = match decision {
                        SignatureDecision::Approve => (MessageKind::SignatureApprove, json!({"decision_id": decision_id})),
                        SignatureDecision::Veto(reason) => {
                            (MessageKind::SignatureVeto, json!({"decision_id": decision_id, "reason": reason}))
                        }
                    };
                    outbound.push(Outbound::new(Recipient::System, kind, content));
                }
                MessageKind::ProgressReport => {
                    let entry = format!("{}: {}", msg.sender, msg.content);
                    let _ = blackboard.append(agent.own_scope(), &agent.as_requester(), entry, view.own_layer.version).await;
                }
                MessageKind::ConflictReport => {
                    let entry = format!("conflict resolved by {}: {}", agent.id, msg.content);
                    let _ = blackboard.append(crate::blackboard::Scope::Global, &agent.as_requester(), entry, view.global.version).await;
                    outbound.push(Outbound::new(
                        Recipient::Agent(msg.sender),
                        MessageKind::ArbitrationResult,
                        json!({"resolution": "recorded_to_global_board"}),
                    ));
                }
                _ => {}
            }
        }

        Ok(outbound)
    }
}
