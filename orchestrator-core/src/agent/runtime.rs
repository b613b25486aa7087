//! Per-agent lifecycle: init, tick loop, shutdown. See `spec.md` §4.6.

use super::behavior::{Behavior, BlackboardView};
use super::Agent;
use crate::blackboard::{Blackboard, Scope};
use crate::bus::MessageBus;
use crate::clock::TickListener;
use crate::governance::GovernanceEngine;
use crate::ids::DecisionId;
use crate::message::{Message, MessageKind, Priority, Recipient};
use crate::state::{transition, AgentState};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Drives one agent through `spec.md` §4.6's per-tick procedure. Wraps the
/// agent record, its behavior, and handles to the bus/blackboard it needs;
/// registered with the `HeartbeatClock` as a `TickListener`.
pub struct AgentRuntime {
    agent: Mutex<Agent>,
    behavior: Arc<dyn Behavior>,
    bus: Arc<MessageBus>,
    blackboard: Arc<Blackboard>,
    /// Set once by `TeamLifecycle::instantiate` after the engine exists.
    /// A top-layer behavior's signature review (`spec.md` §4.6: "review
    /// pending signature_requests via the Decision Engine") only takes
    /// effect once this is wired up; it is a `Recipient::System` message
    /// until then, recorded for stats but not otherwise acted on.
    governance: OnceCell<Arc<GovernanceEngine>>,
}

impl AgentRuntime {
    pub fn new(agent: Agent, behavior: Arc<dyn Behavior>, bus: Arc<MessageBus>, blackboard: Arc<Blackboard>) -> Self {
        Self { agent: Mutex::new(agent), behavior, bus, blackboard, governance: OnceCell::new() }
    }

    pub async fn set_governance(&self, governance: Arc<GovernanceEngine>) {
        let _ = self.governance.set(governance);
    }

    pub async fn agent_id(&self) -> crate::ids::AgentId {
        self.agent.lock().await.id
    }

    pub async fn snapshot(&self) -> Agent {
        self.agent.lock().await.clone()
    }

    /// Swaps a subordinate id in place, used by `TeamLifecycle::replace`
    /// to rewire supervisors onto a replacement agent.
    pub async fn replace_subordinate(&self, old: crate::ids::AgentId, new: crate::ids::AgentId) {
        let mut agent = self.agent.lock().await;
        if agent.subordinates.remove(&old) {
            agent.subordinates.insert(new);
        }
    }

    /// Registers with the bus and runs the agent's `on_init` hook,
    /// transitioning `initializing -> idle`.
    #[instrument(skip(self))]
    pub async fn init(&self, current_tick: u64) -> Result<(), crate::error::KernelError> {
        let mut agent = self.agent.lock().await;
        self.bus.register(agent.id, current_tick).await;
        self.behavior.on_init(&mut agent).await;
        let record = transition(agent.status, AgentState::Idle, "agent initialized")?;
        agent.status = record.to;
        info!(agent = %agent.id, "agent initialized");
        Ok(())
    }

    /// Transitions to `shutting_down`, runs `on_shutdown`, unregisters,
    /// transitions to `terminated`. A no-op on the final transition if the
    /// agent is already terminated (e.g. dismissed by Accountability before
    /// `TeamLifecycle::replace` tears it down).
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), crate::error::KernelError> {
        let mut agent = self.agent.lock().await;
        if agent.status.allows(AgentState::ShuttingDown) {
            let record = transition(agent.status, AgentState::ShuttingDown, "shutdown requested")?;
            agent.status = record.to;
        }
        self.behavior.on_shutdown(&mut agent).await;
        self.bus.unregister(agent.id).await;
        if agent.status != AgentState::Terminated {
            let record = transition(agent.status, AgentState::Terminated, "shutdown complete")?;
            agent.status = record.to;
        }
        info!(agent = %agent.id, "agent terminated");
        Ok(())
    }

    /// Locks the agent record for an in-place mutation, used by
    /// `TeamLifecycle` to apply `accountability.rs`/election effects without
    /// the agent module knowing about governance types.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut Agent) -> R) -> R {
        let mut agent = self.agent.lock().await;
        f(&mut agent)
    }

    async fn blackboard_view(&self, agent: &Agent) -> BlackboardView {
        let requester = agent.as_requester();
        let own_layer = self.blackboard.read(agent.own_scope(), &requester).await.unwrap_or_else(|_| crate::blackboard::Document {
            content: String::new(),
            version: 0,
            last_modified_by: None,
        });
        let global = self.blackboard.read(Scope::Global, &requester).await.unwrap_or_else(|_| crate::blackboard::Document {
            content: String::new(),
            version: 0,
            last_modified_by: None,
        });
        BlackboardView { own_layer, global }
    }

    /// One tick of `spec.md` §4.6's procedure. Returns the outbound messages
    /// the caller (Team Lifecycle) should hand to the bus for this agent's
    /// next send, plus the `heartbeat_ack`.
    async fn process_tick(&self, tick: u64) -> Result<Vec<Message>, String> {
        let messages = self.bus.get_messages(self.agent_id().await).await;
        let mut agent = self.agent.lock().await;

        if !messages.is_empty() && agent.status == AgentState::Idle {
            if let Ok(record) = transition(agent.status, AgentState::Working, "messages arrived") {
                agent.status = record.to;
            }
        }

        let view = self.blackboard_view(&agent).await;

        let result = self.behavior.on_process(&mut agent, &messages, &view, &self.blackboard).await;

        let message_count = messages.len() as u64;
        agent.metrics.messages_processed += message_count;
        agent.metrics.last_active_tick = tick;

        let mut outbound_messages = Vec::new();

        match result {
            Ok(outbound) => {
                agent.metrics.heartbeats_responded += 1;
                for o in outbound {
                    outbound_messages.push(
                        Message::builder(agent.id, o.recipient, agent.task_id, o.kind)
                            .content(o.content)
                            .priority(o.priority)
                            .origin_tick(tick)
                            .build(chrono::Utc::now().timestamp_millis()),
                    );
                }
                if agent.status == AgentState::Working {
                    if let Ok(record) = transition(agent.status, AgentState::Idle, "tick processed") {
                        agent.status = record.to;
                    }
                }
                agent.retry_count = 0;
            }
            Err(e) => {
                agent.metrics.heartbeats_missed += 1;
                warn!(agent = %agent.id, error = %e, "agent behavior failed");
                agent.retry_count += 1;
                return Err(e);
            }
        }

        outbound_messages.push(
            Message::builder(agent.id, Recipient::System, agent.task_id, crate::message::MessageKind::HeartbeatAck)
                .content(json!({"tick": tick}))
                .priority(Priority::Low)
                .origin_tick(tick)
                .build(chrono::Utc::now().timestamp_millis()),
        );

        let reviewer = agent.id;
        drop(agent);
        if let Some(governance) = self.governance.get() {
            for message in &outbound_messages {
                if message.recipient != Recipient::System {
                    continue;
                }
                let Some(decision_id) = message.content.get("decision_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()).map(DecisionId)
                else {
                    continue;
                };
                match message.kind {
                    MessageKind::SignatureApprove => {
                        if let Err(e) = governance.sign(decision_id, reviewer, tick).await {
                            warn!(agent = %reviewer, error = %e, "signature review approval rejected by decision engine");
                        }
                    }
                    MessageKind::SignatureVeto => {
                        let reason = message.content.get("reason").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        if let Err(e) = governance.veto(decision_id, reviewer, reason, tick).await {
                            warn!(agent = %reviewer, error = %e, "signature review veto rejected by decision engine");
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(outbound_messages)
    }
}

#[async_trait]
impl TickListener for AgentRuntime {
    async fn on_tick(&self, tick: u64) -> Result<(), String> {
        let outbound = self.process_tick(tick).await?;
        for message in outbound {
            if let Err(e) = self.bus.send(message, tick, chrono::Utc::now().timestamp_millis()).await {
                warn!(error = %e, "failed to route outbound message");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::behavior::{SignatureDecision, SignaturePolicy, TopBehavior};
    use crate::agent::{LayerAttributes, PowerKind, TopAttributes};
    use crate::blackboard::Blackboard;
    use crate::bus::{BusConfig, MessageBus};
    use crate::decision::{DecisionStatus, DecisionType, ProposeRequest};
    use crate::governance::GovernanceConfig;
    use crate::ids::TaskId;
    use crate::repo::Repositories;
    use serde_json::json;
    use std::collections::HashSet;

    struct AlwaysVeto;

    #[async_trait]
    impl SignaturePolicy for AlwaysVeto {
        async fn review(&self, _decision_type: DecisionType, _content: &serde_json::Value) -> SignatureDecision {
            SignatureDecision::Veto("not convinced".into())
        }
    }

    /// A top agent's autonomous signature review must reach the decision
    /// engine, not just land as a stats-only `Recipient::System` message.
    #[tokio::test]
    async fn signature_review_veto_is_applied_to_the_decision_engine() {
        let task_id = TaskId::new();
        let bus = Arc::new(MessageBus::new(task_id, BusConfig::default(), None));
        let blackboard = Arc::new(Blackboard::new(None, None));
        let repos = Repositories::in_memory();
        let governance = GovernanceEngine::new(
            task_id,
            bus.clone(),
            repos.clone(),
            GovernanceConfig { decision_timeout_ms: 600_000, enable_reminders: false },
        );

        let reviewer = Agent::new(
            task_id,
            "alpha",
            "power-a",
            LayerAttributes::Top(TopAttributes {
                power_kind: PowerKind::A,
                vote_weight: 1,
                signature_authority: HashSet::from(["technical_proposal".to_string()]),
            }),
            HashSet::new(),
        );
        let reviewer_id = reviewer.id;

        let runtime = Arc::new(AgentRuntime::new(reviewer, Arc::new(TopBehavior::new(Arc::new(AlwaysVeto))), bus.clone(), blackboard));
        runtime.set_governance(governance.clone()).await;
        runtime.init(0).await.unwrap();

        let proposer = crate::ids::AgentId::new();
        bus.register(proposer, 0).await;
        let decision_id = governance
            .propose(
                ProposeRequest {
                    proposer,
                    decision_type: DecisionType::TechnicalProposal,
                    content: json!({"proposal": "use tokio"}),
                    required_signers: vec![reviewer_id],
                },
                0,
            )
            .await
            .unwrap();
        bus.flush().await;

        runtime.on_tick(1).await.unwrap();
        bus.flush().await;

        let stored = repos.decisions.get_decision(decision_id).await.unwrap().unwrap();
        assert_eq!(stored.status, DecisionStatus::Rejected);
    }
}
