//! Wires the pure `decision`/`accountability` effects into real bus sends
//! and persisted rows, and schedules the decision timeout + reminder series
//! from `spec.md` §4.7. `election.rs`'s outcomes are dispatched by
//! `team::TeamLifecycle::run_elections`, which already holds the agent
//! runtimes this module has no business touching directly.
//!
//! Grounded on `knhk-swarm::core::swarm.rs`'s `AgentSwarm`: a thin owning
//! struct that holds the bus/coordinator/consensus handles an embedder
//! assembled elsewhere and only translates between domain events and wire
//! messages, never reaching into another component's internals.

use crate::accountability::AccountabilityEffect;
use crate::bus::MessageBus;
use crate::decision::{self, Appeal, Decision, DecisionEffect, ProposeRequest, Vote};
use crate::domain::{AuditEvent, AuditEventType};
use crate::error::{KernelError, KernelResult};
use crate::ids::{AgentId, AppealId, DecisionId, TaskId};
use crate::message::{Message, MessageKind, Priority, Recipient};
use crate::repo::Repositories;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Sender id stamped on kernel-originated notifications (reminders, appeal
/// results, accountability/election notices) that did not come from any
/// particular agent.
fn system_sender() -> AgentId {
    AgentId(Uuid::nil())
}

#[derive(Debug, Clone, Copy)]
pub struct GovernanceConfig {
    pub decision_timeout_ms: u64,
    pub enable_reminders: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { decision_timeout_ms: 300_000, enable_reminders: true }
    }
}

/// Owns the live decision/appeal tables for one task and turns `decision.rs`
/// effects into bus sends plus `Repositories` writes. See `spec.md` §4.7 and
/// §9's "correlation-id + bounded timer" design note.
pub struct GovernanceEngine {
    task_id: TaskId,
    bus: Arc<MessageBus>,
    repos: Repositories,
    config: GovernanceConfig,
    decisions: Mutex<HashMap<DecisionId, Decision>>,
    appeals: Mutex<HashMap<AppealId, Appeal>>,
}

impl GovernanceEngine {
    pub fn new(task_id: TaskId, bus: Arc<MessageBus>, repos: Repositories, config: GovernanceConfig) -> Arc<Self> {
        Arc::new(Self {
            task_id,
            bus,
            repos,
            config,
            decisions: Mutex::new(HashMap::new()),
            appeals: Mutex::new(HashMap::new()),
        })
    }

    #[instrument(skip(self, req))]
    pub async fn propose(self: &Arc<Self>, req: ProposeRequest, tick: u64) -> KernelResult<DecisionId> {
        let (decision, effects) = decision::propose(self.task_id, req)?;
        let id = decision.id;
        self.repos.decisions.save_decision(&decision).await?;
        self.decisions.lock().await.insert(id, decision);
        self.dispatch(effects, tick).await;
        self.schedule_timeout(id);
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn sign(&self, decision_id: DecisionId, signer: AgentId, tick: u64) -> KernelResult<()> {
        let effects = {
            let mut decisions = self.decisions.lock().await;
            let decision = decisions
                .get_mut(&decision_id)
                .ok_or_else(|| KernelError::Validation(format!("unknown decision {decision_id}")))?;
            let effects = decision::sign(decision, signer)?;
            self.repos.decisions.save_decision(decision).await?;
            effects
        };
        self.dispatch(effects, tick).await;
        Ok(())
    }

    #[instrument(skip(self, reason))]
    pub async fn veto(&self, decision_id: DecisionId, vetoer: AgentId, reason: impl Into<String>, tick: u64) -> KernelResult<()> {
        let reason = reason.into();
        let audit_reason = reason.clone();
        let effects = {
            let mut decisions = self.decisions.lock().await;
            let decision = decisions
                .get_mut(&decision_id)
                .ok_or_else(|| KernelError::Validation(format!("unknown decision {decision_id}")))?;
            let effects = decision::veto(decision, vetoer, reason)?;
            self.repos.decisions.save_decision(decision).await?;
            effects
        };
        let _ = self
            .repos
            .audits
            .append_audit(&AuditEvent::new(self.task_id, vetoer, AuditEventType::Veto, audit_reason, None))
            .await;
        self.dispatch(effects, tick).await;
        Ok(())
    }

    #[instrument(skip(self, arguments, roster))]
    pub async fn appeal(
        &self,
        decision_id: DecisionId,
        appealer: AgentId,
        arguments: impl Into<String>,
        roster: &[AgentId],
        tick: u64,
    ) -> KernelResult<AppealId> {
        let arguments = arguments.into();
        let (appeal, effects) = {
            let mut decisions = self.decisions.lock().await;
            let decision = decisions
                .get_mut(&decision_id)
                .ok_or_else(|| KernelError::Validation(format!("unknown decision {decision_id}")))?;
            let (appeal, effects) = decision::appeal(decision, appealer, arguments, roster)?;
            self.repos.decisions.save_decision(decision).await?;
            (appeal, effects)
        };
        let id = appeal.id;
        self.repos.appeals.save_appeal(&appeal).await?;
        self.appeals.lock().await.insert(id, appeal);
        self.dispatch(effects, tick).await;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn cast_appeal_vote(&self, appeal_id: AppealId, voter: AgentId, vote: Vote, roster_size: usize, tick: u64) -> KernelResult<()> {
        let effects = {
            let mut appeals = self.appeals.lock().await;
            let appeal = appeals
                .get_mut(&appeal_id)
                .ok_or_else(|| KernelError::AppealRejected(format!("unknown appeal {appeal_id}")))?;
            let mut decisions = self.decisions.lock().await;
            let decision = decisions
                .get_mut(&appeal.decision_id)
                .ok_or_else(|| KernelError::Validation(format!("unknown decision {}", appeal.decision_id)))?;
            let effects = decision::cast_appeal_vote(appeal, decision, voter, vote, roster_size)?;
            self.repos.appeals.save_appeal(appeal).await?;
            self.repos.decisions.save_decision(decision).await?;
            effects
        };
        self.dispatch(effects, tick).await;
        Ok(())
    }

    async fn handle_timeout(self: Arc<Self>, decision_id: DecisionId) {
        let effects = {
            let mut decisions = self.decisions.lock().await;
            let Some(decision) = decisions.get_mut(&decision_id) else { return };
            match decision::timeout(decision) {
                Ok(effects) if !effects.is_empty() => {
                    if let Err(e) = self.repos.decisions.save_decision(decision).await {
                        warn!(error = %e, "failed to persist timed-out decision");
                    }
                    effects
                }
                _ => return,
            }
        };
        self.dispatch(effects, 0).await;
    }

    /// Spawns the background timer described in `spec.md` §4.7: a `HIGH`
    /// reminder at 2/3 elapsed, an `URGENT` reminder at 5/6 elapsed, then
    /// the timeout itself. A decision resolved before it fires leaves the
    /// timer to find nothing to do (checked via `DecisionStatus::Pending`).
    fn schedule_timeout(self: &Arc<Self>, decision_id: DecisionId) {
        let engine = self.clone();
        let timeout_ms = self.config.decision_timeout_ms;
        let enable_reminders = self.config.enable_reminders;
        tokio::spawn(async move {
            if enable_reminders && timeout_ms >= 6 {
                tokio::time::sleep(Duration::from_millis(timeout_ms * 2 / 3)).await;
                engine.send_reminder(decision_id, Priority::High).await;
                tokio::time::sleep(Duration::from_millis(timeout_ms * 5 / 6 - timeout_ms * 2 / 3)).await;
                engine.send_reminder(decision_id, Priority::Urgent).await;
                tokio::time::sleep(Duration::from_millis(timeout_ms - timeout_ms * 5 / 6)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            }
            engine.handle_timeout(decision_id).await;
        });
    }

    async fn send_reminder(&self, decision_id: DecisionId, priority: Priority) {
        let pending_signers = {
            let decisions = self.decisions.lock().await;
            let Some(decision) = decisions.get(&decision_id) else { return };
            if decision.status != decision::DecisionStatus::Pending {
                return;
            }
            decision
                .required_signers
                .iter()
                .copied()
                .filter(|s| !decision.signers.contains(s) && !decision.vetoers.contains(s))
                .collect::<Vec<_>>()
        };
        for signer in pending_signers {
            let msg = Message::builder(system_sender(), Recipient::Agent(signer), self.task_id, MessageKind::SignatureRequest)
                .content(json!({"decision_id": decision_id.to_string(), "reminder": true}))
                .priority(priority)
                .build(chrono::Utc::now().timestamp_millis());
            if let Err(e) = self.bus.send(msg, 0, chrono::Utc::now().timestamp_millis()).await {
                warn!(error = %e, "failed to send signature reminder");
            }
        }
    }

    async fn dispatch(&self, effects: Vec<DecisionEffect>, tick: u64) {
        for effect in effects {
            let (recipient, kind, content, priority) = match effect {
                DecisionEffect::SignatureRequested { decision_id, signer } => (
                    signer,
                    MessageKind::SignatureRequest,
                    json!({"decision_id": decision_id.to_string()}),
                    Priority::Normal,
                ),
                DecisionEffect::Approved { decision_id, proposer } => (
                    proposer,
                    MessageKind::SignatureApprove,
                    json!({"decision_id": decision_id.to_string()}),
                    Priority::Normal,
                ),
                DecisionEffect::Rejected { decision_id, proposer, reason } => (
                    proposer,
                    MessageKind::SignatureVeto,
                    json!({"decision_id": decision_id.to_string(), "reason": reason}),
                    Priority::Normal,
                ),
                DecisionEffect::VoteRequested { appeal_id, voter } => (
                    voter,
                    MessageKind::VoteRequest,
                    json!({"appeal_id": appeal_id.to_string()}),
                    Priority::High,
                ),
                DecisionEffect::AppealResolved { decision_id, proposer, result } => (
                    proposer,
                    MessageKind::AppealResult,
                    json!({"decision_id": decision_id.to_string(), "result": format!("{result:?}")}),
                    Priority::Normal,
                ),
            };
            let msg = Message::builder(system_sender(), Recipient::Agent(recipient), self.task_id, kind)
                .content(content)
                .priority(priority)
                .origin_tick(tick)
                .build(chrono::Utc::now().timestamp_millis());
            if let Err(e) = self.bus.send(msg, tick, chrono::Utc::now().timestamp_millis()).await {
                warn!(error = %e, "failed to dispatch decision effect");
            }
        }
    }
}

/// Translates `accountability.rs` effects into bus notifications and audit
/// rows; returns the agent ids whose `RequestReplacement` effect the caller
/// (`TeamLifecycle`) must act on, since only it owns the runtime map and
/// `BehaviorFactory` needed to actually spin up a replacement.
#[instrument(skip(bus, repos, effects))]
pub async fn dispatch_accountability(
    task_id: TaskId,
    bus: &MessageBus,
    repos: &Repositories,
    effects: Vec<AccountabilityEffect>,
    tick: u64,
) -> Vec<AgentId> {
    let mut to_replace = Vec::new();
    for effect in effects {
        match effect {
            AccountabilityEffect::AuditWarning { agent, reason } => {
                let _ = repos.audits.append_audit(&AuditEvent::new(task_id, agent, AuditEventType::Warning, reason, None)).await;
            }
            AccountabilityEffect::AuditDemotion { agent, reason } => {
                let _ = repos.audits.append_audit(&AuditEvent::new(task_id, agent, AuditEventType::Demotion, reason, None)).await;
            }
            AccountabilityEffect::AuditDismissal { agent, reason } => {
                let _ = repos.audits.append_audit(&AuditEvent::new(task_id, agent, AuditEventType::Dismissal, reason, None)).await;
            }
            AccountabilityEffect::NotifyWarningIssue { agent } => {
                send_notice(bus, task_id, agent, MessageKind::WarningIssue, Priority::Urgent, tick).await;
            }
            AccountabilityEffect::NotifyDemotionNotice { agent } => {
                send_notice(bus, task_id, agent, MessageKind::DemotionNotice, Priority::Urgent, tick).await;
            }
            AccountabilityEffect::NotifyDismissalNotice { supervisor } => {
                send_notice(bus, task_id, supervisor, MessageKind::DismissalNotice, Priority::Urgent, tick).await;
            }
            AccountabilityEffect::RequestReplacement { agent } => to_replace.push(agent),
        }
    }
    to_replace
}

async fn send_notice(bus: &MessageBus, task_id: TaskId, recipient: AgentId, kind: MessageKind, priority: Priority, tick: u64) {
    let msg = Message::builder(system_sender(), Recipient::Agent(recipient), task_id, kind)
        .content(json!({}))
        .priority(priority)
        .origin_tick(tick)
        .build(chrono::Utc::now().timestamp_millis());
    if let Err(e) = bus.send(msg, tick, chrono::Utc::now().timestamp_millis()).await {
        warn!(error = %e, "failed to dispatch accountability notice");
    }
}
