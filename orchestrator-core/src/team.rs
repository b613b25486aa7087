//! Team Lifecycle: instantiate a team from a blueprint, own its clock and
//! runtimes, handle pause/resume/cancel/complete/fail/replace. See
//! `spec.md` §4.12.

use crate::accountability::{self, AccountabilityConfig, AccountabilityEffect};
use crate::agent::behavior::Behavior;
use crate::agent::runtime::AgentRuntime;
use crate::agent::{Agent, BottomAttributes, Capability, Layer, LayerAttributes, MidAttributes, TopAttributes};
use crate::blackboard::Blackboard;
use crate::bus::{BusConfig, MessageBus};
use crate::clock::{HeartbeatClock, TickListener};
use crate::decision::{ProposeRequest, Vote};
use crate::domain::{AuditEvent, AuditEventType, Task, TaskStatus};
use crate::election::{self, ElectionAction, ElectionThresholds};
use crate::error::{KernelError, KernelResult};
use crate::governance::{self, GovernanceConfig, GovernanceEngine};
use crate::ids::{AgentId, AppealId, DecisionId};
use crate::message::{Message, MessageKind, Priority, Recipient};
use crate::repo::Repositories;
use crate::scorer;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RoleBlueprint {
    pub name: String,
    pub role: String,
    pub capabilities: HashSet<Capability>,
    pub attributes: LayerAttributes,
}

/// A validated team shape, per `spec.md` §4.12: top exactly 3, mid 2-5,
/// bottom 1-50.
#[derive(Debug, Clone)]
pub struct TeamBlueprint {
    pub top: Vec<RoleBlueprint>,
    pub mid: Vec<RoleBlueprint>,
    pub bottom: Vec<RoleBlueprint>,
}

impl TeamBlueprint {
    pub fn validate(&self) -> KernelResult<()> {
        if self.top.len() != 3 {
            return Err(KernelError::Validation("top layer must have exactly 3 roles".into()));
        }
        for role in &self.top {
            if !matches!(role.attributes, LayerAttributes::Top(_)) {
                return Err(KernelError::Validation("top role must carry top attributes".into()));
            }
            if !role.capabilities.contains(&Capability::Arbitrate) {
                return Err(KernelError::Validation("top role must have the arbitrate capability".into()));
            }
        }
        if !(2..=5).contains(&self.mid.len()) {
            return Err(KernelError::Validation("mid layer must have 2-5 roles".into()));
        }
        let mut domains = HashSet::new();
        for role in &self.mid {
            let LayerAttributes::Mid(attrs) = &role.attributes else {
                return Err(KernelError::Validation("mid role must carry mid attributes".into()));
            };
            if !domains.insert(attrs.domain.clone()) {
                return Err(KernelError::Validation(format!("duplicate mid domain: {}", attrs.domain)));
            }
            if !role.capabilities.contains(&Capability::Delegate) {
                return Err(KernelError::Validation("mid role must have the delegate capability".into()));
            }
        }
        if self.bottom.is_empty() || self.bottom.len() > 50 {
            return Err(KernelError::Validation("bottom layer must have 1-50 roles".into()));
        }
        for role in &self.bottom {
            if !matches!(role.attributes, LayerAttributes::Bottom(_)) {
                return Err(KernelError::Validation("bottom role must carry bottom attributes".into()));
            }
            if !role.capabilities.contains(&Capability::Execute) {
                return Err(KernelError::Validation("bottom role must have the execute capability".into()));
            }
        }
        Ok(())
    }
}

/// Supplies the `Behavior` instance for each layer; lets an embedder inject
/// its executor/decomposer/signature-policy without the lifecycle needing
/// to know about them.
pub trait BehaviorFactory: Send + Sync {
    fn top(&self) -> Arc<dyn Behavior>;
    fn mid(&self) -> Arc<dyn Behavior>;
    fn bottom(&self) -> Arc<dyn Behavior>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamState {
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

/// Bundles every ambient knob `instantiate` needs beyond the blueprint
/// itself, mirroring the defaults in `orchestrator-config`'s schema (an
/// embedder is expected to build this from a loaded `OrchestratorConfig`;
/// the config crate stays a standalone leaf per `spec.md` §1's "CLI/TUI/
/// packaging remain external").
#[derive(Clone)]
pub struct TeamConfig {
    pub heartbeat_interval_ms: u64,
    pub bus: BusConfig,
    pub workspace_dir: Option<PathBuf>,
    pub accountability: AccountabilityConfig,
    pub election_thresholds: ElectionThresholds,
    pub election_interval_ticks: u64,
    pub governance: GovernanceConfig,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 4000,
            bus: BusConfig::default(),
            workspace_dir: None,
            accountability: AccountabilityConfig::default(),
            election_thresholds: ElectionThresholds::default(),
            election_interval_ticks: 50,
            governance: GovernanceConfig::default(),
        }
    }
}

/// Owns one task's full agent graph, bus, blackboard, clock, and the
/// governance engine that wires decisions/accountability/elections into
/// bus sends and persisted rows.
pub struct TeamLifecycle {
    pub task: RwLock<Task>,
    pub bus: Arc<MessageBus>,
    pub blackboard: Arc<Blackboard>,
    pub clock: Arc<HeartbeatClock>,
    pub governance: Arc<GovernanceEngine>,
    runtimes: RwLock<HashMap<AgentId, Arc<AgentRuntime>>>,
    state: RwLock<TeamState>,
    repos: Repositories,
    behaviors: Arc<dyn BehaviorFactory>,
    accountability_config: AccountabilityConfig,
    election_thresholds: ElectionThresholds,
    election_interval_ticks: u64,
}

/// Drives `TeamLifecycle::run_elections` off the heartbeat clock every
/// `election_interval_ticks`. Holds a `Weak` reference so registering it
/// with the clock (which the lifecycle itself owns) does not leak a
/// reference cycle.
struct ElectionTicker {
    lifecycle: Weak<TeamLifecycle>,
    interval_ticks: u64,
}

#[async_trait]
impl TickListener for ElectionTicker {
    async fn on_tick(&self, tick: u64) -> Result<(), String> {
        if self.interval_ticks == 0 || tick == 0 || tick % self.interval_ticks != 0 {
            return Ok(());
        }
        let Some(lifecycle) = self.lifecycle.upgrade() else { return Ok(()) };
        lifecycle.run_elections(tick).await.map_err(|e| e.to_string())
    }
}

/// Moves the tick's staged bus deliveries into live inboxes. Registered as
/// the clock's last `TickListener` so it runs only after every agent's
/// `on_process` for tick `k` has completed, keeping the §5 invariant that a
/// message produced during tick `k` is never visible before tick `k+1`.
struct BusFlushTicker {
    bus: Arc<MessageBus>,
}

#[async_trait]
impl TickListener for BusFlushTicker {
    async fn on_tick(&self, _tick: u64) -> Result<(), String> {
        self.bus.flush().await;
        Ok(())
    }
}

/// Checks bus liveness every tick and emits a single batched `timeout`
/// event for whichever agents exceeded `timeout_threshold_ticks`, per
/// `spec.md` §4.3's "detect timeouts" bus responsibility. Registered before
/// `BusFlushTicker` so a timeout notification raised in tick `k` is staged
/// alongside that tick's other sends and becomes visible in tick `k+1`,
/// same as everything else the bus routes. The actual liveness check and
/// message construction live on `MessageBus::check_and_emit_timeouts` so bus
/// tests can exercise the same path without a full team/clock setup.
struct LivenessTicker {
    bus: Arc<MessageBus>,
}

#[async_trait]
impl TickListener for LivenessTicker {
    async fn on_tick(&self, tick: u64) -> Result<(), String> {
        self.bus.check_and_emit_timeouts(tick).await;
        Ok(())
    }
}

impl TeamLifecycle {
    /// Validates the blueprint, instantiates agents, wires the
    /// supervisor/subordinate graph, registers each with the bus, and
    /// starts the clock.
    #[instrument(skip(blueprint, behaviors, config))]
    pub async fn instantiate(
        task: Task,
        blueprint: TeamBlueprint,
        behaviors: Arc<dyn BehaviorFactory>,
        repos: Repositories,
        config: TeamConfig,
    ) -> KernelResult<Arc<Self>> {
        blueprint.validate()?;

        let bus = Arc::new(MessageBus::new(task.id, config.bus.clone(), Some(repos.messages.clone())));
        let blackboard = Arc::new(Blackboard::new(config.workspace_dir.clone(), None));
        let clock = Arc::new(HeartbeatClock::new(config.heartbeat_interval_ms));

        let mut top_agents = Vec::new();
        for role in &blueprint.top {
            top_agents.push(Agent::new(task.id, role.name.clone(), role.role.clone(), role.attributes.clone(), role.capabilities.clone()));
        }

        let mut mid_agents = Vec::new();
        for role in &blueprint.mid {
            let mut agent = Agent::new(task.id, role.name.clone(), role.role.clone(), role.attributes.clone(), role.capabilities.clone());
            // Mids round-robin across tops.
            let top_idx = mid_agents.len() % top_agents.len();
            agent.supervisor = Some(top_agents[top_idx].id);
            mid_agents.push(agent);
        }
        for (idx, top) in top_agents.iter_mut().enumerate() {
            let subs = mid_agents
                .iter()
                .enumerate()
                .filter(|(i, _)| i % top_agents.len() == idx)
                .map(|(_, a)| a.id);
            top.subordinates.extend(subs);
        }

        let mut bottom_agents = Vec::new();
        for role in &blueprint.bottom {
            let mut agent = Agent::new(task.id, role.name.clone(), role.role.clone(), role.attributes.clone(), role.capabilities.clone());
            // Attach to the mid whose domain matches the agent name's
            // prefix, else the first mid, per `spec.md` §4.12.
            let supervisor_idx = mid_agents
                .iter()
                .position(|m| match &m.attributes {
                    LayerAttributes::Mid(attrs) => role.name.starts_with(&attrs.domain),
                    _ => false,
                })
                .unwrap_or(0);
            agent.supervisor = Some(mid_agents[supervisor_idx].id);
            bottom_agents.push((agent, supervisor_idx));
        }
        for (idx, mid) in mid_agents.iter_mut().enumerate() {
            let subs = bottom_agents.iter().filter(|(_, sup)| *sup == idx).map(|(a, _)| a.id);
            mid.subordinates.extend(subs);
        }

        // Created before the runtimes so each `AgentRuntime` can be wired to
        // it below — a top-layer behavior's signature review needs a live
        // engine to act on, not just a dead-end `Recipient::System` message.
        let governance = GovernanceEngine::new(task.id, bus.clone(), repos.clone(), config.governance);

        let mut runtimes = HashMap::new();
        for agent in top_agents {
            let id = agent.id;
            repos.agents.save_agent(&agent).await?;
            let runtime = Arc::new(AgentRuntime::new(agent, behaviors.top(), bus.clone(), blackboard.clone()));
            runtime.set_governance(governance.clone()).await;
            runtime.init(clock.current_tick()).await?;
            clock.register(runtime.clone()).await;
            runtimes.insert(id, runtime);
        }
        for agent in mid_agents {
            let id = agent.id;
            repos.agents.save_agent(&agent).await?;
            let runtime = Arc::new(AgentRuntime::new(agent, behaviors.mid(), bus.clone(), blackboard.clone()));
            runtime.init(clock.current_tick()).await?;
            clock.register(runtime.clone()).await;
            runtimes.insert(id, runtime);
        }
        for (agent, _) in bottom_agents {
            let id = agent.id;
            repos.agents.save_agent(&agent).await?;
            let runtime = Arc::new(AgentRuntime::new(agent, behaviors.bottom(), bus.clone(), blackboard.clone()));
            runtime.init(clock.current_tick()).await?;
            clock.register(runtime.clone()).await;
            runtimes.insert(id, runtime);
        }

        let mut task = task;
        task.status = TaskStatus::Running;
        repos.tasks.save_task(&task).await?;

        let lifecycle = Arc::new(Self {
            task: RwLock::new(task),
            bus,
            blackboard,
            clock: clock.clone(),
            governance,
            runtimes: RwLock::new(runtimes),
            state: RwLock::new(TeamState::Running),
            repos,
            behaviors,
            accountability_config: config.accountability,
            election_thresholds: config.election_thresholds,
            election_interval_ticks: config.election_interval_ticks,
        });

        clock
            .register(Arc::new(ElectionTicker { lifecycle: Arc::downgrade(&lifecycle), interval_ticks: lifecycle.election_interval_ticks }))
            .await;
        clock
            .register(Arc::new(LivenessTicker { bus: lifecycle.bus.clone() }))
            .await;
        // Must be registered after every agent runtime, the election ticker,
        // and the liveness ticker so it observes the tick's full set of
        // staged sends, including any timeout event just raised.
        clock.register(Arc::new(BusFlushTicker { bus: lifecycle.bus.clone() })).await;

        clock.start().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        info!(task = %lifecycle.task.read().await.id, "team instantiated");
        Ok(lifecycle)
    }

    pub async fn agent_ids(&self) -> Vec<AgentId> {
        self.runtimes.read().await.keys().copied().collect()
    }

    pub async fn pause(&self) {
        self.clock.stop().await;
        *self.state.write().await = TeamState::Paused;
    }

    pub async fn resume(&self) -> KernelResult<()> {
        self.clock.start().await.map_err(|e| KernelError::Internal(e.to_string()))?;
        *self.state.write().await = TeamState::Running;
        Ok(())
    }

    /// Shuts down every agent in arbitrary order (awaiting each),
    /// transitions the task to `cancelled`.
    pub async fn cancel(&self) -> KernelResult<()> {
        self.dissolve_team().await?;
        self.task.write().await.status = TaskStatus::Cancelled;
        *self.state.write().await = TeamState::Cancelled;
        Ok(())
    }

    pub async fn complete(&self) -> KernelResult<()> {
        self.dissolve_team().await?;
        let mut task = self.task.write().await;
        task.status = TaskStatus::Completed;
        task.completed_at = Some(chrono::Utc::now());
        *self.state.write().await = TeamState::Completed;
        Ok(())
    }

    pub async fn fail(&self, _reason: impl Into<String>) -> KernelResult<()> {
        self.dissolve_team().await?;
        self.task.write().await.status = TaskStatus::Failed;
        *self.state.write().await = TeamState::Failed;
        Ok(())
    }

    async fn dissolve_team(&self) -> KernelResult<()> {
        self.clock.stop().await;
        let runtimes = self.runtimes.read().await;
        for runtime in runtimes.values() {
            runtime.shutdown().await?;
        }
        Ok(())
    }

    /// Replaces an agent with a fresh identity and the same config, minus
    /// subordinates; rewires supervisor and inherits subordinates. Does not
    /// attempt to recover in-flight task state (`spec.md` §9, open question
    /// resolved conservatively).
    pub async fn replace(&self, agent_id: AgentId, behavior: Arc<dyn Behavior>) -> KernelResult<AgentId> {
        let mut runtimes = self.runtimes.write().await;
        let old_runtime = runtimes.remove(&agent_id).ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
        let old = old_runtime.snapshot().await;
        old_runtime.shutdown().await?;

        let mut replacement = Agent::new(old.task_id, old.name.clone(), old.role.clone(), old.attributes.clone(), old.capabilities.clone());
        replacement.supervisor = old.supervisor;
        replacement.config = old.config.clone();
        let new_id = replacement.id;

        let runtime = Arc::new(AgentRuntime::new(replacement, behavior, self.bus.clone(), self.blackboard.clone()));
        runtime.set_governance(self.governance.clone()).await;
        runtime.init(self.clock.current_tick()).await?;
        self.clock.register(runtime.clone()).await;
        runtimes.insert(new_id, runtime);

        // Rewire anyone who listed `agent_id` as a subordinate.
        for other in runtimes.values() {
            other.replace_subordinate(agent_id, new_id).await;
        }

        Ok(new_id)
    }

    /// Every currently-live top-layer agent id, used as the voting roster
    /// for appeals (`spec.md` §4.7: "the top layer votes").
    pub async fn top_roster(&self) -> Vec<AgentId> {
        let runtimes = self.runtimes.read().await;
        let mut roster = Vec::new();
        for runtime in runtimes.values() {
            let agent = runtime.snapshot().await;
            if agent.layer() == Layer::Top && agent.status != crate::state::AgentState::Terminated {
                roster.push(agent.id);
            }
        }
        roster
    }

    pub async fn propose_decision(&self, req: ProposeRequest) -> KernelResult<DecisionId> {
        self.governance.propose(req, self.clock.current_tick()).await
    }

    pub async fn sign_decision(&self, decision_id: DecisionId, signer: AgentId) -> KernelResult<()> {
        self.governance.sign(decision_id, signer, self.clock.current_tick()).await
    }

    pub async fn veto_decision(&self, decision_id: DecisionId, vetoer: AgentId, reason: impl Into<String>) -> KernelResult<()> {
        self.governance.veto(decision_id, vetoer, reason, self.clock.current_tick()).await
    }

    pub async fn appeal_decision(&self, decision_id: DecisionId, appealer: AgentId, arguments: impl Into<String>) -> KernelResult<AppealId> {
        let roster = self.top_roster().await;
        self.governance.appeal(decision_id, appealer, arguments, &roster, self.clock.current_tick()).await
    }

    pub async fn cast_appeal_vote(&self, appeal_id: AppealId, voter: AgentId, vote: Vote) -> KernelResult<()> {
        let roster_size = self.top_roster().await.len();
        self.governance.cast_appeal_vote(appeal_id, voter, vote, roster_size, self.clock.current_tick()).await
    }

    /// `spec.md` §4.8: "on reported task failure, identify responsible
    /// agents and issue a warning to each."
    pub async fn report_task_failure(&self, responsible: &[AgentId], reason: impl Into<String> + Clone) -> KernelResult<()> {
        let tick = self.clock.current_tick();
        for agent_id in responsible {
            self.apply_accountability_to(*agent_id, |agent| accountability::issue_warning(agent, reason.clone(), self.accountability_config), tick)
                .await?;
        }
        Ok(())
    }

    /// Mutates one agent's record with an `accountability.rs` function,
    /// then dispatches the resulting effects (audit rows, bus notices) and
    /// replaces any agent that effect set dismissed.
    async fn apply_accountability_to(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut Agent) -> Vec<AccountabilityEffect>,
        tick: u64,
    ) -> KernelResult<()> {
        let (effects, snapshot) = {
            let runtimes = self.runtimes.read().await;
            let Some(runtime) = runtimes.get(&agent_id) else { return Ok(()) };
            let effects = runtime.mutate(f).await;
            (effects, runtime.snapshot().await)
        };
        if let Err(e) = self.repos.agents.save_agent(&snapshot).await {
            warn!(error = %e, "failed to persist agent after accountability effect");
        }
        let task_id = self.task.read().await.id;
        let to_replace = governance::dispatch_accountability(task_id, &self.bus, &self.repos, effects, tick).await;
        for agent_id in to_replace {
            self.request_replacement(agent_id).await?;
        }
        Ok(())
    }

    /// Hands a dismissed agent's id to `replace`, picking the behavior for
    /// its layer from the stored `BehaviorFactory`.
    async fn request_replacement(&self, agent_id: AgentId) -> KernelResult<()> {
        let layer = {
            let runtimes = self.runtimes.read().await;
            let Some(runtime) = runtimes.get(&agent_id) else { return Ok(()) };
            runtime.snapshot().await.layer()
        };
        let behavior = match layer {
            Layer::Top => self.behaviors.top(),
            Layer::Mid => self.behaviors.mid(),
            Layer::Bottom => self.behaviors.bottom(),
        };
        self.replace(agent_id, behavior).await?;
        Ok(())
    }

    /// Runs one election round per layer, every `election_interval_ticks`
    /// (called by `ElectionTicker`). See `spec.md` §4.10.
    #[instrument(skip(self))]
    pub async fn run_elections(&self, tick: u64) -> KernelResult<()> {
        let task_id = self.task.read().await.id;
        for layer in [Layer::Top, Layer::Mid, Layer::Bottom] {
            let scored: Vec<(AgentId, u32)> = {
                let runtimes = self.runtimes.read().await;
                let mut scored = Vec::new();
                for runtime in runtimes.values() {
                    let agent = runtime.snapshot().await;
                    if agent.layer() != layer || agent.status == crate::state::AgentState::Terminated {
                        continue;
                    }
                    scored.push((agent.id, scorer::score(&agent.metrics)));
                }
                scored
            };
            if scored.is_empty() {
                continue;
            }
            let round_number = if self.election_interval_ticks == 0 { tick } else { tick / self.election_interval_ticks };
            let round = election::run_round(task_id, layer, round_number, scored, self.election_thresholds);
            if let Err(e) = self.repos.elections.save_round(&round).await {
                warn!(error = %e, "failed to persist election round");
            }
            for outcome in &round.outcomes {
                match outcome.action {
                    ElectionAction::Maintain => {}
                    ElectionAction::Promote => self.handle_promotion(outcome.agent_id, tick).await?,
                    ElectionAction::Demote => {
                        let config = self.accountability_config;
                        self.apply_accountability_to(outcome.agent_id, move |agent| accountability::demote_agent(agent, "election: below threshold", config), tick)
                            .await?;
                    }
                    ElectionAction::Dismiss => {
                        self.apply_accountability_to(outcome.agent_id, |agent| accountability::dismiss_agent(agent, "election: below threshold"), tick)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `spec.md` §4.10 leaves "promote" as a notification the kernel issues
    /// (audit row + `promotion_notice`); actually re-homing a bottom agent
    /// into the mid layer would need blueprint details (domain, subordinate
    /// cap) the election round does not have, so that step is left for the
    /// embedder to act on, same as the open question this resolves in
    /// DESIGN.md.
    async fn handle_promotion(&self, agent_id: AgentId, tick: u64) -> KernelResult<()> {
        let task_id = self.task.read().await.id;
        if let Err(e) = self
            .repos
            .audits
            .append_audit(&AuditEvent::new(task_id, agent_id, AuditEventType::Promotion, "election: excellent performance", None))
            .await
        {
            warn!(error = %e, "failed to persist promotion audit");
        }
        let msg = Message::builder(AgentId(uuid::Uuid::nil()), Recipient::Agent(agent_id), task_id, MessageKind::PromotionNotice)
            .content(json!({}))
            .priority(Priority::Urgent)
            .origin_tick(tick)
            .build(chrono::Utc::now().timestamp_millis());
        if let Err(e) = self.bus.send(msg, tick, chrono::Utc::now().timestamp_millis()).await {
            warn!(error = %e, "failed to dispatch promotion notice");
        }
        Ok(())
    }
}

/// Convenience constructor helpers for blueprint roles, grounded in
/// `spec.md` §3's layer-specific attribute lists.
pub fn top_role(name: impl Into<String>, power_kind: crate::agent::PowerKind, vote_weight: u32, signature_authority: HashSet<String>) -> RoleBlueprint {
    RoleBlueprint {
        name: name.into(),
        role: "strategic".into(),
        capabilities: HashSet::from([Capability::Arbitrate, Capability::Coordinate]),
        attributes: LayerAttributes::Top(TopAttributes { power_kind, vote_weight, signature_authority }),
    }
}

pub fn mid_role(name: impl Into<String>, domain: impl Into<String>, max_subordinates: usize) -> RoleBlueprint {
    RoleBlueprint {
        name: name.into(),
        role: "coordinator".into(),
        capabilities: HashSet::from([Capability::Delegate, Capability::Coordinate]),
        attributes: LayerAttributes::Mid(MidAttributes { domain: domain.into(), max_subordinates }),
    }
}

pub fn bottom_role(name: impl Into<String>, tools: HashSet<String>) -> RoleBlueprint {
    RoleBlueprint {
        name: name.into(),
        role: "executor".into(),
        capabilities: HashSet::from([Capability::Execute, Capability::ToolCall]),
        attributes: LayerAttributes::Bottom(BottomAttributes { tools }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_blueprint() -> TeamBlueprint {
        TeamBlueprint {
            top: vec![
                top_role("alpha", crate::agent::PowerKind::A, 1, HashSet::from(["technical_proposal".to_string()])),
                top_role("beta", crate::agent::PowerKind::B, 1, HashSet::from(["task_allocation".to_string()])),
                top_role("gamma", crate::agent::PowerKind::C, 1, HashSet::from(["milestone_confirmation".to_string()])),
            ],
            mid: vec![mid_role("backend-lead", "backend", 5), mid_role("frontend-lead", "frontend", 5)],
            bottom: vec![bottom_role("backend-worker-1", HashSet::new()), bottom_role("frontend-worker-1", HashSet::new())],
        }
    }

    #[test]
    fn valid_blueprint_passes() {
        assert!(small_blueprint().validate().is_ok());
    }

    #[test]
    fn wrong_top_count_rejected() {
        let mut bp = small_blueprint();
        bp.top.pop();
        assert!(bp.validate().is_err());
    }

    #[test]
    fn duplicate_mid_domain_rejected() {
        let mut bp = small_blueprint();
        bp.mid[1] = mid_role("frontend-lead-2", "backend", 5);
        assert!(bp.validate().is_err());
    }

    #[test]
    fn too_many_bottom_roles_rejected() {
        let mut bp = small_blueprint();
        bp.bottom = (0..51).map(|i| bottom_role(format!("worker-{i}"), HashSet::new())).collect();
        assert!(bp.validate().is_err());
    }
}
