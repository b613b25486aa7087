//! End-to-end smoke test: a small blueprint instantiated through
//! `TeamLifecycle`, driven for a few ticks, then a governed decision
//! routed through the running team.

use async_trait::async_trait;
use orchestrator_core::agent::behavior::{BottomBehavior, Executor, MidBehavior, SignatureDecision, SignaturePolicy, TopBehavior};
use orchestrator_core::decision::{DecisionType, ProposeRequest};
use orchestrator_core::domain::{Task, TaskMode};
use orchestrator_core::repo::Repositories;
use orchestrator_core::team::{bottom_role, mid_role, top_role, BehaviorFactory, TeamBlueprint, TeamConfig, TeamLifecycle};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, task: &Task, _view: &orchestrator_core::agent::behavior::BlackboardView) -> Result<Value, String> {
        Ok(json!({"ran": task.description}))
    }
}

struct AlwaysApprove;

#[async_trait]
impl SignaturePolicy for AlwaysApprove {
    async fn review(&self, _decision_type: DecisionType, _content: &Value) -> SignatureDecision {
        SignatureDecision::Approve
    }
}

struct DefaultBehaviors;

impl BehaviorFactory for DefaultBehaviors {
    fn top(&self) -> Arc<dyn orchestrator_core::agent::behavior::Behavior> {
        Arc::new(TopBehavior::new(Arc::new(AlwaysApprove)))
    }
    fn mid(&self) -> Arc<dyn orchestrator_core::agent::behavior::Behavior> {
        Arc::new(MidBehavior::new(None))
    }
    fn bottom(&self) -> Arc<dyn orchestrator_core::agent::behavior::Behavior> {
        Arc::new(BottomBehavior::new(Arc::new(EchoExecutor)))
    }
}

fn blueprint() -> TeamBlueprint {
    TeamBlueprint {
        top: vec![
            top_role("alpha", orchestrator_core::agent::PowerKind::A, 1, HashSet::from(["technical_proposal".to_string()])),
            top_role("beta", orchestrator_core::agent::PowerKind::B, 1, HashSet::from(["task_allocation".to_string()])),
            top_role("gamma", orchestrator_core::agent::PowerKind::C, 1, HashSet::from(["milestone_confirmation".to_string()])),
        ],
        mid: vec![mid_role("backend-lead", "backend", 5), mid_role("frontend-lead", "frontend", 5)],
        bottom: vec![bottom_role("backend-worker-1", HashSet::new()), bottom_role("frontend-worker-1", HashSet::new())],
    }
}

#[tokio::test]
async fn instantiated_team_runs_ticks_and_routes_a_governed_decision() {
    let task = Task::new("ship the orchestrator", TaskMode::Auto);
    let repos = Repositories::in_memory();
    let mut config = TeamConfig::default();
    config.heartbeat_interval_ms = 20;

    let lifecycle = TeamLifecycle::instantiate(task, blueprint(), Arc::new(DefaultBehaviors), repos.clone(), config)
        .await
        .unwrap();

    assert_eq!(lifecycle.agent_ids().await.len(), 7);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let top_roster = lifecycle.top_roster().await;
    assert_eq!(top_roster.len(), 3);

    let decision_id = lifecycle
        .propose_decision(ProposeRequest {
            proposer: top_roster[0],
            decision_type: DecisionType::TechnicalProposal,
            content: json!({"proposal": "adopt the new retry policy"}),
            required_signers: top_roster.clone(),
        })
        .await
        .unwrap();

    lifecycle.sign_decision(decision_id, top_roster[1]).await.unwrap();
    lifecycle.sign_decision(decision_id, top_roster[2]).await.unwrap();

    let stored = repos.decisions.get_decision(decision_id).await.unwrap().unwrap();
    assert_eq!(stored.status, orchestrator_core::decision::DecisionStatus::Approved);

    lifecycle.cancel().await.unwrap();
}
