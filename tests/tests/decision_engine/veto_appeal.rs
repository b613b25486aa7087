//! Scenario (b): veto then appeal success.

use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::decision::{DecisionType, ProposeRequest, Vote};
use orchestrator_core::domain::AuditEventType;
use orchestrator_core::governance::{GovernanceConfig, GovernanceEngine};
use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::message::MessageKind;
use orchestrator_core::repo::Repositories;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn veto_with_reason_then_appeal_succeeds() {
    let task_id = TaskId::new();
    let proposer = AgentId::new();
    let signers = [AgentId::new(), AgentId::new(), AgentId::new()];

    let bus = Arc::new(MessageBus::new(task_id, BusConfig::default(), None));
    bus.register(proposer, 0).await;
    for s in signers {
        bus.register(s, 0).await;
    }
    let repos = Repositories::in_memory();
    let engine = GovernanceEngine::new(
        task_id,
        bus.clone(),
        repos.clone(),
        GovernanceConfig { decision_timeout_ms: 600_000, enable_reminders: false },
    );

    let id = engine
        .propose(
            ProposeRequest {
                proposer,
                decision_type: DecisionType::TechnicalProposal,
                content: json!({"proposal": "use tokio"}),
                required_signers: signers.to_vec(),
            },
            0,
        )
        .await
        .unwrap();

    engine.veto(id, signers[0], "risk", 1).await.unwrap();
    bus.flush().await;

    let proposer_inbox = bus.get_messages(proposer).await;
    assert_eq!(proposer_inbox[0].kind, MessageKind::SignatureVeto);
    assert_eq!(proposer_inbox[0].content["reason"], "risk");

    let audits = repos.audits.list_audits(signers[0]).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].event_type, AuditEventType::Veto);
    assert_eq!(audits[0].reason, "risk");

    let appeal_id = engine.appeal(id, proposer, "reconsider", &signers, 2).await.unwrap();
    bus.flush().await;
    for s in signers {
        bus.get_messages(s).await;
    }

    engine.cast_appeal_vote(appeal_id, signers[0], Vote::Oppose, 3, 3).await.unwrap();
    engine.cast_appeal_vote(appeal_id, signers[1], Vote::Support, 3, 3).await.unwrap();
    engine.cast_appeal_vote(appeal_id, signers[2], Vote::Support, 3, 3).await.unwrap();
    bus.flush().await;

    let proposer_inbox = bus.get_messages(proposer).await;
    assert_eq!(proposer_inbox[0].kind, MessageKind::AppealResult);
    assert!(proposer_inbox[0].content["result"].as_str().unwrap().contains("Success"));
}
