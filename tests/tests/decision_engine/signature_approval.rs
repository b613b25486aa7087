//! Scenario (a): three-signer approval.

use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::decision::{DecisionType, ProposeRequest};
use orchestrator_core::error::KernelError;
use orchestrator_core::governance::{GovernanceConfig, GovernanceEngine};
use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::message::MessageKind;
use orchestrator_core::repo::Repositories;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn three_signer_approval_then_third_sign_rejected() {
    let task_id = TaskId::new();
    let proposer = AgentId::new();
    let signers = [AgentId::new(), AgentId::new(), AgentId::new()];

    let bus = Arc::new(MessageBus::new(task_id, BusConfig::default(), None));
    bus.register(proposer, 0).await;
    for s in signers {
        bus.register(s, 0).await;
    }

    let engine = GovernanceEngine::new(
        task_id,
        bus.clone(),
        Repositories::in_memory(),
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

    engine.sign(id, signers[0], 1).await.unwrap();
    engine.sign(id, signers[1], 1).await.unwrap();
    let err = engine.sign(id, signers[2], 1).await.unwrap_err();
    assert!(matches!(err, KernelError::DecisionNotPending));
    bus.flush().await;

    let proposer_inbox = bus.get_messages(proposer).await;
    assert_eq!(proposer_inbox.len(), 1);
    assert_eq!(proposer_inbox[0].kind, MessageKind::SignatureApprove);
}
