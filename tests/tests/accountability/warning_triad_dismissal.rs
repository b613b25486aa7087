//! Scenario (f): warning triad leads to dismissal.

use orchestrator_core::accountability::{issue_warning, AccountabilityConfig};
use orchestrator_core::agent::{Agent, BottomAttributes, LayerAttributes};
use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::domain::AuditEventType;
use orchestrator_core::governance::dispatch_accountability;
use orchestrator_core::ids::TaskId;
use orchestrator_core::message::MessageKind;
use orchestrator_core::repo::Repositories;
use orchestrator_core::state::AgentState;
use std::collections::HashSet;

#[tokio::test]
async fn three_warnings_terminate_b1_and_notify_its_supervisor() {
    let task_id = TaskId::new();
    let supervisor_id = orchestrator_core::ids::AgentId::new();

    let mut b1 = Agent::new(task_id, "worker-1", "executor", LayerAttributes::Bottom(BottomAttributes { tools: HashSet::new() }), HashSet::new());
    b1.status = AgentState::Idle;
    b1.supervisor = Some(supervisor_id);

    let bus = MessageBus::new(task_id, BusConfig::default(), None);
    bus.register(b1.id, 0).await;
    bus.register(supervisor_id, 0).await;
    let repos = Repositories::in_memory();

    let config = AccountabilityConfig::default();
    for reason in ["missed deadline", "missed deadline again", "missed deadline thrice"] {
        let effects = issue_warning(&mut b1, reason, config);
        dispatch_accountability(task_id, &bus, &repos, effects, 0).await;
    }
    bus.flush().await;

    assert_eq!(b1.status, AgentState::Terminated);

    let notice = bus.get_messages(supervisor_id).await;
    assert!(notice.iter().any(|m| m.kind == MessageKind::DismissalNotice));

    let audits = repos.audits.list_audits(b1.id).await.unwrap();
    assert_eq!(audits.iter().filter(|a| a.event_type == AuditEventType::Warning).count(), 3);
    assert_eq!(audits.iter().filter(|a| a.event_type == AuditEventType::Dismissal).count(), 1);
}
