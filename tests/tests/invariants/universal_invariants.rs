//! Universal invariants from `spec.md` §8, exercised across the modules
//! that are each responsible for holding them.

use orchestrator_core::accountability::{issue_warning, AccountabilityConfig};
use orchestrator_core::agent::{Agent, BottomAttributes, LayerAttributes};
use orchestrator_core::blackboard::{Blackboard, RequesterLayer, Requester, Scope};
use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::decision::{self, DecisionStatus, DecisionType, ProposeRequest};
use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::message::{Message, MessageKind, Priority, Recipient};
use orchestrator_core::state::{transition, AgentState};
use serde_json::json;
use std::collections::HashSet;

fn bottom_agent() -> Agent {
    let mut a = Agent::new(
        TaskId::new(),
        "worker-1",
        "executor",
        LayerAttributes::Bottom(BottomAttributes { tools: HashSet::new() }),
        HashSet::new(),
    );
    a.status = AgentState::Idle;
    a
}

/// Invariant 1: `heartbeats_responded + heartbeats_missed` never decreases.
#[test]
fn heartbeat_counters_are_monotonic_across_a_run() {
    let mut agent = bottom_agent();
    let mut prior = agent.metrics.heartbeats_responded + agent.metrics.heartbeats_missed;
    for i in 0..20 {
        if i % 3 == 0 {
            agent.metrics.heartbeats_missed += 1;
        } else {
            agent.metrics.heartbeats_responded += 1;
        }
        let total = agent.metrics.heartbeats_responded + agent.metrics.heartbeats_missed;
        assert!(total >= prior);
        prior = total;
    }
}

/// Invariant 2 & 3: signers/vetoers stay disjoint and `signers ⊆
/// required_signers` through the decision's whole lifecycle, and a
/// rejected decision always has at least one vetoer, or it timed out.
#[test]
fn signers_and_vetoers_never_overlap_and_rejection_has_a_cause() {
    let task_id = TaskId::new();
    let signers = [AgentId::new(), AgentId::new(), AgentId::new()];
    let (mut decision, _) = decision::propose(
        task_id,
        ProposeRequest {
            proposer: AgentId::new(),
            decision_type: DecisionType::TechnicalProposal,
            content: json!({"proposal": "x"}),
            required_signers: signers.to_vec(),
        },
    )
    .unwrap();

    decision::sign(&mut decision, signers[0]).unwrap();
    assert!(decision.signers.is_disjoint(&decision.vetoers));
    assert!(decision.signers.iter().all(|s| decision.required_signers.contains(s)));

    decision::veto(&mut decision, signers[1], "risk").unwrap();
    assert_eq!(decision.status, DecisionStatus::Rejected);
    assert!(!decision.vetoers.is_empty());
    assert!(decision.signers.is_disjoint(&decision.vetoers));
}

#[test]
fn timed_out_decision_is_rejected_with_no_vetoer() {
    let task_id = TaskId::new();
    let signers = [AgentId::new(), AgentId::new()];
    let (mut decision, _) = decision::propose(
        task_id,
        ProposeRequest {
            proposer: AgentId::new(),
            decision_type: DecisionType::TechnicalProposal,
            content: json!({"proposal": "x"}),
            required_signers: signers.to_vec(),
        },
    )
    .unwrap();

    decision::timeout(&mut decision).unwrap();
    assert_eq!(decision.status, DecisionStatus::Rejected);
    assert!(decision.vetoers.is_empty());
}

/// Invariant 3 (approved leg): `|signers| >= threshold(type)`.
#[test]
fn approved_decision_meets_its_signature_threshold() {
    let task_id = TaskId::new();
    let signers = [AgentId::new(), AgentId::new(), AgentId::new()];
    let (mut decision, _) = decision::propose(
        task_id,
        ProposeRequest {
            proposer: AgentId::new(),
            decision_type: DecisionType::TechnicalProposal,
            content: json!({"proposal": "x"}),
            required_signers: signers.to_vec(),
        },
    )
    .unwrap();

    decision::sign(&mut decision, signers[0]).unwrap();
    decision::sign(&mut decision, signers[1]).unwrap();

    assert_eq!(decision.status, DecisionStatus::Approved);
    assert!(decision.signers.len() >= decision.decision_type.threshold());
}

/// Invariant 4: every observed state transition is in the allowed table.
#[test]
fn only_table_transitions_succeed() {
    use AgentState::*;
    let allowed = [
        (Initializing, Idle),
        (Idle, Working),
        (Working, Idle),
        (Working, Blocked),
        (Blocked, Working),
        (Idle, ShuttingDown),
        (ShuttingDown, Terminated),
    ];
    for (from, to) in allowed {
        assert!(transition(from, to, "table-driven").is_ok());
    }
    let disallowed = [(Idle, Terminated), (Terminated, Idle), (Initializing, Blocked)];
    for (from, to) in disallowed {
        assert!(transition(from, to, "table-driven").is_err());
    }
}

/// Invariant 5: priority dequeue is URGENT > HIGH > NORMAL > LOW, FIFO
/// within a level — covered at the queue layer in `queue.rs`'s own tests
/// and end-to-end in `tests/bus/priority_dequeue.rs`; reasserted here
/// against a bus with a mixed-priority backlog across two agents.
#[tokio::test]
async fn priority_ordering_holds_per_recipient_independently() {
    let task_id = TaskId::new();
    let bus = MessageBus::new(task_id, BusConfig::default(), None);
    let sender = AgentId::new();
    let a = AgentId::new();
    let b = AgentId::new();
    bus.register(sender, 0).await;
    bus.register(a, 0).await;
    bus.register(b, 0).await;

    for (recipient, priority) in [(a, Priority::Low), (b, Priority::Urgent), (a, Priority::Urgent), (b, Priority::Low)] {
        let m = Message::builder(sender, Recipient::Agent(recipient), task_id, MessageKind::StatusQuery)
            .priority(priority)
            .build(0);
        bus.send(m, 0, 0).await.unwrap();
    }
    bus.flush().await;

    let a_inbox = bus.get_messages(a).await;
    assert_eq!(a_inbox[0].priority, Priority::Urgent);
    assert_eq!(a_inbox[1].priority, Priority::Low);
    let b_inbox = bus.get_messages(b).await;
    assert_eq!(b_inbox[0].priority, Priority::Urgent);
    assert_eq!(b_inbox[1].priority, Priority::Low);
}

/// Invariant 6: an agent is timed out iff ticks-since-last-seen exceeds
/// the threshold, exactly at the boundary.
#[tokio::test]
async fn liveness_boundary_is_strictly_greater_than_threshold() {
    let task_id = TaskId::new();
    let mut config = BusConfig::default();
    config.timeout_threshold_ticks = 3;
    let bus = MessageBus::new(task_id, config, None);
    let agent = AgentId::new();
    let observer = AgentId::new();
    bus.register(agent, 0).await;
    bus.register(observer, 0).await;

    for tick in 0..=3 {
        assert!(bus.check_liveness(tick).await.is_empty(), "tick {tick} should not yet time out");
        bus.check_and_emit_timeouts(tick).await;
        bus.flush().await;
        assert!(bus.get_messages(observer).await.is_empty(), "tick {tick} should not emit a timeout event");
    }
    assert_eq!(bus.check_liveness(4).await, vec![agent]);

    let emitted = bus.check_and_emit_timeouts(4).await;
    assert_eq!(emitted, vec![agent]);
    bus.flush().await;
    let delivered = bus.get_messages(observer).await;
    assert_eq!(delivered.len(), 1, "exactly one batched timeout event, not one per exceeder");
    assert_eq!(delivered[0].kind, MessageKind::Timeout);
}

/// Invariant 7: two successful writes to the same document are
/// consecutive versions.
#[tokio::test]
async fn consecutive_writes_bump_version_by_exactly_one() {
    let bb = Blackboard::new(None, None);
    let requester = Requester { id: AgentId::new(), layer: RequesterLayer::Top, supervisor: None };
    let v1 = bb.write(Scope::Global, &requester, "a".into(), 0).await.unwrap();
    let v2 = bb.write(Scope::Global, &requester, "b".into(), v1).await.unwrap();
    assert_eq!(v2, v1 + 1);
}

/// Boundary: a full queue drops the newest message, not an older one.
#[tokio::test]
async fn overflow_drops_newest_message() {
    let task_id = TaskId::new();
    let mut config = BusConfig::default();
    config.max_queue_size = 2;
    let bus = MessageBus::new(task_id, config, None);
    let sender = AgentId::new();
    let recipient = AgentId::new();
    bus.register(sender, 0).await;
    bus.register(recipient, 0).await;

    let mut sent_ids = Vec::new();
    for _ in 0..3 {
        let m = Message::builder(sender, Recipient::Agent(recipient), task_id, MessageKind::StatusQuery).build(0);
        sent_ids.push(m.id);
        bus.send(m, 0, 0).await.unwrap();
    }
    bus.flush().await;

    let delivered: Vec<_> = bus.get_messages(recipient).await.into_iter().map(|m| m.id).collect();
    assert_eq!(delivered, sent_ids[..2]);
}

/// Boundary: `required_signers = []` is rejected at proposal time, not
/// later.
#[test]
fn empty_required_signers_rejected_up_front() {
    let err = decision::propose(
        TaskId::new(),
        ProposeRequest {
            proposer: AgentId::new(),
            decision_type: DecisionType::TechnicalProposal,
            content: json!({"proposal": "x"}),
            required_signers: vec![],
        },
    )
    .unwrap_err();
    assert!(matches!(err, orchestrator_core::error::KernelError::Validation(_)));
}

/// Scenario (f), invariant cross-check: after the third warning the
/// threshold effect fires exactly once, not cumulatively per call.
#[test]
fn warning_threshold_fires_dismissal_exactly_at_the_configured_count() {
    let config = AccountabilityConfig { warning_threshold: 3, failure_threshold: 1 };
    let mut agent = bottom_agent();
    for n in 1..3 {
        let effects = issue_warning(&mut agent, format!("warning {n}"), config);
        assert_eq!(agent.metrics.warnings_received, n);
        assert!(!effects.iter().any(|e| matches!(e, orchestrator_core::accountability::AccountabilityEffect::AuditDismissal { .. })));
    }
    let effects = issue_warning(&mut agent, "warning 3", config);
    assert_eq!(agent.metrics.warnings_received, 3);
    assert!(effects.iter().any(|e| matches!(e, orchestrator_core::accountability::AccountabilityEffect::AuditDismissal { .. })));
}
