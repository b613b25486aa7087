//! Scenario (d): timeout detection.

use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::message::MessageKind;

#[tokio::test]
async fn agent_flagged_only_once_threshold_exceeded() {
    let task_id = TaskId::new();
    let mut config = BusConfig::default();
    config.timeout_threshold_ticks = 3;
    let bus = MessageBus::new(task_id, config, None);

    let a = AgentId::new();
    bus.register(a, 0).await;

    assert!(bus.check_liveness(3).await.is_empty());
    let timed_out = bus.check_liveness(4).await;
    assert_eq!(timed_out, vec![a]);
}

#[tokio::test]
async fn liveness_breach_emits_one_batched_timeout_event() {
    let task_id = TaskId::new();
    let mut config = BusConfig::default();
    config.timeout_threshold_ticks = 3;
    let bus = MessageBus::new(task_id, config, None);

    let a = AgentId::new();
    let observer = AgentId::new();
    bus.register(a, 0).await;
    bus.register(observer, 0).await;

    // Below threshold: no event staged, nothing to flush.
    let timed_out = bus.check_and_emit_timeouts(3).await;
    assert!(timed_out.is_empty());
    bus.flush().await;
    assert!(bus.get_messages(observer).await.is_empty());

    // Past threshold: exactly one batched `timeout` event, delivered to
    // every other registered agent, naming the exceeders.
    let timed_out = bus.check_and_emit_timeouts(4).await;
    assert_eq!(timed_out, vec![a]);
    bus.flush().await;

    let delivered = bus.get_messages(observer).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, MessageKind::Timeout);
    let agents = delivered[0].content["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].as_str().unwrap(), a.to_string());

    // The synthetic bus sender stamped on that event must never itself
    // accumulate as a liveness candidate on later ticks: only `a`, which
    // really has gone quiet, should ever show up.
    let still_timed_out = bus.check_liveness(100).await;
    assert_eq!(still_timed_out, vec![a]);
}
