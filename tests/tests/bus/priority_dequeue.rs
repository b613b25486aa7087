//! Scenario (c): priority dequeue order.

use orchestrator_core::bus::{BusConfig, MessageBus};
use orchestrator_core::ids::{AgentId, TaskId};
use orchestrator_core::message::{Message, MessageKind, Priority, Recipient};
use serde_json::json;

fn msg(sender: AgentId, recipient: AgentId, task_id: TaskId, priority: Priority) -> Message {
    Message::builder(sender, Recipient::Agent(recipient), task_id, MessageKind::StatusQuery)
        .content(json!({}))
        .priority(priority)
        .build(0)
}

#[tokio::test]
async fn urgent_before_high_before_normal_before_low() {
    let task_id = TaskId::new();
    let bus = MessageBus::new(task_id, BusConfig::default(), None);
    let sender = AgentId::new();
    let a = AgentId::new();
    bus.register(sender, 0).await;
    bus.register(a, 0).await;

    let m1 = msg(sender, a, task_id, Priority::Normal);
    let m2 = msg(sender, a, task_id, Priority::Urgent);
    let m3 = msg(sender, a, task_id, Priority::Low);
    let m4 = msg(sender, a, task_id, Priority::High);
    let ids = [m1.id, m2.id, m3.id, m4.id];

    bus.send(m1, 0, 0).await.unwrap();
    bus.send(m2, 0, 0).await.unwrap();
    bus.send(m3, 0, 0).await.unwrap();
    bus.send(m4, 0, 0).await.unwrap();
    bus.flush().await;

    let delivered: Vec<_> = bus.get_messages(a).await.into_iter().map(|m| m.id).collect();
    assert_eq!(delivered, vec![ids[1], ids[3], ids[0], ids[2]]);
}
