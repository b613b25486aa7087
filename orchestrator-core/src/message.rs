//! Wire-level message types, closed vocabularies from `spec.md` §3 and §6.

use crate::ids::{AgentId, MessageId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Four-level priority, ordered `Low < Normal < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    pub const ALL_HIGH_TO_LOW: [Priority; 4] =
        [Priority::Urgent, Priority::High, Priority::Normal, Priority::Low];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Destination of a message: a specific agent, every registered agent
/// (minus the sender), or the system sink (recorded for stats, not queued).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Agent(AgentId),
    Broadcast,
    System,
}

/// Closed set of message kinds, see `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TaskAssign,
    TaskAccept,
    TaskReject,
    TaskComplete,
    TaskFail,
    ProgressReport,
    StatusQuery,
    StatusReport,
    DecisionPropose,
    SignatureRequest,
    SignatureApprove,
    SignatureVeto,
    AppealRequest,
    AppealResult,
    VoteRequest,
    VoteResponse,
    PeerCoordination,
    PeerCoordinationResponse,
    PeerHelpRequest,
    PeerHelpResponse,
    ConflictReport,
    ArbitrationRequest,
    ArbitrationResult,
    ErrorReport,
    IssueEscalation,
    RecoveryCommand,
    WarningIssue,
    DemotionNotice,
    DismissalNotice,
    PromotionNotice,
    ElectionStart,
    ElectionVote,
    ElectionResult,
    HeartbeatAck,
    AgentRegister,
    AgentUnregister,
    SystemCommand,
    /// Internal-only: the bus's batched liveness notification. Never sent
    /// by an agent; delivered to whoever observes bus events.
    Timeout,
}

/// An immutable, once-sent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: AgentId,
    pub recipient: Recipient,
    pub task_id: TaskId,
    pub kind: MessageKind,
    pub content: Value,
    /// Wall-clock send time in epoch milliseconds. Informational only —
    /// logical time for timeouts comes from the heartbeat clock.
    pub timestamp_ms: i64,
    #[serde(default)]
    pub priority: Priority,
    pub reply_to: Option<MessageId>,
    pub origin_tick: Option<u64>,
}

impl Message {
    pub fn builder(sender: AgentId, recipient: Recipient, task_id: TaskId, kind: MessageKind) -> MessageBuilder {
        MessageBuilder {
            sender,
            recipient,
            task_id,
            kind,
            content: Value::Object(Default::default()),
            priority: Priority::Normal,
            reply_to: None,
            origin_tick: None,
        }
    }
}

pub struct MessageBuilder {
    sender: AgentId,
    recipient: Recipient,
    task_id: TaskId,
    kind: MessageKind,
    content: Value,
    priority: Priority,
    reply_to: Option<MessageId>,
    origin_tick: Option<u64>,
}

impl MessageBuilder {
    pub fn content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn reply_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }

    pub fn origin_tick(mut self, tick: u64) -> Self {
        self.origin_tick = Some(tick);
        self
    }

    pub fn build(self, now_ms: i64) -> Message {
        Message {
            id: MessageId::new(),
            sender: self.sender,
            recipient: self.recipient,
            task_id: self.task_id,
            kind: self.kind,
            content: self.content,
            timestamp_ms: now_ms,
            priority: self.priority,
            reply_to: self.reply_to,
            origin_tick: self.origin_tick,
        }
    }
}

/// Validation per `spec.md` §4.3. Returns the first violation found.
pub fn validate_message(msg: &Message, bus_task_id: TaskId, now_ms: i64) -> Result<(), String> {
    if msg.task_id != bus_task_id {
        return Err("message task id does not match bus task id".into());
    }
    if !msg.content.is_object() {
        return Err("message content must be a JSON object".into());
    }
    if msg.timestamp_ms < 0 {
        return Err("timestamp must be non-negative".into());
    }
    if msg.timestamp_ms > now_ms + 1000 {
        return Err("timestamp is more than 1 second in the future".into());
    }
    Ok(())
}
