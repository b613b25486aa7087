//! Priority message bus: validation, routing, caps, compression, liveness.
//! See `spec.md` §4.3.

use crate::error::{KernelError, KernelResult};
use crate::ids::{AgentId, TaskId};
use crate::message::{validate_message, Message, MessageKind, Recipient};
use crate::queue::PriorityQueue;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub heartbeat_interval_ms: u64,
    pub max_queue_size: usize,
    pub timeout_threshold_ticks: u64,
    pub enable_compression: bool,
    pub compression_threshold_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 4000,
            max_queue_size: 1000,
            timeout_threshold_ticks: 3,
            enable_compression: false,
            compression_threshold_bytes: 1024,
        }
    }
}

/// Narrow persistence seam the bus writes through; failures are logged, not
/// propagated (see `spec.md` §7, "Persistence" row).
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn save_message(&self, message: &Message, tick: u64) -> KernelResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BusStats {
    pub total: u64,
    pub per_kind: HashMap<MessageKind, u64>,
    pub per_agent: HashMap<AgentId, AgentStats>,
}

pub struct MessageBus {
    task_id: TaskId,
    config: BusConfig,
    inboxes: Mutex<HashMap<AgentId, PriorityQueue>>,
    /// Routed-but-not-yet-visible deliveries for the tick currently being
    /// processed. `flush` moves these into `inboxes`; it is registered as
    /// the last `TickListener` on the clock so a message sent by one
    /// agent's `on_tick` during tick `k` only reaches another agent's
    /// inbox once tick `k` finishes, never mid-tick (`spec.md` §5).
    staged: Mutex<Vec<(AgentId, Message)>>,
    last_seen: Mutex<HashMap<AgentId, u64>>,
    stats: Mutex<BusStats>,
    sink: Option<Arc<dyn MessageSink>>,
}

impl MessageBus {
    pub fn new(task_id: TaskId, config: BusConfig, sink: Option<Arc<dyn MessageSink>>) -> Self {
        Self {
            task_id,
            config,
            inboxes: Mutex::new(HashMap::new()),
            staged: Mutex::new(Vec::new()),
            last_seen: Mutex::new(HashMap::new()),
            stats: Mutex::new(BusStats::default()),
            sink,
        }
    }

    #[instrument(skip(self))]
    pub async fn register(&self, agent: AgentId, current_tick: u64) {
        self.inboxes.lock().await.entry(agent).or_insert_with(PriorityQueue::new);
        self.last_seen.lock().await.insert(agent, current_tick);
        info!(%agent, "agent registered with bus");
    }

    /// No-op if the agent was never registered.
    #[instrument(skip(self))]
    pub async fn unregister(&self, agent: AgentId) {
        self.inboxes.lock().await.remove(&agent);
        self.last_seen.lock().await.remove(&agent);
    }

    pub async fn registered_agents(&self) -> HashSet<AgentId> {
        self.inboxes.lock().await.keys().copied().collect()
    }

    pub async fn update_last_seen(&self, agent: AgentId, current_tick: u64) {
        self.last_seen.lock().await.insert(agent, current_tick);
    }

    /// Validates, routes, persists, and accounts for one message. Routed
    /// copies are staged, not delivered: they only enter a recipient's
    /// inbox at the next `flush`, which keeps within-tick sends invisible
    /// to other agents processed later in the same tick (`spec.md` §5).
    /// Capacity and unknown-recipient failures are dropped and logged,
    /// never returned as errors — only validation failures are.
    #[instrument(skip(self, message), fields(kind = ?message.kind))]
    pub async fn send(&self, message: Message, current_tick: u64, now_ms: i64) -> KernelResult<()> {
        validate_message(&message, self.task_id, now_ms).map_err(KernelError::Validation)?;

        let sender = message.sender;
        let mut staged_for = Vec::new();

        match &message.recipient {
            Recipient::System => {
                // Recorded for statistics only; never queued.
            }
            Recipient::Broadcast => {
                let recipients: Vec<AgentId> = self
                    .inboxes
                    .lock()
                    .await
                    .keys()
                    .copied()
                    .filter(|id| *id != sender)
                    .collect();
                staged_for.extend(recipients);
            }
            Recipient::Agent(recipient) => {
                let recipient = *recipient;
                if !self.inboxes.lock().await.contains_key(&recipient) {
                    warn!(%recipient, "dropping message to unknown agent");
                } else {
                    staged_for.push(recipient);
                }
            }
        }

        if !staged_for.is_empty() {
            let mut copy = message.clone();
            if self.config.enable_compression {
                compress_in_place(&mut copy, self.config.compression_threshold_bytes);
            }
            let mut staged = self.staged.lock().await;
            for recipient in &staged_for {
                staged.push((*recipient, copy.clone()));
            }
        }

        self.record_sent(&message).await;
        self.update_last_seen(sender, current_tick).await;

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save_message(&message, current_tick).await {
                warn!(error = %e, "failed to persist message");
            }
        }

        Ok(())
    }

    /// Moves every staged delivery into its recipient's live inbox,
    /// enforcing the per-recipient queue cap at the point of entry. Called
    /// once per tick, after every agent's `on_tick` for that tick has run
    /// (registered as the clock's last `TickListener`), so messages
    /// produced during tick `k` become visible starting tick `k+1`.
    #[instrument(skip(self))]
    pub async fn flush(&self) {
        let staged = std::mem::take(&mut *self.staged.lock().await);
        if staged.is_empty() {
            return;
        }
        let mut inboxes = self.inboxes.lock().await;
        let mut delivered = Vec::new();
        for (recipient, message) in staged {
            let Some(queue) = inboxes.get_mut(&recipient) else { continue };
            if queue.size() >= self.config.max_queue_size {
                warn!(%recipient, "inbox overflow, dropping message");
                continue;
            }
            queue.enqueue(message);
            delivered.push(recipient);
        }
        drop(inboxes);
        let mut stats = self.stats.lock().await;
        for recipient in delivered {
            stats.per_agent.entry(recipient).or_default().received += 1;
        }
    }

    async fn record_sent(&self, message: &Message) {
        let mut stats = self.stats.lock().await;
        stats.total += 1;
        *stats.per_kind.entry(message.kind).or_default() += 1;
        stats.per_agent.entry(message.sender).or_default().sent += 1;
    }

    pub async fn stats(&self) -> BusStats {
        self.stats.lock().await.clone()
    }

    /// Drains and returns this agent's inbox in priority order,
    /// decompressing lazily.
    #[instrument(skip(self))]
    pub async fn get_messages(&self, agent: AgentId) -> Vec<Message> {
        let mut inboxes = self.inboxes.lock().await;
        let Some(queue) = inboxes.get_mut(&agent) else { return Vec::new() };
        queue
            .dequeue_all()
            .into_iter()
            .map(|mut m| {
                decompress_in_place(&mut m);
                m
            })
            .collect()
    }

    /// Batched liveness check: returns every registered agent whose
    /// `current_tick - last_seen` exceeds the configured threshold.
    #[instrument(skip(self))]
    pub async fn check_liveness(&self, current_tick: u64) -> Vec<AgentId> {
        let last_seen = self.last_seen.lock().await;
        last_seen
            .iter()
            .filter_map(|(agent, seen)| {
                if current_tick.saturating_sub(*seen) > self.config.timeout_threshold_ticks {
                    Some(*agent)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Runs `check_liveness` and, when it finds any exceeders, stages a
    /// single batched `timeout` event (`MessageKind::Timeout`, broadcast to
    /// every registered agent) onto the bus itself — the concrete mechanism
    /// behind `spec.md` §4.3's "detect timeouts" responsibility and seed
    /// scenario §8(d). Returns the same exceeder list `check_liveness` would.
    #[instrument(skip(self))]
    pub async fn check_and_emit_timeouts(&self, current_tick: u64) -> Vec<AgentId> {
        let timed_out = self.check_liveness(current_tick).await;
        if !timed_out.is_empty() {
            let agents: Vec<String> = timed_out.iter().map(|a| a.to_string()).collect();
            let msg = Message::builder(system_sender(), Recipient::Broadcast, self.task_id, MessageKind::Timeout)
                .content(json!({"agents": agents}))
                .priority(crate::message::Priority::High)
                .build(chrono::Utc::now().timestamp_millis());
            if let Err(e) = self.send(msg, current_tick, chrono::Utc::now().timestamp_millis()).await {
                warn!(error = %e, "failed to dispatch timeout event");
            }
            // `send` stamps `last_seen` for every sender, including this
            // synthetic one; drop it so the bus's own notification never
            // becomes a liveness candidate itself.
            self.last_seen.lock().await.remove(&system_sender());
        }
        timed_out
    }
}

/// Sender id stamped on the bus's own kernel-originated notifications
/// (currently just the batched `timeout` event), matching the
/// `governance.rs` convention for system-originated messages.
fn system_sender() -> AgentId {
    AgentId(uuid::Uuid::nil())
}

fn compress_in_place(message: &mut Message, threshold_bytes: usize) {
    let serialized = match serde_json::to_vec(&message.content) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };
    if serialized.len() <= threshold_bytes {
        return;
    }
    let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    if encoder.write_all(&serialized).is_err() {
        return;
    }
    let Ok(compressed) = encoder.finish() else { return };
    let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);
    message.content = json!({
        "_compressed": true,
        "_original_size": serialized.len(),
        "_data": encoded,
    });
}

fn decompress_in_place(message: &mut Message) {
    let Some(obj) = message.content.as_object() else { return };
    if obj.get("_compressed").and_then(|v| v.as_bool()) != Some(true) {
        return;
    }
    let Some(data) = obj.get("_data").and_then(|v| v.as_str()) else { return };
    let Ok(compressed) = base64::engine::general_purpose::STANDARD.decode(data) else { return };
    let mut decoder = flate2::read::DeflateDecoder::new(&compressed[..]);
    let mut raw = Vec::new();
    if decoder.read_to_end(&mut raw).is_err() {
        return;
    }
    if let Ok(original) = serde_json::from_slice(&raw) {
        message.content = original;
    }
}
