//! Error classification, retry backoff, peer takeover, escalation, and the
//! execution-time monitor. See `spec.md` §4.11.

use crate::ids::AgentId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Case-insensitive substring classification, first match wins, per
/// `spec.md` §4.11.
pub fn classify(message: &str) -> Severity {
    let lower = message.to_lowercase();
    if lower.contains("auth") || lower.contains("permission") {
        Severity::Critical
    } else if lower.contains("timeout") || lower.contains("network") || lower.contains("connection") || lower.contains("econnrefused") {
        Severity::High
    } else if lower.contains("file-not-found") || lower.contains("enoent") || lower.contains("syntax") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn retry_budget(severity: Severity) -> u32 {
    match severity {
        Severity::Low => 3,
        Severity::Medium => 2,
        Severity::High => 1,
        Severity::Critical => 0,
    }
}

const BASE_DELAY_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub enum RecoveryAction {
    Retry { delay_ms: u64 },
    PeerTakeover { severity: Severity },
    EscalateToTop,
    EscalateToSupervisor,
}

/// Decides the next action for one failed attempt, per the decision table
/// in `spec.md` §4.11. `attempt` is the zero-based number of prior
/// attempts, i.e. the agent's current `retry_count`.
pub fn decide(message: &str, attempt: u32) -> RecoveryAction {
    let severity = classify(message);
    let budget = retry_budget(severity);

    if attempt < budget {
        RecoveryAction::Retry { delay_ms: BASE_DELAY_MS * 2u64.pow(attempt) }
    } else if severity == Severity::High {
        RecoveryAction::PeerTakeover { severity }
    } else if severity == Severity::Critical {
        RecoveryAction::EscalateToTop
    } else {
        RecoveryAction::EscalateToSupervisor
    }
}

/// Requests the first idle peer in the same layer to accept a task. The
/// caller supplies the pool of same-layer peer ids and a predicate for
/// idleness; this stays free of `Agent`/`AgentState` coupling so it can be
/// tested in isolation and driven by either live state or a snapshot.
pub fn first_idle_peer<'a>(peers: &'a [AgentId], is_idle: impl Fn(AgentId) -> bool) -> Option<AgentId> {
    peers.iter().copied().find(|p| is_idle(*p))
}

/// Single-shot timer with idempotent cancellation, the concrete mechanism
/// behind "a timeout_ms fires on_timeout" in `spec.md` §4.11 and the
/// decision-engine's reminder/timeout schedule in §4.7.
pub struct ExecutionMonitor {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExecutionMonitor {
    /// Spawns a task that sleeps for `timeout_ms` then invokes `on_timeout`
    /// unless cancelled first.
    pub fn start<F>(timeout_ms: u64, on_timeout: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(timeout_ms)).await;
            if !flag.load(Ordering::SeqCst) {
                on_timeout();
            }
        });
        Self { cancelled, handle: Some(handle) }
    }

    /// Idempotent: cancelling twice is a no-op the second time.
    pub fn cancel(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ExecutionMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !self.cancelled.load(Ordering::SeqCst) {
                warn!("execution monitor dropped without cancellation or firing");
            }
            handle.abort();
        }
    }
}

/// Callback contract an embedder can implement instead of closures, mirroring
/// `spec.md` §9's request/response replacement note (bounded timer, not a
/// promise graph).
#[async_trait]
pub trait TimeoutSink: Send + Sync {
    async fn on_timeout(&self, context: String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_first_match_wins() {
        assert_eq!(classify("Permission denied for auth token"), Severity::Critical);
        assert_eq!(classify("connection timeout"), Severity::High);
        assert_eq!(classify("ENOENT: file-not-found"), Severity::Medium);
        assert_eq!(classify("unexpected widget state"), Severity::Low);
    }

    #[test]
    fn retry_then_escalate_scenario() {
        // attempt 0: HIGH severity, budget 1, retry with 5s delay.
        match decide("connection timeout", 0) {
            RecoveryAction::Retry { delay_ms } => assert_eq!(delay_ms, 5_000),
            other => panic!("expected retry, got {other:?}"),
        }
        // attempt 1: budget exhausted, HIGH -> peer_takeover.
        assert!(matches!(decide("connection timeout", 1), RecoveryAction::PeerTakeover { .. }));
    }

    #[test]
    fn critical_has_zero_retry_budget() {
        assert!(matches!(decide("auth failure", 0), RecoveryAction::EscalateToTop));
    }

    #[test]
    fn low_severity_escalates_to_supervisor_after_budget() {
        assert!(matches!(decide("widget misaligned", 3), RecoveryAction::EscalateToSupervisor));
    }

    #[test]
    fn first_idle_peer_skips_busy_ones() {
        let a = AgentId::new();
        let b = AgentId::new();
        let peers = [a, b];
        let found = first_idle_peer(&peers, |id| id == b);
        assert_eq!(found, Some(b));
    }

    #[tokio::test]
    async fn cancelling_before_fire_prevents_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let mut monitor = ExecutionMonitor::start(30, move || flag.store(true, Ordering::SeqCst));
        monitor.cancel();
        monitor.cancel(); // idempotent
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn uncancelled_monitor_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _monitor = ExecutionMonitor::start(10, move || flag.store(true, Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
