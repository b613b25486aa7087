//! Scenario (e): retry then escalate.

use orchestrator_core::recovery::{decide, RecoveryAction, Severity};

#[tokio::test]
async fn connection_timeout_retries_once_then_requests_peer_takeover() {
    match decide("connection timeout", 0) {
        RecoveryAction::Retry { delay_ms } => assert_eq!(delay_ms, 5_000),
        other => panic!("expected a retry on the first attempt, got {other:?}"),
    }

    match decide("connection timeout", 1) {
        RecoveryAction::PeerTakeover { severity } => assert_eq!(severity, Severity::High),
        other => panic!("expected peer takeover once the retry budget is spent, got {other:?}"),
    }
}
