//! Agent state machine: a fixed set of states and allowed transitions.
//! See `spec.md` §4.5.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Initializing,
    Idle,
    Working,
    WaitingApproval,
    Blocked,
    Failed,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl AgentState {
    /// The fixed transition table from `spec.md` §4.5.
    pub fn allows(self, to: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (Initializing, Idle)
                | (Initializing, Failed)
                | (Idle, Working)
                | (Idle, WaitingApproval)
                | (Idle, ShuttingDown)
                | (Working, Idle)
                | (Working, Blocked)
                | (Working, Failed)
                | (Working, WaitingApproval)
                | (WaitingApproval, Working)
                | (WaitingApproval, Idle)
                | (WaitingApproval, Blocked)
                | (Blocked, Working)
                | (Blocked, Failed)
                | (Failed, Working)
                | (Failed, Terminated)
                | (ShuttingDown, Terminated)
        )
    }
}

/// An audit-logged transition attempt, `Err` if disallowed.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: AgentState,
    pub to: AgentState,
    pub reason: String,
}

pub fn transition(from: AgentState, to: AgentState, reason: impl Into<String>) -> Result<TransitionRecord, crate::error::KernelError> {
    if !from.allows(to) {
        return Err(crate::error::KernelError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(TransitionRecord { from, to, reason: reason.into() })
}
