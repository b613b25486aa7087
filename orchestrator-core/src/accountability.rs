//! Warning accumulation, demotion, dismissal. See `spec.md` §4.8.

use crate::agent::{Agent, Layer};
use crate::ids::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct AccountabilityConfig {
    pub warning_threshold: u32,
    pub failure_threshold: u32,
}

impl Default for AccountabilityConfig {
    fn default() -> Self {
        Self { warning_threshold: 3, failure_threshold: 1 }
    }
}

/// What the caller (Team Lifecycle) must do as a result of an
/// accountability action: audit, notify, or hand off to the replacement
/// flow. Kept as data so this module stays free of bus/repository types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountabilityEffect {
    AuditWarning { agent: AgentId, reason: String },
    AuditDemotion { agent: AgentId, reason: String },
    AuditDismissal { agent: AgentId, reason: String },
    NotifyWarningIssue { agent: AgentId },
    NotifyDemotionNotice { agent: AgentId },
    NotifyDismissalNotice { supervisor: AgentId },
    RequestReplacement { agent: AgentId },
}

/// Increments `warnings_received`; at `warning_threshold` triggers
/// `dismiss_agent` instead of notifying, per `spec.md` §4.8.
pub fn issue_warning(agent: &mut Agent, reason: impl Into<String>, config: AccountabilityConfig) -> Vec<AccountabilityEffect> {
    let reason = reason.into();
    agent.metrics.warnings_received += 1;
    agent.metrics.last_warning_tick = Some(agent.metrics.last_active_tick);

    let mut effects = vec![AccountabilityEffect::AuditWarning { agent: agent.id, reason: reason.clone() }];

    if agent.metrics.warnings_received >= config.warning_threshold {
        effects.extend(dismiss_agent(agent, "warning threshold reached"));
    } else {
        effects.push(AccountabilityEffect::NotifyWarningIssue { agent: agent.id });
    }

    effects
}

/// Bottom-layer agents cannot be demoted further; the degrade path is a
/// warning instead, per `spec.md` §4.8.
pub fn demote_agent(agent: &mut Agent, reason: impl Into<String>, config: AccountabilityConfig) -> Vec<AccountabilityEffect> {
    if agent.layer() == Layer::Bottom {
        return issue_warning(agent, reason, config);
    }

    let reason = reason.into();
    vec![
        AccountabilityEffect::AuditDemotion { agent: agent.id, reason },
        AccountabilityEffect::NotifyDemotionNotice { agent: agent.id },
    ]
}

/// The only legal route from each state to `terminated`, per the fixed
/// transition table in `spec.md` §4.5 (most states cannot jump straight
/// there — `shutting_down`/`failed` are the sole direct predecessors).
fn terminate_path(from: crate::state::AgentState) -> &'static [crate::state::AgentState] {
    use crate::state::AgentState::*;
    match from {
        Terminated => &[],
        Failed | ShuttingDown => &[Terminated],
        Idle => &[ShuttingDown, Terminated],
        Working | Blocked => &[Failed, Terminated],
        WaitingApproval => &[Idle, ShuttingDown, Terminated],
        Initializing => &[Failed, Terminated],
    }
}

/// Terminates the agent and requests a replacement. Walks the fixed state
/// machine to `terminated` rather than attempting an illegal direct jump
/// (`spec.md` §4.8 says "transition agent to terminated"; §4.5's table
/// gates that behind `shutting_down`/`failed` from most starting states).
pub fn dismiss_agent(agent: &mut Agent, reason: impl Into<String>) -> Vec<AccountabilityEffect> {
    let reason = reason.into();
    for &next in terminate_path(agent.status) {
        match crate::state::transition(agent.status, next, reason.clone()) {
            Ok(record) => agent.status = record.to,
            Err(_) => break,
        }
    }

    let mut effects = vec![AccountabilityEffect::AuditDismissal { agent: agent.id, reason }];
    if let Some(supervisor) = agent.supervisor {
        effects.push(AccountabilityEffect::NotifyDismissalNotice { supervisor });
    }
    effects.push(AccountabilityEffect::RequestReplacement { agent: agent.id });
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{BottomAttributes, LayerAttributes};
    use crate::ids::TaskId;
    use crate::state::AgentState;
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

    #[test]
    fn three_warnings_trigger_dismissal_not_a_fourth_notice() {
        let config = AccountabilityConfig::default();
        let mut agent = bottom_agent();

        issue_warning(&mut agent, "missed deadline", config);
        assert_eq!(agent.metrics.warnings_received, 1);
        issue_warning(&mut agent, "missed deadline again", config);
        assert_eq!(agent.metrics.warnings_received, 2);
        let effects = issue_warning(&mut agent, "missed deadline thrice", config);

        assert_eq!(agent.metrics.warnings_received, 3);
        assert_eq!(agent.status, AgentState::Terminated);
        assert!(effects.iter().any(|e| matches!(e, AccountabilityEffect::AuditDismissal { .. })));
        assert!(!effects.iter().any(|e| matches!(e, AccountabilityEffect::NotifyWarningIssue { .. })));
    }

    #[test]
    fn demoting_a_bottom_agent_degrades_to_warning() {
        let mut agent = bottom_agent();
        let effects = demote_agent(&mut agent, "underperforming", AccountabilityConfig::default());
        assert!(effects.iter().any(|e| matches!(e, AccountabilityEffect::AuditWarning { .. })));
        assert!(!effects.iter().any(|e| matches!(e, AccountabilityEffect::AuditDemotion { .. })));
    }
}
