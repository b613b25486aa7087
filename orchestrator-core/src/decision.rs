//! Signature/veto/appeal decision protocol. See `spec.md` §4.7.

use crate::error::{KernelError, KernelResult};
use crate::ids::{AgentId, AppealId, DecisionId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    TechnicalProposal,
    TaskAllocation,
    ResourceAdjustment,
    MilestoneConfirmation,
}

impl DecisionType {
    /// Signature threshold defaults from `spec.md` §4.7.
    pub fn threshold(self) -> usize {
        match self {
            DecisionType::TechnicalProposal => 2,
            DecisionType::TaskAllocation => 2,
            DecisionType::ResourceAdjustment => 2,
            DecisionType::MilestoneConfirmation => 3,
        }
    }

    /// The content key this decision type requires, per `spec.md` §4.7.
    fn required_content_key(self) -> &'static str {
        match self {
            DecisionType::TechnicalProposal => "proposal",
            DecisionType::TaskAllocation => "task_id",
            DecisionType::ResourceAdjustment => "adjustment",
            DecisionType::MilestoneConfirmation => "milestone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
    Appealing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub task_id: TaskId,
    pub proposer: AgentId,
    pub decision_type: DecisionType,
    pub content: Value,
    pub required_signers: Vec<AgentId>,
    pub signers: HashSet<AgentId>,
    pub vetoers: HashSet<AgentId>,
    pub status: DecisionStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Decision {
    fn is_terminal(&self) -> bool {
        matches!(self.status, DecisionStatus::Approved | DecisionStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Support,
    Oppose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppealVote {
    pub voter: AgentId,
    pub vote: Vote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealResult {
    Unset,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,
    pub decision_id: DecisionId,
    pub appealer: AgentId,
    pub arguments: String,
    pub votes: Vec<AppealVote>,
    pub result: AppealResult,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// What the caller should do after a decision-engine call that schedules
/// off-clock work. `Repositories`/`MessageSink` wiring happens in
/// `TeamLifecycle`; this module only decides *what* should be sent.
#[derive(Debug, Clone)]
pub enum DecisionEffect {
    SignatureRequested { decision_id: DecisionId, signer: AgentId },
    Approved { decision_id: DecisionId, proposer: AgentId },
    Rejected { decision_id: DecisionId, proposer: AgentId, reason: String },
    VoteRequested { appeal_id: AppealId, voter: AgentId },
    AppealResolved { decision_id: DecisionId, proposer: AgentId, result: AppealResult },
}

#[derive(Debug, Clone)]
pub struct ProposeRequest {
    pub proposer: AgentId,
    pub decision_type: DecisionType,
    pub content: Value,
    pub required_signers: Vec<AgentId>,
}

/// Validates and constructs a new `pending` decision plus the signature
/// requests it implies. Does not perform I/O: callers persist/send.
pub fn propose(task_id: TaskId, req: ProposeRequest) -> KernelResult<(Decision, Vec<DecisionEffect>)> {
    if req.required_signers.is_empty() {
        return Err(KernelError::Validation("required_signers must not be empty".into()));
    }
    let key = req.decision_type.required_content_key();
    if req.content.get(key).is_none() {
        return Err(KernelError::Validation(format!(
            "{:?} requires content key '{key}'",
            req.decision_type
        )));
    }

    let decision = Decision {
        id: DecisionId::new(),
        task_id,
        proposer: req.proposer,
        decision_type: req.decision_type,
        content: req.content,
        required_signers: req.required_signers.clone(),
        signers: HashSet::new(),
        vetoers: HashSet::new(),
        status: DecisionStatus::Pending,
        created_at: Utc::now(),
        approved_at: None,
        rejected_at: None,
    };

    let effects = req
        .required_signers
        .into_iter()
        .map(|signer| DecisionEffect::SignatureRequested { decision_id: decision.id, signer })
        .collect();

    Ok((decision, effects))
}

/// Records a signature. Returns the effects the caller must act on
/// (notifying the proposer on approval).
pub fn sign(decision: &mut Decision, signer: AgentId) -> KernelResult<Vec<DecisionEffect>> {
    if decision.status != DecisionStatus::Pending {
        return Err(KernelError::DecisionNotPending);
    }
    if !decision.required_signers.contains(&signer) {
        return Err(KernelError::SignerNotAuthorized);
    }
    if decision.signers.contains(&signer) || decision.vetoers.contains(&signer) {
        return Err(KernelError::SignerAlreadyActed);
    }

    decision.signers.insert(signer);

    if decision.signers.len() >= decision.decision_type.threshold() {
        decision.status = DecisionStatus::Approved;
        decision.approved_at = Some(Utc::now());
        return Ok(vec![DecisionEffect::Approved { decision_id: decision.id, proposer: decision.proposer }]);
    }

    Ok(Vec::new())
}

/// Records a veto, unconditionally rejecting the decision.
pub fn veto(decision: &mut Decision, vetoer: AgentId, reason: impl Into<String>) -> KernelResult<Vec<DecisionEffect>> {
    if decision.status != DecisionStatus::Pending {
        return Err(KernelError::DecisionNotPending);
    }
    if !decision.required_signers.contains(&vetoer) {
        return Err(KernelError::SignerNotAuthorized);
    }

    let reason = reason.into();
    decision.vetoers.insert(vetoer);
    decision.status = DecisionStatus::Rejected;
    decision.rejected_at = Some(Utc::now());

    Ok(vec![DecisionEffect::Rejected { decision_id: decision.id, proposer: decision.proposer, reason }])
}

/// Applied when a decision's timeout fires while still pending.
pub fn timeout(decision: &mut Decision) -> KernelResult<Vec<DecisionEffect>> {
    if decision.status != DecisionStatus::Pending {
        return Ok(Vec::new());
    }
    decision.status = DecisionStatus::Rejected;
    decision.rejected_at = Some(Utc::now());
    Ok(vec![DecisionEffect::Rejected {
        decision_id: decision.id,
        proposer: decision.proposer,
        reason: "timeout".into(),
    }])
}

/// Opens an appeal against a rejected decision, soliciting votes from the
/// given top-layer roster.
pub fn appeal(
    decision: &mut Decision,
    appealer: AgentId,
    arguments: impl Into<String>,
    roster: &[AgentId],
) -> KernelResult<(Appeal, Vec<DecisionEffect>)> {
    if decision.status != DecisionStatus::Rejected {
        return Err(KernelError::AppealRejected("decision is not rejected".into()));
    }
    if appealer != decision.proposer {
        return Err(KernelError::AppealRejected("only the original proposer may appeal".into()));
    }

    decision.status = DecisionStatus::Appealing;

    let record = Appeal {
        id: AppealId::new(),
        decision_id: decision.id,
        appealer,
        arguments: arguments.into(),
        votes: Vec::new(),
        result: AppealResult::Unset,
        created_at: Utc::now(),
        resolved_at: None,
    };

    let effects = roster
        .iter()
        .map(|voter| DecisionEffect::VoteRequested { appeal_id: record.id, voter: *voter })
        .collect();

    Ok((record, effects))
}

/// Records one appeal vote. If every roster seat has voted, resolves the
/// appeal (`support/total >= 2/3`, rounded up) and mutates `decision`
/// accordingly.
pub fn cast_appeal_vote(
    appeal: &mut Appeal,
    decision: &mut Decision,
    voter: AgentId,
    vote: Vote,
    roster_size: usize,
) -> KernelResult<Vec<DecisionEffect>> {
    if appeal.result != AppealResult::Unset {
        return Err(KernelError::AppealRejected("appeal already resolved".into()));
    }
    if appeal.votes.iter().any(|v| v.voter == voter) {
        return Err(KernelError::SignerAlreadyActed);
    }

    appeal.votes.push(AppealVote { voter, vote });

    if appeal.votes.len() < roster_size {
        return Ok(Vec::new());
    }

    let support = appeal.votes.iter().filter(|v| v.vote == Vote::Support).count();
    // Ceiling division for the 2/3 threshold.
    let needed = (2 * roster_size + 2) / 3;
    let result = if support >= needed { AppealResult::Success } else { AppealResult::Failed };

    appeal.result = result;
    appeal.resolved_at = Some(Utc::now());

    decision.status = if result == AppealResult::Success {
        decision.approved_at = Some(Utc::now());
        DecisionStatus::Approved
    } else {
        decision.rejected_at = Some(Utc::now());
        DecisionStatus::Rejected
    };

    Ok(vec![DecisionEffect::AppealResolved {
        decision_id: decision.id,
        proposer: decision.proposer,
        result,
    }])
}
