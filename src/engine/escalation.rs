//! Escalation trigger
//!
//! Escalation is on demand: a caller asks for a complaint to be escalated and
//! the engine checks it against the SLA clock.

use super::{sla, EngineError};
use crate::models::{Actor, Complaint};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Escalated,
    /// An earlier call already escalated it; nothing changed.
    AlreadyEscalated,
}

pub fn escalate(
    complaint: &mut Complaint,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Escalation, EngineError> {
    if !actor.can_participate() {
        return Err(EngineError::Forbidden);
    }
    if complaint.status.is_resolved_or_later() {
        return Err(EngineError::NotEligible(format!(
            "complaint is already {}",
            complaint.status
        )));
    }
    if complaint.escalated {
        return Ok(Escalation::AlreadyEscalated);
    }
    if !sla::is_overdue(complaint, now) {
        return Err(EngineError::NotEligible(format!(
            "deadline {} has not passed",
            complaint.due_at.to_rfc3339()
        )));
    }

    complaint.escalated = true;
    complaint.escalated_at = Some(now);
    complaint.updated_at = now;
    Ok(Escalation::Escalated)
}

/// Complaints an escalation sweep would flag at `now`.
pub fn sweep_candidates(complaints: &[Complaint], now: DateTime<Utc>) -> Vec<i64> {
    complaints
        .iter()
        .filter(|c| c.status.is_pending() && !c.escalated && sla::is_overdue(c, now))
        .map(|c| c.id)
        .collect()
}
