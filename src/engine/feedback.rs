//! Citizen feedback on a resolved complaint

use super::EngineError;
use crate::models::{Actor, Complaint, ComplaintStatus, Feedback};
use chrono::{DateTime, Utc};

/// Record the reporter's verdict and close the complaint.
pub fn submit_feedback(
    complaint: &mut Complaint,
    actor: &Actor,
    feedback: Feedback,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if !actor.can_participate() || actor.user_id != Some(complaint.reporter) {
        return Err(EngineError::Forbidden);
    }
    if complaint.feedback.is_some() {
        return Err(EngineError::AlreadyFinalized);
    }

    let target = if feedback.confirmed {
        ComplaintStatus::CitizenConfirmed
    } else {
        ComplaintStatus::CitizenRejected
    };
    if complaint.status != ComplaintStatus::Resolved {
        return Err(EngineError::InvalidTransition {
            from: complaint.status,
            to: target,
        });
    }

    complaint.feedback = Some(feedback);
    complaint.status = target;
    complaint.closed = true;
    complaint.closed_at = Some(now);
    complaint.updated_at = now;
    Ok(())
}
