//! Complaint creation and the official status state machine
//!
//! ```text
//! open -> inProgress -> resolved -> citizenConfirmed | citizenRejected
//! ```
//!
//! Officials drive the first two steps; the last one belongs to the reporter
//! through [`feedback`](super::feedback). Escalation is a separate flag and
//! never replaces the status.

use super::{priority, sla, EngineError};
use crate::models::{
    Actor, Complaint, ComplaintStatus, NewComplaint, Photo, PhotoSlot, SubmitComplaintRequest,
};
use chrono::{DateTime, Utc};

/// Build a new open complaint for `reporter`.
pub fn new_complaint(
    input: &SubmitComplaintRequest,
    public_id: String,
    reporter: &Actor,
    now: DateTime<Utc>,
) -> Result<NewComplaint, EngineError> {
    let reporter_id = match reporter.user_id {
        Some(id) if reporter.can_participate() => id,
        _ => return Err(EngineError::Forbidden),
    };

    let category = priority::Category::from_name(&input.category)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| input.category.trim().to_string());
    let location = input.location.trim().to_string();
    let has_photo = !input.photo_id.trim().is_empty();

    Ok(NewComplaint {
        priority_score: priority::score(&category, &location, has_photo),
        public_id,
        category,
        description: input.description.trim().to_string(),
        location,
        photo_id: input.photo_id.trim().to_string(),
        due_at: sla::due_at(now),
        created_at: now,
        reporter: reporter_id,
    })
}

/// A submission may only reference a before photo the reporter uploaded.
pub fn check_before_photo(
    photo_id: &str,
    photo: Option<&Photo>,
    reporter: &Actor,
) -> Result<(), EngineError> {
    match photo {
        Some(p) if p.slot == PhotoSlot::Before => match (p.uploaded_by, reporter.user_id) {
            (Some(owner), Some(caller)) if owner == caller => Ok(()),
            _ => Err(EngineError::PreconditionFailed(format!(
                "before photo '{}' was uploaded by someone else",
                photo_id
            ))),
        },
        _ => Err(EngineError::PreconditionFailed(format!(
            "before photo '{}' has not been stored",
            photo_id
        ))),
    }
}

/// A resolution may only attach a stored after photo that no other complaint
/// already uses. `attached_to` is the complaint currently holding it, if any.
pub fn check_after_photo(
    photo_id: &str,
    photo: Option<&Photo>,
    attached_to: Option<i64>,
    complaint_id: i64,
) -> Result<(), EngineError> {
    match photo {
        Some(p) if p.slot == PhotoSlot::After => {}
        _ => {
            return Err(EngineError::PreconditionFailed(format!(
                "after photo '{}' has not been stored",
                photo_id
            )))
        }
    }
    match attached_to {
        Some(other) if other != complaint_id => Err(EngineError::PreconditionFailed(format!(
            "after photo '{}' is already attached to complaint {}",
            photo_id, other
        ))),
        _ => Ok(()),
    }
}

/// Apply an official status change.
///
/// Moving to `resolved` requires `after_photo_id`, which is attached in the
/// same step. An after-photo passed with any other transition is ignored.
pub fn update_status(
    complaint: &mut Complaint,
    actor: &Actor,
    target: ComplaintStatus,
    after_photo_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if !actor.is_admin() {
        return Err(EngineError::Forbidden);
    }

    match (complaint.status, target) {
        (ComplaintStatus::Open, ComplaintStatus::InProgress) => {}
        (ComplaintStatus::InProgress, ComplaintStatus::Resolved) => {
            let photo = after_photo_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    EngineError::PreconditionFailed(
                        "an after photo is required to resolve a complaint".to_string(),
                    )
                })?;
            complaint.after_photo_id = Some(photo.to_string());
        }
        (from, to) => return Err(EngineError::InvalidTransition { from, to }),
    }

    complaint.status = target;
    complaint.updated_at = now;
    Ok(())
}

/// Append an official response to a complaint that is not yet closed.
pub fn add_response(
    complaint: &mut Complaint,
    actor: &Actor,
    message: &str,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if !actor.is_admin() {
        return Err(EngineError::Forbidden);
    }
    if complaint.closed {
        return Err(EngineError::PreconditionFailed(
            "complaint is closed".to_string(),
        ));
    }

    complaint.responses.push(message.trim().to_string());
    complaint.updated_at = now;
    Ok(())
}
