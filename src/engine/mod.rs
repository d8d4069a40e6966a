//! Complaint lifecycle engine
//!
//! Pure domain logic: every operation takes the current time from the caller
//! and mutates an in-memory [`Complaint`](crate::models::Complaint). Persistence
//! and locking are the store's concern.
//!
//! - [`priority`]: urgency scoring at submission time
//! - [`sla`]: the 72 hour response window
//! - [`lifecycle`]: creation and official status transitions
//! - [`escalation`]: flagging overdue complaints
//! - [`feedback`]: citizen confirmation or rejection
//! - [`duplicate`]: advisory similarity check

pub mod duplicate;
pub mod escalation;
pub mod feedback;
pub mod lifecycle;
pub mod priority;
pub mod sla;

use crate::models::ComplaintStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Operation not permitted for this caller")]
    Forbidden,

    #[error("Cannot move complaint from {from} to {to}")]
    InvalidTransition {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Complaint is not eligible for escalation: {0}")]
    NotEligible(String),

    #[error("Feedback has already been submitted for this complaint")]
    AlreadyFinalized,

    #[error("Complaint not found")]
    NotFound,
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::models::{Complaint, ComplaintStatus, PriorityScore};
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// An open complaint created at `t0()` by `reporter`.
    pub fn complaint(reporter: Uuid) -> Complaint {
        let created_at = t0();
        Complaint {
            id: 1,
            public_id: "CL-1709283600000-k3j9x2m1q".to_string(),
            category: "Pothole".to_string(),
            description: "Large pothole in the left lane".to_string(),
            location: "Main Street near City Hall".to_string(),
            photo_id: "photo-before-1".to_string(),
            after_photo_id: None,
            status: ComplaintStatus::Open,
            priority_score: PriorityScore {
                urgency: 5,
                category: "Pothole".to_string(),
                location: "Main Street near City Hall".to_string(),
                photo: true,
            },
            due_at: super::sla::due_at(created_at),
            escalated: false,
            escalated_at: None,
            closed: false,
            closed_at: None,
            created_at,
            updated_at: created_at,
            reporter,
            responses: Vec::new(),
            feedback: None,
        }
    }
}
