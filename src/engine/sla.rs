//! SLA clock

use crate::models::Complaint;
use chrono::{DateTime, Duration, Utc};

/// Hours an official has to act before a complaint becomes eligible for escalation.
pub const SLA_WINDOW_HOURS: i64 = 72;

pub fn sla_window() -> Duration {
    Duration::hours(SLA_WINDOW_HOURS)
}

/// Deadline for a complaint created at `created_at`. Fixed at creation.
pub fn due_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + sla_window()
}

/// Time remaining until `due_at`, never negative.
pub fn time_left(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (due_at - now).max(Duration::zero())
}

pub fn is_overdue(complaint: &Complaint, now: DateTime<Utc>) -> bool {
    now > complaint.due_at && !complaint.status.is_resolved_or_later()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{complaint, t0};
    use crate::models::ComplaintStatus;
    use uuid::Uuid;

    #[test]
    fn test_due_at_is_72_hours_after_creation() {
        assert_eq!(due_at(t0()) - t0(), Duration::hours(72));
    }

    #[test]
    fn test_time_left_counts_down() {
        let due = due_at(t0());
        assert_eq!(time_left(due, t0()), Duration::hours(72));
        assert_eq!(
            time_left(due, t0() + Duration::hours(70)),
            Duration::hours(2)
        );
    }

    #[test]
    fn test_time_left_never_negative() {
        let due = due_at(t0());
        assert_eq!(time_left(due, due), Duration::zero());
        assert_eq!(time_left(due, due + Duration::days(3)), Duration::zero());
    }

    #[test]
    fn test_overdue_only_after_deadline() {
        let c = complaint(Uuid::new_v4());
        assert!(!is_overdue(&c, c.due_at));
        assert!(is_overdue(&c, c.due_at + Duration::seconds(1)));
    }

    #[test]
    fn test_resolved_complaints_are_never_overdue() {
        let mut c = complaint(Uuid::new_v4());
        let late = c.due_at + Duration::days(1);
        for status in [
            ComplaintStatus::Resolved,
            ComplaintStatus::CitizenConfirmed,
            ComplaintStatus::CitizenRejected,
        ] {
            c.status = status;
            assert!(!is_overdue(&c, late));
        }
        c.status = ComplaintStatus::InProgress;
        assert!(is_overdue(&c, late));
    }
}
