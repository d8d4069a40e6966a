//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of a complaint.
///
/// `Escalated` is accepted on the wire for querying the escalation queue but is
/// never stored: escalation is tracked by the `escalated` flag on the complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "complaint_status", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    CitizenConfirmed,
    CitizenRejected,
    Escalated,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "open",
            ComplaintStatus::InProgress => "inProgress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::CitizenConfirmed => "citizenConfirmed",
            ComplaintStatus::CitizenRejected => "citizenRejected",
            ComplaintStatus::Escalated => "escalated",
        }
    }

    /// Still waiting on an official (open or in progress).
    pub fn is_pending(&self) -> bool {
        matches!(self, ComplaintStatus::Open | ComplaintStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComplaintStatus::CitizenConfirmed | ComplaintStatus::CitizenRejected
        )
    }

    /// Resolved, confirmed or rejected: an after-photo exists from here on.
    pub fn is_resolved_or_later(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved) || self.is_terminal()
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "photo_slot", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PhotoSlot {
    Before,
    After,
}

// =============================================================================
// Actor
// =============================================================================

/// The authenticated (or anonymous) caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub role: UserRole,
}

impl Actor {
    pub fn guest() -> Self {
        Self {
            user_id: None,
            role: UserRole::Guest,
        }
    }

    pub fn user(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin && self.user_id.is_some()
    }

    /// Signed in with a role that may submit, escalate and give feedback.
    pub fn can_participate(&self) -> bool {
        self.user_id.is_some() && matches!(self.role, UserRole::User | UserRole::Admin)
    }
}

// =============================================================================
// Complaint
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub urgency: u8,
    pub category: String,
    pub location: String,
    pub photo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub comment: String,
    pub rating: Option<u8>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub public_id: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub photo_id: String,
    pub after_photo_id: Option<String>,
    pub status: ComplaintStatus,
    pub priority_score: PriorityScore,
    pub due_at: DateTime<Utc>,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reporter: Uuid,
    pub responses: Vec<String>,
    pub feedback: Option<Feedback>,
}

/// A complaint built at submission time, before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComplaint {
    pub public_id: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub photo_id: String,
    pub priority_score: PriorityScore,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reporter: Uuid,
}

/// Flat row of the `complaints` table.
#[derive(Debug, Clone, FromRow)]
pub struct ComplaintRow {
    pub id: i64,
    pub public_id: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub photo_id: String,
    pub after_photo_id: Option<String>,
    pub status: ComplaintStatus,
    pub urgency: i16,
    pub has_photo: bool,
    pub due_at: DateTime<Utc>,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reporter_id: Uuid,
    pub responses: Vec<String>,
    pub feedback_comment: Option<String>,
    pub feedback_rating: Option<i16>,
    pub feedback_confirmed: Option<bool>,
}

impl From<ComplaintRow> for Complaint {
    fn from(row: ComplaintRow) -> Self {
        let feedback = match (row.feedback_comment, row.feedback_confirmed) {
            (Some(comment), Some(confirmed)) => Some(Feedback {
                comment,
                rating: row.feedback_rating.and_then(|r| u8::try_from(r).ok()),
                confirmed,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            priority_score: PriorityScore {
                urgency: u8::try_from(row.urgency).unwrap_or(1),
                category: row.category.clone(),
                location: row.location.clone(),
                photo: row.has_photo,
            },
            public_id: row.public_id,
            category: row.category,
            description: row.description,
            location: row.location,
            photo_id: row.photo_id,
            after_photo_id: row.after_photo_id,
            status: row.status,
            due_at: row.due_at,
            escalated: row.escalated,
            escalated_at: row.escalated_at,
            closed: row.closed,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            reporter: row.reporter_id,
            responses: row.responses,
            feedback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitComplaintRequest {
    pub category: String,
    pub description: String,
    pub location: String,
    pub photo_id: String,
    /// Client-generated public id; the server generates one when absent.
    pub public_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitComplaintResponse {
    pub complaint: Complaint,
    pub public_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ComplaintStatus,
    pub after_photo_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(max = 2000))]
    pub comment: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddResponseRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateCheckRequest {
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheckResponse {
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalationResponse {
    /// False when the complaint had already been escalated by an earlier call.
    pub newly_escalated: bool,
    pub complaint: Complaint,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub escalated: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeLeftResponse {
    pub due_at: DateTime<Utc>,
    pub seconds_left: i64,
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicIdResponse {
    pub public_id: String,
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub role: UserRole,
}

/// Features this server supports, so clients can negotiate instead of probing.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub version: &'static str,
    pub features: Vec<&'static str>,
}

// =============================================================================
// Photo
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Photo {
    pub id: String,
    pub slot: PhotoSlot,
    pub mime_type: String,
    pub byte_size: i64,
    pub sha256: String,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoResponse {
    pub id: String,
    pub slot: PhotoSlot,
    pub mime_type: String,
    pub byte_size: i64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            slot: photo.slot,
            mime_type: photo.mime_type,
            byte_size: photo.byte_size,
            sha256: photo.sha256,
            created_at: photo.created_at,
        }
    }
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
