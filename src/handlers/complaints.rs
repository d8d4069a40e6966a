//! Citizen-facing complaint handlers

use crate::db;
use crate::db::audit::AuditEvent;
use crate::engine::{duplicate, escalation, feedback, lifecycle, sla, EngineError};
use crate::models::*;
use crate::validation::{validate_request, validate_submit_complaint};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use std::net::SocketAddr;

use super::auth::{enforce_rate_limit, get_client_ip};
use super::error::{conflict_on_unique, ApiResult};
use super::middleware::ClientIp;
use super::AppState;

/// Max complaint submissions per IP per hour
const MAX_SUBMISSIONS_PER_HOUR: i64 = 20;

/// Length of the random suffix of a generated public id
const PUBLIC_ID_CODE_LEN: usize = 9;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: ComplaintStatus,
}

#[derive(Debug, Deserialize)]
pub struct TimeLeftQuery {
    pub due_at: DateTime<Utc>,
}

/// Submit a new complaint
pub async fn submit_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(input): Json<SubmitComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    let client_ip = get_client_ip(peer, &headers, &state.trusted_proxies);
    enforce_rate_limit(&state, &client_ip, "submit_complaint", MAX_SUBMISSIONS_PER_HOUR).await?;

    validate_submit_complaint(&input)?;

    let now = Utc::now();
    let public_id = match &input.public_id {
        Some(id) => id.trim().to_string(),
        None => generate_public_id(now),
    };
    let new = lifecycle::new_complaint(&input, public_id, &actor, now)?;

    // The before photo must already be stored by the reporter
    let photo = db::photos::get(&state.pool, &new.photo_id).await?;
    lifecycle::check_before_photo(&new.photo_id, photo.as_ref(), &actor)?;

    let complaint = db::complaints::insert(&state.pool, &new)
        .await
        .map_err(|e| conflict_on_unique(e, "Public id is already in use"))?;

    tracing::info!(
        "Complaint {} ({}) submitted, urgency {}",
        complaint.id,
        complaint.public_id,
        complaint.priority_score.urgency
    );
    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("complaint_submitted", "complaint")
            .entity(complaint.id)
            .actor(actor.user_id, Some(client_ip.as_str()))
            .details(serde_json::json!({
                "public_id": complaint.public_id,
                "category": complaint.category,
                "urgency": complaint.priority_score.urgency,
            })),
    )
    .await;

    let public_id = complaint.public_id.clone();
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SubmitComplaintResponse {
            complaint,
            public_id,
        })),
    ))
}

/// Hand out a fresh public id for clients that don't generate their own
pub async fn new_public_id() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(PublicIdResponse {
            public_id: generate_public_id(Utc::now()),
        })),
    )
}

pub async fn get_complaint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let complaint = db::complaints::get(&state.pool, id)
        .await?
        .ok_or(EngineError::NotFound)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(complaint))))
}

/// Complaints still waiting on an official (open or in progress)
pub async fn list_open_complaints(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let complaints = db::complaints::list_open(&state.pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(complaints))))
}

pub async fn list_complaints_by_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<impl IntoResponse> {
    let complaints = db::complaints::list_by_status(&state.pool, query.status).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(complaints))))
}

/// Reporter confirms or rejects the resolution
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(id): Path<i64>,
    Json(input): Json<FeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_request(&input)?;

    let verdict = Feedback {
        comment: input.comment.trim().to_string(),
        rating: input.rating,
        confirmed: input.confirmed,
    };
    let now = Utc::now();
    let (complaint, ()) = db::complaints::mutate(&state.pool, id, |c| {
        feedback::submit_feedback(c, &actor, verdict, now)
    })
    .await?;

    tracing::info!("Complaint {} closed as {}", complaint.id, complaint.status);
    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("feedback_submitted", "complaint")
            .entity(complaint.id)
            .actor(actor.user_id, client_ip.as_deref())
            .details(serde_json::json!({ "status": complaint.status.as_str() })),
    )
    .await;

    Ok((StatusCode::OK, Json(ApiResponse::success(complaint))))
}

/// Escalate an overdue complaint. Repeating the call is a no-op.
pub async fn escalate_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let (complaint, outcome) =
        db::complaints::mutate(&state.pool, id, |c| escalation::escalate(c, &actor, now)).await?;

    let newly_escalated = outcome == escalation::Escalation::Escalated;
    if newly_escalated {
        tracing::info!("Complaint {} escalated", complaint.id);
        db::audit::log_audit(
            &state.pool,
            AuditEvent::new("complaint_escalated", "complaint")
                .entity(complaint.id)
                .actor(actor.user_id, client_ip.as_deref()),
        )
        .await;
    }

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(EscalationResponse {
            newly_escalated,
            complaint,
        })),
    ))
}

/// Advisory check against descriptions of complaints still in progress
pub async fn duplicate_check(
    State(state): State<AppState>,
    Json(input): Json<DuplicateCheckRequest>,
) -> ApiResult<impl IntoResponse> {
    let existing = db::complaints::active_descriptions(&state.pool).await?;
    let is_dup = duplicate::is_duplicate(&input.description, existing.iter().map(String::as_str));

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(DuplicateCheckResponse { duplicate: is_dup })),
    ))
}

pub async fn time_left(Query(query): Query<TimeLeftQuery>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(time_left_response(query.due_at, Utc::now()))),
    )
}

fn time_left_response(due_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeLeftResponse {
    TimeLeftResponse {
        due_at,
        seconds_left: sla::time_left(due_at, now).num_seconds(),
        overdue: now > due_at,
    }
}

/// `CL-<unix millis>-<random base36>`
fn generate_public_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let code: String = (0..PUBLIC_ID_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("CL-{}-{}", now.timestamp_millis(), code)
}
