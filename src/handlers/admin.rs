//! Admin handlers
//!
//! Mounted under `/api/admin` behind [`require_admin`](super::middleware::require_admin).

use crate::db;
use crate::db::audit::AuditEvent;
use crate::db::complaints::MutationError;
use crate::engine::{escalation, lifecycle, EngineError};
use crate::models::*;
use crate::validation::validate_request;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::error::{conflict_on_unique, ApiResult};
use super::middleware::ClientIp;
use super::AppState;

/// Move a complaint along the official lifecycle
pub async fn update_complaint_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let after_photo_id = input
        .after_photo_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    // A referenced after photo must be stored and not resolve another complaint
    if input.status == ComplaintStatus::Resolved {
        if let Some(photo_id) = after_photo_id {
            let photo = db::photos::get(&state.pool, photo_id).await?;
            let attached_to = db::complaints::after_photo_owner(&state.pool, photo_id).await?;
            lifecycle::check_after_photo(photo_id, photo.as_ref(), attached_to, id)?;
        }
    }

    let note = input.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let now = Utc::now();
    let (complaint, ()) = db::complaints::mutate(&state.pool, id, |c| {
        lifecycle::update_status(c, &actor, input.status, after_photo_id, now)?;
        if let Some(note) = note {
            lifecycle::add_response(c, &actor, note, now)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| match e {
        // Lost a race for the same after photo
        MutationError::Database(err) => {
            conflict_on_unique(err, "After photo is already attached to another complaint")
        }
        other => other.into(),
    })?;

    tracing::info!("Complaint {} is now {}", complaint.id, complaint.status);

    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("status_changed", "complaint")
            .entity(complaint.id)
            .actor(actor.user_id, client_ip.as_deref())
            .details(serde_json::json!({
                "status": complaint.status.as_str(),
                "after_photo_id": complaint.after_photo_id,
            })),
    )
    .await;

    Ok((StatusCode::OK, Json(ApiResponse::success(complaint))))
}

/// Append an official response
pub async fn add_complaint_response(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(id): Path<i64>,
    Json(input): Json<AddResponseRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_request(&input)?;

    let now = Utc::now();
    let (complaint, ()) = db::complaints::mutate(&state.pool, id, |c| {
        lifecycle::add_response(c, &actor, &input.message, now)
    })
    .await?;

    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("response_added", "complaint")
            .entity(complaint.id)
            .actor(actor.user_id, client_ip.as_deref()),
    )
    .await;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(complaint))))
}

/// Assign a role to a stored user
pub async fn assign_user_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<AssignRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    // Keeps at least the acting admin in place
    if actor.user_id == Some(user_id) && input.role != UserRole::Admin {
        return Err(EngineError::PreconditionFailed(
            "admins cannot demote themselves".to_string(),
        )
        .into());
    }

    let user = db::users::set_role(&state.pool, user_id, input.role)
        .await?
        .ok_or(EngineError::NotFound)?;

    tracing::info!("User {} is now {:?}", user.username, user.role);
    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("role_assigned", "user")
            .entity(user.id)
            .actor(actor.user_id, client_ip.as_deref())
            .details(serde_json::json!({ "role": user.role })),
    )
    .await;

    Ok((StatusCode::OK, Json(ApiResponse::success(UserResponse::from(user)))))
}

/// Dashboard statistics
pub async fn get_dashboard_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let by_status: HashMap<&'static str, i64> = db::complaints::count_by_status(&state.pool)
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();
    let escalated = db::complaints::count_escalated_pending(&state.pool).await?;
    let overdue = db::complaints::count_overdue(&state.pool, Utc::now()).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "complaints_by_status": by_status,
            "escalated_pending": escalated,
            "overdue": overdue,
        }))),
    ))
}

/// Escalate every overdue complaint that isn't flagged yet
pub async fn sweep_escalations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let open = db::complaints::list_open(&state.pool).await?;
    let candidates = escalation::sweep_candidates(&open, now);

    let mut escalated = Vec::with_capacity(candidates.len());
    for id in candidates {
        match db::complaints::mutate(&state.pool, id, |c| escalation::escalate(c, &actor, now)).await {
            Ok((_, escalation::Escalation::Escalated)) => escalated.push(id),
            Ok((_, escalation::Escalation::AlreadyEscalated)) => {}
            // Resolved or escalated by a concurrent request since the scan
            Err(MutationError::Engine(EngineError::NotEligible(_) | EngineError::NotFound)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if !escalated.is_empty() {
        tracing::info!("Escalation sweep flagged {} complaint(s)", escalated.len());
        db::audit::log_audit(
            &state.pool,
            AuditEvent::new("escalation_sweep", "complaint")
                .actor(actor.user_id, client_ip.as_deref())
                .details(serde_json::json!({ "escalated": escalated })),
        )
        .await;
    }

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(SweepResponse { escalated })),
    ))
}
