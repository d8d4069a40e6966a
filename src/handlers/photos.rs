//! Photo upload and retrieval

use crate::db;
use crate::db::audit::AuditEvent;
use crate::engine::EngineError;
use crate::models::*;
use crate::storage::content_hash;
use crate::validation::{
    validate_filename_extensions, validate_photo_content, validate_photo_id, validate_photo_upload,
    ValidationError,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use super::error::{conflict_on_unique, ApiError, ApiResult};
use super::middleware::ClientIp;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct StorePhotoQuery {
    pub slot: PhotoSlot,
}

/// Store a photo under a caller-chosen id. Ids are write-once.
///
/// Before photos may be stored by any participating user, after photos only
/// by admins (they document a resolution).
pub async fn store_photo(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(client_ip): Extension<ClientIp>,
    Path(id): Path<String>,
    Query(query): Query<StorePhotoQuery>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    validate_photo_id(&id)?;

    let allowed = match query.slot {
        PhotoSlot::Before => actor.can_participate(),
        PhotoSlot::After => actor.is_admin(),
    };
    if !allowed {
        return Err(EngineError::Forbidden.into());
    }

    // Single file per request
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return Err(ValidationError::Required {
                field: "photo".to_string(),
            }
            .into())
        }
        Err(e) => {
            tracing::warn!("Multipart parsing error: {}", e);
            return Err(ValidationError::Invalid(format!("Failed to process upload ({})", e)).into());
        }
    };

    let original_filename = field.file_name().map(str::to_string);
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field.bytes().await.map_err(|e| {
        tracing::warn!("Failed to read photo bytes for {}: {}", id, e);
        ApiError::Validation(ValidationError::Invalid(format!(
            "Failed to read uploaded photo ({})",
            e
        )))
    })?;

    validate_photo_upload(&content_type, data.len(), state.max_photo_size)?;
    validate_photo_content(&content_type, &data)?;
    if let Some(name) = &original_filename {
        validate_filename_extensions(name)?;
    }

    let sha256 = content_hash(&data);
    let photo = db::photos::insert(
        &state.pool,
        &db::photos::NewPhoto {
            id: &id,
            slot: query.slot,
            mime_type: &content_type,
            byte_size: data.len() as i64,
            sha256: &sha256,
            uploaded_by: actor.user_id,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Photo id already exists"))?;

    if let Err(e) = state.photos.write(&id, &data).await {
        // No bytes, no metadata
        if let Err(cleanup_err) = db::photos::delete(&state.pool, &id).await {
            tracing::warn!("Failed to roll back metadata for photo {}: {}", id, cleanup_err);
        }
        return Err(e.into());
    }

    tracing::info!("Stored {:?} photo {} ({} bytes)", photo.slot, photo.id, photo.byte_size);
    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("photo_stored", "photo")
            .entity(&photo.id)
            .actor(actor.user_id, client_ip.as_deref())
            .details(serde_json::json!({ "slot": photo.slot, "sha256": photo.sha256 })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PhotoResponse::from(photo))),
    ))
}

/// Serve stored photo bytes
pub async fn fetch_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    validate_photo_id(&id)?;

    let photo = db::photos::get(&state.pool, &id)
        .await?
        .ok_or(EngineError::NotFound)?;
    let data = state.photos.read(&id).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, photo.mime_type),
            // Photos never change once stored
            (
                header::CACHE_CONTROL,
                "private, max-age=31536000, immutable".to_string(),
            ),
        ],
        data,
    ))
}
