use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use studio_db::format_timestamp;
use studio_db::models::{CaptionRow, ImageRow};
use studio_pipeline::{
    ALLOWED_CONTENT_TYPES, ImageUpload, PipelineOutcome, caption_content, caption_id,
};
use studio_types::api::{AuthControls, UploadPage, UploadResponse};
use studio_types::models::SessionUser;

use crate::auth::AppState;
use crate::error::AppError;
use crate::feed::{PUBLIC_PATH, VOTING_PATH};

/// 25 MB upload limit for images
pub const MAX_UPLOAD_SIZE: usize = 25 * 1024 * 1024;

/// GET /protected/upload
pub async fn upload_page(Extension(user): Extension<SessionUser>) -> Json<UploadPage> {
    Json(UploadPage {
        signed_in_as: user.display_name().to_string(),
        allowed_types: ALLOWED_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
        auth: AuthControls::signed_in(),
    })
}

/// POST /protected/upload — raw image bytes with the file's Content-Type.
/// Runs the captioning pipeline and returns the generated captions.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    let upload = (!bytes.is_empty()).then(|| ImageUpload {
        content_type,
        bytes,
    });

    let outcome = state
        .pipeline
        .run(Some(&user.access_token), upload.as_ref())
        .await
        .map_err(|e| {
            warn!("Upload by {} failed: {}", user.id, e);
            AppError::from(e)
        })?;

    info!(
        "User {} uploaded image {} ({} captions)",
        user.id,
        outcome.image_id,
        outcome.captions.len()
    );

    record_outcome(&state, &outcome).await;

    Ok(Json(UploadResponse {
        cdn_url: outcome.cdn_url,
        image_id: outcome.image_id,
        captions: outcome.captions,
    }))
}

/// Mirror the registered image and its captions into the local store. The
/// upload already succeeded remotely, so failures here are only logged.
async fn record_outcome(state: &AppState, outcome: &PipelineOutcome) {
    let now = format_timestamp(chrono::Utc::now());
    let image = ImageRow {
        id: outcome.image_id.clone(),
        url: Some(outcome.cdn_url.clone()),
        is_public: false,
        created_datetime_utc: now.clone(),
    };
    let captions: Vec<CaptionRow> = outcome
        .captions
        .iter()
        .filter_map(|caption| {
            let content = caption_content(caption)?;
            Some(CaptionRow {
                id: caption_id(caption).unwrap_or_else(|| Uuid::new_v4().to_string()),
                content: Some(content.to_string()),
                image_id: outcome.image_id.clone(),
                is_public: false,
                is_featured: false,
                like_count: 0,
                created_datetime_utc: now.clone(),
            })
        })
        .collect();

    let db = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        db.db.insert_image(&image)?;
        for caption in &captions {
            db.db.insert_caption(caption)?;
        }
        Ok::<_, anyhow::Error>(captions.len())
    })
    .await;

    match result {
        Ok(Ok(count)) => {
            info!("Recorded image {} with {} captions", outcome.image_id, count);
            state.feed_cache.revalidate(PUBLIC_PATH);
            state.voting_cache.revalidate(VOTING_PATH);
        }
        Ok(Err(e)) => warn!("Failed to record image {}: {}", outcome.image_id, e),
        Err(e) => error!("spawn_blocking join error: {}", e),
    }
}
