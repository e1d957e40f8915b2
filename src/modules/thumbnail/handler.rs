use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{scratch_path, stream_to_file};
use crate::modules::thumbnail::dto::ThumbnailResponse;
use crate::state::AppState;

/// Upload Thumbnail
/// Adds a single image to the content store
#[utoipa::path(
    post,
    path = "/api/v1/thumbnail",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Thumbnail stored", body = ApiResponse<ThumbnailResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Thumbnail"
)]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
        };

        if field.name() != Some("thumbnail") {
            continue;
        }

        let path = scratch_path(
            &state.config.scratch_dir(),
            Uuid::new_v4(),
            "-thumbnail",
            field.file_name(),
        );

        if let Err(e) = stream_to_file(field, &path).await {
            return ApiError(format!("Upload failed: {}", e), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }

        let added = state.storage.add_file(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove thumbnail scratch {}: {}", path.display(), e);
        }

        return match added {
            Ok(cid) => {
                info!("✅ Thumbnail stored as {}", cid);
                ApiSuccess(
                    ApiResponse::success(ThumbnailResponse { cid }, "Thumbnail stored"),
                    StatusCode::CREATED,
                )
                .into_response()
            }
            Err(e) => {
                error!("❌ Thumbnail ingest failed: {}", e);
                ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        };
    }

    ApiError("No thumbnail field found in multipart request".to_string(), StatusCode::BAD_REQUEST)
        .into_response()
}
