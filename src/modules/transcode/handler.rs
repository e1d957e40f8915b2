use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{scratch_path, stream_to_file};
use crate::modules::transcode::dto::*;
use crate::modules::transcode::model::JobStatus;
use crate::modules::transcode::service::TranscodeService;
use crate::state::AppState;

/// Upload Video
/// Streams the source to scratch storage and queues an HLS encode
#[utoipa::path(
    post,
    path = "/api/v1/video",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Encoding started", body = ApiResponse<StartEncodingResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Transcode"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
        };

        if field.name() != Some("video") {
            continue;
        }

        let source = scratch_path(
            &state.config.scratch_dir(),
            Uuid::new_v4(),
            "",
            field.file_name(),
        );
        info!("🎥 Receiving upload into {}", source.display());

        if let Err(e) = stream_to_file(field, &source).await {
            return ApiError(format!("Upload failed: {}", e), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }

        let id = TranscodeService::submit(state, source).await;
        return ApiSuccess(
            ApiResponse::success(StartEncodingResponse { id }, "Encoding started"),
            StatusCode::ACCEPTED,
        )
        .into_response();
    }

    ApiError("No video field found in multipart request".to_string(), StatusCode::BAD_REQUEST).into_response()
}

/// Encoding Status
/// Finished results are returned once, later polls answer 404
#[utoipa::path(
    get,
    path = "/api/v1/status",
    params(StatusQuery),
    responses(
        (status = 202, description = "Still encoding", body = ApiResponse<EncodingStatusResponse>),
        (status = 201, description = "Encoded and stored", body = ApiResponse<EncodingStatusResponse>),
        (status = 400, description = "Missing or invalid id"),
        (status = 404, description = "Unknown job"),
        (status = 500, description = "Encoding failed", body = ApiResponse<EncodingStatusResponse>)
    ),
    tag = "Transcode"
)]
pub async fn encoding_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let Some(raw) = query.id.filter(|id| !id.is_empty()) else {
        return ApiError("Missing job id".to_string(), StatusCode::BAD_REQUEST).into_response();
    };
    let id = match Uuid::parse_str(&raw) {
        Ok(id) => id,
        Err(e) => return ApiError(format!("Invalid job id: {}", e), StatusCode::BAD_REQUEST).into_response(),
    };

    let status = TranscodeService::query(state, id).await;
    let code = match &status {
        JobStatus::NotFound => StatusCode::NOT_FOUND,
        JobStatus::InProgress { .. } => StatusCode::ACCEPTED,
        JobStatus::Done { .. } => StatusCode::CREATED,
        JobStatus::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match EncodingStatusResponse::from_status(status) {
        None => ApiError("Job not found".to_string(), code).into_response(),
        Some(res) if res.error.is_some() => {
            ApiSuccess(ApiResponse::failure(res, "Encoding failed"), code).into_response()
        }
        Some(res) if res.finished => {
            ApiSuccess(ApiResponse::success(res, "Encoding finished"), code).into_response()
        }
        Some(res) => ApiSuccess(ApiResponse::success(res, "Encoding in progress"), code).into_response(),
    }
}
