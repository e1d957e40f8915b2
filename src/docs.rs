use utoipa::OpenApi;

use crate::modules::thumbnail::dto::ThumbnailResponse;
use crate::modules::transcode::dto::{EncodingStatusResponse, StartEncodingResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::transcode::handler::upload_video,
        crate::modules::transcode::handler::encoding_status,
        crate::modules::thumbnail::handler::upload_thumbnail,
    ),
    components(
        schemas(StartEncodingResponse, EncodingStatusResponse, ThumbnailResponse)
    ),
    tags(
        (name = "Transcode", description = "HLS encoding and content store ingest"),
        (name = "Thumbnail", description = "Single image ingest")
    )
)]
pub struct ApiDoc;
