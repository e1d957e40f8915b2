use axum::routing::post;
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handler;

pub fn router() -> Router<AppState> {
    Router::new().route("/thumbnail", post(handler::upload_thumbnail))
}
