use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod command;
pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod ladder;
pub mod model;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/video", post(handler::upload_video))
        .route("/status", get(handler::encoding_status))
}
