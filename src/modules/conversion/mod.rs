use axum::Router;
use axum::routing::post;
use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handler;
pub mod service;

pub fn router() -> axum::Router<AppState> {
    Router::new().route("/convert", post(handler::convert))
}
