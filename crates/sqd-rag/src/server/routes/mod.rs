//! Inference routes

pub mod score;

use axum::{routing::post, Router};

use crate::server::state::AppState;

/// Build the scoring routes
pub fn score_routes() -> Router<AppState> {
    Router::new().route("/score", post(score::score))
}
