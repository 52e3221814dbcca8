//! Scoring endpoint: one chat turn per request

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde_json::json;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{conversation::flatten_history, ScoreRequest};

/// POST /score - Answer a chat turn
///
/// Returns `{"reply", "context"}` as JSON, or as two server-sent events when `stream` is set.
/// A client disconnect drops this future, which abandons any in-flight upstream call.
/// A body that does not decode, including history with an unknown role, is an input error.
pub async fn score(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|rejection| {
        Error::input(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let start = Instant::now();
    let history = flatten_history(request.chat_history);

    tracing::info!(
        "Score: \"{}\" ({} history turns, stream={})",
        request.chat_input,
        history.len(),
        request.stream
    );

    let response = state
        .pipeline()
        .handle_turn(&request.chat_input, &history)
        .await?;

    tracing::info!("Score completed in {}ms", start.elapsed().as_millis());

    if request.stream {
        let events = vec![
            Event::default().json_data(json!({ "reply": response.reply })),
            Event::default().json_data(json!({ "context": response.context })),
        ];
        return Ok(Sse::new(tokio_stream::iter(events)).into_response());
    }

    Ok(Json(response).into_response())
}
