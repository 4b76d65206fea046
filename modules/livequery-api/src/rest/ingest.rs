use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use livequery_common::{Comment, QueueMessage};

use crate::AppState;

/// Queue hand-typed comments. Accepts `{"comments": "text"}` or
/// `{"comments": ["text", ...]}`; non-string list items are skipped.
pub async fn api_ingest(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(body)) = body else {
        return bad_request("Invalid JSON in request body.");
    };

    let items = match body.get("comments") {
        Some(Value::String(text)) => vec![Value::String(text.clone())],
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        _ => {
            return bad_request(
                "Request body must contain a non-empty \"comments\" field \
                 as a string or a list of strings.",
            )
        }
    };

    let original_count = items.len();
    let mut skipped_count = 0;
    let mut messages = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(text) = item else {
            warn!(item = %item, "Skipping non-string comment");
            skipped_count += 1;
            continue;
        };
        match QueueMessage::from_comment(&Comment::manual(text)) {
            Ok(message) => messages.push(message),
            Err(e) => {
                warn!(error = %e, "Could not encode comment");
                skipped_count += 1;
            }
        }
    }

    let processed_count = messages.len();
    info!(
        original_count,
        skipped_count,
        processed_count,
        "Ingest request summarized"
    );
    if messages.is_empty() {
        return bad_request("No valid comments to process after filtering.");
    }

    for message in messages {
        if let Err(e) = state.queue.send(message) {
            error!(error = %e, "Failed to enqueue comment");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "An internal server error occurred."})),
            )
                .into_response();
        }
    }

    Json(json!({
        "message": format!("Successfully ingested {processed_count} comments."),
        "details": {
            "original_count": original_count,
            "skipped_count": skipped_count,
            "processed_count": processed_count,
        }
    }))
    .into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}
