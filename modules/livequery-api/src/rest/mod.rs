pub mod ingest;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use livequery_common::{LiveQueryError, ProductSnapshot};

use crate::AppState;

#[derive(Deserialize)]
pub struct SnapshotRequest {
    file_key: Option<String>,
    raw: String,
    result: Option<String>,
}

fn error_response(err: LiveQueryError) -> Response {
    let status = match &err {
        LiveQueryError::NotFound(_) => StatusCode::NOT_FOUND,
        LiveQueryError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

/// READY answers waiting to be delivered.
pub async fn api_responses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.processor.questions().list_ready().await {
        Ok(records) => Json(json!({"responses": records})).into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn api_ack_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.processor.questions().mark_consumed(&id).await {
        Ok(()) => {
            info!(id = %id, "Answer acknowledged");
            Json(json!({"message": format!("Question {id} marked as CONSUMED.")})).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Processed product files that carry a result.
pub async fn api_file_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.processor.snapshots().ready_results().await {
        Ok(snapshots) => {
            let results: Vec<_> = snapshots
                .iter()
                .map(|s| json!({"result": s.result, "raw": s.raw.as_deref().unwrap_or("")}))
                .collect();
            Json(json!({"count": results.len(), "results": results})).into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

/// Register product text as a READY snapshot.
pub async fn api_register_snapshot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SnapshotRequest>,
) -> impl IntoResponse {
    if body.raw.trim().is_empty() {
        return error_response(LiveQueryError::Validation("raw must not be empty".into()));
    }

    let file_key = body
        .file_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4()));
    let snapshot = ProductSnapshot {
        result: body.result,
        ..ProductSnapshot::ready(file_key, body.raw)
    };

    match state.processor.snapshots().register(&snapshot).await {
        Ok(()) => {
            info!(file_key = %snapshot.file_key, "Product snapshot registered");
            (
                StatusCode::CREATED,
                Json(json!({"file_key": snapshot.file_key})),
            )
                .into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use livequery_common::QueueMessage;
    use livequery_pipeline::testing::ScriptedModel;
    use livequery_pipeline::{BatchProcessor, PipelineDeps};
    use livequery_store::MemoryRecordStore;
    use serde_json::Value;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tower::ServiceExt;

    use crate::queue::MemoryQueue;

    fn app() -> (axum::Router, Arc<AppState>, UnboundedReceiver<QueueMessage>) {
        let processor = BatchProcessor::new(
            PipelineDeps::builder()
                .comments(Arc::new(MemoryRecordStore::new()))
                .snapshots(Arc::new(MemoryRecordStore::new()))
                .model(Arc::new(ScriptedModel::new()))
                .build(),
        );
        let (queue, receiver) = MemoryQueue::new();
        let state = Arc::new(AppState {
            processor: Arc::new(processor),
            queue,
        });
        (crate::build_router(state.clone()), state, receiver)
    }

    async fn call(
        app: axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn ingest_accepts_a_single_string() {
        let (app, _, mut receiver) = app();
        let payload = json!({"comments": "Is it waterproof?"});
        let (status, body) = call(app, "POST", "/ingest", Some(payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"]["processed_count"], 1);
        let message = receiver.try_recv().unwrap();
        let comment: Value = serde_json::from_str(&message.body).unwrap();
        assert_eq!(comment["text"], "Is it waterproof?");
        assert_eq!(comment["author"], "manual_tester");
    }

    #[tokio::test]
    async fn ingest_skips_non_strings() {
        let (app, _, mut receiver) = app();
        let (status, body) = call(
            app,
            "POST",
            "/ingest",
            Some(json!({"comments": ["Price?", 7, null, "Colors?"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"]["original_count"], 4);
        assert_eq!(body["details"]["skipped_count"], 2);
        assert_eq!(body["details"]["processed_count"], 2);
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn ingest_rejects_empty_or_invalid_input() {
        for body in [json!({}), json!({"comments": []}), json!({"comments": [1, 2]})] {
            let (app, _, _rx) = app();
            let (status, _) = call(app, "POST", "/ingest", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn ack_marks_consumed_and_unknown_ids_are_404() {
        let (app, state, _rx) = app();
        let record = state
            .processor
            .questions()
            .create_initiated("What's the price?")
            .await
            .unwrap();
        state.processor.questions().mark_ready(&record.id, "$999").await.unwrap();

        let (status, body) = call(app.clone(), "GET", "/responses", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["responses"][0]["id"], record.id.as_str());
        assert_eq!(body["responses"][0]["status"], "READY");

        let ack = format!("/responses/{}/ack", record.id);
        let (status, _) = call(app.clone(), "POST", &ack, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(app.clone(), "GET", "/responses", None).await;
        assert_eq!(body["responses"].as_array().unwrap().len(), 0);

        let (status, _) = call(app, "POST", "/responses/question-nope/ack", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn registered_snapshots_show_up_in_file_status_once_they_have_a_result() {
        let (app, _, _rx) = app();
        let (status, _) = call(
            app.clone(),
            "POST",
            "/snapshots",
            Some(json!({"file_key": "tv.txt", "raw": "A TV", "result": "TV summary"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let bare = json!({"raw": "Bare"});
        let (status, _) = call(app.clone(), "POST", "/snapshots", Some(bare)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(app.clone(), "GET", "/file-status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["result"], "TV summary");
        assert_eq!(body["results"][0]["raw"], "A TV");

        let (status, _) = call(app, "POST", "/snapshots", Some(json!({"raw": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
