use std::sync::Arc;
use std::time::Duration;

use ai_client::Llama;
use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livequery_common::Config;
use livequery_pipeline::{BatchProcessor, PipelineConfig, PipelineDeps};
use livequery_store::{MemoryRecordStore, PgRecordStore, RecordStore};

mod queue;
mod rest;

use queue::{MemoryQueue, QueueSettings};

pub struct AppState {
    pub processor: Arc<BatchProcessor>,
    pub queue: MemoryQueue,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Comment intake
        .route("/ingest", post(rest::ingest::api_ingest))
        // Answers
        .route("/responses", get(rest::api_responses))
        .route("/responses/{id}/ack", post(rest::api_ack_response))
        // Product context
        .route("/file-status", get(rest::api_file_status))
        .route("/snapshots", post(rest::api_register_snapshot))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

/// Comment and snapshot stores: Postgres when DATABASE_URL is set, otherwise
/// in memory.
async fn open_stores(config: &Config) -> Result<(Arc<dyn RecordStore>, Arc<dyn RecordStore>)> {
    let Some(url) = &config.database_url else {
        info!("DATABASE_URL not set, using in-memory stores");
        return Ok((
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryRecordStore::new()),
        ));
    };

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    let comments = PgRecordStore::new(pool.clone(), config.comments_table.clone())?;
    let snapshots = PgRecordStore::new(pool, config.processing_table.clone())?;
    comments.migrate().await?;
    snapshots.migrate().await?;
    Ok((Arc::new(comments), Arc::new(snapshots)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("livequery=info".parse()?))
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let (comments, snapshots) = open_stores(&config).await?;

    let model = Llama::new(config.llama_api_key.clone(), config.llama_model.clone())
        .with_base_url(config.llama_api_url.clone())
        .with_timeout(Duration::from_secs(config.llm_timeout_secs));

    let processor = Arc::new(BatchProcessor::new(
        PipelineDeps::builder()
            .comments(comments)
            .snapshots(snapshots)
            .model(Arc::new(model))
            .config(PipelineConfig::from(&config))
            .build(),
    ));

    let (queue, receiver) = MemoryQueue::new();
    tokio::spawn(queue::run_consumer(
        queue.clone(),
        receiver,
        processor.clone(),
        QueueSettings::from(&config),
    ));

    let app = build_router(Arc::new(AppState { processor, queue }));

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("LiveQuery API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
