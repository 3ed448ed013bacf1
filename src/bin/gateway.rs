//! HTTP front door: accepts submit/run requests and enqueues them for workers

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use judger::config::JudgerConfig;
use judger::jobs::{JobRequest, WorkerJob};
use judger::redis_manager::RedisManager;
use judger::submission::RunMode;

#[derive(Clone)]
struct AppState {
    redis: Arc<Mutex<RedisManager>>,
}

#[derive(Debug, Serialize)]
struct Accepted {
    msg: String,
    request_id: Uuid,
}

#[derive(Debug, Serialize)]
struct Rejected {
    msg: String,
}

type ApiResult = Result<Json<Accepted>, (StatusCode, Json<Rejected>)>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judger=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = JudgerConfig::from_env()?;
    let redis = RedisManager::connect(&config.redis_url).await?;

    let state = AppState {
        redis: Arc::new(Mutex::new(redis)),
    };
    let app = Router::new()
        .route("/submit", post(submit))
        .route("/run", post(run))
        .route("/health", get(health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.gateway_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.gateway_addr))?;
    info!("Gateway listening on {}", config.gateway_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Gateway server failed")?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn submit(State(state): State<AppState>, Json(request): Json<JobRequest>) -> ApiResult {
    enqueue(&state, RunMode::Graded, request).await
}

async fn run(State(state): State<AppState>, Json(request): Json<JobRequest>) -> ApiResult {
    enqueue(&state, RunMode::Custom, request).await
}

async fn enqueue(state: &AppState, mode: RunMode, mut request: JobRequest) -> ApiResult {
    request.request_id = Uuid::new_v4();

    // Reject malformed input here; language support is decided by the worker
    let valid = request
        .to_submission()
        .and_then(|submission| submission.validate(mode));
    if let Err(e) = valid {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(Rejected { msg: e.to_string() }),
        ));
    }

    let request_id = request.request_id;
    let job = match mode {
        RunMode::Graded => WorkerJob::Submit(request),
        RunMode::Custom => WorkerJob::Run(request),
    };

    if let Err(e) = state.redis.lock().await.push_job(&job).await {
        error!("Failed to enqueue {}: {:#}", request_id, e);
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Rejected {
                msg: "queue unavailable".to_string(),
            }),
        ));
    }

    info!("Enqueued {:?} job {}", mode, request_id);
    Ok(Json(Accepted {
        msg: "Task queued".to_string(),
        request_id,
    }))
}
