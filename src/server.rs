// src/server.rs
//
// Thin HTTP surface over the pipeline. POST /api/run-tests queues a suite
// run on a background task and hands back an execution id; the run registry
// is the only thing the handlers share.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::llm::ModelService;
use crate::pipeline::{self, RunOptions, RunSummary};
use crate::sheets::{self, SheetStore};

pub struct ServerState {
    cfg: AppConfig,
    store: Arc<dyn SheetStore>,
    model: Arc<dyn ModelService>,
    sheet_url: Option<String>,
    runs: Mutex<HashMap<String, RunState>>,
}

/// Lifecycle of one queued suite run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunState {
    Queued { worksheet: String },
    Running { worksheet: String },
    Finished { summary: RunSummary },
    Failed { worksheet: String, error: String },
}

#[derive(Debug, Clone, Deserialize)]
struct RunRequest {
    worksheet_name: String,
    #[serde(default)]
    browser: Option<String>,
    #[serde(default)]
    headless: Option<bool>,
}

/* ---------- wiring ---------- */

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/config", get(config_handler))
        .route("/api/worksheets", get(worksheets_handler))
        .route("/api/run-tests", post(run_tests_handler))
        .route("/api/runs/:run_id", get(run_status_handler))
        .with_state(state)
}

pub async fn serve(
    cfg: AppConfig,
    store: Arc<dyn SheetStore>,
    model: Arc<dyn ModelService>,
    sheet_url: Option<String>,
) -> Result<()> {
    let addr = cfg.bind_addr.clone();
    let state = Arc::new(ServerState {
        cfg,
        store,
        model,
        sheet_url,
        runs: Mutex::new(HashMap::new()),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::ConfigLoad(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, "HTTP surface listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::ConfigLoad(format!("server stopped: {e}")))?;
    Ok(())
}

/* ---------- handlers ---------- */

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Effective configuration, secrets excluded.
async fn config_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let cfg = &state.cfg;
    let provider = match cfg.provider {
        ProviderKind::OpenAi => "openai",
        ProviderKind::Azure => "azure",
    };
    Json(json!({
        "success": true,
        "config": {
            "base_url": cfg.base_url,
            "sheet_id": cfg.sheet_id,
            "provider": provider,
            "browser": "chromium",
            "headless": cfg.headless,
            "test_prefix": cfg.test_prefix,
        }
    }))
}

async fn worksheets_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match sheets::list_worksheets(state.store.as_ref(), &state.cfg.test_prefix).await {
        Ok(mut worksheets) => {
            for ws in &mut worksheets {
                ws.url = state.sheet_url.clone();
            }
            let total = worksheets.len();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "sheet_url": state.sheet_url,
                    "worksheets": worksheets,
                    "total": total,
                })),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "worksheet listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn run_tests_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<RunRequest>,
) -> impl IntoResponse {
    if req.worksheet_name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "worksheet_name is required" })),
        )
            .into_response();
    }
    if let Some(browser) = req.browser.as_deref() {
        if browser != "chromium" {
            warn!(browser, "only chromium is driven; requested engine ignored");
        }
    }

    let id = Uuid::new_v4().to_string();
    state
        .runs
        .lock()
        .await
        .insert(id.clone(), RunState::Queued { worksheet: req.worksheet_name.clone() });
    info!(execution_id = %id, worksheet = %req.worksheet_name, "run queued");

    let task_state = state.clone();
    let task_id = id.clone();
    tokio::spawn(async move {
        execute_run(task_state, task_id, req).await;
    });

    (
        StatusCode::OK,
        Json(json!({ "success": true, "execution_id": id, "status": "queued" })),
    )
        .into_response()
}

async fn run_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let runs = state.runs.lock().await;
    match runs.get(&run_id) {
        Some(run) => (
            StatusCode::OK,
            Json(json!({ "success": true, "execution_id": run_id, "run": run })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": format!("unknown run id '{run_id}'") })),
        )
            .into_response(),
    }
}

/* ---------- background run ---------- */

async fn execute_run(state: Arc<ServerState>, id: String, req: RunRequest) {
    let worksheet = req.worksheet_name;
    let mut cfg = state.cfg.clone();
    if let Some(headless) = req.headless {
        cfg.headless = headless;
    }

    {
        let mut runs = state.runs.lock().await;
        runs.insert(id.clone(), RunState::Running { worksheet: worksheet.clone() });
    }

    let outcome = pipeline::run_suite(
        &cfg,
        state.store.as_ref(),
        state.model.as_ref(),
        &worksheet,
        &RunOptions::default(),
    )
    .await;

    let mut runs = state.runs.lock().await;
    match outcome {
        Ok(summary) => {
            info!(execution_id = %id, passed = summary.passed, failed = summary.failed, "run finished");
            runs.insert(id, RunState::Finished { summary });
        }
        Err(err) => {
            error!(execution_id = %id, error = %err, "run failed");
            runs.insert(id, RunState::Failed { worksheet, error: err.to_string() });
        }
    }
}
