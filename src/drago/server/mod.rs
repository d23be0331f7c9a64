// SPDX-License-Identifier: MIT

//! HTTP trigger surface
//!
//! - `GET /health` - liveness probe
//! - `POST /trigger` - seed a fresh run with a flat JSON object and start it
//!   in the background

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::drago::workflow::graph::{Graph, Scheduler};
use crate::drago::workflow::registry::HandlerRegistry;
use crate::drago::workflow::state::KvStore;
use crate::drago::workflow::types::NodeSpec;
use crate::engine::event::{LogReporter, Reporter};

/// Shared by every request; each trigger builds its own graph and bus
#[derive(Clone)]
pub struct AppState {
    /// Already validated workflow definition
    pub definition: Arc<Vec<NodeSpec>>,
    pub registry: HandlerRegistry,
    pub reporter: Arc<dyn Reporter>,
    pub workers: usize,
    /// Parent of every run's cancellation token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(definition: Vec<NodeSpec>, registry: HandlerRegistry, workers: usize) -> Self {
        Self {
            definition: Arc::new(definition),
            registry,
            reporter: Arc::new(LogReporter),
            workers: workers.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/trigger", post(trigger))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C, then cancel every in-flight run
pub async fn serve(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
            log::info!("Shutting down, cancelling in-flight runs");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn trigger(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let payload: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Rejected trigger payload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid input" })),
            );
        }
    };

    let graph = Arc::new(Graph::from_specs(state.definition.iter().cloned()));
    let scheduler = Scheduler::new(graph, state.registry.clone(), state.reporter.clone())
        .with_bus(KvStore::seeded(payload))
        .with_cancellation(state.shutdown.child_token());
    let run_id = scheduler.run_id();
    let workers = state.workers;

    tokio::spawn(async move {
        match scheduler.run_parallel(workers).await {
            Ok(summary) => log::info!(
                "run={} finished: {} succeeded, {} failed in {:?}",
                run_id,
                summary.succeeded(),
                summary.failed(),
                summary.elapsed
            ),
            Err(e) => log::error!("run={} could not be scheduled: {}", run_id, e),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "workflow started",
            "started_at": chrono::Utc::now().to_rfc3339(),
            "run_id": run_id,
        })),
    )
}
