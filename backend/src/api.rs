//! HTTP surface: the websocket route and a health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config;
use crate::ws::{ws_handler, GameServer};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
}

pub fn router(server: Arc<GameServer>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(server)
}

async fn health(State(server): State<Arc<GameServer>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: config::VERSION,
        uptime: server.uptime_secs(),
    })
}
