// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal admin surface: a `/healthz` endpoint for liveness probes.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::StateEngine;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    zones: usize,
}

async fn healthz(State(state): State<Arc<StateEngine>>) -> Json<Health> {
    Json(Health { status: "ok", zones: state.zones().await.len() })
}

pub async fn serve(port: u16, state: Arc<StateEngine>, shutdown: CancellationToken) {
    let app = Router::new().route("/healthz", get(healthz)).with_state(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(addr = %addr, err = %e, "failed to bind admin listener, health endpoint disabled");
            return;
        }
    };
    info!(addr = %addr, "admin health endpoint listening");
    let _ = axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await }).await;
}
