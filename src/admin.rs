// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admin HTTP server: health, readiness, metrics, shutdown and debug lookups.
//!
//! Routes:
//! - `GET  /healthz` - process is up
//! - `GET  /readyz` - 200 once every reflector has synced, 503 before
//! - `GET  /metrics` - Prometheus text exposition
//! - `POST /shutdown` - stop the mirror (409 if already stopping)
//! - `GET  /services` - mirrored services grouped by namespace
//! - `GET  /names` - every name currently served
//! - `GET  /resolve?name=<query>[&exact=true]` - run one query

use crate::metrics::gather_metrics;
use crate::resolver::ResolutionEngine;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Content type of the Prometheus text format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State shared by every handler.
#[derive(Clone)]
pub struct AdminState {
    engine: Arc<ResolutionEngine>,
}

impl AdminState {
    #[must_use]
    pub fn new(engine: Arc<ResolutionEngine>) -> Self {
        Self { engine }
    }
}

/// Build the admin router.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/shutdown", post(shutdown))
        .route("/services", get(services))
        .route("/names", get(names))
        .route("/resolve", get(resolve))
        .with_state(state)
}

/// Serve the admin router on `addr` until the mirror is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AdminState) -> std::io::Result<()> {
    let mut shutdown = state.engine.mirror().shutdown_signal();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Admin server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<AdminState>) -> Response {
    let mirror = state.engine.mirror();
    let synced = mirror.is_synced();
    let reflectors: BTreeMap<&str, String> = mirror
        .reflector_states()
        .into_iter()
        .map(|(kind, reflector_state)| (kind, reflector_state.to_string()))
        .collect();

    let status = if synced {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "synced": synced, "reflectors": reflectors }))).into_response()
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn shutdown(State(state): State<AdminState>) -> Response {
    match state.engine.mirror().stop() {
        Ok(()) => {
            info!("Shutdown requested through admin server");
            (StatusCode::OK, "shutting down").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected shutdown request");
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
    }
}

async fn services(State(state): State<AdminState>) -> Json<BTreeMap<String, Vec<String>>> {
    let grouped = state
        .engine
        .mirror()
        .services_by_namespace()
        .into_iter()
        .map(|(namespace, services)| {
            let names = services
                .iter()
                .map(|svc| svc.metadata.name.clone().unwrap_or_default())
                .collect();
            (namespace, names)
        })
        .collect();
    Json(grouped)
}

async fn names(State(state): State<AdminState>) -> Json<Vec<String>> {
    Json(state.engine.served_names())
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    name: String,
    #[serde(default)]
    exact: bool,
}

async fn resolve(State(state): State<AdminState>, Query(params): Query<ResolveParams>) -> Response {
    match state.engine.resolve(&params.name, params.exact) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod admin_tests;
