//! HTTP routes for the bridge page
//!
//! | Route | Answer |
//! |-------|--------|
//! | `GET /` | the page with the transaction and network injected |
//! | `GET /health` | `{"status", "service", "network"}` |
//! | `POST /splice` | `{"witness": hex}` → `{"tx": hex}`, or 422 with the error kind |
//!
//! `/splice` is stateless: it splices against the payload this page was
//! rendered for and remembers nothing about the call.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::core::paths::{page, server};
use crate::core::NetworkContext;
use crate::error::BridgeError;
use crate::splice::WitnessSplicer;
use crate::tx::{UnsignedTxPayload, WitnessFragment};

const TEMPLATE: &str = include_str!("../../static/bridge.html");

/// Page rendered once per `start()`; every request serves the same document.
#[derive(Clone)]
pub struct PageState {
    pub page: Arc<String>,
    pub payload: Arc<UnsignedTxPayload>,
    pub network: NetworkContext,
}

#[derive(Debug, Deserialize)]
pub struct SpliceRequest {
    pub witness: String,
}

/// JSON safe to place inside a `<script>` element.
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Fill the two injected data blocks of the page template.
pub fn render_page(payload: &UnsignedTxPayload, network: NetworkContext) -> String {
    let data = script_json(&json!({ "message": payload.as_hex() }));
    let net = script_json(&json!({ "network": network.explorer_prefix() }));
    TEMPLATE.replace(page::DATA_PLACEHOLDER, &data).replace(page::NETWORK_PLACEHOLDER, &net)
}

pub fn create_router(payload: &UnsignedTxPayload, network: NetworkContext) -> Router {
    let state = PageState {
        page: Arc::new(render_page(payload, network)),
        payload: Arc::new(payload.clone()),
        network,
    };
    Router::new()
        .route(server::INDEX, get(index))
        .route(server::HEALTH, get(health))
        .route(server::SPLICE, post(splice))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(s): State<PageState>) -> impl IntoResponse {
    Html(s.page.as_str().to_owned())
}

async fn health(State(s): State<PageState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "service": server::SERVICE, "network": s.network}))
}

async fn splice(State(s): State<PageState>, Json(req): Json<SpliceRequest>) -> impl IntoResponse {
    let finalized = WitnessFragment::from_hex(&req.witness)
        .map_err(BridgeError::InvalidWitness)
        .and_then(|witness| WitnessSplicer::splice(&s.payload, &witness));
    match finalized {
        Ok(tx) => (StatusCode::OK, Json(json!({"tx": tx.to_hex()}))),
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "splice request failed");
            let body = json!({"error": e.to_string(), "kind": e.kind(), "remedy": e.remedy()});
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body))
        }
    }
}
