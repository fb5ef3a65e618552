use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use settlement_rust_core::{Disposition, RateQuoteCache, SubscriptionError, SubscriptionReconciler};
use std::sync::Arc;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub quotes: Arc<RateQuoteCache>,
    pub subscriptions: Arc<SubscriptionReconciler>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubscribeResponse {
    ok: bool,
    disposition: Disposition,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/rate", get(get_rate))
        .route("/api/subscribe", post(subscribe))
        .with_state(state)
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// GET /api/rate - cached mortgage rate quote
async fn get_rate(State(state): State<AppState>) -> impl IntoResponse {
    let quote = state.quotes.get_quote().await;
    Json(quote.as_ref().clone())
}

/// POST /api/subscribe - add a settlement to an email's alerts
async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Response {
    let result = state
        .subscriptions
        .reconcile(&req.email, &req.tag, &req.name, req.deadline.as_deref())
        .await;

    match result {
        Ok(disposition) => (
            StatusCode::OK,
            Json(SubscribeResponse {
                ok: true,
                disposition,
                message: disposition.message(req.name.trim()),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_status(e: &SubscriptionError) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(e: SubscriptionError) -> Response {
    let status = error_status(&e);
    if status.is_server_error() {
        error!("Subscribe failed: {}", e);
    } else {
        warn!("Rejected subscribe request: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            ok: false,
            error: e.to_string(),
        }),
    )
        .into_response()
}
