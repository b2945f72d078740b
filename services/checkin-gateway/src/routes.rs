//! HTTP surface
//!
//! Endpoints:
//! - GET /authenticate/{name}  302 to the Google consent page, `state` = name
//! - GET /oauth2callback       redeem `code` for the user named by `state`
//! - GET /callback             alias of /oauth2callback
//! - GET /qr/{name}            check-in records for an authorized user
//! - GET /status/{name}        whether `name` holds a durable grant
//! - GET /health               liveness plus stored user count
//! - GET /metrics              Prometheus text exposition

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use google_auth::{AuthFlow, UserIdentity};
use mailbox::MailboxService;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthFlow>,
    pub mailbox: Arc<MailboxService>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` bounds concurrently handled requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/authenticate/{name}", get(authenticate))
        .route("/oauth2callback", get(oauth_callback))
        .route("/callback", get(oauth_callback))
        .route("/qr/{name}", get(check_in_records))
        .route("/status/{name}", get(authorization_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Records count and latency per route template.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();

    let response = next.run(request).await;
    crate::metrics::record_request(
        response.status().as_u16(),
        &route,
        start.elapsed().as_secs_f64(),
    );
    response
}

/// GET /authenticate/{name}
async fn authenticate(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.flow.begin_authorization(&name).await {
        Ok(url) => (StatusCode::FOUND, [(LOCATION, url)]).into_response(),
        Err(e) => {
            warn!(user = %name, error = %e, "cannot start authorization");
            AppError::from(e).into_text_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by Google when the user declines consent
    error: Option<String>,
}

/// GET /oauth2callback and /callback
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(reason) = params.error.as_deref() {
        warn!(user = ?params.state, reason, "provider returned an authorization error");
    }

    let result = state
        .flow
        .complete_authorization(params.code.as_deref(), params.state.as_deref())
        .await;

    match result {
        Ok(user) => {
            crate::metrics::record_token_exchange("success");
            (
                StatusCode::OK,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Authentication successful for {user}! You can close this window."),
            )
                .into_response()
        }
        Err(e) => {
            let error = AppError::from(e);
            let outcome = match &error {
                AppError::MissingParameter(_) | AppError::InvalidIdentity(_) => "invalid_request",
                AppError::ExchangeFailed(_) => "rejected",
                _ => "error",
            };
            crate::metrics::record_token_exchange(outcome);
            warn!(user = ?params.state, error = %error, "authorization callback failed");
            error.into_text_response()
        }
    }
}

/// GET /qr/{name}
async fn check_in_records(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let user = match UserIdentity::new(name.as_str()) {
        Ok(user) => user,
        Err(e) => return AppError::from(e).into_json_response(),
    };

    let client = match state.flow.authorized_client(&user).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            info!(user = %user, "records requested before authorization");
            return AppError::NotAuthorized { user: name }.into_json_response();
        }
        Err(e) => return AppError::from(e).into_json_response(),
    };

    match state.mailbox.fetch(&client).await {
        Ok(batch) => {
            crate::metrics::record_dropped_messages(batch.dropped);
            Json(batch.records).into_response()
        }
        Err(e) => {
            warn!(user = %user, error = %e, "mailbox fetch failed");
            AppError::from_mailbox(e, user.as_str()).into_json_response()
        }
    }
}

/// GET /status/{name}
async fn authorization_status(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let user = match UserIdentity::new(name.as_str()) {
        Ok(user) => user,
        Err(e) => return AppError::from(e).into_json_response(),
    };

    match state.flow.is_authorized(&user).await {
        Ok(authorized) => Json(serde_json::json!({
            "user": user.as_str(),
            "authorized": authorized,
        }))
        .into_response(),
        Err(e) => AppError::from(e).into_json_response(),
    }
}

/// GET /health
///
/// Always 200; an unreadable token directory shows up as `degraded`.
async fn health(State(state): State<AppState>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    let body = match state.flow.factory().store().count().await {
        Ok(stored) => serde_json::json!({
            "status": "healthy",
            "uptime_seconds": uptime,
            "stored_users": stored,
        }),
        Err(e) => {
            warn!(error = %e, "cannot list stored users");
            serde_json::json!({
                "status": "degraded",
                "uptime_seconds": uptime,
                "stored_users": null,
            })
        }
    };
    Json(body).into_response()
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
