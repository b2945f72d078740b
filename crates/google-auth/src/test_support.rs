//! Test doubles: a local stand-in for Google's token endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Form;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::registration::ClientRegistration;

const CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
const CLIENT_SECRET: &str = "test-secret";

#[derive(Default)]
struct Counters {
    exchanges: AtomicUsize,
    refreshes: AtomicUsize,
}

/// Token endpoint with a fixed set of accepted codes and refresh tokens.
///
/// `SLOW_REFRESH` is honoured after `SLOW_REFRESH_DELAY`, long enough for a
/// test to act while a refresh holds the client's grant lock.
pub struct MockTokenEndpoint {
    pub url: String,
    counters: Arc<Counters>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub const GOOD_CODE: &'static str = "4/good-code";
    pub const GOOD_REFRESH: &'static str = "1//rt-good";
    /// Accepted, but the response carries no refresh token.
    pub const NO_REFRESH_CODE: &'static str = "4/no-refresh-code";
    pub const SLOW_REFRESH: &'static str = "1//rt-slow";
    pub const SLOW_REFRESH_DELAY: Duration = Duration::from_millis(300);

    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let counters = Arc::new(Counters::default());

        let app = Router::new()
            .route("/token", post(token_handler))
            .with_state(counters.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/token"),
            counters,
            _handle: handle,
        }
    }

    pub fn exchanges(&self) -> usize {
        self.counters.exchanges.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.counters.refreshes.load(Ordering::SeqCst)
    }
}

async fn token_handler(
    State(counters): State<Arc<Counters>>,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if param(&params, "client_id") != CLIENT_ID || param(&params, "client_secret") != CLIENT_SECRET {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid_client" })),
        );
    }

    match param(&params, "grant_type") {
        "authorization_code" if param(&params, "code") == MockTokenEndpoint::GOOD_CODE => {
            let n = counters.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": format!("at-{n}"),
                    "refresh_token": MockTokenEndpoint::GOOD_REFRESH,
                    "expires_in": 3599,
                    "scope": crate::GMAIL_READONLY_SCOPE,
                    "token_type": "Bearer",
                })),
            )
        }
        "authorization_code" if param(&params, "code") == MockTokenEndpoint::NO_REFRESH_CODE => {
            counters.exchanges.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": "at-no-refresh",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                })),
            )
        }
        "refresh_token"
            if matches!(
                param(&params, "refresh_token"),
                MockTokenEndpoint::GOOD_REFRESH | MockTokenEndpoint::SLOW_REFRESH
            ) =>
        {
            if param(&params, "refresh_token") == MockTokenEndpoint::SLOW_REFRESH {
                tokio::time::sleep(MockTokenEndpoint::SLOW_REFRESH_DELAY).await;
            }
            counters.refreshes.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": "at-refreshed",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                })),
            )
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request",
            })),
        ),
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

/// Registration pointing at the given token endpoint.
pub fn registration_for(token_uri: &str) -> ClientRegistration {
    let json = serde_json::json!({
        "web": {
            "client_id": CLIENT_ID,
            "client_secret": CLIENT_SECRET,
            "redirect_uris": ["http://localhost:3000/oauth2callback"],
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
        }
    });
    ClientRegistration::from_json(&json.to_string()).unwrap()
}
