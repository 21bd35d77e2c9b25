//! Same-origin request relay for the Polon dashboard.
//!
//! `GET /proxy?url=<target>` forwards to the target with the process-wide
//! response cache applied. Upstream failure returns a `502` JSON envelope
//! (`{"error": …}`) instead of throwing, so the fetch cascade on the client
//! side can treat this relay as one ordinary stage.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use polon_data::{ResponseCache, cache};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

struct RelayState {
    cache: ResponseCache,
    client: reqwest::Client,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

#[tokio::main]
async fn main() {
    init_logging();

    // Configurable via RELAY_ADDR env var (default: 0.0.0.0:8777)
    let addr_str = std::env::var("RELAY_ADDR").unwrap_or_else(|_| "0.0.0.0:8777".to_string());
    let addr = addr_str
        .parse::<SocketAddr>()
        .unwrap_or_else(|_| "0.0.0.0:8777".parse().expect("default relay addr"));

    let ttl = std::env::var("RELAY_CACHE_TTL_MS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(cache::DEFAULT_TTL);

    let upstream_timeout = std::env::var("RELAY_UPSTREAM_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(8));

    let client = reqwest::Client::builder()
        .timeout(upstream_timeout)
        .build()
        .expect("failed to build HTTP client");

    let state = Arc::new(RelayState {
        cache: ResponseCache::default(),
        client,
        ttl,
    });

    let app = Router::new()
        .route("/proxy", get(proxy))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("relay listening on http://{addr} (cache ttl {ttl:?})");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind relay address");
    axum::serve(listener, app).await.expect("relay server error");
}

async fn proxy(State(state): State<Arc<RelayState>>, Query(query): Query<ProxyQuery>) -> Response {
    let Some(target) = query.url else {
        return error_response(StatusCode::BAD_REQUEST, "missing url param");
    };

    if let Err(reason) = validate_target(&target) {
        return error_response(StatusCode::BAD_REQUEST, &reason);
    }

    if let Some(hit) = state.cache.get(&target) {
        return Json(hit).into_response();
    }

    match forward(&state.client, &target).await {
        Ok(payload) => {
            state.cache.put(target, payload.clone(), state.ttl);
            Json(payload).into_response()
        }
        Err(reason) => {
            warn!(url = %target, %reason, "upstream fetch failed");
            error_response(StatusCode::BAD_GATEWAY, &reason)
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Only plain web targets are forwarded.
fn validate_target(target: &str) -> Result<(), String> {
    let parsed = Url::parse(target).map_err(|err| format!("invalid url: {err}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme: {other}")),
    }
}

async fn forward(client: &reqwest::Client, target: &str) -> Result<Value, String> {
    let response = client
        .get(target)
        .send()
        .await
        .map_err(|err| err.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("upstream status {status}"));
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| err.to_string())
}

fn error_payload(reason: &str) -> Value {
    json!({ "error": reason })
}

fn error_response(status: StatusCode, reason: &str) -> Response {
    (status, Json(error_payload(reason))).into_response()
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
