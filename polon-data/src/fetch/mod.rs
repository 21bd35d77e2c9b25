//! Cascading transport resolution.
//!
//! A request is tried through an ordered list of [`TransportStage`]
//! strategies: direct, then relay A (distinguishing header), then relay B
//! (URL-encoded passthrough). Each stage has its own timeout; a timed-out or
//! non-success attempt advances the cascade without a same-stage retry, and
//! the first successful, decodable response short-circuits it. Resolved
//! payloads are memoized in the [`ResponseCache`] under the original target,
//! regardless of which stage carried them.

mod stages;

pub use stages::{DirectStage, EncodedRelayStage, HeaderRelayStage, RELAY_CLIENT_HEADER};

use crate::{
    cache::ResponseCache,
    config::ResolverConfig,
    error::{DataError, Stage},
    status::DegradationReporter,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// An opaque request descriptor. Immutable once issued.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Endpoint {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cache identity: the original target, not the stage that carried it.
    pub fn cache_key(&self) -> &str {
        &self.url
    }

    /// Apply method-independent request parts (headers, body).
    pub(crate) fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        request
    }
}

/// One rung of the transport cascade.
///
/// Strategies share a uniform result type so the resolver can try any subset
/// in sequence, and so tests can substitute mock stages.
#[async_trait]
pub trait TransportStage: Send + Sync {
    /// Which rung of the cascade this strategy occupies.
    fn stage(&self) -> Stage;

    /// Attempt to fetch `endpoint` through this strategy, decoding the
    /// response as JSON. Any failure (timeout, transport, status, decode)
    /// is a stage failure.
    async fn attempt(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Value, DataError>;
}

/// A decoded object carrying a non-null top-level `"error"` member is a relay
/// failure envelope, even under a success status.
pub(crate) fn is_error_envelope(value: &Value) -> bool {
    value.get("error").is_some_and(|member| !member.is_null())
}

/// Send `request`, enforce `timeout`, and decode the body as JSON. Shared by
/// the real stages so only request shaping differs between them.
pub(crate) async fn execute_json(
    stage: Stage,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Value, DataError> {
    let attempt = async {
        let response = request.send().await.map_err(|err| DataError::Transport {
            stage,
            reason: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Transport {
                stage,
                reason: format!("upstream status {status}"),
            });
        }

        let body = response.text().await.map_err(|err| DataError::Transport {
            stage,
            reason: err.to_string(),
        })?;

        serde_json::from_str::<Value>(&body).map_err(|err| DataError::Parse(err.to_string()))
    };

    let payload = tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| DataError::Timeout { stage, timeout })??;

    if is_error_envelope(&payload) {
        return Err(DataError::Transport {
            stage,
            reason: format!("relay failure envelope: {}", payload["error"]),
        });
    }

    Ok(payload)
}

/// Ordered-cascade HTTP fetch with per-attempt timeout and response
/// memoization.
pub struct FetchResolver {
    stages: Vec<Arc<dyn TransportStage>>,
    cache: Arc<ResponseCache>,
    cache_ttl: Duration,
    stage_timeout: Duration,
    reporter: DegradationReporter,
}

impl FetchResolver {
    /// Resolver with the production cascade: direct, relay A, relay B.
    pub fn new(
        config: &ResolverConfig,
        cache: Arc<ResponseCache>,
        reporter: DegradationReporter,
    ) -> Self {
        let client = Client::new();
        let stages: Vec<Arc<dyn TransportStage>> = vec![
            Arc::new(DirectStage::new(client.clone())),
            Arc::new(HeaderRelayStage::new(client.clone(), &config.relay_url)),
            Arc::new(EncodedRelayStage::new(client, &config.mirror_url)),
        ];
        Self::with_stages(config, cache, reporter, stages)
    }

    /// Resolver over an explicit strategy list. Tests substitute any subset.
    pub fn with_stages(
        config: &ResolverConfig,
        cache: Arc<ResponseCache>,
        reporter: DegradationReporter,
        stages: Vec<Arc<dyn TransportStage>>,
    ) -> Self {
        Self {
            stages,
            cache,
            cache_ttl: config.cache_ttl,
            stage_timeout: config.stage_timeout,
            reporter,
        }
    }

    /// Resolve `endpoint` through the cascade, consulting the cache first.
    ///
    /// Fails with [`DataError::Transport`] at [`Stage::All`] only once every
    /// stage has been exhausted; the caller decides whether to substitute a
    /// fallback.
    pub async fn resolve(&self, endpoint: &Endpoint) -> Result<Value, DataError> {
        if let Some(hit) = self.cache.get(endpoint.cache_key()) {
            return Ok(hit);
        }

        let mut last_failure = String::from("no transport stages configured");
        for stage in &self.stages {
            match stage.attempt(endpoint, self.stage_timeout).await {
                Ok(payload) => {
                    if stage.stage() != Stage::Direct {
                        self.reporter.set_using_proxy();
                    }
                    debug!(stage = %stage.stage(), url = endpoint.url(), "resolved");
                    self.cache
                        .put(endpoint.cache_key(), payload.clone(), self.cache_ttl);
                    return Ok(payload);
                }
                Err(err) => {
                    warn!(stage = %stage.stage(), url = endpoint.url(), %err, "stage failed, advancing cascade");
                    last_failure = err.to_string();
                }
            }
        }

        Err(DataError::exhausted(last_failure))
    }

    /// Resolve and decode into `T`. A structured-decode failure surfaces as
    /// [`DataError::Parse`].
    pub async fn resolve_as<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, DataError> {
        let value = self.resolve(endpoint).await?;
        serde_json::from_value(value).map_err(|err| DataError::Parse(err.to_string()))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}
