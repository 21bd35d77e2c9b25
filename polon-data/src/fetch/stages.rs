//! The production transport strategies.
//!
//! Relay stages carry GET requests only; anything else is declined so the
//! cascade moves on without ever mutating state through a relay.

use super::{Endpoint, TransportStage, execute_json};
use crate::error::{DataError, Stage};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Distinguishing header attached to relay A traffic.
pub const RELAY_CLIENT_HEADER: &str = "x-polon-client";

const RELAY_CLIENT_VALUE: &str = "polon-data";

fn encode_target(target: &str) -> String {
    url::form_urlencoded::byte_serialize(target.as_bytes()).collect()
}

/// Stage 1: direct request to the target.
pub struct DirectStage {
    client: Client,
}

impl DirectStage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportStage for DirectStage {
    fn stage(&self) -> Stage {
        Stage::Direct
    }

    async fn attempt(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Value, DataError> {
        let request = endpoint.apply(
            self.client
                .request(endpoint.method().clone(), endpoint.url()),
        );
        execute_json(self.stage(), request, timeout).await
    }
}

/// Stage 2: relay A. The target travels in a query parameter and the request
/// carries [`RELAY_CLIENT_HEADER`] so relay traffic is distinguishable
/// upstream.
pub struct HeaderRelayStage {
    client: Client,
    relay_url: String,
}

impl HeaderRelayStage {
    pub fn new(client: Client, relay_url: impl Into<String>) -> Self {
        Self {
            client,
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl TransportStage for HeaderRelayStage {
    fn stage(&self) -> Stage {
        Stage::RelayHeader
    }

    async fn attempt(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Value, DataError> {
        if endpoint.method() != &Method::GET {
            return Err(DataError::Transport {
                stage: self.stage(),
                reason: "relay carries GET requests only".to_string(),
            });
        }

        let url = format!("{}?url={}", self.relay_url, encode_target(endpoint.url()));
        let request = self
            .client
            .get(url)
            .header(RELAY_CLIENT_HEADER, RELAY_CLIENT_VALUE);
        execute_json(self.stage(), request, timeout).await
    }
}

/// Stage 3: relay B, a plain URL-encoded passthrough mirror.
pub struct EncodedRelayStage {
    client: Client,
    mirror_url: String,
}

impl EncodedRelayStage {
    pub fn new(client: Client, mirror_url: impl Into<String>) -> Self {
        Self {
            client,
            mirror_url: mirror_url.into(),
        }
    }
}

#[async_trait]
impl TransportStage for EncodedRelayStage {
    fn stage(&self) -> Stage {
        Stage::RelayEncoded
    }

    async fn attempt(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Value, DataError> {
        if endpoint.method() != &Method::GET {
            return Err(DataError::Transport {
                stage: self.stage(),
                reason: "relay carries GET requests only".to_string(),
            });
        }

        let url = format!("{}?url={}", self.mirror_url, encode_target(endpoint.url()));
        execute_json(self.stage(), self.client.get(url), timeout).await
    }
}
