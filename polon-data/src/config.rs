//! Configuration for the acquisition core.
//!
//! Defaults match the production dashboard; every knob has a builder-style
//! override, and the relay locations can additionally be set through the
//! `POLON_RELAY_URL` / `POLON_MIRROR_URL` environment variables.

use crate::cache;
use std::time::Duration;

/// Transport cascade configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-stage attempt timeout. A timed-out stage advances the cascade.
    pub stage_timeout: Duration,
    /// Relay A: same-origin relay accepting the target as a query parameter.
    pub relay_url: String,
    /// Relay B: public mirror accepting a URL-encoded passthrough.
    pub mirror_url: String,
    /// Memoization window applied to resolved payloads.
    pub cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(8),
            relay_url: "http://127.0.0.1:8777/proxy".to_string(),
            mirror_url: "https://api.allorigins.win/raw".to_string(),
            cache_ttl: cache::DEFAULT_TTL,
        }
    }
}

impl ResolverConfig {
    /// Default configuration with `POLON_RELAY_URL` / `POLON_MIRROR_URL`
    /// overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(relay) = std::env::var("POLON_RELAY_URL") {
            config.relay_url = relay;
        }
        if let Ok(mirror) = std::env::var("POLON_MIRROR_URL") {
            config.mirror_url = mirror;
        }
        config
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    pub fn with_mirror_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_url = url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// Live feed session configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How long the push stream may stay silent after connecting before the
    /// session falls back to polling.
    pub watchdog: Duration,
    /// Poll cadence for tick-level subscriptions.
    pub tick_poll_interval: Duration,
    /// Poll cadence for every other granularity.
    pub poll_interval: Duration,
    /// Anchor for synthesized values when no real value was ever observed.
    pub simulated_base: f64,
    /// Width of the bounded pseudo-random walk; deltas stay within ± half.
    pub simulated_jitter: f64,
    /// Stream tick channel depth per session.
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(5),
            tick_poll_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(6),
            simulated_base: 60_000.0,
            simulated_jitter: 100.0,
            channel_buffer_size: 256,
        }
    }
}

impl FeedConfig {
    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_tick_poll_interval(mut self, interval: Duration) -> Self {
        self.tick_poll_interval = interval;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Liquidation aggregation configuration.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Price quantization step.
    pub bucket_size: f64,
    /// Window cap; overflow evicts the lowest price level first.
    pub max_buckets: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_size: 100.0,
            max_buckets: 80,
        }
    }
}

impl AggregatorConfig {
    pub fn with_bucket_size(mut self, bucket_size: f64) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }
}

/// Configuration for the whole acquisition context.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub resolver: ResolverConfig,
    pub feed: FeedConfig,
    pub aggregator: AggregatorConfig,
    pub cache_capacity: Option<usize>,
}

impl CoreConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self {
            resolver: ResolverConfig::from_env(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.resolver.stage_timeout, Duration::from_secs(8));
        assert_eq!(config.feed.watchdog, Duration::from_secs(5));
        assert_eq!(config.feed.poll_interval, Duration::from_secs(6));
        assert_eq!(config.feed.tick_poll_interval, Duration::from_secs(1));
        assert_eq!(config.aggregator.bucket_size, 100.0);
        assert_eq!(config.aggregator.max_buckets, 80);
    }

    #[test]
    fn test_builder_overrides() {
        let resolver = ResolverConfig::default()
            .with_stage_timeout(Duration::from_secs(2))
            .with_relay_url("http://relay.internal/proxy")
            .with_mirror_url("https://mirror.example/raw");

        assert_eq!(resolver.stage_timeout, Duration::from_secs(2));
        assert_eq!(resolver.relay_url, "http://relay.internal/proxy");
        assert_eq!(resolver.mirror_url, "https://mirror.example/raw");

        let aggregator = AggregatorConfig::default()
            .with_bucket_size(50.0)
            .with_max_buckets(40);
        assert_eq!(aggregator.bucket_size, 50.0);
        assert_eq!(aggregator.max_buckets, 40);
    }
}
