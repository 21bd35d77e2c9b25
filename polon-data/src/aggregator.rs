//! Bucketed sliding-window aggregation of forced-liquidation events.
//!
//! Unbounded event streams are folded into a bounded set of quantized price
//! levels for rendering. Eviction is capacity-driven only; a quiet period
//! needs no background sweeping.

use crate::config::AggregatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Taker side of a matched liquidation order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "SELL", alias = "Sell")]
    Sell,
}

/// One quantized price level with the volume matched on each side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBucket {
    /// Price rounded down to the bucket size.
    pub price_level: f64,
    /// Accumulated matched buy-side volume.
    pub long_volume: f64,
    /// Accumulated matched sell-side volume.
    pub short_volume: f64,
}

/// Streaming aggregator bucketing liquidation events into at most
/// `max_buckets` price levels.
///
/// Known limitation: once the cap is exceeded, the lowest price level is
/// evicted first regardless of recency, so the side of the book far below
/// the recently active prices is silently discarded. Downstream rendering
/// relies on this exact window shape, so it stays.
#[derive(Debug)]
pub struct LiquidationAggregator {
    bucket_size: f64,
    max_buckets: usize,
    buckets: BTreeMap<i64, PriceBucket>,
}

impl LiquidationAggregator {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            bucket_size: config.bucket_size,
            max_buckets: config.max_buckets.max(1),
            buckets: BTreeMap::new(),
        }
    }

    /// Fold one event into its price bucket.
    ///
    /// Event sources are externally controlled and untrusted in format:
    /// malformed input is dropped silently, never an error.
    pub fn ingest(&mut self, price: f64, side: Side, quantity: f64) {
        if !price.is_finite() || !quantity.is_finite() || price <= 0.0 || quantity < 0.0 {
            return;
        }

        let index = (price / self.bucket_size).floor() as i64;
        let bucket = self.buckets.entry(index).or_insert(PriceBucket {
            price_level: index as f64 * self.bucket_size,
            long_volume: 0.0,
            short_volume: 0.0,
        });

        match side {
            Side::Buy => bucket.long_volume += quantity,
            Side::Sell => bucket.short_volume += quantity,
        }

        self.evict_over_cap(index);
    }

    /// Lowest level goes first; the bucket that triggered the overflow is
    /// exempt.
    fn evict_over_cap(&mut self, just_inserted: i64) {
        while self.buckets.len() > self.max_buckets {
            let victim = self
                .buckets
                .keys()
                .copied()
                .find(|key| *key != just_inserted);
            match victim {
                Some(key) => {
                    self.buckets.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Current window, ordered by ascending price level.
    pub fn snapshot(&self) -> Vec<PriceBucket> {
        self.buckets.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
