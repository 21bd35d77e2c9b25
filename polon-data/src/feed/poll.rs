//! Polling fallback: single-price snapshots through the transport cascade,
//! plus the bounded random walk used when even polling fails.

use super::PricePoller;
use crate::{
    error::DataError,
    exchange::binance::{self, BinanceTickerPrice},
    fetch::FetchResolver,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

/// Polls the Binance single-price endpoint via [`FetchResolver`], so each
/// poll benefits from the full cascade and the response cache.
pub struct SnapshotPoller {
    resolver: Arc<FetchResolver>,
}

impl SnapshotPoller {
    pub fn new(resolver: Arc<FetchResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl PricePoller for SnapshotPoller {
    async fn latest_price(&self, symbol: &str) -> Result<f64, DataError> {
        let ticker: BinanceTickerPrice = self
            .resolver
            .resolve_as(&binance::price_endpoint(symbol))
            .await?;
        Ok(ticker.price)
    }
}

/// Perturb `last` by a bounded pseudo-random delta within ± half of
/// `jitter`. Keeps a plausible value moving when no real one is obtainable.
pub(crate) fn perturb(last: f64, jitter: f64) -> f64 {
    let delta: f64 = rand::rng().random_range(-0.5..0.5);
    last + delta * jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perturb_stays_bounded() {
        for _ in 0..1_000 {
            let next = perturb(60_000.0, 100.0);
            assert!((next - 60_000.0).abs() < 50.0);
        }
    }
}
