//! Resilient market-data acquisition for the Polon dashboard.
//!
//! External price, funding and liquidation sources are unreliable from a
//! restricted-network context, so everything here is built to degrade
//! gracefully instead of failing visibly:
//!
//! - [`FetchResolver`] — ordered transport cascade (direct, relay A with a
//!   distinguishing header, relay B URL-encoded passthrough) with per-attempt
//!   timeouts.
//! - [`LiveFeedController`] — per-symbol sessions preferring a push stream,
//!   falling back to polling, and synthesizing values as the last resort.
//! - [`LiquidationAggregator`] — bounded price-level aggregation of the
//!   forced-liquidation event stream.
//! - [`ResponseCache`] — short-TTL memoization collapsing repeated identical
//!   requests.
//! - [`DegradationReporter`] — the flags telling consumers which fallback
//!   layer is active.
//!
//! The UI layer never sees a raw network error from this crate: managed
//! sessions only ever produce a value (possibly simulated) plus degradation
//! flags. The one exception is a direct one-shot resolve (eg. a kline
//! snapshot), which may surface an exhausted-cascade error for the caller to
//! substitute its own fallback.

pub mod aggregator;
pub mod cache;
pub mod config;
pub(crate) mod de;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod fetch;
pub mod status;

pub use aggregator::{LiquidationAggregator, PriceBucket, Side};
pub use cache::ResponseCache;
pub use config::{AggregatorConfig, CoreConfig, FeedConfig, ResolverConfig};
pub use error::{DataError, Stage};
pub use feed::{
    BinanceTickerStream, FeedHandle, FeedMode, FeedSnapshot, Granularity, LiveFeedController,
    PricePoller, SnapshotPoller, StreamConnector, StreamTick,
};
pub use fetch::{Endpoint, FetchResolver, TransportStage};
pub use status::{DegradationFlags, DegradationReporter};

use crate::exchange::{
    binance::{self, BinanceFundingRate, BinanceOpenInterest, Candle},
    coingecko::{self, GlobalMarket, MarketAsset},
    coinglass,
    coinmetrics::{self, AssetMetricsResponse},
    okx::{self, OkxFundingRateResponse},
};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

const LIQUIDATION_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The acquisition context: one explicitly constructed object owning the
/// shared cache, resolver, reporter, feed controller and aggregation window.
///
/// Created at process start, torn down at shutdown; there are no ambient
/// singletons. The UI layer calls in through this type only.
pub struct MarketData {
    cache: Arc<ResponseCache>,
    resolver: Arc<FetchResolver>,
    reporter: DegradationReporter,
    feeds: LiveFeedController,
    liquidations: Mutex<LiquidationAggregator>,
}

impl MarketData {
    pub fn new(config: CoreConfig) -> Self {
        let reporter = DegradationReporter::new();
        let cache = Arc::new(ResponseCache::new(
            config.cache_capacity.unwrap_or(cache::DEFAULT_CAPACITY),
        ));
        let resolver = Arc::new(FetchResolver::new(
            &config.resolver,
            Arc::clone(&cache),
            reporter.clone(),
        ));

        let connector = Arc::new(BinanceTickerStream::new(config.feed.channel_buffer_size));
        let poller = Arc::new(SnapshotPoller::new(Arc::clone(&resolver)));
        let feeds = LiveFeedController::new(connector, poller, reporter.clone(), config.feed);

        Self {
            cache,
            resolver,
            reporter,
            feeds,
            liquidations: Mutex::new(LiquidationAggregator::new(&config.aggregator)),
        }
    }

    /// Open a live feed session for `symbol`.
    pub fn subscribe_ticker(&self, symbol: &str, granularity: Granularity) -> FeedHandle {
        self.feeds.subscribe(symbol, granularity)
    }

    /// Tear a feed session down, cancelling its timers and streams.
    pub fn unsubscribe_ticker(&self, handle: FeedHandle) {
        self.feeds.unsubscribe(handle);
    }

    /// Fold one forced-liquidation event into the aggregation window.
    pub fn ingest_liquidation_event(&self, price: f64, side: Side, quantity: f64) {
        self.liquidations.lock().ingest(price, side, quantity);
    }

    /// Current aggregation window, ordered by ascending price level.
    pub fn aggregated_levels(&self) -> Vec<PriceBucket> {
        self.liquidations.lock().snapshot()
    }

    pub fn degradation_flags(&self) -> DegradationFlags {
        self.reporter.read()
    }

    pub fn subscribe_degradation(&self) -> watch::Receiver<DegradationFlags> {
        self.reporter.subscribe()
    }

    pub fn resolver(&self) -> &Arc<FetchResolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// One-shot OHLC snapshot. This is the documented exception to the
    /// absorb-everything rule: an exhausted cascade surfaces here and the
    /// caller decides what to substitute.
    pub async fn klines(
        &self,
        symbol: &str,
        granularity: Granularity,
        limit: u32,
    ) -> Result<Vec<Candle>, DataError> {
        self.resolver
            .resolve_as(&binance::klines_endpoint(
                symbol,
                granularity.kline_interval(),
                limit,
            ))
            .await
    }

    /// Recent Binance funding rates.
    pub async fn funding_rates(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<BinanceFundingRate>, DataError> {
        self.resolver
            .resolve_as(&binance::funding_rate_endpoint(symbol, limit))
            .await
    }

    /// Current OKX funding rate (second provider).
    pub async fn okx_funding_rate(&self, inst_id: &str) -> Result<OkxFundingRateResponse, DataError> {
        self.resolver
            .resolve_as(&okx::funding_rate_endpoint(inst_id))
            .await
    }

    /// Current Binance open interest.
    pub async fn open_interest(&self, symbol: &str) -> Result<BinanceOpenInterest, DataError> {
        self.resolver
            .resolve_as(&binance::open_interest_endpoint(symbol))
            .await
    }

    /// Global market snapshot.
    pub async fn global_market(&self) -> Result<GlobalMarket, DataError> {
        self.resolver.resolve_as(&coingecko::global_endpoint()).await
    }

    /// Top assets by market cap.
    pub async fn top_assets(&self, per_page: u32) -> Result<Vec<MarketAsset>, DataError> {
        self.resolver
            .resolve_as(&coingecko::top_assets_endpoint(per_page))
            .await
    }

    /// On-chain asset metrics time series.
    pub async fn on_chain_metrics(
        &self,
        asset: &str,
        metrics: &[&str],
        page_size: u32,
    ) -> Result<AssetMetricsResponse, DataError> {
        self.resolver
            .resolve_as(&coinmetrics::asset_metrics_endpoint(
                asset, metrics, page_size,
            ))
            .await
    }

    /// Seed the aggregation window from the Coinglass 24h chart so the map
    /// renders before live events arrive. Returns the number of levels
    /// folded in.
    pub async fn seed_liquidations(&self, symbol: &str, time_type: &str) -> Result<usize, DataError> {
        let chart: coinglass::LiquidationChart = self
            .resolver
            .resolve_as(&coinglass::liquidation_chart_endpoint(symbol, time_type))
            .await?;

        let mut window = self.liquidations.lock();
        for level in &chart.data {
            window.ingest(level.price, Side::Buy, level.buy_vol_usdt);
            window.ingest(level.price, Side::Sell, level.sell_vol_usdt);
        }

        Ok(chart.data.len())
    }

    /// Drive the aggregation window from the forced-liquidation push stream,
    /// reconnecting on stream death. At-least-once, best-effort: events lost
    /// while reconnecting are not compensated.
    pub fn spawn_liquidation_ingest(
        self: &Arc<Self>,
        symbol: &str,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        let url = binance::force_order_stream_url(symbol);

        tokio::spawn(async move {
            loop {
                match connect_async(&url).await {
                    Ok((ws_stream, _)) => {
                        info!(%url, "liquidation stream connected");
                        let (_, mut read) = ws_stream.split();

                        while let Some(message) = read.next().await {
                            match message {
                                Ok(Message::Text(text)) => {
                                    match serde_json::from_str::<binance::BinanceForceOrder>(&text)
                                    {
                                        Ok(event) => this.ingest_liquidation_event(
                                            event.order.price,
                                            event.order.side,
                                            event.order.quantity,
                                        ),
                                        Err(err) => {
                                            debug!(%err, "unparseable forceOrder frame");
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => break,
                                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                                Err(err) => {
                                    error!(%err, "liquidation stream error");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(err) => {
                        error!(%err, %url, "liquidation stream connect failed");
                    }
                }

                tokio::time::sleep(LIQUIDATION_RECONNECT_DELAY).await;
            }
        })
    }
}
