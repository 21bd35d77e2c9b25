//! Live-feed sessions: push stream first, polling fallback, synthesized
//! values as the last resort.
//!
//! Each subscription runs one session task that is the sole driver of its
//! [`FeedSnapshot`]; consumers observe through a `watch` channel. The machine
//! moves `Connecting → Live → Polling` (or straight to `Polling` when the
//! handshake fails), and never returns to `Live` within a session — a fresh
//! subscription starts over instead of risking a reconnection storm. Polling
//! failures degrade value quality in place: the session stays in its poll
//! loop and synthesizes a bounded random walk, surfacing the degradation
//! through [`DegradationReporter`](crate::status::DegradationReporter) rather
//! than as an error.

mod poll;
mod stream;

pub use poll::SnapshotPoller;
pub use stream::BinanceTickerStream;

use crate::{config::FeedConfig, error::DataError, status::DegradationReporter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

/// Chart granularity requested by the consumer; mirrors the dashboard's
/// interval picker.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
pub enum Granularity {
    #[serde(rename = "tick")]
    Tick,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Granularity {
    /// Interval used for kline snapshot requests; tick charts read 1m bars.
    pub fn kline_interval(&self) -> &'static str {
        match self {
            Granularity::Tick | Granularity::OneMinute => "1m",
            Granularity::FifteenMinutes => "15m",
            Granularity::OneDay => "1d",
            Granularity::OneWeek => "1w",
            Granularity::OneMonth => "1M",
        }
    }

    fn poll_interval(&self, config: &FeedConfig) -> Duration {
        match self {
            Granularity::Tick => config.tick_poll_interval,
            _ => config.poll_interval,
        }
    }
}

/// Where a session currently sources its values.
///
/// `Simulated` is a value-provenance projection inside the poll loop, not a
/// separate driver: a failed poll reports it, a later successful poll reports
/// `Polling` again. The sticky signal lives in the degradation flags.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedMode {
    Connecting,
    Live,
    Polling,
    Simulated,
}

/// Latest observed state of one feed session.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub symbol: SmolStr,
    pub mode: FeedMode,
    pub last: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// One inbound stream message.
#[derive(Debug, Clone, Copy)]
pub struct StreamTick {
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Push-stream primitive: yields an ordered channel of ticks for a symbol.
///
/// A handshake failure errors here; later producer-side errors close the
/// channel, which the session treats as a stream error.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, symbol: &str) -> Result<mpsc::Receiver<StreamTick>, DataError>;
}

/// Single-price snapshot source backing the polling fallback.
#[async_trait]
pub trait PricePoller: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<f64, DataError>;
}

/// Handle to one live feed session.
///
/// Dropping it (or passing it to [`LiveFeedController::unsubscribe`]) tears
/// the session down: stream reader, watchdog and poll timer are cancelled,
/// and an in-flight poll completion is discarded rather than applied.
#[derive(Debug)]
pub struct FeedHandle {
    symbol: SmolStr,
    state: watch::Receiver<FeedSnapshot>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    pub fn last(&self) -> Option<f64> {
        self.state.borrow().last
    }

    pub fn mode(&self) -> FeedMode {
        self.state.borrow().mode
    }

    /// Receiver notified on every snapshot change.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.clone()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Manages feed sessions over injectable stream/poll seams.
pub struct LiveFeedController {
    connector: Arc<dyn StreamConnector>,
    poller: Arc<dyn PricePoller>,
    reporter: DegradationReporter,
    config: FeedConfig,
}

impl LiveFeedController {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        poller: Arc<dyn PricePoller>,
        reporter: DegradationReporter,
        config: FeedConfig,
    ) -> Self {
        Self {
            connector,
            poller,
            reporter,
            config,
        }
    }

    /// Start a session for `symbol` and return its handle.
    pub fn subscribe(&self, symbol: &str, granularity: Granularity) -> FeedHandle {
        let symbol = SmolStr::new(symbol);
        let (state_tx, state_rx) = watch::channel(FeedSnapshot {
            symbol: symbol.clone(),
            mode: FeedMode::Connecting,
            last: None,
            updated_at: Utc::now(),
        });

        info!(%symbol, ?granularity, "ticker subscription opened");

        let task = tokio::spawn(run_session(
            symbol.clone(),
            granularity,
            Arc::clone(&self.connector),
            Arc::clone(&self.poller),
            self.reporter.clone(),
            self.config.clone(),
            state_tx,
        ));

        FeedHandle {
            symbol,
            state: state_rx,
            task,
        }
    }

    /// Tear the session down. Equivalent to dropping the handle.
    pub fn unsubscribe(&self, handle: FeedHandle) {
        info!(symbol = %handle.symbol, "ticker subscription closed");
        drop(handle);
    }
}

/// Drives one session through its lifetime. The task is the only writer of
/// the session snapshot; cancellation (handle drop) stops it at the next
/// suspension point, so no timer or in-flight poll outlives the session.
async fn run_session(
    symbol: SmolStr,
    granularity: Granularity,
    connector: Arc<dyn StreamConnector>,
    poller: Arc<dyn PricePoller>,
    reporter: DegradationReporter,
    config: FeedConfig,
    state: watch::Sender<FeedSnapshot>,
) {
    // Connecting: one watchdog window covers the handshake and the first
    // message. Whichever way it degrades, polling is tried next.
    let connected = {
        let watchdog = tokio::time::sleep(config.watchdog);
        tokio::pin!(watchdog);

        tokio::select! {
            first = connect_first_tick(connector.as_ref(), &symbol) => first,
            _ = &mut watchdog => {
                warn!(%symbol, watchdog = ?config.watchdog, "no stream message before watchdog fired");
                None
            }
        }
    };

    if let Some((mut ticks, first)) = connected {
        publish(&state, &symbol, FeedMode::Live, Some(first.price), first.time);
        debug!(%symbol, "live stream established");

        // Live: apply messages in arrival order until the stream dies.
        while let Some(tick) = ticks.recv().await {
            publish(&state, &symbol, FeedMode::Live, Some(tick.price), tick.time);
        }

        warn!(%symbol, "live stream ended, falling back to polling");
    }

    // Polling: fixed cadence for the rest of the session. There is no
    // transition back to live; a fresh subscription starts over.
    reporter.set_using_polled_feed();

    let mut ticker = tokio::time::interval(granularity.poll_interval(&config));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match poller.latest_price(&symbol).await {
            Ok(price) => {
                publish(&state, &symbol, FeedMode::Polling, Some(price), Utc::now());
            }
            Err(err) => {
                debug!(%symbol, %err, "snapshot poll failed, synthesizing value");
                reporter.set_using_simulated_data();

                let previous = state.borrow().last.unwrap_or(config.simulated_base);
                let next = poll::perturb(previous, config.simulated_jitter);
                publish(&state, &symbol, FeedMode::Simulated, Some(next), Utc::now());
            }
        }
    }
}

async fn connect_first_tick(
    connector: &dyn StreamConnector,
    symbol: &str,
) -> Option<(mpsc::Receiver<StreamTick>, StreamTick)> {
    match connector.connect(symbol).await {
        Ok(mut ticks) => match ticks.recv().await {
            Some(first) => Some((ticks, first)),
            None => {
                warn!(symbol, "push stream closed before first message");
                None
            }
        },
        Err(err) => {
            warn!(symbol, %err, "push stream handshake failed");
            None
        }
    }
}

/// Publish a new snapshot. A send after every handle is gone means the
/// session is being torn down; the result is discarded, not applied.
fn publish(
    state: &watch::Sender<FeedSnapshot>,
    symbol: &SmolStr,
    mode: FeedMode,
    last: Option<f64>,
    updated_at: DateTime<Utc>,
) {
    let _ = state.send(FeedSnapshot {
        symbol: symbol.clone(),
        mode,
        last,
        updated_at,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum ConnectorBehavior {
        RefuseHandshake,
        /// Channel stays open but never carries a message.
        SilentStream,
        /// Emit the given ticks, hold the channel open briefly, then close.
        TicksThenClose(Vec<f64>),
    }

    struct ScriptedConnector {
        connects: Arc<AtomicUsize>,
        behavior: ConnectorBehavior,
        held: Mutex<Vec<mpsc::Sender<StreamTick>>>,
    }

    impl ScriptedConnector {
        fn new(behavior: ConnectorBehavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let connects = Arc::new(AtomicUsize::new(0));
            let connector = Arc::new(Self {
                connects: Arc::clone(&connects),
                behavior,
                held: Mutex::new(Vec::new()),
            });
            (connector, connects)
        }
    }

    #[async_trait]
    impl StreamConnector for ScriptedConnector {
        async fn connect(&self, _symbol: &str) -> Result<mpsc::Receiver<StreamTick>, DataError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                ConnectorBehavior::RefuseHandshake => {
                    Err(DataError::Stream("handshake refused".to_string()))
                }
                ConnectorBehavior::SilentStream => {
                    let (tx, rx) = mpsc::channel(8);
                    self.held.lock().push(tx);
                    Ok(rx)
                }
                ConnectorBehavior::TicksThenClose(prices) => {
                    let (tx, rx) = mpsc::channel(8);
                    let prices = prices.clone();
                    tokio::spawn(async move {
                        for price in prices {
                            let tick = StreamTick {
                                price,
                                time: Utc::now(),
                            };
                            if tx.send(tick).await.is_err() {
                                return;
                            }
                        }
                        // Keep the stream alive long enough for assertions
                        // against live mode before closing it.
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    });
                    Ok(rx)
                }
            }
        }
    }

    struct MockPoller {
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        price: f64,
    }

    impl MockPoller {
        fn new(price: f64) -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let failing = Arc::new(AtomicBool::new(false));
            let poller = Arc::new(Self {
                calls: Arc::clone(&calls),
                failing: Arc::clone(&failing),
                price,
            });
            (poller, calls, failing)
        }
    }

    #[async_trait]
    impl PricePoller for MockPoller {
        async fn latest_price(&self, _symbol: &str) -> Result<f64, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(DataError::exhausted("poll endpoint down"))
            } else {
                Ok(self.price)
            }
        }
    }

    fn controller(
        connector: Arc<dyn StreamConnector>,
        poller: Arc<dyn PricePoller>,
    ) -> (LiveFeedController, DegradationReporter) {
        let reporter = DegradationReporter::new();
        let controller =
            LiveFeedController::new(connector, poller, reporter.clone(), FeedConfig::default());
        (controller, reporter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_forces_polling_fallback() {
        let (connector, connects) = ScriptedConnector::new(ConnectorBehavior::SilentStream);
        let (poller, _calls, _failing) = MockPoller::new(42.0);
        let (controller, reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::OneMinute);
        assert_eq!(handle.mode(), FeedMode::Connecting);

        // Past the 5s watchdog plus the first poll tick.
        tokio::time::sleep(Duration::from_secs(7)).await;

        assert_eq!(handle.mode(), FeedMode::Polling);
        assert_eq!(handle.last(), Some(42.0));
        assert!(reporter.read().using_polled_feed);
        assert!(!reporter.read().using_simulated_data);
        // Degraded exactly once; no reconnection attempts.
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_failure_goes_straight_to_polling() {
        let (connector, connects) = ScriptedConnector::new(ConnectorBehavior::RefuseHandshake);
        let (poller, _calls, _failing) = MockPoller::new(64_900.0);
        let (controller, reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::OneMinute);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.mode(), FeedMode::Polling);
        assert_eq!(handle.last(), Some(64_900.0));
        assert!(reporter.read().using_polled_feed);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_degrades_live_to_polling() {
        let (connector, _connects) =
            ScriptedConnector::new(ConnectorBehavior::TicksThenClose(vec![65_100.0]));
        let (poller, _calls, _failing) = MockPoller::new(65_050.0);
        let (controller, reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::OneMinute);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(handle.mode(), FeedMode::Live);
        assert_eq!(handle.last(), Some(65_100.0));
        assert!(!reporter.read().using_polled_feed);

        // The producer closes after ~2s; polling takes over.
        tokio::time::sleep(Duration::from_secs(8)).await;

        assert_eq!(handle.mode(), FeedMode::Polling);
        assert_eq!(handle.last(), Some(65_050.0));
        assert!(reporter.read().using_polled_feed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_synthesize_values_in_place() {
        let (connector, _connects) = ScriptedConnector::new(ConnectorBehavior::RefuseHandshake);
        let (poller, calls, failing) = MockPoller::new(65_000.0);
        failing.store(true, Ordering::SeqCst);
        let (controller, reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::Tick);
        // Tick granularity polls every second; cover several failures.
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(handle.mode(), FeedMode::Simulated);
        assert!(reporter.read().using_simulated_data);
        assert!(reporter.read().using_polled_feed);

        // Values keep flowing, anchored near the simulated base.
        let value = handle.last().expect("synthesized value");
        assert!((value - 60_000.0).abs() <= 200.0);

        let before = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(calls.load(Ordering::SeqCst) > before);
        assert!(handle.last().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_recovery_reports_polling_again() {
        let (connector, _connects) = ScriptedConnector::new(ConnectorBehavior::RefuseHandshake);
        let (poller, _calls, failing) = MockPoller::new(65_000.0);
        failing.store(true, Ordering::SeqCst);
        let (controller, reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::Tick);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.mode(), FeedMode::Simulated);

        failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(handle.mode(), FeedMode::Polling);
        assert_eq!(handle.last(), Some(65_000.0));
        // The degradation flag is sticky for the session.
        assert!(reporter.read().using_simulated_data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_cancels_timers_and_inflight_polls() {
        let (connector, _connects) = ScriptedConnector::new(ConnectorBehavior::RefuseHandshake);
        let (poller, calls, _failing) = MockPoller::new(65_000.0);
        let (controller, _reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::Tick);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(calls.load(Ordering::SeqCst) >= 2);

        controller.unsubscribe(handle);
        tokio::task::yield_now().await;

        let after_teardown = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_teardown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_subscribers_observe_updates() {
        let (connector, _connects) = ScriptedConnector::new(ConnectorBehavior::RefuseHandshake);
        let (poller, _calls, _failing) = MockPoller::new(65_000.0);
        let (controller, _reporter) = controller(connector, poller);

        let handle = controller.subscribe("BTCUSDT", Granularity::Tick);
        let mut observer = handle.watch();

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(observer.has_changed().unwrap());
        assert_eq!(observer.borrow_and_update().mode, FeedMode::Polling);
    }

    #[test]
    fn test_granularity_kline_interval() {
        assert_eq!(Granularity::Tick.kline_interval(), "1m");
        assert_eq!(Granularity::OneMinute.kline_interval(), "1m");
        assert_eq!(Granularity::FifteenMinutes.kline_interval(), "15m");
        assert_eq!(Granularity::OneMonth.kline_interval(), "1M");
    }

    #[test]
    fn test_granularity_poll_cadence() {
        let config = FeedConfig::default();
        assert_eq!(
            Granularity::Tick.poll_interval(&config),
            Duration::from_secs(1)
        );
        assert_eq!(
            Granularity::OneDay.poll_interval(&config),
            Duration::from_secs(6)
        );
    }
}
