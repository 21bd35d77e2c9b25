//! Push-stream primitive backed by the Binance mini-ticker WebSocket.

use super::{StreamConnector, StreamTick};
use crate::{
    error::DataError,
    exchange::binance::{self, BinanceMiniTicker},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error};

/// Connects to `<symbol>@miniTicker` and forwards close prices as ticks.
///
/// There is deliberately no reconnect loop here: a dead stream closes the
/// tick channel and the session degrades to polling instead of hammering the
/// endpoint with reconnection attempts.
pub struct BinanceTickerStream {
    ws_base: String,
    buffer: usize,
}

impl BinanceTickerStream {
    pub fn new(buffer: usize) -> Self {
        Self {
            ws_base: binance::SPOT_WS.to_string(),
            buffer: buffer.max(1),
        }
    }

    /// Point the connector at a different WebSocket host (eg. a local stub).
    pub fn with_ws_base(mut self, ws_base: impl Into<String>) -> Self {
        self.ws_base = ws_base.into();
        self
    }
}

#[async_trait]
impl StreamConnector for BinanceTickerStream {
    async fn connect(&self, symbol: &str) -> Result<mpsc::Receiver<StreamTick>, DataError> {
        let url = format!("{}/{}@miniTicker", self.ws_base, symbol.to_lowercase());
        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|err| DataError::Stream(err.to_string()))?;

        let (tx, rx) = mpsc::channel(self.buffer);
        tokio::spawn(read_ticker_stream(ws_stream, tx));
        Ok(rx)
    }
}

/// Forward parsed frames in arrival order until the socket or the session
/// goes away. Dropping the sender closes the tick channel, which the session
/// treats as a stream error.
async fn read_ticker_stream(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    tx: mpsc::Sender<StreamTick>,
) {
    let (_, mut read) = ws_stream.split();

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<BinanceMiniTicker>(&text) {
                Ok(ticker) => {
                    let tick = StreamTick {
                        price: ticker.close,
                        time: ticker.time,
                    };
                    if tx.send(tick).await.is_err() {
                        // Session unsubscribed; stop reading.
                        return;
                    }
                }
                Err(err) => {
                    debug!(%err, "unparseable miniTicker frame");
                }
            },
            Ok(Message::Close(_)) => {
                debug!("ticker stream closed by server");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Heartbeat, handled by tungstenite.
            }
            Err(err) => {
                error!(%err, "ticker stream error");
                break;
            }
            _ => {}
        }
    }
}
