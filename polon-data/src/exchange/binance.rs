//! Binance spot & USD-M futures endpoints and payload adapters.

use crate::{aggregator::Side, de, fetch::Endpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de::IgnoredAny};

pub const SPOT_API: &str = "https://api.binance.com";
pub const FUTURES_API: &str = "https://fapi.binance.com";
pub const SPOT_WS: &str = "wss://stream.binance.com:9443/ws";
pub const FUTURES_WS: &str = "wss://fstream.binance.com/ws";

/// OHLC snapshot request.
pub fn klines_endpoint(symbol: &str, interval: &str, limit: u32) -> Endpoint {
    Endpoint::get(format!(
        "{SPOT_API}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}"
    ))
}

/// Single-price snapshot used by the polling fallback.
pub fn price_endpoint(symbol: &str) -> Endpoint {
    Endpoint::get(format!("{SPOT_API}/api/v3/ticker/price?symbol={symbol}"))
}

/// Recent funding rates (USD-M futures).
pub fn funding_rate_endpoint(symbol: &str, limit: u32) -> Endpoint {
    Endpoint::get(format!(
        "{FUTURES_API}/fapi/v1/fundingRate?symbol={symbol}&limit={limit}"
    ))
}

/// Current open interest (USD-M futures).
pub fn open_interest_endpoint(symbol: &str) -> Endpoint {
    Endpoint::get(format!("{FUTURES_API}/fapi/v1/openInterest?symbol={symbol}"))
}

/// Push-stream URL for the spot mini ticker.
pub fn mini_ticker_stream_url(symbol: &str) -> String {
    format!("{SPOT_WS}/{}@miniTicker", symbol.to_lowercase())
}

/// Push-stream URL for forced liquidation orders (USD-M futures).
pub fn force_order_stream_url(symbol: &str) -> String {
    format!("{FUTURES_WS}/{}@forceOrder", symbol.to_lowercase())
}

/// `<symbol>@miniTicker` frame. Only the fields the feed consumes.
#[derive(Clone, Debug, Deserialize)]
pub struct BinanceMiniTicker {
    #[serde(rename = "E", deserialize_with = "de::de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,

    #[serde(rename = "s")]
    pub market: String,

    #[serde(rename = "c", deserialize_with = "de::de_str")]
    pub close: f64,
}

/// `/api/v3/ticker/price` response.
#[derive(Clone, Debug, Deserialize)]
pub struct BinanceTickerPrice {
    pub symbol: String,

    #[serde(deserialize_with = "de::de_str")]
    pub price: f64,
}

/// One OHLC bar decoded from the positional kline row format.
#[derive(Clone, Debug, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl<'de> Deserialize<'de> for Candle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // [openTime, open, high, low, close, volume, closeTime, quoteVolume,
        //  trades, takerBase, takerQuote, unused]
        type Row = (
            i64,
            String,
            String,
            String,
            String,
            String,
            IgnoredAny,
            IgnoredAny,
            IgnoredAny,
            IgnoredAny,
            IgnoredAny,
            IgnoredAny,
        );

        let row = Row::deserialize(deserializer)?;
        let parse = |field: &str, raw: &str| {
            raw.parse::<f64>()
                .map_err(|err| serde::de::Error::custom(format!("kline {field}: {err}")))
        };

        Ok(Candle {
            open_time: DateTime::<Utc>::from_timestamp_millis(row.0)
                .ok_or_else(|| serde::de::Error::custom(format!("kline open time: {}", row.0)))?,
            open: parse("open", &row.1)?,
            high: parse("high", &row.2)?,
            low: parse("low", &row.3)?,
            close: parse("close", &row.4)?,
            volume: parse("volume", &row.5)?,
        })
    }
}

/// `/fapi/v1/fundingRate` entry.
#[derive(Clone, Debug, Deserialize)]
pub struct BinanceFundingRate {
    pub symbol: String,

    #[serde(
        rename = "fundingTime",
        deserialize_with = "de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,

    #[serde(rename = "fundingRate", deserialize_with = "de::de_str")]
    pub rate: f64,
}

/// `/fapi/v1/openInterest` response.
#[derive(Clone, Debug, Deserialize)]
pub struct BinanceOpenInterest {
    pub symbol: String,

    #[serde(rename = "openInterest", deserialize_with = "de::de_str")]
    pub open_interest: f64,

    #[serde(deserialize_with = "de::de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

/// `<symbol>@forceOrder` frame (forced liquidation event).
#[derive(Clone, Debug, Deserialize)]
pub struct BinanceForceOrder {
    #[serde(rename = "E", deserialize_with = "de::de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,

    #[serde(rename = "o")]
    pub order: BinanceForceOrderDetail,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BinanceForceOrderDetail {
    #[serde(rename = "s")]
    pub market: String,

    #[serde(rename = "S")]
    pub side: Side,

    #[serde(rename = "q", deserialize_with = "de::de_str")]
    pub quantity: f64,

    #[serde(rename = "p", deserialize_with = "de::de_str")]
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mini_ticker_de() {
        let raw = r#"{
            "e": "24hrMiniTicker", "E": 1736899200000, "s": "BTCUSDT",
            "c": "65032.40", "o": "64100.00", "h": "65400.00", "l": "63900.00",
            "v": "12345.6", "q": "800000000.0"
        }"#;

        let ticker: BinanceMiniTicker = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker.market, "BTCUSDT");
        assert_eq!(ticker.close, 65032.40);
        assert_eq!(ticker.time.timestamp_millis(), 1_736_899_200_000);
    }

    #[test]
    fn test_ticker_price_de() {
        let raw = r#"{"symbol": "BTCUSDT", "price": "65032.40000000"}"#;
        let ticker: BinanceTickerPrice = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker.price, 65032.4);
    }

    #[test]
    fn test_kline_row_de() {
        let raw = r#"[
            [1736899200000, "64000.0", "65100.0", "63900.0", "65032.4",
             "1234.5", 1736899259999, "79000000.0", 4210, "600.1", "38500000.0", "0"]
        ]"#;

        let candles: Vec<Candle> = serde_json::from_str(raw).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open, 64000.0);
        assert_eq!(candles[0].close, 65032.4);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_736_899_200_000);
    }

    #[test]
    fn test_force_order_de() {
        let raw = r#"{
            "e": "forceOrder", "E": 1736899200000,
            "o": {
                "s": "BTCUSDT", "S": "SELL", "o": "LIMIT", "f": "IOC",
                "q": "0.014", "p": "64910.00", "ap": "64905.12",
                "X": "FILLED", "l": "0.014", "z": "0.014", "T": 1736899199998
            }
        }"#;

        let event: BinanceForceOrder = serde_json::from_str(raw).unwrap();
        assert_eq!(event.order.side, Side::Sell);
        assert_eq!(event.order.price, 64910.0);
        assert_eq!(event.order.quantity, 0.014);
    }

    #[test]
    fn test_stream_urls_lowercase_symbol() {
        assert_eq!(
            mini_ticker_stream_url("BTCUSDT"),
            "wss://stream.binance.com:9443/ws/btcusdt@miniTicker"
        );
        assert_eq!(
            force_order_stream_url("BTCUSDT"),
            "wss://fstream.binance.com/ws/btcusdt@forceOrder"
        );
    }
}
