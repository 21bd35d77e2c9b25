//! Coinglass liquidation-chart snapshot, used to seed the aggregation window
//! before live forced-order events start flowing.

use crate::fetch::Endpoint;
use serde::Deserialize;

pub const API: &str = "https://api.coinglass.com";

/// Aggregated liquidation volume per price level over `time_type` (eg. `24h`).
pub fn liquidation_chart_endpoint(symbol: &str, time_type: &str) -> Endpoint {
    Endpoint::get(format!(
        "{API}/api/futures/liquidationChart?symbol={symbol}&timeType={time_type}"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct LiquidationChart {
    pub data: Vec<LiquidationLevel>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LiquidationLevel {
    pub price: f64,

    #[serde(rename = "buyVolUsdt")]
    pub buy_vol_usdt: f64,

    #[serde(rename = "sellVolUsdt")]
    pub sell_vol_usdt: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquidation_chart_de() {
        let raw = r#"{
            "code": "0",
            "data": [
                {"price": 64900.0, "buyVolUsdt": 1250000.0, "sellVolUsdt": 310000.0},
                {"price": 65000.0, "buyVolUsdt": 880000.0, "sellVolUsdt": 940000.0}
            ]
        }"#;

        let chart: LiquidationChart = serde_json::from_str(raw).unwrap();
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0].price, 64900.0);
        assert_eq!(chart.data[1].sell_vol_usdt, 940000.0);
    }
}
