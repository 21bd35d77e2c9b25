//! CoinMetrics community API — on-chain asset metrics.

use crate::fetch::Endpoint;
use serde::Deserialize;

pub const COMMUNITY_API: &str = "https://community-api.coinmetrics.io";

/// Daily time series of the given metrics for one asset.
pub fn asset_metrics_endpoint(asset: &str, metrics: &[&str], page_size: u32) -> Endpoint {
    Endpoint::get(format!(
        "{COMMUNITY_API}/v4/timeseries/asset-metrics?assets={asset}&metrics={}&frequency=1d&page_size={page_size}",
        metrics.join(",")
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssetMetricsResponse {
    pub data: Vec<AssetMetricsRow>,
}

/// One daily row; metric columns vary with the request, so they stay an open
/// map of string-encoded values.
#[derive(Clone, Debug, Deserialize)]
pub struct AssetMetricsRow {
    pub asset: String,
    pub time: String,

    #[serde(flatten)]
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_metrics_de() {
        let raw = r#"{
            "data": [{
                "asset": "btc",
                "time": "2026-08-06T00:00:00.000000000Z",
                "CapMrktCurUSD": "1280000000000.0",
                "PriceUSD": "65032.4"
            }]
        }"#;

        let response: AssetMetricsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.data[0].asset, "btc");
        assert_eq!(
            response.data[0].metrics["PriceUSD"],
            serde_json::json!("65032.4")
        );
    }

    #[test]
    fn test_endpoint_joins_metrics() {
        let endpoint = asset_metrics_endpoint("btc", &["CapMrktCurUSD", "PriceUSD"], 365);
        assert!(endpoint.url().contains("metrics=CapMrktCurUSD,PriceUSD"));
        assert!(endpoint.url().contains("page_size=365"));
    }
}
