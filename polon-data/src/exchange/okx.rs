//! OKX public endpoints — second funding-rate provider.

use crate::{de, fetch::Endpoint};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const PUBLIC_API: &str = "https://www.okx.com";

/// Current funding rate for a perpetual swap instrument (eg. `BTC-USDT-SWAP`).
pub fn funding_rate_endpoint(inst_id: &str) -> Endpoint {
    Endpoint::get(format!(
        "{PUBLIC_API}/api/v5/public/funding-rate?instId={inst_id}"
    ))
}

/// OKX v5 response envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct OkxFundingRateResponse {
    pub code: String,
    pub data: Vec<OkxFundingRate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OkxFundingRate {
    #[serde(rename = "instId")]
    pub inst_id: String,

    #[serde(rename = "fundingRate", deserialize_with = "de::de_str")]
    pub rate: f64,

    #[serde(
        rename = "fundingTime",
        deserialize_with = "de::de_str_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_rate_de() {
        let raw = r#"{
            "code": "0",
            "msg": "",
            "data": [{
                "instType": "SWAP",
                "instId": "BTC-USDT-SWAP",
                "fundingRate": "0.0001",
                "nextFundingRate": "0.00012",
                "fundingTime": "1736899200000"
            }]
        }"#;

        let response: OkxFundingRateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.code, "0");
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].rate, 0.0001);
        assert_eq!(response.data[0].time.timestamp_millis(), 1_736_899_200_000);
    }
}
