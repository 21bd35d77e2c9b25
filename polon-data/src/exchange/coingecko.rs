//! CoinGecko endpoints: global market cap and the top-assets listing.

use crate::fetch::Endpoint;
use serde::Deserialize;
use std::collections::HashMap;

pub const API: &str = "https://api.coingecko.com";

/// Global market snapshot.
pub fn global_endpoint() -> Endpoint {
    Endpoint::get(format!("{API}/api/v3/global"))
}

/// Top assets by market cap, one page.
pub fn top_assets_endpoint(per_page: u32) -> Endpoint {
    Endpoint::get(format!(
        "{API}/api/v3/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={per_page}&page=1"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalMarket {
    pub data: GlobalMarketData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalMarketData {
    /// Market cap per quote currency; consumers read the `usd` entry.
    pub total_market_cap: HashMap<String, f64>,

    pub market_cap_change_percentage_24h_usd: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MarketAsset {
    pub id: String,
    pub name: String,
    pub current_price: f64,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: f64,
}
