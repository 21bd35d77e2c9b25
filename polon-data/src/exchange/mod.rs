//! Upstream endpoint catalog and thin payload adapters.
//!
//! Providers are opaque JSON sources reached through the transport cascade or
//! the push-stream primitive. Adapters name only the fields consumers read;
//! an undecodable payload surfaces as [`DataError::Parse`](crate::error::DataError)
//! and counts as a stage failure in the cascade.

pub mod binance;
pub mod coingecko;
pub mod coinglass;
pub mod coinmetrics;
pub mod okx;
