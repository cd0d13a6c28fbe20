//! Rate provider abstraction

use super::error::Result;
use super::rates::RateSnapshot;
use async_trait::async_trait;

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the full rate table for an uppercased base currency code.
    async fn fetch_rates(&self, base: &str) -> Result<RateSnapshot>;
}
