//! Rate tables and the persisted settings object.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rates keyed by 3-letter currency code, relative to some base currency.
pub type CurrencyRates = HashMap<String, f64>;

/// One fetched rate table together with the provider's update timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    /// Unix seconds reported by the provider as the table's last update.
    pub last_updated: i64,
    pub rates: CurrencyRates,
}

impl RateSnapshot {
    /// Returns true once the calendar day of `now` differs from the calendar
    /// day of `last_updated`, both evaluated in `now`'s timezone.
    pub fn is_stale<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        match now.timezone().timestamp_opt(self.last_updated, 0).single() {
            Some(updated) => updated.date_naive() != now.date_naive(),
            None => true,
        }
    }
}

/// Everything persisted between runs, stored as a single JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Snapshots keyed by uppercased base currency code.
    #[serde(default)]
    pub exchange_rate_data: HashMap<String, RateSnapshot>,
}

impl Settings {
    pub fn from_json(blob: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(blob)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Normalizes a currency code for use as a cache or table key.
pub fn normalize_code(code: &str) -> String {
    code.to_uppercase()
}

/// Rounds to 6 decimal places, working from the exact decimal expansion of
/// `value` so products just below a half-way point are not rounded up.
pub fn round6(value: f64) -> f64 {
    format!("{value:.6}").parse().unwrap_or(value)
}
