use crate::core::error::{RateError, Result};
use crate::core::provider::RateProvider;
use crate::core::rates::RateSnapshot;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

const USER_AGENT: &str = concat!("exrate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct OpenErApiResponse {
    result: String,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default)]
    time_last_update_unix: Option<i64>,
    #[serde(default)]
    time_next_update_unix: Option<i64>,
    #[serde(default)]
    rates: Option<HashMap<String, f64>>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

/// Client for the open.er-api.com `latest` endpoint.
pub struct OpenErApiProvider {
    base_url: String,
}

impl OpenErApiProvider {
    pub fn new(base_url: &str) -> Self {
        OpenErApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
    #[instrument(name = "OpenErApiFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: &str) -> Result<RateSnapshot> {
        let url = format!("{}/{}", self.base_url, base);
        debug!("Requesting exchange rates from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(RateError::fetch)?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::fetch(format!("Request error: {e} for URL: {url}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RateError::fetch(format!(
                "API Request Failed: {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(RateError::fetch)?;
        let data: OpenErApiResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %text,
                    "Failed to parse exchange rate response"
                );
                return Err(RateError::fetch(format!(
                    "Failed to parse JSON response for {base}: {e}"
                )));
            }
        };

        if data.result != "success" {
            let cause = data.error_type.unwrap_or(data.result);
            return Err(RateError::fetch(format!("API Request Failed: {cause}")));
        }

        let (Some(last_updated), Some(rates)) = (data.time_last_update_unix, data.rates) else {
            return Err(RateError::fetch(format!(
                "Incomplete rate data in response for {base}"
            )));
        };

        debug!(
            base_code = ?data.base_code,
            next_update = ?data.time_next_update_unix,
            currencies = rates.len(),
            "Received exchange rates"
        );
        Ok(RateSnapshot {
            last_updated,
            rates,
        })
    }
}
