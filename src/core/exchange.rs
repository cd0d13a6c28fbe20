//! Per-base-currency rate cache backed by a remote provider.
//!
//! Cached tables are served until the calendar day changes, after which the
//! next request refetches the whole table, replaces the entry and persists the
//! settings blob. Concurrent requests for the same stale base share a single
//! fetch.
use super::clock::{Clock, SystemClock};
use super::error::{RateError, Result};
use super::provider::RateProvider;
use super::rates::{CurrencyRates, RateSnapshot, Settings, normalize_code, round6};
use super::store::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Cached snapshot for a base currency along with its freshness right now.
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub base: String,
    pub snapshot: RateSnapshot,
    pub stale: bool,
}

pub struct ExchangeRates {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: RwLock<Settings>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ExchangeRates {
    /// Loads persisted settings from `store` and uses the local wall clock.
    pub async fn load(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        Self::load_with_clock(provider, store, Arc::new(SystemClock)).await
    }

    pub async fn load_with_clock(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings = match store.load().await? {
            Some(blob) => Settings::from_json(&blob).map_err(RateError::store)?,
            None => {
                debug!("No stored settings, starting with an empty cache");
                Settings::default()
            }
        };
        info!(
            cached_bases = settings.exchange_rate_data.len(),
            "Loaded exchange rate settings"
        );

        Ok(Self {
            provider,
            store,
            clock,
            settings: RwLock::new(settings),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Returns every rate for `base`, refetching when the cached table is
    /// missing or from an earlier calendar day.
    pub async fn get_currency_rates(&self, base: &str) -> Result<CurrencyRates> {
        let base = normalize_code(base);
        if let Some(rates) = self.fresh_rates(&base).await {
            return Ok(rates);
        }

        let gate = self.gate(&base).await;
        let result = self.refresh(&base, &gate).await;
        self.release_gate(&base, gate).await;
        result
    }

    async fn refresh(&self, base: &str, gate: &Mutex<()>) -> Result<CurrencyRates> {
        let _guard = gate.lock().await;

        // Another caller may have refreshed the entry while we waited.
        if let Some(rates) = self.fresh_rates(base).await {
            debug!(%base, "Rates refreshed by a concurrent request");
            return Ok(rates);
        }

        Ok(self.fetch_exchange_rates(base).await?.rates)
    }

    /// Fetches `base` from the provider, replaces its cache entry and persists
    /// the settings. On any failure the previous entry is left untouched.
    pub async fn fetch_exchange_rates(&self, base: &str) -> Result<RateSnapshot> {
        let base = normalize_code(base);
        let snapshot = self.provider.fetch_rates(&base).await?;

        let mut settings = self.settings.write().await;
        let mut updated = settings.clone();
        updated
            .exchange_rate_data
            .insert(base.clone(), snapshot.clone());
        let blob = updated.to_json().map_err(RateError::store)?;
        self.store.save(&blob).await?;
        *settings = updated;

        info!(
            %base,
            last_updated = snapshot.last_updated,
            currencies = snapshot.rates.len(),
            "Stored fresh exchange rates"
        );
        Ok(snapshot)
    }

    /// Rate to convert one unit of `source` into `target`.
    pub async fn get_currency_rate(&self, source: &str, target: &str) -> Result<f64> {
        let source = normalize_code(source);
        let target = normalize_code(target);
        let rates = self.get_currency_rates(&source).await?;

        match rates.get(&target) {
            Some(rate) => Ok(*rate),
            None if source == target => Ok(1.0),
            None => Err(RateError::Lookup {
                base: source,
                target,
            }),
        }
    }

    /// Converts `amount` of `source` into `target`, rounded to 6 decimals.
    pub async fn transform_currency(&self, source: &str, target: &str, amount: f64) -> Result<f64> {
        let rate = self.get_currency_rate(source, target).await?;
        let converted = round6(amount * rate);
        debug!("Converted {amount} {source} to {converted} {target} at rate {rate}");
        Ok(converted)
    }

    /// Lists cached bases in code order.
    pub async fn cache_status(&self) -> Vec<CacheStatus> {
        let now = self.clock.now();
        let settings = self.settings.read().await;
        let mut entries: Vec<CacheStatus> = settings
            .exchange_rate_data
            .iter()
            .map(|(base, snapshot)| CacheStatus {
                base: base.clone(),
                snapshot: snapshot.clone(),
                stale: snapshot.is_stale(&now),
            })
            .collect();
        entries.sort_by(|a, b| a.base.cmp(&b.base));
        entries
    }

    async fn fresh_rates(&self, base: &str) -> Option<CurrencyRates> {
        let settings = self.settings.read().await;
        match settings.exchange_rate_data.get(base) {
            Some(snapshot) if !snapshot.is_stale(&self.clock.now()) => {
                debug!(%base, "Cache HIT");
                Some(snapshot.rates.clone())
            }
            Some(_) => {
                debug!(%base, "Cache entry stale");
                None
            }
            None => {
                debug!(%base, "Cache MISS");
                None
            }
        }
    }

    async fn gate(&self, base: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(base.to_string()).or_default())
    }

    /// Drops the gate for `base` once no other caller holds or waits on it.
    /// Clones are only handed out under the `in_flight` lock, so a count of
    /// two (the map and ours) means nobody else is queued.
    async fn release_gate(&self, base: &str, gate: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        if Arc::strong_count(&gate) == 2 {
            in_flight.remove(base);
        }
    }

    #[cfg(test)]
    async fn pending_gates(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // 2023-11-14 22:13:20 UTC
    const UPDATED: i64 = 1_700_000_000;

    struct FixedClock(std::sync::Mutex<DateTime<FixedOffset>>);

    impl FixedClock {
        fn at(ts: i64) -> Arc<Self> {
            Arc::new(Self(std::sync::Mutex::new(Self::utc(ts))))
        }

        fn set(&self, ts: i64) {
            *self.0.lock().unwrap() = Self::utc(ts);
        }

        fn utc(ts: i64) -> DateTime<FixedOffset> {
            FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_opt(ts, 0)
                .unwrap()
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<FixedOffset> {
            *self.0.lock().unwrap()
        }
    }

    struct MockProvider {
        call_count: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        delay: Duration,
    }

    impl MockProvider {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                call_count: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        async fn fetch_rates(&self, base: &str) -> Result<RateSnapshot> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(RateError::fetch("API Request Failed: 500"));
            }
            let rates = match base {
                "USD" => HashMap::from([
                    ("USD".to_string(), 1.0),
                    ("EUR".to_string(), 0.9 / call as f64),
                ]),
                "EUR" => HashMap::from([("USD".to_string(), 1.1)]),
                _ => return Err(RateError::fetch("unsupported-code")),
            };
            Ok(RateSnapshot {
                last_updated: UPDATED,
                rates,
            })
        }
    }

    struct FailingSaveStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for FailingSaveStore {
        async fn load(&self) -> Result<Option<Vec<u8>>> {
            self.inner.load().await
        }

        async fn save(&self, _blob: &[u8]) -> Result<()> {
            Err(RateError::store("disk full"))
        }
    }

    async fn service(
        provider: Arc<MockProvider>,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
    ) -> ExchangeRates {
        ExchangeRates::load_with_clock(provider, store, clock)
            .await
            .unwrap()
    }

    async fn service_with_store(
        store: Arc<FailingSaveStore>,
        clock: Arc<FixedClock>,
    ) -> ExchangeRates {
        ExchangeRates::load_with_clock(MockProvider::new(), store, clock)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_rates_and_transform() {
        let provider = MockProvider::new();
        let rates = service(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED + 60),
        )
        .await;

        let table = rates.get_currency_rates("USD").await.unwrap();
        assert_eq!(table.get("EUR"), Some(&0.9));
        assert_eq!(table.get("USD"), Some(&1.0));
        assert_eq!(
            rates.transform_currency("USD", "EUR", 100.0).await.unwrap(),
            90.0
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_codes_are_case_insensitive() {
        let provider = MockProvider::new();
        let rates = service(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED),
        )
        .await;

        let lower = rates.get_currency_rates("usd").await.unwrap();
        let upper = rates.get_currency_rates("USD").await.unwrap();
        assert_eq!(lower, upper);
        assert_eq!(rates.get_currency_rate("usd", "eur").await.unwrap(), 0.9);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_day_uses_cache_next_day_refetches() {
        let provider = MockProvider::new();
        let clock = FixedClock::at(UPDATED + 3600);
        let rates = service(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        )
        .await;

        rates.get_currency_rates("USD").await.unwrap();
        rates.get_currency_rates("USD").await.unwrap();
        assert_eq!(provider.calls(), 1);

        // 2023-11-15 00:01:00 UTC
        clock.set(1_700_006_460);
        let table = rates.get_currency_rates("USD").await.unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(table.get("EUR"), Some(&0.45));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_entry() {
        let provider = MockProvider::new();
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock::at(UPDATED);
        let rates = service(provider.clone(), store.clone(), clock.clone()).await;

        rates.get_currency_rates("USD").await.unwrap();
        let stored_before = store.load().await.unwrap();

        provider.fail.store(true, Ordering::SeqCst);
        clock.set(UPDATED + 86_400);
        let err = rates.get_currency_rates("USD").await.unwrap_err();
        assert_eq!(
            err,
            RateError::Fetch("API Request Failed: 500".to_string())
        );

        let status = rates.cache_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].snapshot.rates.get("EUR"), Some(&0.9));
        assert!(status[0].stale);
        assert_eq!(store.load().await.unwrap(), stored_before);
    }

    #[tokio::test]
    async fn test_missing_target_is_lookup_error() {
        let rates = service(
            MockProvider::new(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED),
        )
        .await;

        let err = rates.get_currency_rate("USD", "XYZ").await.unwrap_err();
        assert_eq!(
            err,
            RateError::Lookup {
                base: "USD".to_string(),
                target: "XYZ".to_string()
            }
        );
        assert!(rates.transform_currency("USD", "XYZ", 1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_same_currency_rate_is_one() {
        let rates = service(
            MockProvider::new(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED),
        )
        .await;

        // USD lists itself, EUR does not
        assert_eq!(rates.get_currency_rate("USD", "USD").await.unwrap(), 1.0);
        assert_eq!(rates.get_currency_rate("EUR", "eur").await.unwrap(), 1.0);
        assert_eq!(
            rates.transform_currency("EUR", "EUR", 12.5).await.unwrap(),
            12.5
        );
    }

    #[tokio::test]
    async fn test_fetch_persists_settings() {
        let store = Arc::new(MemoryStore::new());
        let rates = service(
            MockProvider::new(),
            store.clone(),
            FixedClock::at(UPDATED),
        )
        .await;

        rates.fetch_exchange_rates("eur").await.unwrap();

        let blob = store.load().await.unwrap().expect("settings saved");
        let settings = Settings::from_json(&blob).unwrap();
        let entry = settings.exchange_rate_data.get("EUR").unwrap();
        assert_eq!(entry.last_updated, UPDATED);
        assert_eq!(entry.rates.get("USD"), Some(&1.1));
    }

    #[tokio::test]
    async fn test_loads_cached_entries_from_store() {
        let mut settings = Settings::default();
        settings.exchange_rate_data.insert(
            "USD".to_string(),
            RateSnapshot {
                last_updated: UPDATED,
                rates: HashMap::from([("GBP".to_string(), 0.8)]),
            },
        );
        let store = Arc::new(MemoryStore::with_blob(settings.to_json().unwrap()));
        let provider = MockProvider::new();
        let rates = service(provider.clone(), store, FixedClock::at(UPDATED + 10)).await;

        assert_eq!(rates.get_currency_rate("USD", "GBP").await.unwrap(), 0.8);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_store_fails_load() {
        let store = Arc::new(MemoryStore::with_blob(b"not json".to_vec()));
        let result =
            ExchangeRates::load_with_clock(MockProvider::new(), store, FixedClock::at(UPDATED))
                .await;
        assert!(matches!(result, Err(RateError::Store(_))));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let provider = MockProvider::with_delay(Duration::from_millis(50));
        let rates = service(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED),
        )
        .await;

        let (first, second, third) = tokio::join!(
            rates.get_currency_rates("USD"),
            rates.get_currency_rates("usd"),
            rates.get_currency_rate("USD", "EUR"),
        );
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(third.unwrap(), 0.9);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_leaves_cache_unchanged() {
        let provider = MockProvider::new();
        let store = Arc::new(FailingSaveStore {
            inner: MemoryStore::new(),
        });
        let rates =
            ExchangeRates::load_with_clock(provider.clone(), store, FixedClock::at(UPDATED))
                .await
                .unwrap();

        let err = rates.get_currency_rates("USD").await.unwrap_err();
        assert_eq!(err, RateError::Store("disk full".to_string()));
        assert!(rates.cache_status().await.is_empty());

        // Nothing was cached, so the next call goes back to the provider
        assert!(rates.get_currency_rates("USD").await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_previous_snapshot() {
        let mut settings = Settings::default();
        settings.exchange_rate_data.insert(
            "USD".to_string(),
            RateSnapshot {
                last_updated: UPDATED,
                rates: HashMap::from([("GBP".to_string(), 0.8)]),
            },
        );
        let store = Arc::new(FailingSaveStore {
            inner: MemoryStore::with_blob(settings.to_json().unwrap()),
        });
        let rates = service_with_store(store, FixedClock::at(UPDATED + 86_400)).await;

        let err = rates.get_currency_rates("USD").await.unwrap_err();
        assert!(matches!(err, RateError::Store(_)));

        let status = rates.cache_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].snapshot.rates.get("GBP"), Some(&0.8));
        assert!(status[0].stale);
    }

    #[tokio::test]
    async fn test_gates_are_released_after_fetch() {
        let provider = MockProvider::with_delay(Duration::from_millis(20));
        let rates = service(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            FixedClock::at(UPDATED),
        )
        .await;

        // Unknown codes fail at the provider and must not leave a gate behind
        assert!(rates.get_currency_rates("XYZ").await.is_err());
        assert!(rates.get_currency_rates("ABC").await.is_err());
        assert_eq!(rates.pending_gates().await, 0);

        let (first, second) = tokio::join!(
            rates.get_currency_rates("USD"),
            rates.get_currency_rates("USD"),
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(rates.pending_gates().await, 0);
        assert_eq!(provider.calls(), 3);
    }
}
