//! Host-facing surface: the three scripting entry points and their
//! registration on a host namespace.

use crate::core::error::Result;
use crate::core::exchange::ExchangeRates;
use crate::core::provider::RateProvider;
use crate::core::rates::CurrencyRates;
use crate::core::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Name under which the entry points are registered on the host.
pub const NAMESPACE: &str = "exchangerate";

/// Operations callable from the host's scripting surface.
#[async_trait]
pub trait ExchangeRateApi: Send + Sync {
    /// Converts `amount` from `source` to `target`, rounded to 6 decimals.
    async fn transform(&self, source: &str, target: &str, amount: f64) -> Result<f64>;
    async fn rate(&self, source: &str, target: &str) -> Result<f64>;
    async fn rates(&self, source: &str) -> Result<CurrencyRates>;
}

#[async_trait]
impl ExchangeRateApi for ExchangeRates {
    async fn transform(&self, source: &str, target: &str, amount: f64) -> Result<f64> {
        self.transform_currency(source, target, amount).await
    }

    async fn rate(&self, source: &str, target: &str) -> Result<f64> {
        self.get_currency_rate(source, target).await
    }

    async fn rates(&self, source: &str) -> Result<CurrencyRates> {
        self.get_currency_rates(source).await
    }
}

/// A host that can expose named API objects to its scripts.
pub trait ScriptHost: Send + Sync {
    fn register(&self, name: &str, api: Arc<dyn ExchangeRateApi>);

    /// Returns true if `name` was registered.
    fn unregister(&self, name: &str) -> bool;
}

/// In-process namespace of registered API objects.
#[derive(Default)]
pub struct Namespace {
    entries: RwLock<HashMap<String, Arc<dyn ExchangeRateApi>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExchangeRateApi>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).cloned()
    }
}

impl ScriptHost for Namespace {
    fn register(&self, name: &str, api: Arc<dyn ExchangeRateApi>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        debug!("Namespace REGISTER {}", name);
        entries.insert(name.to_string(), api);
    }

    fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        debug!("Namespace UNREGISTER {}", name);
        entries.remove(name).is_some()
    }
}

/// Wires the rate cache into a host for the lifetime of a load/unload pair.
pub struct ExchangeRatePlugin {
    host: Arc<dyn ScriptHost>,
    rates: Option<Arc<ExchangeRates>>,
}

impl ExchangeRatePlugin {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host, rates: None }
    }

    /// Loads persisted settings and registers the entry points under
    /// [`NAMESPACE`].
    pub async fn load(
        &mut self,
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Arc<ExchangeRates>> {
        let rates = Arc::new(ExchangeRates::load(provider, store).await?);
        Ok(self.register(rates))
    }

    /// Registers an already loaded rate cache.
    pub fn register(&mut self, rates: Arc<ExchangeRates>) -> Arc<ExchangeRates> {
        self.host.register(NAMESPACE, rates.clone());
        self.rates = Some(rates.clone());
        info!("Registered {} on host", NAMESPACE);
        rates
    }

    pub fn unload(&mut self) {
        if self.rates.take().is_some() {
            self.host.unregister(NAMESPACE);
            info!("Removed {} from host", NAMESPACE);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.rates.is_some()
    }
}
