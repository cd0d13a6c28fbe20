//! Core business logic abstractions

pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod log;
pub mod provider;
pub mod rates;
pub mod store;

// Re-export main types for cleaner imports
pub use clock::{Clock, SystemClock};
pub use error::{RateError, Result};
pub use exchange::ExchangeRates;
pub use provider::RateProvider;
pub use rates::{CurrencyRates, RateSnapshot, Settings};
pub use store::KeyValueStore;
