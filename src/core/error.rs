use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// The provider could not deliver a rate table for a base currency.
    #[error("Get Exchange Rate Failed: {0}")]
    Fetch(String),
    /// The provider's table for `base` has no entry for `target`.
    #[error("No exchange rate from {base} to {target}")]
    Lookup { base: String, target: String },
    #[error("Settings store error: {0}")]
    Store(String),
}

pub type Result<T, E = RateError> = std::result::Result<T, E>;

impl RateError {
    pub fn fetch(cause: impl std::fmt::Display) -> Self {
        RateError::Fetch(cause.to_string())
    }

    pub fn store(cause: impl std::fmt::Display) -> Self {
        RateError::Store(cause.to_string())
    }
}
