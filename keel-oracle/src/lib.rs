pub mod price_feed;

pub use price_feed::{PriceFeed, PriceReport};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("no price available: {0}")]
    Unavailable(String),
    #[error("price is stale: last update {last}, now {now}")]
    Stale { last: u64, now: u64 },
    #[error("oracle returned a zero price")]
    ZeroPrice,
}

/// Synchronous price source consulted once per ledger operation.
/// Authoritative per call — no caching across operations and no
/// fallback pricing; failure here fails the enclosing operation.
pub trait PriceOracle {
    fn fetch_current_price(&self) -> Result<u128, OracleError>;
}

/// Settable oracle for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    price: Option<u128>,
}

impl StaticOracle {
    pub fn new(price: u128) -> Self {
        Self { price: Some(price) }
    }

    pub fn set(&mut self, price: u128) {
        self.price = Some(price);
    }

    pub fn clear(&mut self) {
        self.price = None;
    }
}

impl PriceOracle for StaticOracle {
    fn fetch_current_price(&self) -> Result<u128, OracleError> {
        match self.price {
            Some(0) => Err(OracleError::ZeroPrice),
            Some(price) => Ok(price),
            None => Err(OracleError::Unavailable("static oracle unset".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_oracle_serves_and_fails_explicitly() {
        let mut oracle = StaticOracle::default();
        assert!(matches!(
            oracle.fetch_current_price(),
            Err(OracleError::Unavailable(_))
        ));

        oracle.set(1_000_000_000_000);
        assert_eq!(oracle.fetch_current_price().unwrap(), 1_000_000_000_000);

        oracle.set(0);
        assert_eq!(oracle.fetch_current_price(), Err(OracleError::ZeroPrice));
    }
}
