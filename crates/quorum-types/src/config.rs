//! Fee configuration
//!
//! Gas prices and per-operation gas limits are ordinary configuration values
//! passed around explicitly; there is no process-wide default table.

use crate::tx::{Coin, Fee};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid gas price format: {0}")]
    InvalidGasPrice(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Price of one unit of gas in a single denomination, e.g. `0.025ucosm`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GasPrice {
    amount: f64,
    denom: String,
}

impl GasPrice {
    pub fn new(amount: f64, denom: impl Into<String>) -> Result<Self, ConfigError> {
        let denom = denom.into();
        if !amount.is_finite() || amount < 0.0 {
            return Err(ConfigError::InvalidGasPrice(format!("{amount}{denom}")));
        }
        if denom.is_empty() {
            return Err(ConfigError::InvalidGasPrice(format!("{amount}")));
        }
        Ok(Self { amount, denom })
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn denom(&self) -> &str {
        &self.denom
    }

    /// Fee paying for `gas_limit` units at this price, rounded up
    pub fn calculate_fee(&self, gas_limit: u64) -> Fee {
        let amount = (self.amount * gas_limit as f64).ceil() as u128;
        Fee::new(vec![Coin::new(self.denom.clone(), amount)], gas_limit)
    }
}

impl Default for GasPrice {
    fn default() -> Self {
        Self {
            amount: 0.025,
            denom: "ucosm".to_string(),
        }
    }
}

impl FromStr for GasPrice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split at the first alphabetic character: "0.025ucosm" -> ("0.025", "ucosm")
        let split_pos = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(pos, _)| pos)
            .ok_or_else(|| ConfigError::InvalidGasPrice(s.to_string()))?;

        let (amount_str, denom) = s.split_at(split_pos);
        if amount_str.is_empty() {
            return Err(ConfigError::InvalidGasPrice(s.to_string()));
        }

        let amount: f64 = amount_str
            .parse()
            .map_err(|_| ConfigError::InvalidGasPrice(s.to_string()))?;
        Self::new(amount, denom)
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl TryFrom<String> for GasPrice {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GasPrice> for String {
    fn from(price: GasPrice) -> Self {
        price.to_string()
    }
}

/// Operations with a configured gas limit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeKind {
    Send,
    Exec,
    Upload,
    Init,
    Migrate,
}

/// Gas limits per operation plus the price used to turn them into fees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeTable {
    pub gas_price: GasPrice,
    pub send: u64,
    pub exec: u64,
    pub upload: u64,
    pub init: u64,
    pub migrate: u64,
}

impl Default for FeeTable {
    fn default() -> Self {
        Self::with_gas_price(GasPrice::default())
    }
}

impl FeeTable {
    /// Build a table with the usual CosmWasm gas limits at the given price
    pub fn with_gas_price(gas_price: GasPrice) -> Self {
        Self {
            gas_price,
            send: 80_000,
            exec: 200_000,
            upload: 1_500_000,
            init: 500_000,
            migrate: 200_000,
        }
    }

    pub fn gas_limit(&self, kind: FeeKind) -> u64 {
        match kind {
            FeeKind::Send => self.send,
            FeeKind::Exec => self.exec,
            FeeKind::Upload => self.upload,
            FeeKind::Init => self.init,
            FeeKind::Migrate => self.migrate,
        }
    }

    pub fn fee(&self, kind: FeeKind) -> Fee {
        self.gas_price.calculate_fee(self.gas_limit(kind))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, limit) in [
            ("send", self.send),
            ("exec", self.exec),
            ("upload", self.upload),
            ("init", self.init),
            ("migrate", self.migrate),
        ] {
            if limit == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "gas limit for {name} must be positive"
                )));
            }
        }
        Ok(())
    }
}
