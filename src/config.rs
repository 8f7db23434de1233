//! Service configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP port for the storefront gateway
    pub port: u16,
    /// Base URL of the Remote Cart Service
    pub cart_api_url: String,
    pub cart_api_timeout: Duration,
    /// Directory holding guest cart slots
    pub local_store_dir: PathBuf,
    /// Telemetry is only logged when unset
    pub nats_url: Option<String>,
    pub events_subject: String,
    pub telemetry_buffer: usize,
    /// Per-cart mailbox capacity
    pub cart_mailbox: usize,
    /// Cart actors with no traffic for this long are stopped
    pub cart_idle_timeout: Duration,
    pub loyalty_spend_per_coin: Decimal,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_or(&var, "PORT", 8084)?,
            cart_api_url: var("CART_API_URL").ok_or(ConfigError::Missing("CART_API_URL"))?,
            cart_api_timeout: Duration::from_secs(parse_or(&var, "CART_API_TIMEOUT_SECS", 10)?),
            local_store_dir: var("CART_STORE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data/carts")),
            nats_url: var("NATS_URL"),
            events_subject: var("CART_EVENTS_SUBJECT").unwrap_or_else(|| "storefront.cart.events".to_string()),
            telemetry_buffer: parse_or(&var, "TELEMETRY_BUFFER", 1024)?,
            cart_mailbox: parse_or(&var, "CART_MAILBOX", 64)?,
            cart_idle_timeout: Duration::from_secs(parse_or(&var, "CART_IDLE_SECS", 900)?),
            loyalty_spend_per_coin: parse_or(&var, "LOYALTY_SPEND_PER_COIN", Decimal::ONE_HUNDRED)?,
        })
    }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
