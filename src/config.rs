//! Runtime configuration.
//!
//! Endpoints, contract addresses and keys are never compiled in; they come from
//! a [`Config`] value, usually loaded from the environment (and an optional
//! `.env` file) with [`Config::from_env`].

use std::env;
use std::path::PathBuf;

use alloy::primitives::Address;
use displaydoc::Display;
use thiserror::Error;
use url::Url;

pub const ENV_RPC_URL: &str = "ETHWATCH_RPC_URL";
pub const ENV_WS_URL: &str = "ETHWATCH_WS_URL";
pub const ENV_STORE_ADDRESS: &str = "ETHWATCH_STORE_ADDRESS";
pub const ENV_PRIVATE_KEY: &str = "ETHWATCH_PRIVATE_KEY";
pub const ENV_KEYSTORE_DIR: &str = "ETHWATCH_KEYSTORE_DIR";
pub const ENV_GAS_LIMIT: &str = "ETHWATCH_GAS_LIMIT";

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8545";
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Errors raised while reading configuration values.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// Invalid URL in {0}: {1}
    InvalidUrl(&'static str, String),
    /// Invalid address in {0}: {1}
    InvalidAddress(&'static str, String),
    /// Invalid number in {0}: {1}
    InvalidNumber(&'static str, String),
    /// Missing required setting {0}
    Missing(&'static str),
}

/// Gas settings applied to state-changing contract calls.
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Gas limit for transactions.
    pub gas_limit: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Settings for the clients and the demo program.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP JSON-RPC endpoint for one-shot queries.
    pub rpc_url: Url,
    /// Websocket endpoint for subscriptions.
    pub ws_url: Url,
    /// Address of the deployed `Store` contract.
    pub store_address: Option<Address>,
    /// Hex encoded private key used to sign `Store` transactions.
    pub private_key: Option<String>,
    /// Directory holding JSON keystore files. `None` means the default location.
    pub keystore_dir: Option<PathBuf>,
    /// Transaction parameters.
    pub tx: TransactionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            ws_url: Url::parse(DEFAULT_WS_URL).expect("default WS URL is valid"),
            store_address: None,
            private_key: None,
            keystore_dir: None,
            tx: TransactionConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `ETHWATCH_*` environment variables.
    /// A `.env` file in the working directory is read first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_RPC_URL) {
            config.rpc_url = parse_url(ENV_RPC_URL, &url)?;
        }
        if let Some(url) = lookup(ENV_WS_URL) {
            config.ws_url = parse_url(ENV_WS_URL, &url)?;
        }
        if let Some(address) = lookup(ENV_STORE_ADDRESS) {
            let address = address
                .parse()
                .map_err(|e| ConfigError::InvalidAddress(ENV_STORE_ADDRESS, format!("{e}")))?;
            config.store_address = Some(address);
        }
        config.private_key = lookup(ENV_PRIVATE_KEY).filter(|key| !key.trim().is_empty());
        config.keystore_dir = lookup(ENV_KEYSTORE_DIR).map(PathBuf::from);
        if let Some(gas_limit) = lookup(ENV_GAS_LIMIT) {
            config.tx.gas_limit = gas_limit
                .parse()
                .map_err(|e| ConfigError::InvalidNumber(ENV_GAS_LIMIT, format!("{e}")))?;
        }

        log::debug!(
            "Loaded configuration: rpc={}, ws={}, store={:?}",
            config.rpc_url,
            config.ws_url,
            config.store_address
        );
        Ok(config)
    }

    /// Returns the store address or an error naming the missing variable.
    pub fn require_store_address(&self) -> Result<Address, ConfigError> {
        self.store_address
            .ok_or(ConfigError::Missing(ENV_STORE_ADDRESS))
    }

    /// Returns the private key or an error naming the missing variable.
    pub fn require_private_key(&self) -> Result<&str, ConfigError> {
        self.private_key
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_PRIVATE_KEY))
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl(key, format!("{value}: {e}")))
}
