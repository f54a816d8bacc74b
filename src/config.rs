use crate::models::{network_ids, NetworkTable};
use crate::services::{price::DEFAULT_COINGECKO_API_URL, VerificationSettings};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testnet => "testnet",
            Environment::Production => "production",
        }
    }
}

pub fn parse_environment(value: &str) -> Result<Environment> {
    match value.to_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "testnet" | "test" => Ok(Environment::Testnet),
        "production" | "prod" => Ok(Environment::Production),
        _ => bail!("Unknown environment: {}", value),
    }
}

/// Endpoint overrides, one env var per network.
const RPC_URL_VARS: &[(u64, &str)] = &[
    (network_ids::MAINNET, "MAINNET_RPC_URL"),
    (network_ids::POLYGON, "POLYGON_RPC_URL"),
    (network_ids::OPTIMISM, "OPTIMISM_RPC_URL"),
    (network_ids::ARBITRUM, "ARBITRUM_RPC_URL"),
    (network_ids::GNOSIS, "GNOSIS_RPC_URL"),
    (network_ids::CELO, "CELO_RPC_URL"),
    (network_ids::BASE, "BASE_RPC_URL"),
    (network_ids::SOLANA_MAINNET, "SOLANA_RPC_URL"),
    (network_ids::SOLANA_DEVNET, "SOLANA_DEVNET_RPC_URL"),
    (network_ids::STELLAR_MAINNET, "STELLAR_NETWORK_URL"),
    (network_ids::STELLAR_TESTNET, "STELLAR_TESTNET_URL"),
    (network_ids::CARDANO_MAINNET, "CARDANO_MAINNET_URL"),
    (network_ids::CARDANO_TESTNET, "CARDANO_TESTNET_URL"),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Reconciliation
    pub amount_delta: f64,
    pub time_threshold_secs: i64,

    // Upstreams
    pub rpc_timeout_secs: u64,
    pub rpc_urls: HashMap<u64, String>,
    pub coingecko_api_url: String,
    pub safe_service_url: Option<String>,
    pub blockfrost_project_id: Option<String>,

    // Cache
    pub redis_url: Option<String>,
    pub price_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let settings = VerificationSettings::default();
        Self {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 3000,
            amount_delta: settings.amount_delta,
            time_threshold_secs: settings.time_threshold_secs,
            rpc_timeout_secs: 30,
            rpc_urls: HashMap::new(),
            coingecko_api_url: DEFAULT_COINGECKO_API_URL.to_string(),
            safe_service_url: None,
            blockfrost_project_id: None,
            redis_url: None,
            price_cache_ttl_secs: 60,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let environment = parse_environment(
            &std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        )?;

        let rpc_urls = RPC_URL_VARS
            .iter()
            .filter_map(|(id, var)| optional_var(var).map(|url| (*id, url)))
            .collect();

        let config = Self {
            environment,
            host: optional_var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,

            amount_delta: parse_var("TRANSACTION_AMOUNT_DELTA", defaults.amount_delta)?,
            time_threshold_secs: parse_var(
                "TRANSACTION_TIME_THRESHOLD",
                defaults.time_threshold_secs,
            )?,

            rpc_timeout_secs: parse_var("RPC_TIMEOUT_SECS", defaults.rpc_timeout_secs)?,
            rpc_urls,
            coingecko_api_url: optional_var("COINGECKO_API_URL")
                .unwrap_or(defaults.coingecko_api_url),
            safe_service_url: optional_var("SAFE_TRANSACTION_SERVICE_URL"),
            blockfrost_project_id: optional_var("BLOCKFROST_PROJECT_ID"),

            redis_url: optional_var("REDIS_URL"),
            price_cache_ttl_secs: parse_var("PRICE_CACHE_TTL_SECS", defaults.price_cache_ttl_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.amount_delta.is_finite() && self.amount_delta > 0.0) {
            bail!("TRANSACTION_AMOUNT_DELTA must be positive");
        }
        if self.time_threshold_secs <= 0 {
            bail!("TRANSACTION_TIME_THRESHOLD must be positive");
        }
        if self.rpc_timeout_secs == 0 {
            bail!("RPC_TIMEOUT_SECS must be positive");
        }

        if !self.coingecko_api_url.starts_with("http") {
            bail!("COINGECKO_API_URL must be HTTP(S) URL");
        }
        if let Some(url) = &self.safe_service_url {
            if !url.starts_with("http") {
                bail!("SAFE_TRANSACTION_SERVICE_URL must be HTTP(S) URL");
            }
        }
        for (id, var) in RPC_URL_VARS {
            if let Some(url) = self.rpc_urls.get(id) {
                if !url.starts_with("http") {
                    bail!("{} must be HTTP(S) URL", var);
                }
            }
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }

    pub fn network_table(&self) -> NetworkTable {
        NetworkTable::defaults().with_rpc_urls(&self.rpc_urls)
    }

    pub fn settings(&self) -> VerificationSettings {
        VerificationSettings {
            amount_delta: self.amount_delta,
            time_threshold_secs: self.time_threshold_secs,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }
}
