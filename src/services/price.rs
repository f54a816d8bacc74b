use crate::models::PriceRequest;
use crate::services::CacheService;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

type PriceTable = HashMap<String, HashMap<String, f64>>;

fn coin_id(symbol: &str) -> Option<&'static str> {
    let id = match symbol.trim().to_uppercase().as_str() {
        "ETH" => "ethereum",
        "MATIC" | "POL" => "polygon-ecosystem-token",
        "BNB" => "binancecoin",
        "AVAX" => "avalanche-2",
        "CELO" => "celo",
        "XDAI" => "xdai",
        "DAI" => "dai",
        "SOL" => "solana",
        _ => return None,
    };
    Some(id)
}

fn platform_id(network_id: u64) -> Option<&'static str> {
    let id = match network_id {
        1 => "ethereum",
        10 => "optimistic-ethereum",
        56 => "binance-smart-chain",
        100 => "xdai",
        101 => "solana",
        137 => "polygon-pos",
        8453 => "base",
        42161 => "arbitrum-one",
        42220 => "celo",
        43114 => "avalanche",
        _ => return None,
    };
    Some(id)
}

/// USD prices from CoinGecko behind a TTL cache.
pub struct PriceService {
    http: Client,
    base_url: String,
    cache: Arc<CacheService>,
}

impl PriceService {
    pub fn new(http: Client, base_url: &str, cache: Arc<CacheService>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    /// Never fails; an unavailable price is reported as `0.0`.
    pub async fn usd_price(&self, request: &PriceRequest) -> f64 {
        let key = request.cache_key();

        if let Ok(Some(price)) = self.cache.get::<f64>(&key).await {
            tracing::debug!(symbol = %request.symbol, price, "Returning cached price");
            return price;
        }

        match self.fetch(request).await {
            Ok(Some(price)) => {
                if let Err(e) = self.cache.set(&key, &price).await {
                    tracing::warn!("Failed to cache price for {}: {}", key, e);
                }
                tracing::debug!(symbol = %request.symbol, price, "Token price fetched");
                price
            }
            Ok(None) => 0.0,
            Err(e) => {
                tracing::error!(
                    network_id = request.network_id,
                    symbol = %request.symbol,
                    token_address = ?request.token_address(),
                    "Failed to fetch token price: {}",
                    e
                );
                0.0
            }
        }
    }

    async fn fetch(&self, request: &PriceRequest) -> Result<Option<f64>, reqwest::Error> {
        match request.token_address() {
            Some(address) => self.price_by_contract(request.network_id, address).await,
            None => self.price_by_symbol(&request.symbol).await,
        }
    }

    async fn price_by_symbol(&self, symbol: &str) -> Result<Option<f64>, reqwest::Error> {
        let Some(id) = coin_id(symbol) else {
            tracing::warn!(symbol = %symbol, "Unknown native token symbol");
            return Ok(None);
        };

        let prices: PriceTable = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", id), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(prices.get(id).and_then(|quote| quote.get("usd")).copied())
    }

    async fn price_by_contract(
        &self,
        network_id: u64,
        address: &str,
    ) -> Result<Option<f64>, reqwest::Error> {
        let Some(platform) = platform_id(network_id) else {
            tracing::warn!(network_id, "Unknown network for price lookup");
            return Ok(None);
        };

        let address = address.to_lowercase();
        let prices: PriceTable = self
            .http
            .get(format!("{}/simple/token_price/{}", self.base_url, platform))
            .query(&[("contract_addresses", address.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(prices.get(&address).and_then(|quote| quote.get("usd")).copied())
    }
}
