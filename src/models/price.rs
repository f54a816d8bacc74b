use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub network_id: u64,
    pub symbol: String,
    #[serde(default)]
    pub token_address: Option<String>,
}

impl PriceRequest {
    pub fn token_address(&self) -> Option<&str> {
        self.token_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    pub fn cache_key(&self) -> String {
        format!(
            "price:{}:{}:{}",
            self.network_id,
            self.symbol.to_uppercase(),
            self.token_address()
                .map(str::to_lowercase)
                .unwrap_or_else(|| "native".to_string())
        )
    }
}
