use crate::error::{Result, VerifierError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A class of blockchains sharing a transaction and address model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainFamily {
    Evm,
    Solana,
    Stellar,
    Cardano,
}

impl ChainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "EVM",
            ChainFamily::Solana => "SOLANA",
            ChainFamily::Stellar => "STELLAR",
            ChainFamily::Cardano => "CARDANO",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EVM" => Ok(ChainFamily::Evm),
            "SOLANA" => Ok(ChainFamily::Solana),
            "STELLAR" => Ok(ChainFamily::Stellar),
            "CARDANO" => Ok(ChainFamily::Cardano),
            other => Err(format!("Unknown chain type: {}", other)),
        }
    }
}

pub mod network_ids {
    pub const MAINNET: u64 = 1;
    pub const OPTIMISM: u64 = 10;
    pub const GNOSIS: u64 = 100;
    pub const POLYGON: u64 = 137;
    pub const BASE: u64 = 8453;
    pub const ARBITRUM: u64 = 42161;
    pub const CELO: u64 = 42220;

    pub const SOLANA_MAINNET: u64 = 101;
    pub const SOLANA_DEVNET: u64 = 102;
    pub const STELLAR_MAINNET: u64 = 200;
    pub const STELLAR_TESTNET: u64 = 201;
    pub const CARDANO_MAINNET: u64 = 300;
    pub const CARDANO_TESTNET: u64 = 301;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub id: u64,
    pub name: String,
    pub family: ChainFamily,
    pub rpc_url: Option<String>,
    pub block_explorer_url: Option<String>,
    pub native_currency: NativeCurrency,
    /// Former or alternative tickers of the native currency.
    pub native_aliases: Vec<String>,
    /// Contracts that fan a single transaction out to several recipients.
    pub donation_handlers: Vec<String>,
}

impl NetworkConfig {
    fn new(id: u64, name: &str, family: ChainFamily, currency: (&str, &str, u32)) -> Self {
        let (currency_name, symbol, decimals) = currency;
        Self {
            id,
            name: name.to_string(),
            family,
            rpc_url: None,
            block_explorer_url: None,
            native_currency: NativeCurrency {
                name: currency_name.to_string(),
                symbol: symbol.to_string(),
                decimals,
            },
            native_aliases: Vec::new(),
            donation_handlers: Vec::new(),
        }
    }

    fn explorer(mut self, url: &str) -> Self {
        self.block_explorer_url = Some(url.to_string());
        self
    }

    fn rpc(mut self, url: &str) -> Self {
        self.rpc_url = Some(url.to_string());
        self
    }

    fn aliases(mut self, aliases: &[&str]) -> Self {
        self.native_aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    fn handlers(mut self, handlers: &[&str]) -> Self {
        self.donation_handlers = handlers.iter().map(|h| h.to_string()).collect();
        self
    }

    /// Whether `symbol` names this network's native currency, case-insensitively.
    pub fn is_native_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        symbol.eq_ignore_ascii_case(&self.native_currency.symbol)
            || self
                .native_aliases
                .iter()
                .any(|alias| symbol.eq_ignore_ascii_case(alias))
    }

    pub fn is_donation_handler(&self, address: &str) -> bool {
        let address = address.trim();
        self.donation_handlers
            .iter()
            .any(|handler| handler.eq_ignore_ascii_case(address))
    }
}

const GIVETH_HANDLER: &str = "0x97b2cb568e0880B99Cd16EFc6edFF5272Aa02676";

/// Static network-configuration table keyed by network id.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    networks: BTreeMap<u64, NetworkConfig>,
}

impl NetworkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The networks this service knows about, without EVM RPC endpoints.
    pub fn defaults() -> Self {
        use network_ids::*;

        let mut table = Self::new();

        table.insert(
            NetworkConfig::new(
                MAINNET,
                "Ethereum Mainnet",
                ChainFamily::Evm,
                ("Ethereum", "ETH", 18),
            )
            .explorer("https://etherscan.io")
            .handlers(&[GIVETH_HANDLER]),
        );
        table.insert(
            NetworkConfig::new(POLYGON, "Polygon", ChainFamily::Evm, ("MATIC", "MATIC", 18))
                .explorer("https://polygonscan.com")
                .aliases(&["POL"])
                .handlers(&["0x6e349C56F512cB4250276BF36335c8dd618944A1"]),
        );
        table.insert(
            NetworkConfig::new(OPTIMISM, "Optimism", ChainFamily::Evm, ("Ethereum", "ETH", 18))
                .explorer("https://optimistic.etherscan.io")
                .handlers(&["0x8D685A56C51Cf54685d3dB0Ea50748D3A2c2e0dC"]),
        );
        table.insert(
            NetworkConfig::new(ARBITRUM, "Arbitrum One", ChainFamily::Evm, ("Ethereum", "ETH", 18))
                .explorer("https://arbiscan.io")
                .handlers(&[GIVETH_HANDLER]),
        );
        table.insert(
            NetworkConfig::new(GNOSIS, "Gnosis Chain", ChainFamily::Evm, ("xDAI", "xDAI", 18))
                .explorer("https://gnosisscan.io")
                .handlers(&[GIVETH_HANDLER]),
        );
        table.insert(
            NetworkConfig::new(CELO, "Celo", ChainFamily::Evm, ("CELO", "CELO", 18))
                .explorer("https://celoscan.io")
                .handlers(&[GIVETH_HANDLER]),
        );
        table.insert(
            NetworkConfig::new(BASE, "Base", ChainFamily::Evm, ("Ethereum", "ETH", 18))
                .explorer("https://basescan.org")
                .handlers(&["0x7a5D2A00a25b95fd8739bc52Cd79f8F971C37Ca1"]),
        );

        table.insert(
            NetworkConfig::new(
                SOLANA_MAINNET,
                "Solana Mainnet",
                ChainFamily::Solana,
                ("Solana", "SOL", 9),
            )
            .explorer("https://explorer.solana.com")
            .rpc("https://api.mainnet-beta.solana.com"),
        );
        table.insert(
            NetworkConfig::new(
                SOLANA_DEVNET,
                "Solana Devnet",
                ChainFamily::Solana,
                ("Solana", "SOL", 9),
            )
            .explorer("https://explorer.solana.com")
            .rpc("https://api.devnet.solana.com"),
        );
        table.insert(
            NetworkConfig::new(
                STELLAR_MAINNET,
                "Stellar Mainnet",
                ChainFamily::Stellar,
                ("Stellar Lumens", "XLM", 7),
            )
            .explorer("https://stellarchain.io")
            .rpc("https://horizon.stellar.org"),
        );
        table.insert(
            NetworkConfig::new(
                STELLAR_TESTNET,
                "Stellar Testnet",
                ChainFamily::Stellar,
                ("Stellar Lumens", "XLM", 7),
            )
            .explorer("https://testnet.stellarchain.io")
            .rpc("https://horizon-testnet.stellar.org"),
        );
        table.insert(
            NetworkConfig::new(
                CARDANO_MAINNET,
                "Cardano Mainnet",
                ChainFamily::Cardano,
                ("Cardano", "ADA", 6),
            )
            .explorer("https://cardanoscan.io")
            .rpc("https://cardano-mainnet.blockfrost.io/api/v0"),
        );
        table.insert(
            NetworkConfig::new(
                CARDANO_TESTNET,
                "Cardano Preprod",
                ChainFamily::Cardano,
                ("Cardano", "ADA", 6),
            )
            .explorer("https://preprod.cardanoscan.io")
            .rpc("https://cardano-preprod.blockfrost.io/api/v0"),
        );

        table
    }

    pub fn insert(&mut self, network: NetworkConfig) {
        self.networks.insert(network.id, network);
    }

    /// Overrides RPC endpoints; ids that are not in the table are ignored.
    pub fn with_rpc_urls(mut self, urls: &HashMap<u64, String>) -> Self {
        for (id, url) in urls {
            match self.networks.get_mut(id) {
                Some(network) => network.rpc_url = Some(url.clone()),
                None => tracing::warn!("Ignoring RPC URL for unknown network {}", id),
            }
        }
        self
    }

    pub fn get(&self, network_id: u64) -> Option<&NetworkConfig> {
        self.networks.get(&network_id)
    }

    pub fn require(&self, network_id: u64) -> Result<&NetworkConfig> {
        self.get(network_id)
            .ok_or(VerifierError::InvalidNetworkId(network_id))
    }

    pub fn family(&self, network_id: u64) -> Result<ChainFamily> {
        self.require(network_id).map(|network| network.family)
    }

    pub fn contains(&self, network_id: u64) -> bool {
        self.networks.contains_key(&network_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }
}
