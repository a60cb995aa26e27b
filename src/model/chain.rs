use alloy::primitives::{B256, b256};
use serde::{Deserialize, Serialize};

/// Genesis block hash of Ethereum mainnet.
pub const MAINNET_GENESIS: B256 =
    b256!("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3");

/// Genesis block hash of the Rinkeby testnet.
pub const RINKEBY_GENESIS: B256 =
    b256!("6341fd3daf94b748c72ced5a5b26028f2474f5f00d824504e4fa37a75767e177");

/// The ledger a node is expected to serve.
///
/// In JSON, chains are objects:
/// - Known chain: `{"name": "rinkeby", "rpc_url": "http://127.0.0.1:8545"}`
///   (chain_id filled from the registry)
/// - Custom chain: `{"name": "dev", "chain_id": 1337, "rpc_url": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Human-readable chain name (e.g. "mainnet", "rinkeby").
    pub name: String,
    /// EIP-155 chain ID used when signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
}

// ── Methods ──────────────────────────────────────────────────────────

impl Chain {
    /// EIP-155 chain ID, falling back to the registry for known names.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id.or_else(|| match self.name.to_lowercase().as_str() {
            "mainnet" => Some(1),
            "rinkeby" => Some(4),
            _ => None,
        })
    }

    /// Expected hash of block 0. `None` for chains we have no record of,
    /// in which case the genesis check is skipped.
    pub fn genesis_hash(&self) -> Option<B256> {
        match self.name.to_lowercase().as_str() {
            "mainnet" => Some(MAINNET_GENESIS),
            "rinkeby" => Some(RINKEBY_GENESIS),
            _ => None,
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

// ── Convenience constructors ─────────────────────────────────────────

impl Chain {
    pub fn mainnet(rpc_url: impl Into<String>) -> Self {
        Chain {
            name: "mainnet".into(),
            chain_id: Some(1),
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rinkeby(rpc_url: impl Into<String>) -> Self {
        Chain {
            name: "rinkeby".into(),
            chain_id: Some(4),
            rpc_url: rpc_url.into(),
        }
    }

    /// Custom EVM chain with chain_id + rpc_url.
    pub fn custom(name: impl Into<String>, chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Chain {
            name: name.into(),
            chain_id: Some(chain_id),
            rpc_url: rpc_url.into(),
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
