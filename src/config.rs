use std::path::Path;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::contracts::TokenContracts;
use crate::model::Chain;

/// Environment variable holding the hex-encoded signing key.
pub const PRIVATE_KEY_ENV: &str = "GNTW_PAY_PRIVATE_KEY";

/// Gas budget per transaction kind, plus the fixed gas price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Gas price in wei.
    pub gas_price: u128,
    pub batch_base: u64,
    pub per_payment: u64,
    pub create_deposit: u64,
    pub transfer: u64,
    pub process_deposit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        GasConfig {
            gas_price: 20_000_000_000,
            batch_base: 30_000,
            per_payment: 30_000,
            create_deposit: 320_000,
            transfer: 60_000,
            process_deposit: 110_000,
        }
    }
}

/// Deployed token addresses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub legacy_token: Address,
    pub wrapped_token: Address,
}

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: Chain,
    pub contracts: ContractAddresses,
    #[serde(default)]
    pub gas: GasConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents).context("parsing config file")?;
        config.chain_id()?;
        Ok(config)
    }

    pub fn chain_id(&self) -> Result<u64> {
        self.chain.chain_id().with_context(|| {
            format!(
                "chain '{}' is not a known network, set `chain_id` explicitly",
                self.chain
            )
        })
    }

    pub fn token_contracts(&self) -> TokenContracts {
        TokenContracts::new(self.contracts.legacy_token, self.contracts.wrapped_token)
    }
}

/// Read the signing key from [`PRIVATE_KEY_ENV`].
pub fn signer_from_env() -> Result<PrivateKeySigner> {
    let private_key = std::env::var(PRIVATE_KEY_ENV).map_err(|_| {
        anyhow::anyhow!(
            "{PRIVATE_KEY_ENV} env var not set. \
             Set it to your hex private key."
        )
    })?;
    parse_signer(&private_key)
}

pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    private_key
        .trim()
        .trim_start_matches("0x")
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid private key: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_gas_defaults() {
        let json = r#"{
            "chain": {"name": "rinkeby", "rpc_url": "http://localhost:8545"},
            "contracts": {
                "legacy_token": "0x1111111111111111111111111111111111111111",
                "wrapped_token": "0x2222222222222222222222222222222222222222"
            },
            "gas": {"per_payment": 25000}
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chain_id().unwrap(), 4);
        assert_eq!(config.gas.per_payment, 25_000);
        assert_eq!(config.gas.batch_base, GasConfig::default().batch_base);
        assert_eq!(
            config.token_contracts().wrapped.address,
            config.contracts.wrapped_token
        );
    }

    #[test]
    fn test_unknown_chain_needs_chain_id() {
        let json = r#"{
            "chain": {"name": "devnet", "rpc_url": "http://localhost:8545"},
            "contracts": {
                "legacy_token": "0x1111111111111111111111111111111111111111",
                "wrapped_token": "0x2222222222222222222222222222222222222222"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.chain_id().is_err());
    }

    #[test]
    fn test_parse_signer_accepts_prefix() {
        let key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let a = parse_signer(key).unwrap();
        let b = parse_signer(&format!("0x{key}\n")).unwrap();
        assert_eq!(a.address(), b.address());
    }
}
