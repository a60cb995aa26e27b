use std::time::Duration;

use alloy::primitives::B256;
use alloy::providers::Provider;
use semver::Version;
use thiserror::Error;
use tracing::{info, warn};

use super::ChainError;
use super::rpc::RpcChainClient;
use crate::model::Chain;

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub const MIN_GETH_VERSION: Version = Version::new(1, 7, 2);
pub const MAX_GETH_VERSION: Version = Version::new(1, 9, 999);

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("could not connect to node at {url} after {attempts} attempts")]
    Unreachable { url: String, attempts: u32 },

    #[error("node has no genesis block")]
    MissingGenesis,

    #[error("invalid genesis block for {chain}, expected {expected}, got {got}")]
    GenesisMismatch {
        chain: String,
        expected: B256,
        got: B256,
    },

    #[error("expected geth client, got `{0}`")]
    NotGeth(String),

    #[error("malformed version string `{0}`")]
    MalformedVersion(String),

    #[error("incompatible geth version {version}, expected >= {min} and <= {max}")]
    IncompatibleVersion {
        version: Version,
        min: Version,
        max: Version,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Run every bootstrap check against a freshly connected node.
pub async fn ensure_node<P: Provider>(
    client: &RpcChainClient<P>,
    chain: &Chain,
) -> Result<Version, NodeError> {
    ensure_connection(client, chain.rpc_url()).await?;
    let version = ensure_geth_version(client).await?;
    ensure_genesis(client, chain).await?;
    Ok(version)
}

/// Poll the node until it answers, giving up after a fixed number of attempts.
pub async fn ensure_connection<P: Provider>(
    client: &RpcChainClient<P>,
    url: &str,
) -> Result<(), NodeError> {
    for attempt in 1..=CONNECT_ATTEMPTS {
        match client.chain_id().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(attempt, error = %e, "node not reachable yet");
                if attempt < CONNECT_ATTEMPTS {
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                }
            }
        }
    }
    Err(NodeError::Unreachable {
        url: url.to_string(),
        attempts: CONNECT_ATTEMPTS,
    })
}

pub async fn ensure_genesis<P: Provider>(
    client: &RpcChainClient<P>,
    chain: &Chain,
) -> Result<(), NodeError> {
    let Some(expected) = chain.genesis_hash() else {
        info!(%chain, "no known genesis for chain, skipping check");
        return Ok(());
    };
    let got = client.genesis_hash().await?.ok_or(NodeError::MissingGenesis)?;
    check_genesis(chain, expected, got)
}

pub async fn ensure_geth_version<P: Provider>(
    client: &RpcChainClient<P>,
) -> Result<Version, NodeError> {
    let raw = client.client_version().await?;
    let version = parse_geth_version(&raw)?;
    info!(%version, "geth version");
    check_version(version)
}

fn check_genesis(chain: &Chain, expected: B256, got: B256) -> Result<(), NodeError> {
    if got != expected {
        return Err(NodeError::GenesisMismatch {
            chain: chain.name.clone(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Extract `major.minor.patch` from `Geth/v1.8.27-stable/linux-amd64/go1.12`.
pub fn parse_geth_version(raw: &str) -> Result<Version, NodeError> {
    let mut parts = raw.split('/');
    let client = parts.next().unwrap_or_default();
    if client != "Geth" {
        return Err(NodeError::NotGeth(client.to_string()));
    }
    let tag = parts.next().unwrap_or_default();
    let malformed = || NodeError::MalformedVersion(tag.to_string());

    let digits = tag.strip_prefix('v').ok_or_else(malformed)?;
    let mut parts = digits.splitn(3, '.');
    let (Some(major), Some(minor), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    // Only the patch part may carry a suffix, e.g. `27-stable`.
    let patch_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let number = |n: &str| {
        if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        n.parse::<u64>().map_err(|_| malformed())
    };
    Ok(Version::new(
        number(major)?,
        number(minor)?,
        number(&rest[..patch_end])?,
    ))
}

fn check_version(version: Version) -> Result<Version, NodeError> {
    if version < MIN_GETH_VERSION || version > MAX_GETH_VERSION {
        return Err(NodeError::IncompatibleVersion {
            version,
            min: MIN_GETH_VERSION,
            max: MAX_GETH_VERSION,
        });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chain::{MAINNET_GENESIS, RINKEBY_GENESIS};

    #[test]
    fn test_parse_geth_version() {
        let v = parse_geth_version("Geth/v1.8.27-stable-4bcc0a37/linux-amd64/go1.12.5").unwrap();
        assert_eq!(v, Version::new(1, 8, 27));
    }

    #[test]
    fn test_parse_rejects_other_clients() {
        let err = parse_geth_version("Parity-Ethereum//v2.5.1-stable/x86_64-linux-gnu/rustc1.36.0")
            .unwrap_err();
        assert!(matches!(err, NodeError::NotGeth(ref c) if c == "Parity-Ethereum"));
    }

    #[test]
    fn test_parse_rejects_malformed_tag() {
        assert!(matches!(
            parse_geth_version("Geth/1.8.27/linux").unwrap_err(),
            NodeError::MalformedVersion(_)
        ));
        assert!(matches!(
            parse_geth_version("Geth/v1.8").unwrap_err(),
            NodeError::MalformedVersion(_)
        ));
        assert!(matches!(
            parse_geth_version("Geth").unwrap_err(),
            NodeError::MalformedVersion(_)
        ));
    }

    #[test]
    fn test_parse_suffix_only_on_patch() {
        for raw in ["Geth/v1.8x.2/linux", "Geth/v1x.8.2", "Geth/v1..2", "Geth/v1.8.x2"] {
            assert!(
                matches!(parse_geth_version(raw), Err(NodeError::MalformedVersion(_))),
                "{raw} should be malformed"
            );
        }
        assert_eq!(
            parse_geth_version("Geth/v1.9.0-unstable").unwrap(),
            Version::new(1, 9, 0)
        );
    }

    #[test]
    fn test_version_bounds_are_inclusive() {
        assert!(check_version(Version::new(1, 7, 2)).is_ok());
        assert!(check_version(Version::new(1, 9, 999)).is_ok());
        assert!(check_version(Version::new(1, 7, 1)).is_err());
        assert!(check_version(Version::new(1, 10, 0)).is_err());
    }

    #[test]
    fn test_genesis_mismatch() {
        let chain = Chain::rinkeby("http://localhost:8545");
        assert!(check_genesis(&chain, RINKEBY_GENESIS, RINKEBY_GENESIS).is_ok());

        let err = check_genesis(&chain, RINKEBY_GENESIS, MAINNET_GENESIS).unwrap_err();
        assert!(err.to_string().starts_with("invalid genesis block for rinkeby"));
    }

    #[test]
    fn test_mainnet_genesis() {
        let chain = Chain::mainnet("http://localhost:8545");
        assert_eq!(chain.chain_id(), Some(1));

        let expected = chain.genesis_hash().unwrap();
        assert_eq!(expected, MAINNET_GENESIS);
        assert!(check_genesis(&chain, expected, MAINNET_GENESIS).is_ok());
        assert!(matches!(
            check_genesis(&chain, expected, RINKEBY_GENESIS),
            Err(NodeError::GenesisMismatch { ref chain, .. }) if chain == "mainnet"
        ));
    }
}
