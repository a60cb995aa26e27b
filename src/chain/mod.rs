//! The chain-client collaborator.
//!
//! The token engine never talks to a node directly. It goes through
//! [`ChainClient`], which production backs with an alloy provider
//! ([`rpc::RpcChainClient`]) and tests back with an in-memory ledger.

pub mod node;
pub mod rpc;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use thiserror::Error;

use crate::tx::SignedTransaction;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] RpcError<TransportErrorKind>),

    #[error("transaction {tx_hash} rejected: {reason}")]
    Rejected { tx_hash: TxHash, reason: String },

    #[error("invalid RPC URL `{url}`: {reason}")]
    InvalidRpcUrl { url: String, reason: String },

    #[error("call to {contract} failed: {reason}")]
    CallFailed { contract: Address, reason: String },
}

/// Minimal node surface the token engine depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only contract call against the `pending` block.
    ///
    /// `Ok(None)` means the node answered without data.
    async fn call(&self, from: Address, to: Address, data: Bytes)
    -> Result<Option<Bytes>, ChainError>;

    /// Broadcast a signed transaction.
    async fn send(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError>;

    /// Pending transaction count of `address`, i.e. its next nonce.
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for std::sync::Arc<T> {
    async fn call(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<Option<Bytes>, ChainError> {
        (**self).call(from, to, data).await
    }

    async fn send(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError> {
        (**self).send(tx).await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        (**self).get_transaction_count(address).await
    }
}
