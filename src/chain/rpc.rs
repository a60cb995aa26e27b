use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tracing::debug;

use super::{ChainClient, ChainError};
use crate::tx::SignedTransaction;

/// [`ChainClient`] backed by an alloy JSON-RPC provider.
#[derive(Debug, Clone)]
pub struct RpcChainClient<P> {
    provider: P,
}

impl<P: Provider> RpcChainClient<P> {
    pub fn new(provider: P) -> Self {
        RpcChainClient { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Hash of block 0, if the node has it.
    pub async fn genesis_hash(&self) -> Result<Option<B256>, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(0))
            .await?;
        Ok(block.map(|b| b.header.hash))
    }

    /// Raw `web3_clientVersion` string, e.g. `Geth/v1.8.27-stable/linux-amd64/go1.12`.
    pub async fn client_version(&self) -> Result<String, ChainError> {
        Ok(self.provider.get_client_version().await?)
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }
}

/// Connect an HTTP provider to `rpc_url`.
pub fn connect_http(rpc_url: &str) -> Result<RpcChainClient<impl Provider + Clone>, ChainError> {
    let provider = ProviderBuilder::new().connect_http(rpc_url.parse().map_err(|e| {
        ChainError::InvalidRpcUrl {
            url: rpc_url.to_string(),
            reason: format!("{e}"),
        }
    })?);
    Ok(RpcChainClient::new(provider))
}

#[async_trait]
impl<P: Provider + Send + Sync> ChainClient for RpcChainClient<P> {
    async fn call(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<Option<Bytes>, ChainError> {
        let request = TransactionRequest::default().from(from).to(to).input(data.into());
        let result = self
            .provider
            .call(request)
            .block(BlockNumberOrTag::Pending.into())
            .await?;
        Ok(Some(result))
    }

    async fn send(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError> {
        let pending = self.provider.send_raw_transaction(&tx.raw()).await?;
        let hash = *pending.tx_hash();
        debug!(%hash, nonce = tx.nonce(), "broadcast transaction");
        Ok(hash)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .block_id(BlockNumberOrTag::Pending.into())
            .await?)
    }
}
