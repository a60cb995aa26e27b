use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::contracts::{ContractCall, EncodeError, TokenContract, TokenContracts};
use crate::model::Balance;

// ── Chain balance reader ────────────────────────────────────────────

/// `balanceOf(owner)` on `token`, against pending state.
///
/// A read that errors or comes back without data yields `None`. An empty
/// result (`0x`) is zero.
pub async fn read_balance<C: ChainClient + ?Sized>(
    client: &C,
    token: &TokenContract,
    owner: Address,
) -> Result<Balance, EncodeError> {
    let data = token.encode(&ContractCall::BalanceOf { owner })?;
    match client.call(owner, token.address, data).await {
        Ok(Some(raw)) => Ok(decode_balance(&raw, token.address)),
        Ok(None) => {
            debug!(token = %token.address, %owner, "balance read returned no data");
            Ok(None)
        }
        Err(e) => {
            warn!(token = %token.address, %owner, error = %e, "balance read failed");
            Ok(None)
        }
    }
}

fn decode_balance(raw: &Bytes, token: Address) -> Balance {
    if raw.is_empty() {
        return Some(U256::ZERO);
    }
    let balance = U256::try_from_be_slice(raw);
    if balance.is_none() {
        warn!(%token, len = raw.len(), "balance result wider than uint256");
    }
    balance
}

// ── Balance aggregator ──────────────────────────────────────────────

/// Combines the legacy and wrapped token balances of an account.
pub struct BalanceAggregator<C: ?Sized> {
    client: Arc<C>,
    contracts: TokenContracts,
}

impl<C: ?Sized> Clone for BalanceAggregator<C> {
    fn clone(&self) -> Self {
        BalanceAggregator {
            client: Arc::clone(&self.client),
            contracts: self.contracts.clone(),
        }
    }
}

impl<C: ChainClient + ?Sized> BalanceAggregator<C> {
    pub fn new(client: Arc<C>, contracts: TokenContracts) -> Self {
        BalanceAggregator { client, contracts }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn contracts(&self) -> &TokenContracts {
        &self.contracts
    }

    pub async fn legacy_balance(&self, owner: Address) -> Result<Balance, EncodeError> {
        read_balance(self.client.as_ref(), &self.contracts.legacy, owner).await
    }

    pub async fn wrapped_balance(&self, owner: Address) -> Result<Balance, EncodeError> {
        read_balance(self.client.as_ref(), &self.contracts.wrapped, owner).await
    }

    /// Total spendable balance across both tokens.
    ///
    /// `None` if either side is unknown; a missing side is never assumed
    /// to be zero.
    pub async fn get_balance(&self, owner: Address) -> Result<Balance, EncodeError> {
        let legacy = self.legacy_balance(owner).await?;
        let wrapped = self.wrapped_balance(owner).await?;
        Ok(combine(legacy, wrapped))
    }
}

fn combine(legacy: Balance, wrapped: Balance) -> Balance {
    legacy?.checked_add(wrapped?)
}
