pub mod aggregate;
pub mod balance;
pub mod conversion;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{ChainClient, ChainError};
use crate::config::GasConfig;
use crate::contracts::{ContractCall, EncodeError, TokenContracts};
use crate::model::{Balance, Payment};
use crate::tx::{ContractTx, NonceSequencer, SignedTransaction, TransactionFactory};

pub use aggregate::{aggregate, batch_gas, total_value};
pub use balance::BalanceAggregator;
pub use conversion::{ConversionError, ConversionState, ConversionStep, DepositConverter};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no payments to batch")]
    NoPayments,

    #[error("payment total overflows uint256")]
    TotalOverflow,

    #[error("conversion step failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("encoding batchTransfer: {0}")]
    Encode(#[from] EncodeError),

    #[error("signing batch transaction: {0}")]
    Signing(#[from] alloy::signers::Error),

    #[error("reading nonce: {0}")]
    Chain(#[from] ChainError),
}

/// Pays many payees from the wrapped token, converting legacy tokens
/// first when the wrapped balance does not cover a round.
///
/// One batcher serves any number of accounts, but rounds for the same
/// account must not overlap: `batch_transfer` takes `&mut self`, so share a
/// batcher across tasks only behind a lock held for the whole round.
pub struct TokenBatcher<C: ?Sized> {
    client: Arc<C>,
    balances: BalanceAggregator<C>,
    converter: DepositConverter<C>,
    factory: TransactionFactory,
    gas: GasConfig,
}

impl<C: ChainClient + ?Sized> TokenBatcher<C> {
    pub fn new(client: Arc<C>, contracts: TokenContracts, chain_id: u64, gas: GasConfig) -> Self {
        let balances = BalanceAggregator::new(Arc::clone(&client), contracts);
        TokenBatcher {
            converter: DepositConverter::new(balances.clone(), chain_id, gas),
            factory: TransactionFactory::new(chain_id, gas.gas_price),
            client,
            balances,
            gas,
        }
    }

    pub fn balances(&self) -> &BalanceAggregator<C> {
        &self.balances
    }

    pub fn converter(&self) -> &DepositConverter<C> {
        &self.converter
    }

    /// Total of legacy and wrapped balances, `None` if either is unknown.
    pub async fn get_balance(&self, owner: Address) -> Result<Balance, EncodeError> {
        self.balances.get_balance(owner).await
    }

    /// Advance the signer's conversion by one step, regardless of balances.
    pub async fn convert(
        &mut self,
        signer: &PrivateKeySigner,
    ) -> Result<ConversionStep, ConversionError> {
        self.converter.step(signer).await
    }

    /// Build one signed `batchTransfer` paying every payment in `payments`.
    ///
    /// Returns `Ok(None)` when the wrapped balance is unknown or too low:
    /// the conversion state machine has then been advanced by one step and
    /// the round should be retried once new chain state is observed.
    /// The returned transaction is not broadcast.
    pub async fn batch_transfer(
        &mut self,
        signer: &PrivateKeySigner,
        payments: &[Payment],
        closure_time: u64,
    ) -> Result<Option<SignedTransaction>, BatchError> {
        if payments.is_empty() {
            return Err(BatchError::NoPayments);
        }
        let total = total_value(payments).ok_or(BatchError::TotalOverflow)?;
        let owner = signer.address();

        let wrapped = self.balances.wrapped_balance(owner).await?;
        if !covers(wrapped, total) {
            match wrapped {
                Some(balance) => info!(%owner, %balance, %total, "wrapped balance too low"),
                None => warn!(%owner, %total, "wrapped balance unavailable"),
            }
            let step = self.converter.step(signer).await?;
            info!(%owner, ?step, "conversion advanced, no payment this round");
            return Ok(None);
        }

        let aggregated = aggregate(payments).ok_or(BatchError::TotalOverflow)?;
        let input = self.balances.contracts().wrapped.encode(&ContractCall::BatchTransfer {
            payments: &aggregated,
            closure_time,
        })?;
        let gas_limit = batch_gas(&self.gas, aggregated.len());

        let nonce = NonceSequencer::new(self.client.as_ref(), owner)
            .next_nonce()
            .await?;
        let tx = self.factory.sign(
            signer,
            nonce,
            ContractTx {
                to: self.balances.contracts().wrapped.address,
                gas_limit,
                input,
            },
        )?;

        info!(
            %owner,
            payments = payments.len(),
            payees = aggregated.len(),
            %total,
            nonce,
            gas_limit,
            tx_hash = %tx.hash(),
            "built batch transfer"
        );
        Ok(Some(tx))
    }
}

fn covers(balance: Balance, total: U256) -> bool {
    balance.is_some_and(|b| b >= total)
}
