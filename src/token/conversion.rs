//! Legacy → wrapped token conversion through a personal deposit address.
//!
//! Per source address the conversion moves through:
//!
//! - **NoDeposit**: no deposit address on-chain, nothing submitted locally.
//!   Submit `createPersonalDepositAddress` and remember it.
//! - **AwaitingMint**: creation submitted but not yet visible on-chain.
//!   Do nothing until it is.
//! - **DepositReady**: the deposit address exists. Transfer the whole
//!   legacy balance to it, then `processDeposit`.
//!
//! Each call to [`DepositConverter::step`] advances at most one of these.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, TxHash, U256};
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;
use tracing::{info, warn};

use super::balance::BalanceAggregator;
use crate::chain::{ChainClient, ChainError};
use crate::config::GasConfig;
use crate::contracts::{ContractCall, EncodeError, TokenContract};
use crate::tx::{ContractTx, NonceSequencer, TransactionFactory};

// ── Types ────────────────────────────────────────────────────────────

/// On-chain conversion state of one source address, as seen this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    NoDeposit,
    AwaitingMint,
    DepositReady { deposit_address: Address },
}

/// Conversion-related transactions the state machine may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionAction {
    ReadDepositAddress,
    CreateDepositAddress,
    Transfer,
    ProcessDeposit,
}

impl std::fmt::Display for ConversionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversionAction::ReadDepositAddress => "getPersonalDepositAddress",
            ConversionAction::CreateDepositAddress => "createPersonalDepositAddress",
            ConversionAction::Transfer => "transfer",
            ConversionAction::ProcessDeposit => "processDeposit",
        };
        f.write_str(name)
    }
}

/// What one [`DepositConverter::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStep {
    /// Creation of the deposit address was submitted.
    DepositAddressRequested { tx_hash: TxHash },
    /// Creation is still being mined; nothing was sent.
    AwaitingDepositAddress,
    /// The legacy balance was sent to the deposit address and processed.
    Deposited {
        deposit_address: Address,
        amount: U256,
        transfer_tx: TxHash,
        process_tx: TxHash,
    },
    /// Tokens already sitting at the deposit address were processed.
    DepositProcessed {
        deposit_address: Address,
        amount: U256,
        process_tx: TxHash,
    },
    /// The deposit address exists but there is no legacy balance to move.
    NothingToConvert,
    /// The legacy balance could not be read; nothing was sent.
    LegacyBalanceUnavailable,
    /// The owner holds no legacy tokens and the balance parked at the
    /// deposit address could not be read; nothing was sent.
    DepositBalanceUnavailable { deposit_address: Address },
}

impl ConversionStep {
    /// Number of transactions this step put on the wire.
    pub fn transactions(&self) -> usize {
        match self {
            ConversionStep::DepositAddressRequested { .. } => 1,
            ConversionStep::Deposited { .. } => 2,
            ConversionStep::DepositProcessed { .. } => 1,
            ConversionStep::AwaitingDepositAddress
            | ConversionStep::NothingToConvert
            | ConversionStep::LegacyBalanceUnavailable
            | ConversionStep::DepositBalanceUnavailable { .. } => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{action} failed: {source}")]
    Chain {
        action: ConversionAction,
        #[source]
        source: ChainError,
    },

    #[error("encoding {action}: {source}")]
    Encode {
        action: ConversionAction,
        #[source]
        source: EncodeError,
    },

    #[error("signing {action}: {source}")]
    Signing {
        action: ConversionAction,
        #[source]
        source: alloy::signers::Error,
    },

    #[error("deposit address of {owner} could not be read")]
    DepositAddressUnavailable { owner: Address },

    #[error("deposit address result is {len} bytes, expected at most 32")]
    MalformedDepositAddress { len: usize },
}

impl ConversionError {
    /// The step that failed, where one was attempted.
    pub fn action(&self) -> Option<ConversionAction> {
        match self {
            ConversionError::Chain { action, .. }
            | ConversionError::Encode { action, .. }
            | ConversionError::Signing { action, .. } => Some(*action),
            ConversionError::DepositAddressUnavailable { .. }
            | ConversionError::MalformedDepositAddress { .. } => {
                Some(ConversionAction::ReadDepositAddress)
            }
        }
    }
}

// ── Deposit address decoding ─────────────────────────────────────────

/// Decode a `getPersonalDepositAddress` result. All-zero (or empty) means
/// no deposit address has been mined yet.
pub fn decode_deposit_address(raw: &Bytes) -> Result<Option<Address>, ConversionError> {
    if raw.len() > 32 {
        return Err(ConversionError::MalformedDepositAddress { len: raw.len() });
    }
    let word = B256::left_padding_from(raw);
    if word.is_zero() {
        return Ok(None);
    }
    Ok(Some(Address::from_word(word)))
}

// ── State machine ────────────────────────────────────────────────────

/// Drives legacy-token holders through the deposit conversion.
///
/// Owns the process-local record of which addresses have a creation
/// transaction in flight. `step` takes `&mut self`: rounds for one
/// converter are serialized by construction, and callers sharing a
/// converter across tasks must hold it behind a lock for a whole round.
pub struct DepositConverter<C: ?Sized> {
    client: Arc<C>,
    balances: BalanceAggregator<C>,
    factory: TransactionFactory,
    gas: GasConfig,
    pending_creation: HashSet<Address>,
}

impl<C: ChainClient + ?Sized> DepositConverter<C> {
    pub fn new(balances: BalanceAggregator<C>, chain_id: u64, gas: GasConfig) -> Self {
        DepositConverter {
            client: Arc::clone(balances.client()),
            balances,
            factory: TransactionFactory::new(chain_id, gas.gas_price),
            gas,
            pending_creation: HashSet::new(),
        }
    }

    /// Whether a creation transaction for `owner` is believed to be in flight.
    pub fn is_pending(&self, owner: Address) -> bool {
        self.pending_creation.contains(&owner)
    }

    fn wrapped(&self) -> &TokenContract {
        &self.balances.contracts().wrapped
    }

    fn legacy(&self) -> &TokenContract {
        &self.balances.contracts().legacy
    }

    /// Read the deposit address of `owner` from the wrapped token.
    pub async fn deposit_address(
        &self,
        owner: Address,
    ) -> Result<Option<Address>, ConversionError> {
        let action = ConversionAction::ReadDepositAddress;
        let data = self
            .wrapped()
            .encode(&ContractCall::GetPersonalDepositAddress { owner })
            .map_err(|source| ConversionError::Encode { action, source })?;
        let raw = self
            .client
            .call(owner, self.wrapped().address, data)
            .await
            .map_err(|source| ConversionError::Chain { action, source })?
            .ok_or(ConversionError::DepositAddressUnavailable { owner })?;
        decode_deposit_address(&raw)
    }

    /// Classify `owner` from its on-chain deposit address and local state.
    pub async fn state(&self, owner: Address) -> Result<ConversionState, ConversionError> {
        let deposit_address = self.deposit_address(owner).await?;
        Ok(self.classify(owner, deposit_address))
    }

    fn classify(&self, owner: Address, deposit_address: Option<Address>) -> ConversionState {
        match deposit_address {
            Some(deposit_address) => ConversionState::DepositReady { deposit_address },
            None if self.is_pending(owner) => ConversionState::AwaitingMint,
            None => ConversionState::NoDeposit,
        }
    }

    /// Advance the conversion of the signer's account by one step.
    pub async fn step(
        &mut self,
        signer: &PrivateKeySigner,
    ) -> Result<ConversionStep, ConversionError> {
        let owner = signer.address();
        match self.state(owner).await? {
            ConversionState::NoDeposit => self.create_deposit_address(signer).await,
            ConversionState::AwaitingMint => {
                info!(%owner, "deposit address creation not mined yet, waiting");
                Ok(ConversionStep::AwaitingDepositAddress)
            }
            ConversionState::DepositReady { deposit_address } => {
                if self.pending_creation.remove(&owner) {
                    info!(%owner, %deposit_address, "deposit address mined");
                }
                self.deposit(signer, deposit_address).await
            }
        }
    }

    async fn create_deposit_address(
        &mut self,
        signer: &PrivateKeySigner,
    ) -> Result<ConversionStep, ConversionError> {
        let owner = signer.address();
        let mut nonces = NonceSequencer::new(self.client.as_ref(), owner);
        let tx_hash = self
            .submit(
                signer,
                &mut nonces,
                ConversionAction::CreateDepositAddress,
                ContractCall::CreatePersonalDepositAddress,
            )
            .await?;
        self.pending_creation.insert(owner);
        Ok(ConversionStep::DepositAddressRequested { tx_hash })
    }

    async fn deposit(
        &self,
        signer: &PrivateKeySigner,
        deposit_address: Address,
    ) -> Result<ConversionStep, ConversionError> {
        let owner = signer.address();
        let encode = |source: EncodeError| ConversionError::Encode {
            action: ConversionAction::Transfer,
            source,
        };

        // Must be read after the balance check that led here, never reused
        // from an earlier round.
        let Some(amount) = self.balances.legacy_balance(owner).await.map_err(encode)? else {
            warn!(%owner, "legacy balance unavailable, postponing deposit");
            return Ok(ConversionStep::LegacyBalanceUnavailable);
        };

        let mut nonces = NonceSequencer::new(self.client.as_ref(), owner);

        if amount.is_zero() {
            let Some(parked) = self
                .balances
                .legacy_balance(deposit_address)
                .await
                .map_err(encode)?
            else {
                warn!(%owner, %deposit_address, "deposit address balance unavailable, postponing");
                return Ok(ConversionStep::DepositBalanceUnavailable { deposit_address });
            };
            if parked.is_zero() {
                info!(%owner, %deposit_address, "no legacy tokens to convert");
                return Ok(ConversionStep::NothingToConvert);
            }
            info!(%owner, %deposit_address, %parked, "processing tokens already deposited");
            let process_tx = self
                .submit(
                    signer,
                    &mut nonces,
                    ConversionAction::ProcessDeposit,
                    ContractCall::ProcessDeposit,
                )
                .await?;
            return Ok(ConversionStep::DepositProcessed {
                deposit_address,
                amount: parked,
                process_tx,
            });
        }

        info!(%owner, %deposit_address, %amount, "converting legacy balance");
        let transfer_tx = self
            .submit(
                signer,
                &mut nonces,
                ConversionAction::Transfer,
                ContractCall::Transfer {
                    to: deposit_address,
                    value: amount,
                },
            )
            .await?;
        let process_tx = self
            .submit(
                signer,
                &mut nonces,
                ConversionAction::ProcessDeposit,
                ContractCall::ProcessDeposit,
            )
            .await?;

        Ok(ConversionStep::Deposited {
            deposit_address,
            amount,
            transfer_tx,
            process_tx,
        })
    }

    /// Encode, sign with a fresh nonce, and broadcast one conversion call.
    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        nonces: &mut NonceSequencer<'_, C>,
        action: ConversionAction,
        call: ContractCall<'_>,
    ) -> Result<TxHash, ConversionError> {
        let (contract, gas_limit) = match action {
            ConversionAction::Transfer => (self.legacy(), self.gas.transfer),
            ConversionAction::CreateDepositAddress => (self.wrapped(), self.gas.create_deposit),
            ConversionAction::ProcessDeposit | ConversionAction::ReadDepositAddress => {
                (self.wrapped(), self.gas.process_deposit)
            }
        };
        let input = contract
            .encode(&call)
            .map_err(|source| ConversionError::Encode { action, source })?;
        let nonce = nonces
            .next_nonce()
            .await
            .map_err(|source| ConversionError::Chain { action, source })?;
        let tx = self
            .factory
            .sign(
                signer,
                nonce,
                ContractTx {
                    to: contract.address,
                    gas_limit,
                    input,
                },
            )
            .map_err(|source| ConversionError::Signing { action, source })?;
        let tx_hash = self
            .client
            .send(&tx)
            .await
            .map_err(|source| ConversionError::Chain { action, source })?;
        info!(%action, nonce, %tx_hash, "submitted conversion transaction");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn test_decode_zero_deposit_address() {
        assert_eq!(decode_deposit_address(&Bytes::from(vec![0u8; 32])).unwrap(), None);
        assert_eq!(decode_deposit_address(&Bytes::new()).unwrap(), None);
    }

    #[test]
    fn test_decode_takes_low_twenty_bytes() {
        let mut word = [0xffu8; 32];
        let deposit = address!("00000000000000000000000000000000000000d1");
        word[12..].copy_from_slice(deposit.as_slice());

        let decoded = decode_deposit_address(&Bytes::from(word.to_vec())).unwrap();
        assert_eq!(decoded, Some(deposit));
    }

    #[test]
    fn test_decode_rejects_oversized_result() {
        let err = decode_deposit_address(&Bytes::from(vec![1u8; 33])).unwrap_err();
        assert!(matches!(err, ConversionError::MalformedDepositAddress { len: 33 }));
        assert_eq!(err.action(), Some(ConversionAction::ReadDepositAddress));
    }

    #[test]
    fn test_step_transaction_counts() {
        assert_eq!(ConversionStep::AwaitingDepositAddress.transactions(), 0);
        assert_eq!(
            ConversionStep::DepositAddressRequested {
                tx_hash: TxHash::ZERO
            }
            .transactions(),
            1
        );
    }
}
