//! Transaction construction, signing and nonce sequencing.
//!
//! Every transaction this crate emits is a legacy (pre-1559) transaction
//! with an EIP-155 chain id and `value = 0`: all value moves through
//! token contract calls.

use alloy::consensus::{SignableTransaction, Signed, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, SignatureError, TxHash, TxKind, U256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use tracing::warn;

use crate::chain::{ChainClient, ChainError};

// ── Signed transaction ──────────────────────────────────────────────

/// A signed, ready-to-broadcast transaction.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    inner: Signed<TxLegacy>,
}

impl SignedTransaction {
    pub fn nonce(&self) -> u64 {
        self.inner.tx().nonce
    }

    /// Target contract. Contract creation is never emitted, so this is
    /// `None` only for transactions not built by this crate.
    pub fn to(&self) -> Option<Address> {
        self.inner.tx().to.to().copied()
    }

    pub fn value(&self) -> U256 {
        self.inner.tx().value
    }

    pub fn gas_limit(&self) -> u64 {
        self.inner.tx().gas_limit
    }

    pub fn gas_price(&self) -> u128 {
        self.inner.tx().gas_price
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.inner.tx().chain_id
    }

    pub fn input(&self) -> &Bytes {
        &self.inner.tx().input
    }

    pub fn hash(&self) -> TxHash {
        *self.inner.hash()
    }

    /// RLP encoding suitable for `eth_sendRawTransaction`.
    pub fn raw(&self) -> Bytes {
        TxEnvelope::from(self.inner.clone()).encoded_2718().into()
    }

    /// Address that signed this transaction.
    pub fn recover_sender(&self) -> Result<Address, SignatureError> {
        self.inner
            .signature()
            .recover_address_from_prehash(&self.inner.tx().signature_hash())
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Unsigned contract call: everything except nonce and signature.
#[derive(Debug, Clone)]
pub struct ContractTx {
    pub to: Address,
    pub gas_limit: u64,
    pub input: Bytes,
}

/// Signs contract calls for one chain at a fixed gas price.
#[derive(Debug, Clone, Copy)]
pub struct TransactionFactory {
    pub chain_id: u64,
    pub gas_price: u128,
}

impl TransactionFactory {
    pub fn new(chain_id: u64, gas_price: u128) -> Self {
        TransactionFactory {
            chain_id,
            gas_price,
        }
    }

    pub fn sign(
        &self,
        signer: &PrivateKeySigner,
        nonce: u64,
        call: ContractTx,
    ) -> Result<SignedTransaction, alloy::signers::Error> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.gas_price,
            gas_limit: call.gas_limit,
            to: TxKind::Call(call.to),
            value: U256::ZERO,
            input: call.input,
        };
        let signature = signer.sign_hash_sync(&tx.signature_hash())?;
        Ok(SignedTransaction {
            inner: tx.into_signed(signature),
        })
    }
}

// ── Nonce sequencing ────────────────────────────────────────────────

/// Hands out nonces for one account within one round.
///
/// Each nonce is read from the node's pending transaction count right
/// before signing. Within a round the sequence never repeats or goes
/// backwards, even if the node has not yet seen the previous submission.
pub struct NonceSequencer<'a, C: ?Sized> {
    client: &'a C,
    address: Address,
    last: Option<u64>,
}

impl<'a, C: ChainClient + ?Sized> NonceSequencer<'a, C> {
    pub fn new(client: &'a C, address: Address) -> Self {
        NonceSequencer {
            client,
            address,
            last: None,
        }
    }

    pub async fn next_nonce(&mut self) -> Result<u64, ChainError> {
        let pending = self.client.get_transaction_count(self.address).await?;
        let nonce = match self.last {
            Some(last) if pending <= last => {
                warn!(
                    address = %self.address,
                    pending,
                    last,
                    "node has not seen previous submission, advancing nonce locally"
                );
                last + 1
            }
            _ => pending,
        };
        self.last = Some(nonce);
        Ok(nonce)
    }
}
