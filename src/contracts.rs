use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use thiserror::Error;

use crate::model::AggregatedPayment;

// ── Token contract interfaces ──────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    contract IGolemNetworkToken {
        function balanceOf(address _owner) external view returns (uint256);
        function transfer(address _to, uint256 _value) external returns (bool);
    }
}

sol! {
    #[allow(missing_docs)]
    contract IGolemNetworkTokenWrapped {
        function balanceOf(address _owner) external view returns (uint256);
        function getPersonalDepositAddress(address _owner) external view returns (address);
        function createPersonalDepositAddress() external returns (address);
        function processDeposit() external;
        function batchTransfer(bytes32[] payments, uint64 closureTime) external;
    }
}

/// Largest value (exclusive) that fits the 12-byte amount slot of a packed payment.
pub const MAX_PACKED_VALUE: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("`{call}` is not an entry point of the {contract} contract")]
    UnsupportedCall {
        contract: &'static str,
        call: &'static str,
    },

    #[error("payment of {value} to {payee} does not fit in 96 bits")]
    PaymentTooLarge { payee: Address, value: U256 },
}

// ── Calls ──────────────────────────────────────────────────────────

/// Every contract entry point this crate talks to.
#[derive(Debug, Clone, Copy)]
pub enum ContractCall<'a> {
    BalanceOf { owner: Address },
    Transfer { to: Address, value: U256 },
    GetPersonalDepositAddress { owner: Address },
    CreatePersonalDepositAddress,
    ProcessDeposit,
    BatchTransfer {
        payments: &'a [AggregatedPayment],
        closure_time: u64,
    },
}

impl ContractCall<'_> {
    /// Solidity function name.
    pub fn name(&self) -> &'static str {
        match self {
            ContractCall::BalanceOf { .. } => "balanceOf",
            ContractCall::Transfer { .. } => "transfer",
            ContractCall::GetPersonalDepositAddress { .. } => "getPersonalDepositAddress",
            ContractCall::CreatePersonalDepositAddress => "createPersonalDepositAddress",
            ContractCall::ProcessDeposit => "processDeposit",
            ContractCall::BatchTransfer { .. } => "batchTransfer",
        }
    }
}

/// Turns a [`ContractCall`] into calldata for one specific contract.
///
/// Implemented once per contract and injected into the components that
/// build transactions, so tests can substitute their own encoding.
pub trait CallEncoder: Send + Sync {
    fn encode_call(&self, call: &ContractCall<'_>) -> Result<Bytes, EncodeError>;
}

/// ABI of the legacy (non-batchable) token.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyTokenAbi;

impl CallEncoder for LegacyTokenAbi {
    fn encode_call(&self, call: &ContractCall<'_>) -> Result<Bytes, EncodeError> {
        let data = match *call {
            ContractCall::BalanceOf { owner } => {
                IGolemNetworkToken::balanceOfCall { _owner: owner }.abi_encode()
            }
            ContractCall::Transfer { to, value } => IGolemNetworkToken::transferCall {
                _to: to,
                _value: value,
            }
            .abi_encode(),
            other => {
                return Err(EncodeError::UnsupportedCall {
                    contract: "legacy token",
                    call: other.name(),
                });
            }
        };
        Ok(data.into())
    }
}

/// ABI of the wrapped, batchable token.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrappedTokenAbi;

impl CallEncoder for WrappedTokenAbi {
    fn encode_call(&self, call: &ContractCall<'_>) -> Result<Bytes, EncodeError> {
        let data = match *call {
            ContractCall::BalanceOf { owner } => {
                IGolemNetworkTokenWrapped::balanceOfCall { _owner: owner }.abi_encode()
            }
            ContractCall::GetPersonalDepositAddress { owner } => {
                IGolemNetworkTokenWrapped::getPersonalDepositAddressCall { _owner: owner }
                    .abi_encode()
            }
            ContractCall::CreatePersonalDepositAddress => {
                IGolemNetworkTokenWrapped::createPersonalDepositAddressCall {}.abi_encode()
            }
            ContractCall::ProcessDeposit => {
                IGolemNetworkTokenWrapped::processDepositCall {}.abi_encode()
            }
            ContractCall::BatchTransfer {
                payments,
                closure_time,
            } => IGolemNetworkTokenWrapped::batchTransferCall {
                payments: pack_payments(payments)?,
                closureTime: closure_time,
            }
            .abi_encode(),
            ContractCall::Transfer { .. } => {
                return Err(EncodeError::UnsupportedCall {
                    contract: "wrapped token",
                    call: call.name(),
                });
            }
        };
        Ok(data.into())
    }
}

// ── Deployed contracts ─────────────────────────────────────────────

/// A deployed contract: where it lives and how to talk to it.
#[derive(Clone)]
pub struct TokenContract {
    pub address: Address,
    pub abi: Arc<dyn CallEncoder>,
}

impl TokenContract {
    pub fn new(address: Address, abi: Arc<dyn CallEncoder>) -> Self {
        TokenContract { address, abi }
    }

    pub fn encode(&self, call: &ContractCall<'_>) -> Result<Bytes, EncodeError> {
        self.abi.encode_call(call)
    }
}

impl std::fmt::Debug for TokenContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenContract")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// The legacy/wrapped token pair a migration runs between.
#[derive(Debug, Clone)]
pub struct TokenContracts {
    pub legacy: TokenContract,
    pub wrapped: TokenContract,
}

impl TokenContracts {
    /// Contracts at the given addresses, using the real ABIs.
    pub fn new(legacy: Address, wrapped: Address) -> Self {
        TokenContracts {
            legacy: TokenContract::new(legacy, Arc::new(LegacyTokenAbi)),
            wrapped: TokenContract::new(wrapped, Arc::new(WrappedTokenAbi)),
        }
    }
}

// ── Payment packing ────────────────────────────────────────────────

/// Pack one payment as `value (12 bytes, big-endian) ‖ payee (20 bytes)`.
pub fn pack_payment(payment: &AggregatedPayment) -> Result<B256, EncodeError> {
    if payment.total_value >= MAX_PACKED_VALUE {
        return Err(EncodeError::PaymentTooLarge {
            payee: payment.payee,
            value: payment.total_value,
        });
    }
    let value = payment.total_value.to_be_bytes::<32>();
    let mut packed = [0u8; 32];
    packed[..12].copy_from_slice(&value[20..]);
    packed[12..].copy_from_slice(payment.payee.as_slice());
    Ok(B256::from(packed))
}

pub fn pack_payments(payments: &[AggregatedPayment]) -> Result<Vec<B256>, EncodeError> {
    payments.iter().map(pack_payment).collect()
}

/// Inverse of [`pack_payment`].
pub fn unpack_payment(word: &B256) -> AggregatedPayment {
    AggregatedPayment {
        payee: Address::from_slice(&word[12..]),
        total_value: U256::from_be_slice(&word[..12]),
    }
}
