use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A balance that could not be determined this round is `None`, never zero.
pub type Balance = Option<U256>;

/// A single payment request handed in by the caller.
///
/// Several payments may target the same payee within one batching round;
/// they are collapsed by [`crate::token::aggregate`] before hitting the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payee: Address,
    pub value: U256,
}

impl Payment {
    pub fn new(payee: Address, value: U256) -> Self {
        Payment { payee, value }
    }
}

/// One entry per distinct payee in a batching round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPayment {
    pub payee: Address,
    pub total_value: U256,
}
