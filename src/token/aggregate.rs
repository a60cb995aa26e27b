use std::collections::HashMap;

use alloy::primitives::{Address, U256};

use crate::config::GasConfig;
use crate::model::{AggregatedPayment, Payment};

/// Sum of all payment values, `None` on uint256 overflow.
pub fn total_value(payments: &[Payment]) -> Option<U256> {
    payments
        .iter()
        .try_fold(U256::ZERO, |acc, p| acc.checked_add(p.value))
}

/// Collapse payments into one entry per payee, in first-seen payee order.
///
/// `None` if any payee's total overflows uint256.
pub fn aggregate(payments: &[Payment]) -> Option<Vec<AggregatedPayment>> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut aggregated: Vec<AggregatedPayment> = Vec::new();

    for payment in payments {
        match index.get(&payment.payee) {
            Some(&i) => {
                let entry = &mut aggregated[i];
                entry.total_value = entry.total_value.checked_add(payment.value)?;
            }
            None => {
                index.insert(payment.payee, aggregated.len());
                aggregated.push(AggregatedPayment {
                    payee: payment.payee,
                    total_value: payment.value,
                });
            }
        }
    }

    Some(aggregated)
}

/// Gas limit of a `batchTransfer` carrying `entries` distinct payees.
pub fn batch_gas(gas: &GasConfig, entries: usize) -> u64 {
    gas.batch_base + gas.per_payment * entries as u64
}
