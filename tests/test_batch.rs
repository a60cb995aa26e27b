
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolInterface;

use gntw_pay::chain::ChainClient;
use gntw_pay::config::GasConfig;
use gntw_pay::contracts::IGolemNetworkTokenWrapped::IGolemNetworkTokenWrappedCalls;
use gntw_pay::contracts::{
    CallEncoder, ContractCall, EncodeError, LegacyTokenAbi, TokenContract, TokenContracts,
    WrappedTokenAbi, unpack_payment,
};
use gntw_pay::model::{AggregatedPayment, Payment};
use gntw_pay::token::{BatchError, TokenBatcher};
use gntw_pay::tx::SignedTransaction;

use mock_chain::*;

// ── Helpers ──────────────────────────────────────────────────────────

fn pay(payee: Address, value: u64) -> Payment {
    Payment::new(payee, U256::from(value))
}

fn entry(payee: Address, value: u64) -> AggregatedPayment {
    AggregatedPayment {
        payee,
        total_value: U256::from(value),
    }
}

/// Decode a built `batchTransfer` back into its entries and closure time.
fn decode_batch(tx: &SignedTransaction) -> (Vec<AggregatedPayment>, u64) {
    match IGolemNetworkTokenWrappedCalls::abi_decode(tx.input()).unwrap() {
        IGolemNetworkTokenWrappedCalls::batchTransfer(c) => (
            c.payments.iter().map(unpack_payment).collect(),
            c.closureTime,
        ),
        _ => panic!("expected batchTransfer calldata"),
    }
}

// ── Enough wrapped balance ───────────────────────────────────────────

#[tokio::test]
async fn test_batch_with_enough_wrapped_balance() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), empty(), word(10));

    let payments = [pay(payee(1), 1), pay(payee(2), 2), pay(payee(3), 3)];
    let tx = batcher
        .batch_transfer(&signer, &payments, 1_700_000_000)
        .await
        .unwrap()
        .expect("wrapped balance covers the round");

    let gas = GasConfig::default();
    assert_eq!(tx.to(), Some(WRAPPED_TOKEN));
    assert_eq!(tx.value(), U256::ZERO);
    assert_eq!(tx.nonce(), 0);
    assert_eq!(tx.gas_price(), gas.gas_price);
    assert_eq!(tx.gas_limit(), gas.batch_base + 3 * gas.per_payment);
    assert_eq!(tx.chain_id(), Some(CHAIN_ID));
    assert_eq!(tx.recover_sender().unwrap(), signer.address());

    let (entries, closure_time) = decode_batch(&tx);
    assert_eq!(
        entries,
        vec![entry(payee(1), 1), entry(payee(2), 2), entry(payee(3), 3)]
    );
    assert_eq!(closure_time, 1_700_000_000);

    // Built, not broadcast.
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_batch_exact_balance_is_enough() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), word(1000), word(6));

    let payments = [pay(payee(1), 1), pay(payee(2), 5)];
    let tx = batcher.batch_transfer(&signer, &payments, 0).await.unwrap();
    assert!(tx.is_some());
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_batch_aggregates_payees() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), empty(), word(21));

    let (a, b, c) = (payee(0xa), payee(0xb), payee(0xc));
    let payments = [
        pay(a, 1),
        pay(b, 2),
        pay(b, 3),
        pay(c, 4),
        pay(c, 5),
        pay(c, 6),
    ];
    let tx = batcher
        .batch_transfer(&signer, &payments, 0)
        .await
        .unwrap()
        .unwrap();

    let gas = GasConfig::default();
    assert_eq!(tx.gas_limit(), gas.batch_base + 3 * gas.per_payment);
    let (entries, _) = decode_batch(&tx);
    assert_eq!(entries, vec![entry(a, 1), entry(b, 5), entry(c, 15)]);
}

#[tokio::test]
async fn test_batch_nonce_follows_pending_count() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), empty(), word(10));
    chain.with(|l| l.frozen_nonce = Some(12));

    let tx = batcher
        .batch_transfer(&signer, &[pay(payee(1), 1)], 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.nonce(), 12);
}

// ── Conversion fallback ──────────────────────────────────────────────

#[tokio::test]
async fn test_batch_short_on_wrapped_starts_conversion() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), word(100), word(5));

    let payments = [pay(payee(1), 3), pay(payee(2), 3)];
    let tx = batcher.batch_transfer(&signer, &payments, 0).await.unwrap();

    assert!(tx.is_none());
    assert_eq!(chain.sent_calls(), vec![SentCall::CreatePersonalDepositAddress]);
    assert!(batcher.converter().is_pending(signer.address()));
}

#[tokio::test]
async fn test_batch_unknown_wrapped_balance_starts_conversion() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), word(100), None);

    let tx = batcher
        .batch_transfer(&signer, &[pay(payee(1), 1)], 0)
        .await
        .unwrap();

    assert!(tx.is_none());
    assert_eq!(chain.sent_calls(), vec![SentCall::CreatePersonalDepositAddress]);
}

#[tokio::test]
async fn test_batch_migrates_legacy_tokens_over_rounds() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    let owner = signer.address();
    let deposit = payee(0xd0);
    chain.set_balances(owner, word(100), empty());
    let payments = [pay(payee(1), 10), pay(payee(2), 20)];

    // Round 1: deposit address requested.
    assert!(batcher.batch_transfer(&signer, &payments, 0).await.unwrap().is_none());
    assert_eq!(chain.sent().len(), 1);

    // Round 2: not mined yet.
    assert!(batcher.batch_transfer(&signer, &payments, 0).await.unwrap().is_none());
    assert_eq!(chain.sent().len(), 1);

    // Round 3: deposit address mined, legacy balance moved and processed.
    chain.mine_deposit_address(owner, deposit);
    assert!(batcher.batch_transfer(&signer, &payments, 0).await.unwrap().is_none());
    assert_eq!(
        chain.sent_calls(),
        vec![
            SentCall::CreatePersonalDepositAddress,
            SentCall::Transfer {
                to: deposit,
                value: U256::from(100)
            },
            SentCall::ProcessDeposit,
        ]
    );

    // Round 4: wrapped tokens minted, the batch goes through.
    chain.set_balances(owner, empty(), word(100));
    let tx = batcher
        .batch_transfer(&signer, &payments, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.nonce(), 3);

    chain.send(&tx).await.unwrap();
    assert_eq!(
        chain.sent_calls().last(),
        Some(&SentCall::BatchTransfer {
            payments: vec![entry(payee(1), 10), entry(payee(2), 20)],
            closure_time: 0,
        })
    );
}

// ── Rejected inputs ──────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_rejects_empty_payments() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    chain.set_balances(signer.address(), empty(), word(10));

    let err = batcher.batch_transfer(&signer, &[], 0).await.unwrap_err();
    assert!(matches!(err, BatchError::NoPayments));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_batch_rejects_overflowing_total() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();

    let payments = [
        Payment::new(payee(1), U256::MAX),
        Payment::new(payee(2), U256::from(1)),
    ];
    let err = batcher.batch_transfer(&signer, &payments, 0).await.unwrap_err();
    assert!(matches!(err, BatchError::TotalOverflow));
}

#[tokio::test]
async fn test_batch_rejects_payment_wider_than_96_bits() {
    let chain = MockChain::new();
    let mut batcher = batcher(&chain);
    let signer = signer();
    let rich = Some(Bytes::from(U256::MAX.to_be_bytes_vec()));
    chain.set_balances(signer.address(), empty(), rich);

    let payments = [Payment::new(payee(1), U256::from(1u128 << 96))];
    let err = batcher.batch_transfer(&signer, &payments, 0).await.unwrap_err();
    assert!(matches!(
        err,
        BatchError::Encode(EncodeError::PaymentTooLarge { .. })
    ));
    assert!(chain.sent().is_empty());
}

// ── Injected encoder ─────────────────────────────────────────────────

/// Delegates to the real wrapped ABI and counts batch encodings.
#[derive(Default)]
struct CountingEncoder {
    batches: AtomicUsize,
}

impl CallEncoder for CountingEncoder {
    fn encode_call(&self, call: &ContractCall<'_>) -> Result<Bytes, EncodeError> {
        if let ContractCall::BatchTransfer { .. } = call {
            self.batches.fetch_add(1, Ordering::SeqCst);
        }
        WrappedTokenAbi.encode_call(call)
    }
}

#[tokio::test]
async fn test_batch_uses_injected_encoder() {
    let chain = MockChain::new();
    let encoder = Arc::new(CountingEncoder::default());
    let contracts = TokenContracts {
        legacy: TokenContract::new(LEGACY_TOKEN, Arc::new(LegacyTokenAbi)),
        wrapped: TokenContract::new(WRAPPED_TOKEN, encoder.clone()),
    };
    let mut batcher = TokenBatcher::new(
        Arc::clone(&chain),
        contracts,
        CHAIN_ID,
        GasConfig::default(),
    );
    let signer = signer();
    chain.set_balances(signer.address(), empty(), word(10));

    let tx = batcher
        .batch_transfer(&signer, &[pay(payee(1), 1)], 0)
        .await
        .unwrap();

    assert!(tx.is_some());
    assert_eq!(encoder.batches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_legacy_abi_refuses_wrapped_calls() {
    let err = LegacyTokenAbi
        .encode_call(&ContractCall::ProcessDeposit)
        .unwrap_err();
    assert!(matches!(err, EncodeError::UnsupportedCall { .. }));
}
