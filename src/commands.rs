use std::path::Path;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::info;

use gntw_pay::chain::ChainClient;
use gntw_pay::chain::node;
use gntw_pay::chain::rpc::connect_http;
use gntw_pay::config::{self, Config};
use gntw_pay::model::Payment;
use gntw_pay::token::TokenBatcher;

pub async fn check_node(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = connect_http(config.chain.rpc_url())?;
    let version = node::ensure_node(&client, &config.chain).await?;
    println!("Node OK: {} (geth {})", config.chain, version);
    Ok(())
}

pub async fn balance(config_path: &Path, address: Option<&str>) -> Result<()> {
    let config = Config::load(config_path)?;
    let owner: Address = match address {
        Some(a) => a.parse().with_context(|| format!("invalid address '{a}'"))?,
        None => config::signer_from_env()?.address(),
    };

    let client = Arc::new(connect_http(config.chain.rpc_url())?);
    let batcher = TokenBatcher::new(
        client,
        config.token_contracts(),
        config.chain_id()?,
        config.gas,
    );
    let balances = batcher.balances();

    println!("Account: {owner}");
    println!("Legacy:  {}", show(balances.legacy_balance(owner).await?));
    println!("Wrapped: {}", show(balances.wrapped_balance(owner).await?));
    println!("Total:   {}", show(balances.get_balance(owner).await?));
    Ok(())
}

pub async fn pay(
    config_path: &Path,
    payments_path: &Path,
    closure_time: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let signer = config::signer_from_env()?;
    let payments = load_payments(payments_path)?;
    let closure_time = closure_time.unwrap_or_else(|| chrono::Utc::now().timestamp() as u64);

    let client = connect_http(config.chain.rpc_url())?;
    node::ensure_node(&client, &config.chain).await?;
    let client = Arc::new(client);

    let mut batcher = TokenBatcher::new(
        Arc::clone(&client),
        config.token_contracts(),
        config.chain_id()?,
        config.gas,
    );

    let Some(tx) = batcher
        .batch_transfer(&signer, &payments, closure_time)
        .await
        .context("batching round")?
    else {
        println!("Insufficient wrapped balance, conversion in progress. Retry later.");
        return Ok(());
    };

    if dry_run {
        println!("[DRY RUN] would broadcast {} (nonce {})", tx.hash(), tx.nonce());
        println!("{}", tx.raw());
        return Ok(());
    }

    let hash = client.send(&tx).await.context("broadcasting batch transfer")?;
    info!(%hash, "batch transfer broadcast");
    println!("Batch transfer sent: {hash}");
    Ok(())
}

pub async fn convert(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let signer = config::signer_from_env()?;

    let client = connect_http(config.chain.rpc_url())?;
    node::ensure_node(&client, &config.chain).await?;
    let client = Arc::new(client);

    let mut batcher = TokenBatcher::new(
        client,
        config.token_contracts(),
        config.chain_id()?,
        config.gas,
    );
    let step = batcher.convert(&signer).await?;
    println!("{step:?}");
    Ok(())
}

fn load_payments(path: &Path) -> Result<Vec<Payment>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading payments file {}", path.display()))?;
    serde_json::from_str(&contents).context("parsing payments file")
}

fn show(balance: gntw_pay::model::Balance) -> String {
    balance.map_or_else(|| "unknown".to_string(), |b| b.to_string())
}
