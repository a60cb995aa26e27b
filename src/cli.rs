use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batched token payments with legacy → wrapped token migration.
#[derive(Parser)]
#[command(name = "gntw-pay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the configured node is reachable, on the right chain and compatible
    CheckNode {
        /// Path to the JSON config file
        #[arg(long, default_value = "gntw-pay.json")]
        config: PathBuf,
    },

    /// Show legacy, wrapped and total token balance
    Balance {
        /// Path to the JSON config file
        #[arg(long, default_value = "gntw-pay.json")]
        config: PathBuf,

        /// Account to inspect (default: the signer's address)
        #[arg(long)]
        address: Option<String>,
    },

    /// Run one batching round over a payments file
    Pay {
        /// Path to the JSON config file
        #[arg(long, default_value = "gntw-pay.json")]
        config: PathBuf,

        /// JSON array of {"payee": "0x…", "value": "…"}
        #[arg(long)]
        payments: PathBuf,

        /// Closure time forwarded to batchTransfer (default: now, unix seconds)
        #[arg(long)]
        closure_time: Option<u64>,

        /// Build and sign the batch transaction but do not broadcast it
        #[arg(long)]
        dry_run: bool,
    },

    /// Advance the legacy → wrapped conversion by one step
    Convert {
        /// Path to the JSON config file
        #[arg(long, default_value = "gntw-pay.json")]
        config: PathBuf,
    },
}
