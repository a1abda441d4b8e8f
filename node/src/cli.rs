//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-node` using
//! `clap` derive. Supports three subcommands: `run`, `inspect`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vault ledger host driver.
///
/// Embeds a vault ledger with an in-process height counter and balance
/// book, replays scenario files against it, and persists its state between
/// runs.
#[derive(Parser, Debug)]
#[command(
    name = "vault-node",
    about = "Vault ledger host driver",
    version,
    propagate_version = true
)]
pub struct VaultNodeCli {
    /// Log format: "pretty" or "json".
    #[arg(long, global = true, env = "VAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario file against the ledger.
    Run(RunArgs),
    /// Print saved ledger state.
    Inspect(InspectArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file (JSON) to replay.
    #[arg(long, short = 's')]
    pub scenario: PathBuf,

    /// Ledger configuration file (JSON).
    ///
    /// Ignored when `--state` points at an existing snapshot, which carries
    /// its own configuration.
    #[arg(long, short = 'c', env = "VAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Contract owner used when no configuration file is given.
    #[arg(long, env = "VAULT_CONTRACT_OWNER", default_value = "deployer")]
    pub contract_owner: String,

    /// State file (ledger snapshot plus balances). Loaded before the replay
    /// if it exists, written after.
    #[arg(long, env = "VAULT_STATE")]
    pub state: Option<PathBuf>,

    /// Print Prometheus metrics after the step outcomes.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// State file to read.
    #[arg(long, env = "VAULT_STATE")]
    pub state: PathBuf,

    /// Print only this vault.
    #[arg(long)]
    pub vault: Option<u64>,
}
