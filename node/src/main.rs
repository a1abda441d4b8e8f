// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Node
//!
//! Entry point for the `vault-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and hosts a vault ledger: it supplies
//! the height counter, the custody balance book, and the caller identities
//! the ledger trusts.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — replay a scenario file, optionally against saved state
//! - `inspect` — print saved state or one of its vaults
//! - `version` — print build version information

mod cli;
mod logging;
mod metrics;
mod scenario;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vault_ledger::{
    BlockHeight, InMemoryCustody, LedgerConfig, LedgerSnapshot, Principal, VaultLedger,
};

use cli::{Commands, VaultNodeCli};
use logging::LogFormat;
use metrics::LedgerMetrics;
use scenario::{HostLedger, Scenario};

fn main() -> Result<()> {
    let cli = VaultNodeCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Replays a scenario and prints one JSON outcome line per step.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    let run_id = Uuid::new_v4();
    let _span = tracing::info_span!("run", %run_id).entered();

    let raw = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario: {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario: {}", args.scenario.display()))?;

    let mut ledger = open_ledger(&args)?;
    let metrics = LedgerMetrics::new().context("failed to register metrics")?;

    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        height = ledger.current_height(),
        "replaying scenario"
    );

    scenario::seed_balances(&ledger, &scenario)?;
    let outcomes = scenario::replay(&mut ledger, &scenario, &metrics)?;

    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let rejected = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(
        steps = outcomes.len(),
        rejected,
        live_vaults = ledger.vault_ids().len(),
        "scenario complete"
    );

    if let Some(path) = &args.state {
        save_state(&ledger, path)?;
    }

    if args.metrics {
        print!("{}", metrics.encode()?);
    }

    Ok(())
}

/// Everything `--state` persists: the ledger snapshot plus the custody
/// balance book the driver hosts alongside it.
#[derive(Debug, Serialize, Deserialize)]
struct HostState {
    ledger: LedgerSnapshot,
    #[serde(default)]
    balances: BTreeMap<Principal, u64>,
}

/// Restores the ledger from `--state` when the file exists, otherwise
/// deploys a fresh one from `--config` or `--contract-owner`.
fn open_ledger(args: &cli::RunArgs) -> Result<HostLedger> {
    if let Some(path) = args.state.as_deref().filter(|path| path.exists()) {
        if args.config.is_some() {
            tracing::warn!("--config ignored: saved state carries its own configuration");
        }
        let state = load_state(path)?;
        let oracle = BlockHeight::new(state.ledger.taken_at_height);
        let custody = InMemoryCustody::with_balances(state.balances);
        return VaultLedger::restore(state.ledger, oracle, custody)
            .with_context(|| format!("failed to restore state: {}", path.display()));
    }

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            LedgerConfig::from_json(&raw)
                .with_context(|| format!("invalid config: {}", path.display()))?
        }
        None => LedgerConfig::new(args.contract_owner.as_str()),
    };

    VaultLedger::in_memory(config).context("failed to deploy ledger")
}

fn load_state(path: &Path) -> Result<HostState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state: {}", path.display()))?;
    let state: HostState = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state: {}", path.display()))?;
    state
        .ledger
        .verify()
        .with_context(|| format!("invalid state: {}", path.display()))?;
    Ok(state)
}

fn save_state(ledger: &HostLedger, path: &Path) -> Result<()> {
    let state = HostState {
        ledger: ledger.snapshot(),
        balances: ledger.custody().balances().into_iter().collect(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&state)?)
        .with_context(|| format!("failed to write state: {}", path.display()))?;
    tracing::info!(path = %path.display(), "state saved");
    Ok(())
}

/// Prints saved state, or a single vault from it, as JSON.
fn inspect(args: cli::InspectArgs) -> Result<()> {
    let state = load_state(&args.state)?;
    let snapshot = &state.ledger;

    match args.vault {
        Some(vault_id) => {
            let vault = snapshot
                .vaults
                .get(vault_id)
                .with_context(|| format!("vault {vault_id} not found"))?;
            let signed: Vec<_> = vault
                .signers
                .iter()
                .filter(|signer| snapshot.signatures.has_signed(vault_id, signer))
                .collect();
            let report = serde_json::json!({
                "vault": vault,
                "signed_by": signed,
                "signature_count": snapshot.signatures.count(vault),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&state)?),
    }

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("vault-node {}", env!("CARGO_PKG_VERSION"));
}
