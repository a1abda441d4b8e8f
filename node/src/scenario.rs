//! # Scenario Replay
//!
//! A scenario is a JSON document describing initial balances and an ordered
//! list of calls, each made by a named caller at a given height:
//!
//! ```json
//! {
//!   "balances": { "owner": 1000 },
//!   "steps": [
//!     { "height": 1, "caller": "owner", "op": "create_token_vault",
//!       "unlock_height": 100, "amount": 1000, "required_signatures": 0, "signers": [] },
//!     { "height": 100, "caller": "owner", "op": "withdraw", "vault_id": 0 }
//!   ]
//! }
//! ```
//!
//! Replaying produces one [`StepOutcome`] per step. A rejected operation is
//! an outcome, not a replay failure; the replay only fails on malformed
//! scenarios.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use vault_ledger::{
    BlockHeight, CustodyError, Height, InMemoryCustody, NftId, Principal, VaultError, VaultId,
    VaultLedger,
};

use crate::metrics::LedgerMetrics;

/// The ledger flavour the driver embeds.
pub type HostLedger = VaultLedger<BlockHeight, InMemoryCustody>;

/// Errors that abort a replay.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A mutating step named no caller.
    #[error("step {step}: `{op}` requires a caller")]
    MissingCaller {
        /// Zero-based step index.
        step: usize,
        /// Operation name.
        op: &'static str,
    },

    /// Seeding a balance failed.
    #[error("cannot seed balance for {account}: {source}")]
    Seed {
        /// Account being funded.
        account: Principal,
        /// Underlying custody error.
        source: CustodyError,
    },
}

/// A scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Balances deposited into the custody book before the first step.
    #[serde(default)]
    pub balances: BTreeMap<Principal, u64>,
    /// Calls to replay, in order.
    pub steps: Vec<Step>,
}

/// One call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Height to raise the oracle to before the call. Lower values are
    /// ignored; the oracle never moves backwards.
    #[serde(default)]
    pub height: Option<Height>,
    /// Authenticated caller. Required for mutating operations.
    #[serde(default)]
    pub caller: Option<Principal>,
    /// The operation.
    #[serde(flatten)]
    pub op: Operation,
}

/// Operations a step can invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// `create_token_vault`: lock `amount` tokens of the caller.
    CreateTokenVault {
        /// First height at which the time lock opens.
        unlock_height: Height,
        /// Tokens moved into custody.
        amount: u64,
        /// Approvals needed before release.
        #[serde(default)]
        required_signatures: u32,
        /// Principals allowed to approve.
        #[serde(default)]
        signers: Vec<Principal>,
    },
    /// `create_nft_vault`: lock an NFT identifier.
    CreateNftVault {
        /// First height at which the time lock opens.
        unlock_height: Height,
        /// Identifier of the locked NFT.
        nft_id: NftId,
        /// Approvals needed before release.
        #[serde(default)]
        required_signatures: u32,
        /// Principals allowed to approve.
        #[serde(default)]
        signers: Vec<Principal>,
    },
    /// `sign_vault_withdrawal` as the caller.
    Sign {
        /// Vault to approve.
        vault_id: VaultId,
    },
    /// `withdraw_from_vault` as the caller.
    Withdraw {
        /// Vault to release.
        vault_id: VaultId,
    },
    /// `initiate_emergency_unlock` as the caller.
    EmergencyUnlock {
        /// Vault whose time lock to lift.
        vault_id: VaultId,
    },
    /// `set_arbitrator` as the caller.
    SetArbitrator {
        /// Principal to install as arbitrator.
        new_arbitrator: Principal,
    },
    /// `get_vault_details`.
    GetVault {
        /// Vault to read.
        vault_id: VaultId,
    },
    /// `get_signature_count`.
    SignatureCount {
        /// Vault to count approvals for.
        vault_id: VaultId,
    },
    /// `is_vault_unlocked`.
    IsUnlocked {
        /// Vault to test.
        vault_id: VaultId,
    },
    /// `has_signed`.
    HasSigned {
        /// Vault to test.
        vault_id: VaultId,
        /// Signer to look up.
        signer: Principal,
    },
    /// Custody balance of an account. Not a ledger operation; reads the
    /// host's balance book.
    Balance {
        /// Account to read.
        account: Principal,
    },
}

impl Operation {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateTokenVault { .. } => "create_token_vault",
            Operation::CreateNftVault { .. } => "create_nft_vault",
            Operation::Sign { .. } => "sign",
            Operation::Withdraw { .. } => "withdraw",
            Operation::EmergencyUnlock { .. } => "emergency_unlock",
            Operation::SetArbitrator { .. } => "set_arbitrator",
            Operation::GetVault { .. } => "get_vault",
            Operation::SignatureCount { .. } => "signature_count",
            Operation::IsUnlocked { .. } => "is_unlocked",
            Operation::HasSigned { .. } => "has_signed",
            Operation::Balance { .. } => "balance",
        }
    }
}

/// Error as reported in an outcome line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error kind, e.g. `VaultLocked`.
    pub kind: String,
    /// Numeric error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl From<&VaultError> for ErrorReport {
    fn from(err: &VaultError) -> Self {
        Self {
            kind: err.kind().to_string(),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Zero-based step index.
    pub step: usize,
    /// Oracle height the step ran at.
    pub height: Height,
    /// Operation name.
    pub op: String,
    /// Returned value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Error on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl StepOutcome {
    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Deposits the scenario's balances into the ledger's custody book.
pub fn seed_balances(ledger: &HostLedger, scenario: &Scenario) -> Result<(), ScenarioError> {
    for (account, amount) in &scenario.balances {
        ledger
            .custody()
            .deposit(account, *amount)
            .map_err(|source| ScenarioError::Seed {
                account: account.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Replays every step and returns the outcomes in order.
pub fn replay(
    ledger: &mut HostLedger,
    scenario: &Scenario,
    metrics: &LedgerMetrics,
) -> Result<Vec<StepOutcome>, ScenarioError> {
    let mut outcomes = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        if let Some(target) = step.height {
            let now = ledger.oracle().set(target);
            if now != target {
                tracing::warn!(step = index, target, height = now, "height cannot move backwards");
            }
        }

        let height = ledger.current_height();
        let result = execute(ledger, index, step)?;

        for record in ledger.drain_events() {
            metrics.observe_event(&record.event);
        }
        metrics.refresh(ledger);

        let outcome = match result {
            Ok(value) => StepOutcome {
                step: index,
                height,
                op: step.op.name().to_string(),
                value: Some(value),
                error: None,
            },
            Err(err) => {
                metrics.observe_rejection(&err);
                StepOutcome {
                    step: index,
                    height,
                    op: step.op.name().to_string(),
                    value: None,
                    error: Some(ErrorReport::from(&err)),
                }
            }
        };
        tracing::debug!(step = index, op = %outcome.op, ok = outcome.is_ok(), "step replayed");
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

fn execute(
    ledger: &mut HostLedger,
    index: usize,
    step: &Step,
) -> Result<Result<Value, VaultError>, ScenarioError> {
    let caller = || {
        step.caller.as_ref().ok_or(ScenarioError::MissingCaller {
            step: index,
            op: step.op.name(),
        })
    };

    let result = match &step.op {
        Operation::CreateTokenVault {
            unlock_height,
            amount,
            required_signatures,
            signers,
        } => ledger
            .create_token_vault(
                caller()?,
                *unlock_height,
                *amount,
                *required_signatures,
                signers.clone(),
            )
            .map(|id| json!(id)),
        Operation::CreateNftVault {
            unlock_height,
            nft_id,
            required_signatures,
            signers,
        } => ledger
            .create_nft_vault(
                caller()?,
                *unlock_height,
                *nft_id,
                *required_signatures,
                signers.clone(),
            )
            .map(|id| json!(id)),
        Operation::Sign { vault_id } => ledger
            .sign_vault_withdrawal(caller()?, *vault_id)
            .map(|count| json!({ "signatures": count })),
        Operation::Withdraw { vault_id } => ledger
            .withdraw_from_vault(caller()?, *vault_id)
            .map(|vault| json!({ "released": vault.payload })),
        Operation::EmergencyUnlock { vault_id } => ledger
            .initiate_emergency_unlock(caller()?, *vault_id)
            .map(|()| Value::Null),
        Operation::SetArbitrator { new_arbitrator } => ledger
            .set_arbitrator(caller()?, new_arbitrator.clone())
            .map(|()| Value::Null),
        Operation::GetVault { vault_id } => ledger
            .get_vault_details(*vault_id)
            .map(|vault| serde_json::to_value(vault).unwrap_or(Value::Null)),
        Operation::SignatureCount { vault_id } => {
            ledger.get_signature_count(*vault_id).map(|count| json!(count))
        }
        Operation::IsUnlocked { vault_id } => {
            ledger.is_vault_unlocked(*vault_id).map(|open| json!(open))
        }
        Operation::HasSigned { vault_id, signer } => Ok(json!(ledger.has_signed(*vault_id, signer))),
        Operation::Balance { account } => Ok(json!(ledger.custody().balance_of(account))),
    };

    Ok(result)
}
