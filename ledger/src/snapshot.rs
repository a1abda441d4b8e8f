//! # Ledger Snapshots
//!
//! A [`LedgerSnapshot`] is the complete persistent state of a ledger:
//! configuration, admin identities, vault records with the id nonce, and
//! signature facts. The event log and the host collaborators are not part
//! of it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminState;
use crate::config::{ConfigError, LedgerConfig};
use crate::store::{SignatureStore, VaultStore};
use crate::types::Height;

/// Errors raised when loading or verifying a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The embedded configuration is invalid.
    #[error("invalid snapshot configuration: {0}")]
    Config(#[from] ConfigError),

    /// The stores violate a ledger invariant.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serializable state of a [`crate::ledger::VaultLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Deployment configuration.
    pub config: LedgerConfig,
    /// Contract owner and arbitrator.
    pub admin: AdminState,
    /// Live vaults and the id nonce.
    pub vaults: VaultStore,
    /// Approval facts of live vaults.
    pub signatures: SignatureStore,
    /// Oracle height when the snapshot was taken.
    pub taken_at_height: Height,
}

impl LedgerSnapshot {
    /// Pretty-printed JSON encoding.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes and verifies a snapshot.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(raw)?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Checks the configuration and the store invariants.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        self.config.validate()?;

        if self.admin.contract_owner() != &self.config.contract_owner {
            return Err(SnapshotError::Corrupt(format!(
                "admin owner {} does not match configured owner {}",
                self.admin.contract_owner(),
                self.config.contract_owner
            )));
        }

        self.vaults.check_invariants().map_err(SnapshotError::Corrupt)?;

        if let Some(orphan) = self
            .signatures
            .vault_ids()
            .find(|id| self.vaults.get(*id).is_none())
        {
            return Err(SnapshotError::Corrupt(format!(
                "signatures recorded for missing vault {orphan}"
            )));
        }

        Ok(())
    }
}
