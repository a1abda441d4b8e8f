//! # Ledger Events
//!
//! Every successful mutation appends one [`EventRecord`] to the ledger's
//! event log. Rejected operations append nothing. The host drains the log
//! whenever it wants to forward events somewhere durable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Height, Payload, Principal, VaultId};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A vault was created and, for token vaults, funded.
    VaultCreated {
        /// Id assigned to the new vault.
        vault_id: VaultId,
        /// Creator, the only principal who may withdraw.
        owner: Principal,
        /// Locked asset.
        payload: Payload,
        /// First height at which the time lock opens.
        unlock_height: Height,
        /// Approvals needed before release.
        required_signatures: u32,
    },
    /// A signer approved a vault.
    VaultSigned {
        /// Vault that was approved.
        vault_id: VaultId,
        /// Approving signer.
        signer: Principal,
        /// Signature count after this approval.
        signatures: u32,
    },
    /// The arbitrator set the emergency flag. Only emitted on the first
    /// activation; repeats are no-ops.
    EmergencyUnlocked {
        /// Vault whose time lock was lifted.
        vault_id: VaultId,
        /// Arbitrator who lifted it.
        arbitrator: Principal,
    },
    /// The owner withdrew; the vault no longer exists.
    VaultReleased {
        /// Id of the deleted vault.
        vault_id: VaultId,
        /// Owner the payload went back to.
        owner: Principal,
        /// Released asset.
        payload: Payload,
    },
    /// The contract owner reassigned the arbitrator.
    ArbitratorChanged {
        /// Arbitrator before the change.
        previous: Principal,
        /// Arbitrator after the change.
        current: Principal,
    },
}

impl LedgerEvent {
    /// Vault the event concerns, if any.
    pub fn vault_id(&self) -> Option<VaultId> {
        match self {
            LedgerEvent::VaultCreated { vault_id, .. }
            | LedgerEvent::VaultSigned { vault_id, .. }
            | LedgerEvent::EmergencyUnlocked { vault_id, .. }
            | LedgerEvent::VaultReleased { vault_id, .. } => Some(*vault_id),
            LedgerEvent::ArbitratorChanged { .. } => None,
        }
    }
}

/// An event stamped with the host height and wall-clock time it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Host height when the operation ran.
    pub height: Height,
    /// Wall-clock time, for operators only. Never consulted by the ledger.
    pub recorded_at: DateTime<Utc>,
    /// The event itself.
    #[serde(flatten)]
    pub event: LedgerEvent,
}

impl EventRecord {
    pub(crate) fn new(height: Height, event: LedgerEvent) -> Self {
        Self {
            height,
            recorded_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_flat_with_type_tag() {
        let record = EventRecord::new(
            42,
            LedgerEvent::VaultSigned {
                vault_id: 3,
                signer: Principal::from("alice"),
                signatures: 1,
            },
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "vault_signed");
        assert_eq!(value["height"], 42);
        assert_eq!(value["vault_id"], 3);
        assert_eq!(value["signer"], "alice");
    }

    #[test]
    fn vault_id_projection() {
        let changed = LedgerEvent::ArbitratorChanged {
            previous: Principal::from("a"),
            current: Principal::from("b"),
        };
        assert_eq!(changed.vault_id(), None);

        let released = LedgerEvent::VaultReleased {
            vault_id: 9,
            owner: Principal::from("o"),
            payload: Payload::Nft(1),
        };
        assert_eq!(released.vault_id(), Some(9));
    }
}
