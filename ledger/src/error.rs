//! Error types for the vault ledger.
//!
//! Every ledger operation that can fail returns a [`VaultError`]. A returned
//! error always means the operation left the ledger untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ERROR_CODE_BASE;
use crate::custody::CustodyError;
use crate::types::{Height, Principal, VaultId};

/// The role a caller was missing when [`VaultError::NotAuthorized`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Creator of the vault.
    VaultOwner,
    /// Member of the vault's signer set.
    Signer,
    /// Identity that deployed the ledger.
    ContractOwner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::VaultOwner => write!(f, "vault owner"),
            Role::Signer => write!(f, "authorized signer"),
            Role::ContractOwner => write!(f, "contract owner"),
        }
    }
}

/// Errors returned by [`crate::ledger::VaultLedger`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum VaultError {
    /// The caller does not hold the role the operation requires.
    #[error("not authorized: {caller} is not the {required}")]
    NotAuthorized {
        /// Identity that attempted the operation.
        caller: Principal,
        /// Role it would have needed.
        required: Role,
    },

    /// No live record exists for this id (never created or already withdrawn).
    #[error("vault {0} not found")]
    VaultNotFound(VaultId),

    /// Neither the time lock nor an emergency override has opened the vault.
    #[error("vault {vault_id} is locked until height {unlock_height} (current {current_height})")]
    VaultLocked {
        /// The locked vault.
        vault_id: VaultId,
        /// Height the time lock opens at.
        unlock_height: Height,
        /// Height at the time of the call.
        current_height: Height,
    },

    /// The requested unlock height is not strictly in the future.
    #[error("invalid unlock height {requested}: must be greater than current height {current}")]
    InvalidUnlockHeight {
        /// Height the caller asked for.
        requested: Height,
        /// Height at the time of the call.
        current: Height,
    },

    /// A token vault was requested with a zero amount.
    #[error("token vault amount must be greater than zero")]
    ZeroAmount,

    /// Quorum exceeds the signer count or the signer list is too long.
    #[error("invalid signer policy: {required} required of {signers} signers (max {max})")]
    InvalidSigners {
        /// Requested quorum.
        required: u32,
        /// Number of signers supplied.
        signers: usize,
        /// Upper bound on the signer list.
        max: usize,
    },

    /// This signer has already approved the vault.
    #[error("{signer} has already signed vault {vault_id}")]
    AlreadySigned {
        /// The vault.
        vault_id: VaultId,
        /// The repeat signer.
        signer: Principal,
    },

    /// Quorum not met at withdrawal time.
    #[error("vault {vault_id} has {collected} of {required} required signatures")]
    InsufficientSignatures {
        /// The vault.
        vault_id: VaultId,
        /// Signatures recorded so far.
        collected: u32,
        /// Quorum the vault was created with.
        required: u32,
    },

    /// Caller is not the current arbitrator.
    #[error("{caller} is not the arbitrator")]
    NotArbitrator {
        /// Identity that attempted the emergency action.
        caller: Principal,
    },

    /// The custody service refused the value transfer.
    #[error("custody transfer failed: {0}")]
    TransferFailed(#[from] CustodyError),

    /// The vault id space is exhausted.
    #[error("vault id space exhausted")]
    NonceExhausted,
}

impl VaultError {
    /// Stable numeric code for hosts that surface integer error codes.
    pub fn code(&self) -> u32 {
        let offset = match self {
            VaultError::NotAuthorized { .. } => 0,
            VaultError::VaultNotFound(_) => 1,
            VaultError::VaultLocked { .. } => 2,
            VaultError::InvalidUnlockHeight { .. } => 3,
            VaultError::ZeroAmount => 4,
            VaultError::InvalidSigners { .. } => 5,
            VaultError::AlreadySigned { .. } => 6,
            VaultError::InsufficientSignatures { .. } => 7,
            VaultError::NotArbitrator { .. } => 8,
            VaultError::TransferFailed(_) => 9,
            VaultError::NonceExhausted => 10,
        };
        ERROR_CODE_BASE + offset
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::NotAuthorized { .. } => "NotAuthorized",
            VaultError::VaultNotFound(_) => "VaultNotFound",
            VaultError::VaultLocked { .. } => "VaultLocked",
            VaultError::InvalidUnlockHeight { .. } => "InvalidUnlockHeight",
            VaultError::ZeroAmount => "ZeroAmount",
            VaultError::InvalidSigners { .. } => "InvalidSigners",
            VaultError::AlreadySigned { .. } => "AlreadySigned",
            VaultError::InsufficientSignatures { .. } => "InsufficientSignatures",
            VaultError::NotArbitrator { .. } => "NotArbitrator",
            VaultError::TransferFailed(_) => "TransferFailed",
            VaultError::NonceExhausted => "NonceExhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_sequential_from_base() {
        assert_eq!(
            VaultError::NotAuthorized {
                caller: "x".into(),
                required: Role::VaultOwner,
            }
            .code(),
            100
        );
        assert_eq!(VaultError::VaultNotFound(3).code(), 101);
        assert_eq!(VaultError::ZeroAmount.code(), 104);
        assert_eq!(VaultError::NotArbitrator { caller: "x".into() }.code(), 108);
        assert_eq!(VaultError::NonceExhausted.code(), 110);
    }

    #[test]
    fn display_carries_context() {
        let err = VaultError::VaultLocked {
            vault_id: 0,
            unlock_height: 100,
            current_height: 50,
        };
        assert_eq!(
            err.to_string(),
            "vault 0 is locked until height 100 (current 50)"
        );
        assert_eq!(err.kind(), "VaultLocked");
    }

    #[test]
    fn custody_errors_convert() {
        let err: VaultError = CustodyError::ZeroTransfer.into();
        assert_eq!(err.kind(), "TransferFailed");
        assert_eq!(err.code(), 109);
    }
}
