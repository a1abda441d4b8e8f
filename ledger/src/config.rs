//! # Ledger Configuration & Constants
//!
//! Every fixed bound the ledger enforces lives here, next to the runtime
//! [`LedgerConfig`] the host hands over at construction. The constants are
//! part of the ledger's observable behavior; changing one changes which
//! vaults can be created.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Height, Principal};

// ---------------------------------------------------------------------------
// Vault Bounds
// ---------------------------------------------------------------------------

/// Maximum number of entries accepted in a vault's signer list.
pub const MAX_SIGNERS: usize = 5;

/// Identity that holds custodied token balances when the host does not
/// configure one explicitly.
pub const DEFAULT_CUSTODY_ACCOUNT: &str = "vault-ledger.custody";

/// First numeric error code. Codes are assigned sequentially from here, see
/// [`crate::error::VaultError::code`].
pub const ERROR_CODE_BASE: u32 = 100;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Errors raised while validating a [`LedgerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A principal field was left empty.
    #[error("configuration field `{0}` must not be empty")]
    EmptyPrincipal(&'static str),

    /// The custody account would alias the contract owner, which would let
    /// custodied funds mix with the owner's own balance.
    #[error("custody account {0} must differ from the contract owner")]
    CustodyIsOwner(Principal),

    /// The configuration file could not be parsed.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Deployment-time parameters of a [`crate::ledger::VaultLedger`].
///
/// `contract_owner` is fixed for the lifetime of the ledger. The arbitrator
/// starts out equal to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Identity that deployed the ledger and may reassign the arbitrator.
    pub contract_owner: Principal,
    /// Identity holding token balances while they sit in a vault.
    #[serde(default = "default_custody_account")]
    pub custody_account: Principal,
    /// Height the in-process oracle starts at when the host provides none.
    #[serde(default)]
    pub genesis_height: Height,
}

fn default_custody_account() -> Principal {
    Principal::from(DEFAULT_CUSTODY_ACCOUNT)
}

impl LedgerConfig {
    /// Builds a configuration with the default custody account and a
    /// genesis height of zero.
    pub fn new(contract_owner: impl Into<Principal>) -> Self {
        Self {
            contract_owner: contract_owner.into(),
            custody_account: default_custody_account(),
            genesis_height: 0,
        }
    }

    /// Overrides the custody account.
    pub fn with_custody_account(mut self, custody_account: impl Into<Principal>) -> Self {
        self.custody_account = custody_account.into();
        self
    }

    /// Overrides the genesis height.
    pub fn with_genesis_height(mut self, genesis_height: Height) -> Self {
        self.genesis_height = genesis_height;
        self
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the ledger cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract_owner.is_empty() {
            return Err(ConfigError::EmptyPrincipal("contract_owner"));
        }
        if self.custody_account.is_empty() {
            return Err(ConfigError::EmptyPrincipal("custody_account"));
        }
        if self.custody_account == self.contract_owner {
            return Err(ConfigError::CustodyIsOwner(self.custody_account.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::new("deployer");
        assert_eq!(config.custody_account.as_str(), DEFAULT_CUSTODY_ACCOUNT);
        assert_eq!(config.genesis_height, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_owner_rejected() {
        let config = LedgerConfig::new("");
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyPrincipal("contract_owner"))
        );
    }

    #[test]
    fn test_custody_aliasing_owner_rejected() {
        let config = LedgerConfig::new("deployer").with_custody_account("deployer");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CustodyIsOwner(_))
        ));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = LedgerConfig::from_json(r#"{ "contract_owner": "deployer" }"#).unwrap();
        assert_eq!(config, LedgerConfig::new("deployer"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            LedgerConfig::from_json("not json"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_signer_bound_matches_contract() {
        // Deployed vaults were created under a five-signer cap.
        assert_eq!(MAX_SIGNERS, 5);
    }
}
