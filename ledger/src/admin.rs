//! # Admin State
//!
//! The two privileged identities of a ledger. The contract owner is fixed at
//! construction; the arbitrator can be reassigned by the contract owner and
//! by no one else.

use serde::{Deserialize, Serialize};

use crate::error::{Role, VaultError};
use crate::types::Principal;

/// Contract owner and current arbitrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminState {
    contract_owner: Principal,
    arbitrator: Principal,
}

impl AdminState {
    /// The arbitrator starts out as the contract owner.
    pub fn new(contract_owner: Principal) -> Self {
        Self {
            arbitrator: contract_owner.clone(),
            contract_owner,
        }
    }

    /// Identity that deployed the ledger.
    pub fn contract_owner(&self) -> &Principal {
        &self.contract_owner
    }

    /// Identity currently allowed to trigger emergency unlocks.
    pub fn arbitrator(&self) -> &Principal {
        &self.arbitrator
    }

    /// Replaces the arbitrator. Returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotAuthorized`] unless `caller` is the contract
    /// owner.
    pub fn set_arbitrator(
        &mut self,
        caller: &Principal,
        new_arbitrator: Principal,
    ) -> Result<Principal, VaultError> {
        if *caller != self.contract_owner {
            return Err(VaultError::NotAuthorized {
                caller: caller.clone(),
                required: Role::ContractOwner,
            });
        }
        Ok(std::mem::replace(&mut self.arbitrator, new_arbitrator))
    }

    /// Fails with [`VaultError::NotArbitrator`] unless `caller` is the
    /// current arbitrator.
    pub fn ensure_arbitrator(&self, caller: &Principal) -> Result<(), VaultError> {
        if *caller != self.arbitrator {
            return Err(VaultError::NotArbitrator {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> Principal {
        Principal::from(id)
    }

    #[test]
    fn arbitrator_defaults_to_owner() {
        let admin = AdminState::new(p("deployer"));
        assert_eq!(admin.arbitrator(), &p("deployer"));
        assert!(admin.ensure_arbitrator(&p("deployer")).is_ok());
    }

    #[test]
    fn only_owner_reassigns() {
        let mut admin = AdminState::new(p("deployer"));
        let err = admin.set_arbitrator(&p("mallory"), p("mallory")).unwrap_err();
        assert_eq!(
            err,
            VaultError::NotAuthorized {
                caller: p("mallory"),
                required: Role::ContractOwner,
            }
        );
        assert_eq!(admin.arbitrator(), &p("deployer"));

        let previous = admin.set_arbitrator(&p("deployer"), p("judge")).unwrap();
        assert_eq!(previous, p("deployer"));
        assert_eq!(admin.arbitrator(), &p("judge"));
    }

    #[test]
    fn owner_loses_emergency_power_after_handover() {
        let mut admin = AdminState::new(p("deployer"));
        admin.set_arbitrator(&p("deployer"), p("judge")).unwrap();
        assert_eq!(
            admin.ensure_arbitrator(&p("deployer")),
            Err(VaultError::NotArbitrator {
                caller: p("deployer"),
            })
        );
        // Ownership itself is unaffected.
        assert_eq!(admin.contract_owner(), &p("deployer"));
        assert!(admin.set_arbitrator(&p("deployer"), p("deployer")).is_ok());
    }
}
