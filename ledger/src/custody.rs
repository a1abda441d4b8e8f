//! # Value Custody
//!
//! The ledger never moves value itself. It asks a [`CustodyService`] to move
//! an amount between two principals and treats the call as all-or-nothing:
//! either the full amount moved, or nothing did and an error came back.
//!
//! [`InMemoryCustody`] is the in-process implementation used by the driver
//! binary and the tests. It keeps a plain balance book behind a shared lock
//! so the host can fund accounts and read balances while the ledger owns a
//! clone of the same handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Principal;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a custody transfer can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CustodyError {
    /// The sender does not hold enough to cover the transfer.
    #[error("insufficient balance: {account} has {available}, transfer needs {requested}")]
    InsufficientBalance {
        /// The debited account.
        account: Principal,
        /// Its current balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Crediting the recipient would overflow `u64`.
    #[error("balance overflow: {account} holds {current}, credit {credit}")]
    Overflow {
        /// The credited account.
        account: Principal,
        /// Its current balance.
        current: u64,
        /// Amount that would have been added.
        credit: u64,
    },

    /// Zero-value transfers are refused outright.
    #[error("zero-value transfer")]
    ZeroTransfer,

    /// The backing service is unavailable or refused for its own reasons.
    #[error("custody service rejected the transfer: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Atomic value transfer between principals.
///
/// Implementations must leave every balance untouched when they return an
/// error.
pub trait CustodyService {
    /// Moves `amount` from `from` to `to`.
    fn transfer(&mut self, amount: u64, from: &Principal, to: &Principal)
        -> Result<(), CustodyError>;
}

// ---------------------------------------------------------------------------
// InMemoryCustody
// ---------------------------------------------------------------------------

/// Shared in-memory balance book.
///
/// Cloning yields another handle onto the same balances.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    balances: Arc<RwLock<HashMap<Principal, u64>>>,
}

impl InMemoryCustody {
    /// Creates an empty balance book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a balance book seeded with the given balances.
    pub fn with_balances<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (Principal, u64)>,
    {
        Self {
            balances: Arc::new(RwLock::new(balances.into_iter().collect())),
        }
    }

    /// Credits `amount` to `account` from outside the ledger (a faucet, or
    /// the host's genesis allocation). Returns the new balance.
    pub fn deposit(&self, account: &Principal, amount: u64) -> Result<u64, CustodyError> {
        let mut book = self.balances.write();
        let current = book.get(account).copied().unwrap_or(0);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Overflow {
                account: account.clone(),
                current,
                credit: amount,
            })?;
        book.insert(account.clone(), updated);
        Ok(updated)
    }

    /// Current balance of `account`. Unknown accounts hold zero.
    pub fn balance_of(&self, account: &Principal) -> u64 {
        self.balances.read().get(account).copied().unwrap_or(0)
    }

    /// Copy of every non-zero balance, for reporting.
    pub fn balances(&self) -> HashMap<Principal, u64> {
        self.balances
            .read()
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(account, amount)| (account.clone(), *amount))
            .collect()
    }
}

impl CustodyService for InMemoryCustody {
    fn transfer(
        &mut self,
        amount: u64,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), CustodyError> {
        if amount == 0 {
            return Err(CustodyError::ZeroTransfer);
        }

        let mut book = self.balances.write();

        let available = book.get(from).copied().unwrap_or(0);
        let debited = available
            .checked_sub(amount)
            .ok_or_else(|| CustodyError::InsufficientBalance {
                account: from.clone(),
                available,
                requested: amount,
            })?;

        if from == to {
            return Ok(());
        }

        // Both sides are computed before either is written back.
        let current = book.get(to).copied().unwrap_or(0);
        let credited = current
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Overflow {
                account: to.clone(),
                current,
                credit: amount,
            })?;

        book.insert(from.clone(), debited);
        book.insert(to.clone(), credited);
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
    fn transfer_moves_funds() {
        let mut custody = InMemoryCustody::with_balances(vec![(p("alice"), 1_000)]);
        custody.transfer(400, &p("alice"), &p("bob")).unwrap();
        assert_eq!(custody.balance_of(&p("alice")), 600);
        assert_eq!(custody.balance_of(&p("bob")), 400);
    }

    #[test]
    fn overdraft_leaves_book_untouched() {
        let mut custody = InMemoryCustody::with_balances(vec![(p("alice"), 100)]);
        let err = custody.transfer(101, &p("alice"), &p("bob")).unwrap_err();
        assert_eq!(
            err,
            CustodyError::InsufficientBalance {
                account: p("alice"),
                available: 100,
                requested: 101,
            }
        );
        assert_eq!(custody.balance_of(&p("alice")), 100);
        assert_eq!(custody.balance_of(&p("bob")), 0);
    }

    #[test]
    fn overflow_leaves_book_untouched() {
        let mut custody =
            InMemoryCustody::with_balances(vec![(p("alice"), 10), (p("bob"), u64::MAX)]);
        let err = custody.transfer(10, &p("alice"), &p("bob")).unwrap_err();
        assert!(matches!(err, CustodyError::Overflow { .. }));
        assert_eq!(custody.balance_of(&p("alice")), 10);
        assert_eq!(custody.balance_of(&p("bob")), u64::MAX);
    }

    #[test]
    fn zero_transfer_rejected() {
        let mut custody = InMemoryCustody::new();
        assert_eq!(
            custody.transfer(0, &p("alice"), &p("bob")),
            Err(CustodyError::ZeroTransfer)
        );
    }

    #[test]
    fn clones_share_the_book() {
        let custody = InMemoryCustody::new();
        let mut handle = custody.clone();
        custody.deposit(&p("alice"), 50).unwrap();
        handle.transfer(20, &p("alice"), &p("bob")).unwrap();
        assert_eq!(custody.balance_of(&p("bob")), 20);
        assert_eq!(custody.balances().len(), 2);
    }
}
