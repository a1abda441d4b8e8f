//! # Core Ledger Types
//!
//! Identities, vault records, and the bounded signer set. Every type here is
//! serde-serializable so a ledger snapshot can be persisted by the host and
//! shipped over whatever transport it likes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Identifier of a vault. Assigned from a strictly increasing nonce and never
/// reused, even after the vault is withdrawn.
pub type VaultId = u64;

/// A point on the host's monotonic height counter.
pub type Height = u64;

/// Identifier of a non-fungible item recorded by an NFT vault.
pub type NftId = u64;

/// An authenticated identity, as supplied by the host's caller context.
///
/// The ledger compares principals byte-for-byte; it never parses or
/// verifies them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Wraps a raw identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identity, which no host should ever
    /// authenticate.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// What a vault holds. A vault is either a token vault or an NFT vault,
/// never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Fungible amount moved into ledger custody at creation.
    Token(u64),
    /// Identifier of a non-fungible item. Only the id is recorded; the item
    /// itself is not moved through the custody service.
    Nft(NftId),
}

impl Payload {
    /// Amount in custody for token vaults, `None` for NFT vaults.
    pub fn token_amount(&self) -> Option<u64> {
        match self {
            Payload::Token(amount) => Some(*amount),
            Payload::Nft(_) => None,
        }
    }

    /// NFT identifier for NFT vaults, `None` for token vaults.
    pub fn nft_id(&self) -> Option<NftId> {
        match self {
            Payload::Token(_) => None,
            Payload::Nft(id) => Some(*id),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Token(amount) => write!(f, "token({amount})"),
            Payload::Nft(id) => write!(f, "nft(#{id})"),
        }
    }
}

// ---------------------------------------------------------------------------
// SignerSet
// ---------------------------------------------------------------------------

/// Ordered set of identities eligible to sign a vault.
///
/// Construction tolerates duplicates in the input but keeps only the first
/// occurrence of each identity, so iteration order is insertion order and
/// every member counts at most once toward quorum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Principal>", into = "Vec<Principal>")]
pub struct SignerSet {
    members: Vec<Principal>,
}

impl SignerSet {
    /// Builds a set from a raw, possibly duplicated, signer list.
    pub fn from_list<I>(signers: I) -> Self
    where
        I: IntoIterator<Item = Principal>,
    {
        let mut members: Vec<Principal> = Vec::new();
        for signer in signers {
            if !members.contains(&signer) {
                members.push(signer);
            }
        }
        Self { members }
    }

    /// Number of distinct signers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no one may sign.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, signer: &Principal) -> bool {
        self.members.contains(signer)
    }

    /// Iterates members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Principal> {
        self.members.iter()
    }
}

impl From<Vec<Principal>> for SignerSet {
    fn from(signers: Vec<Principal>) -> Self {
        Self::from_list(signers)
    }
}

impl From<SignerSet> for Vec<Principal> {
    fn from(set: SignerSet) -> Self {
        set.members
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Where a live vault sits in its lifecycle.
///
/// A released vault has no record at all, so there is no `Released` variant:
/// lookups of a withdrawn id report "not found" instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultPhase {
    /// Below the unlock height with no emergency override.
    Locked,
    /// Unlock height reached.
    TimeUnlocked,
    /// Arbitrator override active. Takes precedence over `TimeUnlocked`.
    EmergencyUnlocked,
}

impl fmt::Display for VaultPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultPhase::Locked => write!(f, "Locked"),
            VaultPhase::TimeUnlocked => write!(f, "TimeUnlocked"),
            VaultPhase::EmergencyUnlocked => write!(f, "EmergencyUnlocked"),
        }
    }
}

/// A vault record as held by the vault store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Identifier assigned at creation.
    pub vault_id: VaultId,
    /// Creator of the vault and sole recipient on withdrawal.
    pub owner: Principal,
    /// Height at or after which the time lock opens.
    pub unlock_height: Height,
    /// Custodied amount or recorded NFT.
    pub payload: Payload,
    /// Number of distinct signers that must approve before withdrawal.
    pub required_signatures: u32,
    /// Identities eligible to approve. Immutable after creation.
    pub signers: SignerSet,
    /// Standing arbitrator override of the time lock. Never cleared.
    pub emergency_active: bool,
    /// Host height when the vault was created.
    pub created_at_height: Height,
}

impl Vault {
    /// Unlock predicate: time lock elapsed or emergency override set.
    pub fn is_unlocked_at(&self, height: Height) -> bool {
        self.emergency_active || height >= self.unlock_height
    }

    /// Lifecycle phase as observed at `height`.
    pub fn phase_at(&self, height: Height) -> VaultPhase {
        if self.emergency_active {
            VaultPhase::EmergencyUnlocked
        } else if height >= self.unlock_height {
            VaultPhase::TimeUnlocked
        } else {
            VaultPhase::Locked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> Principal {
        Principal::from(id)
    }

    fn sample_vault() -> Vault {
        Vault {
            vault_id: 7,
            owner: p("owner"),
            unlock_height: 100,
            payload: Payload::Token(1_000),
            required_signatures: 1,
            signers: SignerSet::from_list(vec![p("alice")]),
            emergency_active: false,
            created_at_height: 1,
        }
    }

    #[test]
    fn signer_set_drops_duplicates_keeping_order() {
        let set = SignerSet::from_list(vec![p("bob"), p("alice"), p("bob"), p("carol")]);
        let order: Vec<&str> = set.iter().map(Principal::as_str).collect();
        assert_eq!(order, vec!["bob", "alice", "carol"]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&p("alice")));
        assert!(!set.contains(&p("mallory")));
    }

    #[test]
    fn signer_set_serializes_as_plain_list() {
        let set = SignerSet::from_list(vec![p("a"), p("b")]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: SignerSet = serde_json::from_str(r#"["a","a","b"]"#).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn payload_accessors() {
        assert_eq!(Payload::Token(5).token_amount(), Some(5));
        assert_eq!(Payload::Token(5).nft_id(), None);
        assert_eq!(Payload::Nft(9).nft_id(), Some(9));
        assert_eq!(Payload::Nft(9).token_amount(), None);
    }

    #[test]
    fn phase_follows_height_and_emergency() {
        let mut vault = sample_vault();
        assert_eq!(vault.phase_at(99), VaultPhase::Locked);
        assert!(!vault.is_unlocked_at(99));
        assert_eq!(vault.phase_at(100), VaultPhase::TimeUnlocked);
        assert!(vault.is_unlocked_at(100));

        vault.emergency_active = true;
        assert_eq!(vault.phase_at(0), VaultPhase::EmergencyUnlocked);
        assert_eq!(vault.phase_at(500), VaultPhase::EmergencyUnlocked);
        assert!(vault.is_unlocked_at(0));
    }

    #[test]
    fn principal_is_transparent_in_json() {
        let json = serde_json::to_string(&p("alice")).unwrap();
        assert_eq!(json, r#""alice""#);
    }
}
