//! # Vault & Signature Stores
//!
//! Two plain maps and a nonce. The [`VaultStore`] owns vault records and the
//! id counter; the [`SignatureStore`] owns the `(vault, signer)` approval
//! facts quorum is computed from.
//!
//! Vault creation is split in two so the ledger can run the inbound custody
//! transfer between validation and commit:
//!
//! ```text
//! prepare(request, height) -> PendingVault   (all checks, id reserved, no writes)
//! custody.transfer(...)                      (may fail: nothing written yet)
//! commit(pending)          -> VaultId        (infallible)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::MAX_SIGNERS;
use crate::error::VaultError;
use crate::types::{Height, Payload, Principal, SignerSet, Vault, VaultId};

// ---------------------------------------------------------------------------
// Creation request
// ---------------------------------------------------------------------------

/// Parameters of a vault creation, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVault {
    /// Creating identity.
    pub owner: Principal,
    /// Requested unlock height.
    pub unlock_height: Height,
    /// Token amount or NFT id.
    pub payload: Payload,
    /// Requested quorum.
    pub required_signatures: u32,
    /// Raw signer list as supplied by the caller.
    pub signers: Vec<Principal>,
}

/// A fully validated vault with its id reserved, waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending vault is discarded unless committed"]
pub struct PendingVault {
    vault: Vault,
    next_nonce: VaultId,
}

impl PendingVault {
    /// The record that [`VaultStore::commit`] will store.
    pub fn vault(&self) -> &Vault {
        &self.vault
    }
}

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// Live vault records keyed by id, plus the id nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStore {
    vaults: BTreeMap<VaultId, Vault>,
    nonce: VaultId,
}

impl VaultStore {
    /// Creates an empty store with the nonce at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next successful creation will receive.
    pub fn next_id(&self) -> VaultId {
        self.nonce
    }

    /// Validates a creation request against the height at call time.
    ///
    /// Checks run in a fixed order: unlock height, then amount, then signer
    /// policy. Nothing is written.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidUnlockHeight`] if `unlock_height <= current_height`.
    /// - [`VaultError::ZeroAmount`] for a token payload of zero.
    /// - [`VaultError::InvalidSigners`] if the raw list exceeds
    ///   [`MAX_SIGNERS`] or the quorum exceeds the distinct signer count.
    /// - [`VaultError::NonceExhausted`] if no id is left to assign.
    pub fn prepare(
        &self,
        request: NewVault,
        current_height: Height,
    ) -> Result<PendingVault, VaultError> {
        if request.unlock_height <= current_height {
            return Err(VaultError::InvalidUnlockHeight {
                requested: request.unlock_height,
                current: current_height,
            });
        }

        if request.payload == Payload::Token(0) {
            return Err(VaultError::ZeroAmount);
        }

        let raw_len = request.signers.len();
        let signers = SignerSet::from_list(request.signers);
        if raw_len > MAX_SIGNERS || request.required_signatures as usize > signers.len() {
            return Err(VaultError::InvalidSigners {
                required: request.required_signatures,
                signers: signers.len(),
                max: MAX_SIGNERS,
            });
        }

        let next_nonce = self
            .nonce
            .checked_add(1)
            .ok_or(VaultError::NonceExhausted)?;

        Ok(PendingVault {
            vault: Vault {
                vault_id: self.nonce,
                owner: request.owner,
                unlock_height: request.unlock_height,
                payload: request.payload,
                required_signatures: request.required_signatures,
                signers,
                emergency_active: false,
                created_at_height: current_height,
            },
            next_nonce,
        })
    }

    /// Stores a prepared vault and advances the nonce.
    ///
    /// The pending vault must come from [`prepare`](Self::prepare) on this
    /// store with no commit in between.
    pub fn commit(&mut self, pending: PendingVault) -> VaultId {
        debug_assert_eq!(pending.vault.vault_id, self.nonce, "stale pending vault");
        let vault_id = pending.vault.vault_id;
        self.vaults.insert(vault_id, pending.vault);
        self.nonce = pending.next_nonce;
        vault_id
    }

    /// Looks up a live vault.
    pub fn get(&self, vault_id: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault_id)
    }

    pub(crate) fn get_mut(&mut self, vault_id: VaultId) -> Option<&mut Vault> {
        self.vaults.get_mut(&vault_id)
    }

    /// Removes a vault record. The id is never handed out again.
    pub fn delete(&mut self, vault_id: VaultId) -> Option<Vault> {
        self.vaults.remove(&vault_id)
    }

    /// Live vaults in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }

    /// Number of live vaults.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    /// Returns `true` if no vault is live.
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Sum of token amounts held by live vaults. Saturates rather than wraps.
    pub fn custodied_total(&self) -> u64 {
        self.vaults
            .values()
            .filter_map(|vault| vault.payload.token_amount())
            .fold(0u64, u64::saturating_add)
    }

    /// Checks the structural invariants a restored store must satisfy:
    /// every id is below the nonce and every signer policy is in bounds.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        for (id, vault) in &self.vaults {
            if *id != vault.vault_id {
                return Err(format!("vault keyed as {id} records id {}", vault.vault_id));
            }
            if *id >= self.nonce {
                return Err(format!("vault {id} is not below nonce {}", self.nonce));
            }
            if vault.signers.len() > MAX_SIGNERS
                || vault.required_signatures as usize > vault.signers.len()
            {
                return Err(format!("vault {id} has an out-of-bounds signer policy"));
            }
            if vault.payload == Payload::Token(0) {
                return Err(format!("vault {id} custodies zero tokens"));
            }
            if vault.unlock_height <= vault.created_at_height {
                return Err(format!("vault {id} unlocks at or before its creation height"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SignatureStore
// ---------------------------------------------------------------------------

/// Approval facts keyed by vault, then signer.
///
/// A fact is only ever added. It disappears solely when its vault is
/// released, through [`purge`](Self::purge).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStore {
    facts: BTreeMap<VaultId, BTreeSet<Principal>>,
}

impl SignatureStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `signer` approved `vault_id`.
    ///
    /// Membership in the vault's signer set is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AlreadySigned`] if the fact already exists.
    pub fn record(&mut self, vault_id: VaultId, signer: &Principal) -> Result<(), VaultError> {
        let signed = self.facts.entry(vault_id).or_default();
        if !signed.insert(signer.clone()) {
            return Err(VaultError::AlreadySigned {
                vault_id,
                signer: signer.clone(),
            });
        }
        Ok(())
    }

    /// Whether the fact `(vault_id, signer)` exists.
    pub fn has_signed(&self, vault_id: VaultId, signer: &Principal) -> bool {
        self.facts
            .get(&vault_id)
            .is_some_and(|signed| signed.contains(signer))
    }

    /// Counts approvals over exactly the vault's own signer set.
    pub fn count(&self, vault: &Vault) -> u32 {
        let Some(signed) = self.facts.get(&vault.vault_id) else {
            return 0;
        };
        vault
            .signers
            .iter()
            .filter(|signer| signed.contains(*signer))
            .count() as u32
    }

    /// Drops every fact recorded for `vault_id`.
    pub fn purge(&mut self, vault_id: VaultId) {
        self.facts.remove(&vault_id);
    }

    /// Ids that have at least one recorded fact.
    pub(crate) fn vault_ids(&self) -> impl Iterator<Item = VaultId> + '_ {
        self.facts.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> Principal {
        Principal::from(id)
    }

    fn request(unlock_height: Height, payload: Payload, required: u32, signers: &[&str]) -> NewVault {
        NewVault {
            owner: p("owner"),
            unlock_height,
            payload,
            required_signatures: required,
            signers: signers.iter().map(|s| p(s)).collect(),
        }
    }

    #[test]
    fn prepare_then_commit_assigns_sequential_ids() {
        let mut store = VaultStore::new();
        for expected in 0..3 {
            let pending = store
                .prepare(request(10, Payload::Token(5), 0, &[]), 1)
                .unwrap();
            assert_eq!(store.commit(pending), expected);
        }
        assert_eq!(store.next_id(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn prepare_writes_nothing() {
        let store = VaultStore::new();
        let _pending = store
            .prepare(request(10, Payload::Token(5), 0, &[]), 1)
            .unwrap();
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 0);
    }

    #[test]
    fn unlock_height_must_be_in_the_future() {
        let store = VaultStore::new();
        let err = store
            .prepare(request(5, Payload::Token(5), 0, &[]), 5)
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::InvalidUnlockHeight {
                requested: 5,
                current: 5,
            }
        );
    }

    #[test]
    fn unlock_height_is_checked_before_amount() {
        let store = VaultStore::new();
        let err = store
            .prepare(request(1, Payload::Token(0), 9, &[]), 5)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidUnlockHeight");
    }

    #[test]
    fn zero_amount_is_checked_before_signers() {
        let store = VaultStore::new();
        let err = store
            .prepare(request(10, Payload::Token(0), 9, &[]), 1)
            .unwrap_err();
        assert_eq!(err, VaultError::ZeroAmount);
    }

    #[test]
    fn nft_id_zero_is_a_valid_payload() {
        let store = VaultStore::new();
        assert!(store.prepare(request(10, Payload::Nft(0), 0, &[]), 1).is_ok());
    }

    #[test]
    fn signer_bounds_enforced() {
        let store = VaultStore::new();
        let six = ["a", "b", "c", "d", "e", "f"];
        assert!(matches!(
            store.prepare(request(10, Payload::Token(1), 1, &six), 1),
            Err(VaultError::InvalidSigners { .. })
        ));
        assert!(matches!(
            store.prepare(request(10, Payload::Token(1), 3, &["a", "b"]), 1),
            Err(VaultError::InvalidSigners { .. })
        ));
        assert!(store
            .prepare(request(10, Payload::Token(1), 5, &six[..5]), 1)
            .is_ok());
    }

    #[test]
    fn duplicate_signers_do_not_inflate_quorum_capacity() {
        let store = VaultStore::new();
        let err = store
            .prepare(request(10, Payload::Token(1), 2, &["a", "a"]), 1)
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::InvalidSigners {
                required: 2,
                signers: 1,
                max: MAX_SIGNERS,
            }
        );
    }

    #[test]
    fn nonce_exhaustion_reported() {
        let store = VaultStore {
            vaults: BTreeMap::new(),
            nonce: u64::MAX,
        };
        assert_eq!(
            store.prepare(request(10, Payload::Token(1), 0, &[]), 1),
            Err(VaultError::NonceExhausted)
        );
    }

    #[test]
    fn deleted_ids_are_not_reissued() {
        let mut store = VaultStore::new();
        let pending = store.prepare(request(10, Payload::Nft(1), 0, &[]), 1).unwrap();
        let id = store.commit(pending);
        assert!(store.delete(id).is_some());
        assert!(store.get(id).is_none());

        let pending = store.prepare(request(10, Payload::Nft(2), 0, &[]), 1).unwrap();
        assert_eq!(store.commit(pending), id + 1);
    }

    #[test]
    fn custodied_total_ignores_nft_vaults() {
        let mut store = VaultStore::new();
        for payload in [Payload::Token(300), Payload::Nft(4), Payload::Token(700)] {
            let pending = store.prepare(request(10, payload, 0, &[]), 1).unwrap();
            store.commit(pending);
        }
        assert_eq!(store.custodied_total(), 1_000);
    }

    #[test]
    fn signature_facts_are_one_shot() {
        let mut sigs = SignatureStore::new();
        sigs.record(0, &p("alice")).unwrap();
        assert!(sigs.has_signed(0, &p("alice")));
        assert!(!sigs.has_signed(0, &p("bob")));
        assert!(!sigs.has_signed(1, &p("alice")));
        assert_eq!(
            sigs.record(0, &p("alice")),
            Err(VaultError::AlreadySigned {
                vault_id: 0,
                signer: p("alice"),
            })
        );
    }

    #[test]
    fn count_only_covers_the_vault_signer_set() {
        let mut store = VaultStore::new();
        let pending = store
            .prepare(request(10, Payload::Token(1), 1, &["alice", "bob"]), 1)
            .unwrap();
        let id = store.commit(pending);
        let vault = store.get(id).unwrap();

        let mut sigs = SignatureStore::new();
        assert_eq!(sigs.count(vault), 0);
        sigs.record(id, &p("alice")).unwrap();
        sigs.record(id, &p("stranger")).unwrap();
        assert_eq!(sigs.count(vault), 1);

        sigs.purge(id);
        assert_eq!(sigs.count(vault), 0);
        assert!(!sigs.has_signed(id, &p("alice")));
    }
}
