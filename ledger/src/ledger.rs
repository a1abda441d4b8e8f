//! # Vault Ledger
//!
//! Ties the vault store, the signature store, and the admin state together
//! behind the public operation surface. A vault moves through:
//!
//! ```text
//!            create_*_vault
//!                  │
//!                  ▼
//!   ┌──────────── Locked ────────────┐
//!   │ height >= unlock_height        │ initiate_emergency_unlock
//!   ▼                                ▼
//! TimeUnlocked                EmergencyUnlocked
//!   │                                │
//!   └──── withdraw_from_vault ───────┘  (owner only, quorum met)
//!                  │
//!                  ▼
//!              Released   (record and signatures gone)
//! ```
//!
//! Signatures can be collected in any phase. Every operation takes the
//! caller identity the host authenticated and reads the height once.
//! Mutations go through `&mut self`, so the host's serialisation of calls
//! carries straight through to the stores; queries take `&self`.
//!
//! ## Atomicity
//!
//! All checks run before anything is written. The only external side effect,
//! the custody transfer, runs after every check that could still fail and
//! before the infallible store mutation. A refused transfer therefore leaves
//! the ledger exactly as it was.

use crate::admin::AdminState;
use crate::config::{ConfigError, LedgerConfig};
use crate::custody::{CustodyService, InMemoryCustody};
use crate::error::{Role, VaultError};
use crate::events::{EventRecord, LedgerEvent};
use crate::height::{BlockHeight, HeightOracle};
use crate::snapshot::{LedgerSnapshot, SnapshotError};
use crate::store::{NewVault, SignatureStore, VaultStore};
use crate::types::{Height, NftId, Payload, Principal, Vault, VaultId, VaultPhase};

/// The vault ledger, generic over the host's height oracle and custody
/// service.
///
/// Successful mutations append to an in-memory event log that the ledger
/// never truncates on its own. Hosts are expected to call
/// [`VaultLedger::drain_events`] after each operation or batch; a host that
/// never drains keeps every event for the lifetime of the ledger.
#[derive(Debug)]
pub struct VaultLedger<H, C> {
    config: LedgerConfig,
    admin: AdminState,
    vaults: VaultStore,
    signatures: SignatureStore,
    events: Vec<EventRecord>,
    oracle: H,
    custody: C,
}

impl VaultLedger<BlockHeight, InMemoryCustody> {
    /// Builds a ledger backed by the in-process height counter (started at
    /// the configured genesis height) and an empty in-memory balance book.
    pub fn in_memory(config: LedgerConfig) -> Result<Self, ConfigError> {
        let oracle = BlockHeight::new(config.genesis_height);
        Self::new(config, oracle, InMemoryCustody::new())
    }
}

impl<H, C> VaultLedger<H, C>
where
    H: HeightOracle,
    C: CustodyService,
{
    /// Deploys an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn new(config: LedgerConfig, oracle: H, custody: C) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            contract_owner = %config.contract_owner,
            custody_account = %config.custody_account,
            "vault ledger deployed"
        );
        Ok(Self {
            admin: AdminState::new(config.contract_owner.clone()),
            config,
            vaults: VaultStore::new(),
            signatures: SignatureStore::new(),
            events: Vec::new(),
            oracle,
            custody,
        })
    }

    /// Rebuilds a ledger from a snapshot.
    ///
    /// The event log starts empty; events are not part of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the snapshot's configuration is invalid
    /// or its stores violate the ledger's invariants.
    pub fn restore(snapshot: LedgerSnapshot, oracle: H, custody: C) -> Result<Self, SnapshotError> {
        snapshot.verify()?;
        let LedgerSnapshot {
            config,
            admin,
            vaults,
            signatures,
            ..
        } = snapshot;
        tracing::info!(
            live_vaults = vaults.len(),
            next_vault_id = vaults.next_id(),
            "vault ledger restored from snapshot"
        );
        Ok(Self {
            config,
            admin,
            vaults,
            signatures,
            events: Vec::new(),
            oracle,
            custody,
        })
    }

    /// Captures the full store state at the current height.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config.clone(),
            admin: self.admin.clone(),
            vaults: self.vaults.clone(),
            signatures: self.signatures.clone(),
            taken_at_height: self.oracle.current_height(),
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates a token vault and moves `amount` from `caller` into custody.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidUnlockHeight`], [`VaultError::ZeroAmount`],
    /// [`VaultError::InvalidSigners`] (checked in that order),
    /// [`VaultError::NotAuthorized`] if the caller is the custody account
    /// itself, or [`VaultError::TransferFailed`] if the caller cannot fund
    /// the vault.
    pub fn create_token_vault(
        &mut self,
        caller: &Principal,
        unlock_height: Height,
        amount: u64,
        required_signatures: u32,
        signers: Vec<Principal>,
    ) -> Result<VaultId, VaultError> {
        self.create_vault(NewVault {
            owner: caller.clone(),
            unlock_height,
            payload: Payload::Token(amount),
            required_signatures,
            signers,
        })
        .map_err(|err| rejected("create_token_vault", caller, err))
    }

    /// Creates an NFT vault. Only the identifier is recorded; no value moves.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidUnlockHeight`] or [`VaultError::InvalidSigners`].
    pub fn create_nft_vault(
        &mut self,
        caller: &Principal,
        unlock_height: Height,
        nft_id: NftId,
        required_signatures: u32,
        signers: Vec<Principal>,
    ) -> Result<VaultId, VaultError> {
        self.create_vault(NewVault {
            owner: caller.clone(),
            unlock_height,
            payload: Payload::Nft(nft_id),
            required_signatures,
            signers,
        })
        .map_err(|err| rejected("create_nft_vault", caller, err))
    }

    fn create_vault(&mut self, request: NewVault) -> Result<VaultId, VaultError> {
        let height = self.oracle.current_height();
        let pending = self.vaults.prepare(request, height)?;
        let vault = pending.vault();

        if let Payload::Token(amount) = vault.payload {
            // A custody-to-custody transfer moves nothing, so the vault
            // would be backed by other owners' deposits.
            if vault.owner == self.config.custody_account {
                return Err(VaultError::NotAuthorized {
                    caller: vault.owner.clone(),
                    required: Role::VaultOwner,
                });
            }
            self.custody
                .transfer(amount, &vault.owner, &self.config.custody_account)?;
        }

        let event = LedgerEvent::VaultCreated {
            vault_id: vault.vault_id,
            owner: vault.owner.clone(),
            payload: vault.payload,
            unlock_height: vault.unlock_height,
            required_signatures: vault.required_signatures,
        };
        let vault_id = self.vaults.commit(pending);

        tracing::info!(vault_id, height, "vault created");
        self.events.push(EventRecord::new(height, event));
        Ok(vault_id)
    }

    // -----------------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------------

    /// Records `caller`'s approval of `vault_id`. Returns the signature
    /// count after recording.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultNotFound`], [`VaultError::NotAuthorized`] if the
    /// caller is not in the signer set, or [`VaultError::AlreadySigned`] on
    /// a repeat.
    pub fn sign_vault_withdrawal(
        &mut self,
        caller: &Principal,
        vault_id: VaultId,
    ) -> Result<u32, VaultError> {
        self.sign(caller, vault_id)
            .map_err(|err| rejected("sign_vault_withdrawal", caller, err))
    }

    fn sign(&mut self, caller: &Principal, vault_id: VaultId) -> Result<u32, VaultError> {
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or(VaultError::VaultNotFound(vault_id))?;

        if !vault.signers.contains(caller) {
            return Err(VaultError::NotAuthorized {
                caller: caller.clone(),
                required: Role::Signer,
            });
        }

        self.signatures.record(vault_id, caller)?;
        let signatures = self.signatures.count(vault);

        let height = self.oracle.current_height();
        tracing::info!(vault_id, signer = %caller, signatures, "vault signed");
        self.events.push(EventRecord::new(
            height,
            LedgerEvent::VaultSigned {
                vault_id,
                signer: caller.clone(),
                signatures,
            },
        ));
        Ok(signatures)
    }

    // -----------------------------------------------------------------------
    // Withdrawal
    // -----------------------------------------------------------------------

    /// Releases a vault to its owner and deletes it. Returns the released
    /// record.
    ///
    /// Checks run in order: existence, ownership, unlock predicate, quorum.
    /// Token vaults then move their amount out of custody; NFT vaults skip
    /// the transfer.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultNotFound`], [`VaultError::NotAuthorized`],
    /// [`VaultError::VaultLocked`], [`VaultError::InsufficientSignatures`],
    /// or [`VaultError::TransferFailed`].
    pub fn withdraw_from_vault(
        &mut self,
        caller: &Principal,
        vault_id: VaultId,
    ) -> Result<Vault, VaultError> {
        self.withdraw(caller, vault_id)
            .map_err(|err| rejected("withdraw_from_vault", caller, err))
    }

    fn withdraw(&mut self, caller: &Principal, vault_id: VaultId) -> Result<Vault, VaultError> {
        let height = self.oracle.current_height();
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or(VaultError::VaultNotFound(vault_id))?;

        if *caller != vault.owner {
            return Err(VaultError::NotAuthorized {
                caller: caller.clone(),
                required: Role::VaultOwner,
            });
        }

        if !vault.is_unlocked_at(height) {
            return Err(VaultError::VaultLocked {
                vault_id,
                unlock_height: vault.unlock_height,
                current_height: height,
            });
        }

        let collected = self.signatures.count(vault);
        if collected < vault.required_signatures {
            return Err(VaultError::InsufficientSignatures {
                vault_id,
                collected,
                required: vault.required_signatures,
            });
        }

        if let Payload::Token(amount) = vault.payload {
            if let Err(err) =
                self.custody
                    .transfer(amount, &self.config.custody_account, &vault.owner)
            {
                tracing::warn!(vault_id, amount, error = %err, "release transfer refused");
                return Err(err.into());
            }
        }

        let phase = vault.phase_at(height);
        let released = match self.vaults.delete(vault_id) {
            Some(vault) => vault,
            None => return Err(VaultError::VaultNotFound(vault_id)),
        };
        self.signatures.purge(vault_id);

        tracing::info!(vault_id, owner = %released.owner, %phase, "vault released");
        self.events.push(EventRecord::new(
            height,
            LedgerEvent::VaultReleased {
                vault_id,
                owner: released.owner.clone(),
                payload: released.payload,
            },
        ));
        Ok(released)
    }

    // -----------------------------------------------------------------------
    // Admin
    // -----------------------------------------------------------------------

    /// Reassigns the arbitrator.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotAuthorized`] unless `caller` is the contract owner.
    pub fn set_arbitrator(
        &mut self,
        caller: &Principal,
        new_arbitrator: Principal,
    ) -> Result<(), VaultError> {
        let previous = self
            .admin
            .set_arbitrator(caller, new_arbitrator)
            .map_err(|err| rejected("set_arbitrator", caller, err))?;

        let current = self.admin.arbitrator().clone();
        tracing::info!(previous = %previous, current = %current, "arbitrator changed");
        self.events.push(EventRecord::new(
            self.oracle.current_height(),
            LedgerEvent::ArbitratorChanged { previous, current },
        ));
        Ok(())
    }

    /// Sets the emergency flag on a vault, opening its time lock for good.
    /// Setting it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotArbitrator`] (checked first), then
    /// [`VaultError::VaultNotFound`].
    pub fn initiate_emergency_unlock(
        &mut self,
        caller: &Principal,
        vault_id: VaultId,
    ) -> Result<(), VaultError> {
        self.emergency_unlock(caller, vault_id)
            .map_err(|err| rejected("initiate_emergency_unlock", caller, err))
    }

    fn emergency_unlock(&mut self, caller: &Principal, vault_id: VaultId) -> Result<(), VaultError> {
        self.admin.ensure_arbitrator(caller)?;

        let vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or(VaultError::VaultNotFound(vault_id))?;

        if vault.emergency_active {
            tracing::debug!(vault_id, "emergency unlock already active");
            return Ok(());
        }
        vault.emergency_active = true;

        let height = self.oracle.current_height();
        tracing::warn!(vault_id, arbitrator = %caller, height, "emergency unlock activated");
        self.events.push(EventRecord::new(
            height,
            LedgerEvent::EmergencyUnlocked {
                vault_id,
                arbitrator: caller.clone(),
            },
        ));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn lookup(&self, vault_id: VaultId) -> Result<&Vault, VaultError> {
        self.vaults
            .get(vault_id)
            .ok_or(VaultError::VaultNotFound(vault_id))
    }

    /// The live record for `vault_id`.
    pub fn get_vault_details(&self, vault_id: VaultId) -> Result<&Vault, VaultError> {
        self.lookup(vault_id)
    }

    /// Approvals collected from the vault's own signer set.
    pub fn get_signature_count(&self, vault_id: VaultId) -> Result<u32, VaultError> {
        Ok(self.signatures.count(self.lookup(vault_id)?))
    }

    /// Unlock predicate at the current height.
    pub fn is_vault_unlocked(&self, vault_id: VaultId) -> Result<bool, VaultError> {
        Ok(self
            .lookup(vault_id)?
            .is_unlocked_at(self.oracle.current_height()))
    }

    /// Whether `signer` approved `vault_id`. Absence, including of the vault
    /// itself, is `false` rather than an error.
    pub fn has_signed(&self, vault_id: VaultId, signer: &Principal) -> bool {
        self.vaults.get(vault_id).is_some() && self.signatures.has_signed(vault_id, signer)
    }

    /// Lifecycle phase at the current height.
    pub fn vault_phase(&self, vault_id: VaultId) -> Result<VaultPhase, VaultError> {
        Ok(self
            .lookup(vault_id)?
            .phase_at(self.oracle.current_height()))
    }

    /// Unlock predicate and quorum predicate together. Says nothing about
    /// who may withdraw.
    pub fn is_vault_withdrawable(&self, vault_id: VaultId) -> Result<bool, VaultError> {
        let vault = self.lookup(vault_id)?;
        Ok(vault.is_unlocked_at(self.oracle.current_height())
            && self.signatures.count(vault) >= vault.required_signatures)
    }

    /// Ids of live vaults in ascending order.
    pub fn vault_ids(&self) -> Vec<VaultId> {
        self.vaults.iter().map(|vault| vault.vault_id).collect()
    }

    /// Id the next successful creation will receive.
    pub fn next_vault_id(&self) -> VaultId {
        self.vaults.next_id()
    }

    /// Token amount currently held on behalf of live vaults.
    pub fn custodied_total(&self) -> u64 {
        self.vaults.custodied_total()
    }

    /// Identity that deployed the ledger.
    pub fn get_contract_owner(&self) -> &Principal {
        self.admin.contract_owner()
    }

    /// Identity currently allowed to trigger emergency unlocks.
    pub fn get_arbitrator(&self) -> &Principal {
        self.admin.arbitrator()
    }

    /// Height as reported by the oracle right now.
    pub fn current_height(&self) -> Height {
        self.oracle.current_height()
    }

    /// Deployment configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Host access
    // -----------------------------------------------------------------------

    /// Events recorded since the last drain. Borrowing does not release
    /// them; see [`VaultLedger::drain_events`].
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Hands the event log to the host and starts a fresh one.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    /// The height oracle.
    pub fn oracle(&self) -> &H {
        &self.oracle
    }

    /// The custody service.
    pub fn custody(&self) -> &C {
        &self.custody
    }
}

fn rejected(operation: &'static str, caller: &Principal, err: VaultError) -> VaultError {
    tracing::debug!(
        operation,
        caller = %caller,
        code = err.code(),
        error = %err,
        "operation rejected"
    );
    err
}
