// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Ledger
//!
//! Time-locked, multi-signature custody of fungible amounts and NFT
//! identifiers, with an arbitrator who can override the time lock in an
//! emergency.
//!
//! A vault is created by its owner with an unlock height, a payload, and a
//! signer policy (up to five signers, a quorum no larger than that). Signers
//! approve; once the height is reached (or the arbitrator has flagged the
//! vault) and quorum is met, the owner withdraws and the vault is gone.
//!
//! ## Modules
//!
//! - **ledger** — [`VaultLedger`], the public operation surface.
//! - **store** — vault records, id nonce, signature facts.
//! - **admin** — contract owner and arbitrator.
//! - **custody** — the value-transfer seam and an in-memory balance book.
//! - **height** — the height-oracle seam and an in-process counter.
//! - **events** — audit log of successful mutations.
//! - **snapshot** — serializable ledger state.
//! - **config** — bounds and deployment configuration.
//!
//! ## Design Principles
//!
//! 1. A returned error means nothing changed. Checks run before writes, and
//!    the custody transfer runs after every check that could still fail.
//! 2. Ids come from a nonce that only moves forward.
//! 3. The host authenticates callers and keeps time; the ledger trusts both.
//! 4. Every stored type is serializable (serde) so the host can persist it.

#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod height;
pub mod ledger;
pub mod snapshot;
pub mod store;
pub mod types;

pub use admin::AdminState;
pub use config::{ConfigError, LedgerConfig, MAX_SIGNERS};
pub use custody::{CustodyError, CustodyService, InMemoryCustody};
pub use error::{Role, VaultError};
pub use events::{EventRecord, LedgerEvent};
pub use height::{BlockHeight, HeightOracle};
pub use ledger::VaultLedger;
pub use snapshot::{LedgerSnapshot, SnapshotError};
pub use types::{Height, NftId, Payload, Principal, SignerSet, Vault, VaultId, VaultPhase};
