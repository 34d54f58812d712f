//! USDw Ledger Core
//!
//! Regulated digital-currency ledger: account lifecycle, KYC gating,
//! freeze/sanction controls, reserve-backed minting and peer-to-peer transfer,
//! with every state change recorded as an immutable audit event.
//!
//! # Architecture
//!
//! - **Event Sourcing**: state changes only by applying events, so the log
//!   replays to the live state
//! - **Single Writer**: [`Ledger`] takes `&mut self`; [`actor`] serializes
//!   concurrent callers through one task
//! - **Capability Injection**: attestation signing sits behind
//!   [`AttestationSigner`]
//!
//! # Invariants
//!
//! - Money conservation: supply == Σ(balances) for all time
//! - Minting never lets supply exceed attested reserves
//! - Append-only: events are never modified or deleted
//! - Failed operations mutate nothing and emit nothing

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod events;
pub mod state;
pub mod canonical;
pub mod crypto;
pub mod attestation;
pub mod ledger;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{ComplianceReason, Error, Result};
pub use types::{Account, AccountId, AccountView, Amount, KycStatus, LedgerStats};
pub use events::{EventKind, LedgerEvent, TransferRecord};
pub use canonical::TravelRulePayload;
pub use attestation::{AttestationSigner, Ed25519Signer};
pub use ledger::{Ledger, TransferRequest};
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use config::Config;
