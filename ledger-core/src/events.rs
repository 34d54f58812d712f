//! Append-only event log
//!
//! Every committed state transition lands here as exactly one [`LedgerEvent`].
//! Sequence numbers are assigned on append, start at zero and never repeat;
//! nothing is reordered or removed once appended.

use crate::types::{AccountId, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event payload, discriminated by `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// New account created
    AccountRegistered {
        /// Account
        account_id: AccountId,
    },
    /// KYC hash submitted
    #[serde(rename = "KYCUploaded")]
    KycUploaded {
        /// Account
        account_id: AccountId,
        /// Opaque KYC attestation hash
        kyc_hash: String,
    },
    /// KYC verified by issuer
    #[serde(rename = "KYCVerified")]
    KycVerified {
        /// Account
        account_id: AccountId,
    },
    /// Freeze applied
    AccountFrozen {
        /// Account
        account_id: AccountId,
    },
    /// Freeze lifted
    AccountUnfrozen {
        /// Account
        account_id: AccountId,
    },
    /// Sanction applied
    AccountSanctioned {
        /// Account
        account_id: AccountId,
    },
    /// Sanction lifted
    AccountUnsanctioned {
        /// Account
        account_id: AccountId,
    },
    /// New reserve report
    ReserveUpdated {
        /// Attested reserves
        reserves: Amount,
    },
    /// Supply issued to an account
    Mint {
        /// Recipient
        to: AccountId,
        /// Minted amount
        amount: Amount,
        /// Supply after the mint
        supply: Amount,
    },
    /// Peer-to-peer transfer
    Transfer(TransferRecord),
    /// Rejection logged by a caller; carries no state change
    TransferBlocked {
        /// Human-readable rejection reason
        reason: String,
    },
}

impl EventKind {
    /// Wire tag of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::AccountRegistered { .. } => "AccountRegistered",
            EventKind::KycUploaded { .. } => "KYCUploaded",
            EventKind::KycVerified { .. } => "KYCVerified",
            EventKind::AccountFrozen { .. } => "AccountFrozen",
            EventKind::AccountUnfrozen { .. } => "AccountUnfrozen",
            EventKind::AccountSanctioned { .. } => "AccountSanctioned",
            EventKind::AccountUnsanctioned { .. } => "AccountUnsanctioned",
            EventKind::ReserveUpdated { .. } => "ReserveUpdated",
            EventKind::Mint { .. } => "Mint",
            EventKind::Transfer(_) => "Transfer",
            EventKind::TransferBlocked { .. } => "TransferBlocked",
        }
    }

    /// Whether the event touches the given account
    pub fn involves(&self, account: &AccountId) -> bool {
        match self {
            EventKind::AccountRegistered { account_id }
            | EventKind::KycUploaded { account_id, .. }
            | EventKind::KycVerified { account_id }
            | EventKind::AccountFrozen { account_id }
            | EventKind::AccountUnfrozen { account_id }
            | EventKind::AccountSanctioned { account_id }
            | EventKind::AccountUnsanctioned { account_id } => account_id == account,
            EventKind::Mint { to, .. } => to == account,
            EventKind::Transfer(record) => &record.from == account || &record.to == account,
            EventKind::ReserveUpdated { .. } | EventKind::TransferBlocked { .. } => false,
        }
    }
}

/// Payload of a committed transfer, also returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Sender
    pub from: AccountId,
    /// Recipient
    pub to: AccountId,
    /// Transferred amount
    pub amount: Amount,
    /// Hex SHA-256 of the canonical travel-rule payload, empty when none was supplied
    pub travel_rule_hash: String,
    /// Hex attestation signature over the canonical transfer tuple
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Immutable log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Position in the log (audit ordering)
    pub sequence: u64,
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,
    /// Wall-clock time of the append
    pub recorded_at: DateTime<Utc>,
    /// Typed payload
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Append-only ordered event store
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return the stored record
    pub fn append(&mut self, kind: EventKind) -> &LedgerEvent {
        let event = LedgerEvent {
            sequence: self.events.len() as u64,
            event_id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            kind,
        };
        tracing::debug!(
            sequence = event.sequence,
            event_type = event.kind.event_type(),
            "Appended event"
        );
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// All events in insertion order
    pub fn read_all(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Event at a sequence number
    pub fn get(&self, sequence: u64) -> Option<&LedgerEvent> {
        usize::try_from(sequence)
            .ok()
            .and_then(|idx| self.events.get(idx))
    }

    /// Events touching one account, in log order
    pub fn history_for<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> impl Iterator<Item = &'a LedgerEvent> + 'a {
        self.events.iter().filter(move |e| e.kind.involves(account))
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
