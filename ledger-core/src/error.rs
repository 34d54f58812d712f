//! Error types for the ledger

use crate::types::{AccountId, Amount, KycStatus};
use std::fmt;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every domain variant is a permanent rejection of one call: the ledger state
/// and the event log are untouched when an operation returns one of these.
#[derive(Error, Debug)]
pub enum Error {
    /// Account is not registered
    #[error("Account {account_id} not found")]
    NotFound {
        /// Requested account
        account_id: AccountId,
    },

    /// Amount is out of range for the operation
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// Offending amount
        amount: Amount,
        /// What the operation requires
        reason: &'static str,
    },

    /// Minting would push supply above attested reserves
    #[error("Mint of {amount} blocked: supply {supply} would exceed reserves {reserves}")]
    ReserveExceeded {
        /// Requested mint amount
        amount: Amount,
        /// Supply before the mint
        supply: Amount,
        /// Attested reserves
        reserves: Amount,
    },

    /// KYC / freeze / sanction gate failed
    #[error("Compliance violation on account {account_id}: {reason}")]
    ComplianceViolation {
        /// Account that failed the gate
        account_id: AccountId,
        /// Which gate failed
        reason: ComplianceReason,
    },

    /// Sender balance does not cover the transfer
    #[error("Insufficient funds on {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Sender account
        account_id: AccountId,
        /// Current balance
        balance: Amount,
        /// Requested transfer amount
        requested: Amount,
    },

    /// Account identifier is empty
    #[error("Invalid account id: {0:?}")]
    InvalidAccountId(String),

    /// Attestation signer failed or timed out
    #[error("Attestation failed: {0}")]
    Attestation(String),

    /// Invariant violation (supply != sum of balances, replay mismatch)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::InvalidAmount { .. } => "invalid_amount",
            Error::ReserveExceeded { .. } => "reserve_exceeded",
            Error::ComplianceViolation { .. } => "compliance_violation",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::InvalidAccountId(_) => "invalid_account_id",
            Error::Attestation(_) => "attestation",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }

    pub(crate) fn not_found(account_id: &AccountId) -> Self {
        Error::NotFound {
            account_id: account_id.clone(),
        }
    }

    pub(crate) fn compliance(account_id: &AccountId, reason: ComplianceReason) -> Self {
        Error::ComplianceViolation {
            account_id: account_id.clone(),
            reason,
        }
    }
}

/// Reason attached to [`Error::ComplianceViolation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceReason {
    /// KYC status is not VERIFIED
    KycNotVerified(KycStatus),
    /// Account is frozen
    Frozen,
    /// Account is sanctioned
    Sanctioned,
    /// Verification attempted before KYC was submitted (strict policy only)
    KycNotSubmitted(KycStatus),
}

impl fmt::Display for ComplianceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceReason::KycNotVerified(status) => {
                write!(f, "KYC status is {}, VERIFIED required", status)
            }
            ComplianceReason::Frozen => write!(f, "account is frozen"),
            ComplianceReason::Sanctioned => write!(f, "account is sanctioned"),
            ComplianceReason::KycNotSubmitted(status) => {
                write!(f, "KYC status is {}, SUBMITTED required before verification", status)
            }
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}
