//! Core types for the ledger
//!
//! All amounts are integer minor units. Balances, supply and reserves are
//! non-negative by construction; the signed type only exists so that callers
//! handing in a negative figure get a typed rejection instead of a wrap-around.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in minor units (e.g. cents)
pub type Amount = i64;

/// Account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identifier, which registration refuses
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// KYC status of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    /// Registered, nothing submitted yet
    #[default]
    Pending,
    /// KYC hash submitted, awaiting verification
    Submitted,
    /// Verified by the issuer
    Verified,
}

impl KycStatus {
    /// Wire code
    pub fn code(&self) -> &'static str {
        match self {
            KycStatus::Pending => "PENDING",
            KycStatus::Submitted => "SUBMITTED",
            KycStatus::Verified => "VERIFIED",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Fixed-shape account metadata. Holds attestations only, never raw PII.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetadata {
    /// Opaque KYC document hash supplied at submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_hash: Option<String>,
}

/// Ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Immutable identifier
    pub id: AccountId,
    /// KYC status
    pub kyc_status: KycStatus,
    /// Freeze flag
    pub frozen: bool,
    /// Sanction flag, independent of `frozen`
    pub sanctioned: bool,
    /// Balance in minor units
    pub balance: Amount,
    /// Attestation metadata
    #[serde(default)]
    pub metadata: AccountMetadata,
}

impl Account {
    /// Fresh account with registration defaults
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            kyc_status: KycStatus::Pending,
            frozen: false,
            sanctioned: false,
            balance: 0,
            metadata: AccountMetadata::default(),
        }
    }

    /// Read-only view handed to callers
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            kyc_status: self.kyc_status,
            frozen: self.frozen,
            sanctioned: self.sanctioned,
            balance: self.balance,
        }
    }
}

/// Account summary returned by listing queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    /// Account ID
    pub id: AccountId,
    /// KYC status
    pub kyc_status: KycStatus,
    /// Freeze flag
    pub frozen: bool,
    /// Sanction flag
    pub sanctioned: bool,
    /// Balance in minor units
    pub balance: Amount,
}

/// Aggregate ledger figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Outstanding supply
    pub supply: Amount,
    /// Attested reserves
    pub reserves: Amount,
    /// Registered accounts
    pub accounts: usize,
    /// Events in the log
    pub events: usize,
}

impl LedgerStats {
    /// Supply is fully backed by attested reserves
    pub fn is_fully_reserved(&self) -> bool {
        self.supply <= self.reserves
    }
}
