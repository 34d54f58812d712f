//! Ledger state derived from events
//!
//! # Invariants
//!
//! - Money conservation: `supply == Σ balances` for every reachable state
//! - Deterministic replay: same events → same state
//!
//! [`LedgerState::apply`] is the only place balances, flags and counters
//! change. The ledger validates an operation, then applies the event it is
//! about to append, so live state and replayed state go through the same code.

use crate::{
    events::{EventKind, LedgerEvent},
    types::{Account, AccountId, Amount, KycStatus},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account registry plus reserve/supply counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    reserves: Amount,
    supply: Amount,
}

impl LedgerState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by applying events in order
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a LedgerEvent>) -> Result<Self> {
        let mut state = Self::new();
        for event in events {
            state.apply(&event.kind).map_err(|e| {
                Error::InvariantViolation(format!(
                    "Replay failed at sequence {}: {}",
                    event.sequence, e
                ))
            })?;
        }
        Ok(state)
    }

    /// Apply one event. Checks run before any field is touched, so a failed
    /// apply leaves the state as it was.
    pub fn apply(&mut self, kind: &EventKind) -> Result<()> {
        match kind {
            EventKind::AccountRegistered { account_id } => {
                self.accounts
                    .entry(account_id.clone())
                    .or_insert_with(|| Account::new(account_id.clone()));
            }
            EventKind::KycUploaded {
                account_id,
                kyc_hash,
            } => {
                let account = self.account_mut(account_id)?;
                account.metadata.kyc_hash = Some(kyc_hash.clone());
                account.kyc_status = KycStatus::Submitted;
            }
            EventKind::KycVerified { account_id } => {
                self.account_mut(account_id)?.kyc_status = KycStatus::Verified;
            }
            EventKind::AccountFrozen { account_id } => {
                self.account_mut(account_id)?.frozen = true;
            }
            EventKind::AccountUnfrozen { account_id } => {
                self.account_mut(account_id)?.frozen = false;
            }
            EventKind::AccountSanctioned { account_id } => {
                self.account_mut(account_id)?.sanctioned = true;
            }
            EventKind::AccountUnsanctioned { account_id } => {
                self.account_mut(account_id)?.sanctioned = false;
            }
            EventKind::ReserveUpdated { reserves } => {
                if *reserves < 0 {
                    return Err(Error::InvalidAmount {
                        amount: *reserves,
                        reason: "reserves must be non-negative",
                    });
                }
                self.reserves = *reserves;
            }
            EventKind::Mint { to, amount, supply } => {
                if *amount <= 0 {
                    return Err(Error::InvalidAmount {
                        amount: *amount,
                        reason: "mint amount must be positive",
                    });
                }
                let new_supply = self.supply.checked_add(*amount).ok_or(Error::InvalidAmount {
                    amount: *amount,
                    reason: "supply overflow",
                })?;
                if new_supply != *supply {
                    return Err(Error::InvariantViolation(format!(
                        "Mint records supply {} but {} + {} = {}",
                        supply, self.supply, amount, new_supply
                    )));
                }
                self.account_mut(to)?.balance += amount;
                self.supply = new_supply;
            }
            EventKind::Transfer(record) => {
                let balance = self.account(&record.from)?.balance;
                self.account(&record.to)?;
                if record.amount < 0 || balance < record.amount {
                    return Err(Error::InsufficientFunds {
                        account_id: record.from.clone(),
                        balance,
                        requested: record.amount,
                    });
                }
                self.account_mut(&record.from)?.balance -= record.amount;
                self.account_mut(&record.to)?.balance += record.amount;
            }
            EventKind::TransferBlocked { .. } => {}
        }
        Ok(())
    }

    /// Look up an account
    pub fn account(&self, id: &AccountId) -> Result<&Account> {
        self.accounts.get(id).ok_or_else(|| Error::not_found(id))
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account> {
        self.accounts.get_mut(id).ok_or_else(|| Error::not_found(id))
    }

    /// Whether an account is registered
    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// All accounts, ordered by ID
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Number of registered accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Attested reserves
    pub fn reserves(&self) -> Amount {
        self.reserves
    }

    /// Outstanding supply
    pub fn supply(&self) -> Amount {
        self.supply
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Amount {
        self.accounts.values().map(|a| a.balance).sum()
    }

    /// Verify `supply == Σ balances` and that no balance is negative
    pub fn check_conservation(&self) -> Result<()> {
        if let Some(account) = self.accounts.values().find(|a| a.balance < 0) {
            return Err(Error::InvariantViolation(format!(
                "Account {} has negative balance {}",
                account.id, account.balance
            )));
        }
        let total = self.total_balance();
        if total != self.supply {
            return Err(Error::InvariantViolation(format!(
                "Supply {} does not match sum of balances {}",
                self.supply, total
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLog, TransferRecord};

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    #[test]
    fn test_apply_mint_and_transfer() {
        let mut state = LedgerState::new();
        state.apply(&EventKind::AccountRegistered { account_id: id("a") }).unwrap();
        state.apply(&EventKind::AccountRegistered { account_id: id("b") }).unwrap();
        state.apply(&EventKind::ReserveUpdated { reserves: 100 }).unwrap();
        state
            .apply(&EventKind::Mint { to: id("a"), amount: 60, supply: 60 })
            .unwrap();
        state
            .apply(&EventKind::Transfer(TransferRecord {
                from: id("a"),
                to: id("b"),
                amount: 25,
                travel_rule_hash: String::new(),
                signature: None,
            }))
            .unwrap();

        assert_eq!(state.account(&id("a")).unwrap().balance, 35);
        assert_eq!(state.account(&id("b")).unwrap().balance, 25);
        assert_eq!(state.supply(), 60);
        state.check_conservation().unwrap();
    }

    #[test]
    fn test_apply_rejects_inconsistent_mint() {
        let mut state = LedgerState::new();
        state.apply(&EventKind::AccountRegistered { account_id: id("a") }).unwrap();
        let err = state
            .apply(&EventKind::Mint { to: id("a"), amount: 10, supply: 99 })
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(state.account(&id("a")).unwrap().balance, 0);
    }

    #[test]
    fn test_apply_overdraft_leaves_state_untouched() {
        let mut state = LedgerState::new();
        state.apply(&EventKind::AccountRegistered { account_id: id("a") }).unwrap();
        state.apply(&EventKind::AccountRegistered { account_id: id("b") }).unwrap();
        let before = state.clone();

        let err = state
            .apply(&EventKind::Transfer(TransferRecord {
                from: id("a"),
                to: id("b"),
                amount: 1,
                travel_rule_hash: String::new(),
                signature: None,
            }))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_replay_reports_sequence() {
        let mut log = EventLog::new();
        log.append(EventKind::AccountRegistered { account_id: id("a") });
        log.append(EventKind::KycVerified { account_id: id("ghost") });

        let err = LedgerState::replay(log.read_all()).unwrap_err();
        assert!(err.to_string().contains("sequence 1"));
    }

    #[test]
    fn test_kyc_upload_sets_metadata() {
        let mut state = LedgerState::new();
        state.apply(&EventKind::AccountRegistered { account_id: id("a") }).unwrap();
        state
            .apply(&EventKind::KycUploaded { account_id: id("a"), kyc_hash: "h".into() })
            .unwrap();

        let account = state.account(&id("a")).unwrap();
        assert_eq!(account.kyc_status, KycStatus::Submitted);
        assert_eq!(account.metadata.kyc_hash.as_deref(), Some("h"));
    }
}
