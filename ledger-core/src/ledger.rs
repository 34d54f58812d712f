//! Ledger core: the sole writer of ledger state
//!
//! Every mutating operation either validates, applies exactly one event to the
//! state and appends it to the log, or returns a typed error with no mutation
//! and no event. Rejections are logged and counted but never written to the
//! event log; a caller that wants an audit entry for a rejection uses
//! [`Ledger::record_blocked_transfer`].
//!
//! # Example
//!
//! ```
//! use usdw_ledger::{Ledger, TransferRequest, TravelRulePayload};
//!
//! let mut ledger = Ledger::with_generated_key();
//! ledger.register("alice")?;
//! ledger.register("bob")?;
//! ledger.verify_kyc("alice")?;
//! ledger.verify_kyc("bob")?;
//! ledger.set_reserve_report(1000)?;
//! ledger.mint("alice", 500)?;
//!
//! let payload = TravelRulePayload::new().with("sender", "alice").with("recipient", "bob");
//! let record = ledger.transfer(
//!     TransferRequest::new("alice", "bob", 120)
//!         .with_travel_rule(payload)
//!         .with_attestation(),
//! )?;
//! assert!(ledger.verify_transfer_attestation(&record)?);
//! # Ok::<(), usdw_ledger::Error>(())
//! ```

use crate::{
    attestation::{AttestationMessage, AttestationSigner, Ed25519Signer},
    canonical::TravelRulePayload,
    config::{Config, KycPolicy},
    crypto::KeyPair,
    error::ComplianceReason,
    events::{EventKind, EventLog, LedgerEvent, TransferRecord},
    metrics::Metrics,
    state::LedgerState,
    types::{Account, AccountId, AccountView, Amount, KycStatus, LedgerStats},
    Error, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Transfer instruction
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Sender
    pub from: AccountId,
    /// Recipient
    pub to: AccountId,
    /// Amount in minor units
    pub amount: Amount,
    /// Travel-rule metadata; only its hash is persisted
    pub travel_rule: Option<TravelRulePayload>,
    /// Request an issuer attestation signature
    pub attest: bool,
}

impl TransferRequest {
    /// Plain transfer without travel-rule data or attestation
    pub fn new(from: impl Into<AccountId>, to: impl Into<AccountId>, amount: Amount) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            travel_rule: None,
            attest: false,
        }
    }

    /// Attach travel-rule metadata
    pub fn with_travel_rule(mut self, payload: TravelRulePayload) -> Self {
        self.travel_rule = Some(payload);
        self
    }

    /// Request an attestation signature
    pub fn with_attestation(mut self) -> Self {
        self.attest = true;
        self
    }
}

/// Validated transfer awaiting its (optional) signature
///
/// Produced by [`Ledger::prepare_transfer`]; nothing has been mutated yet.
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    record: TransferRecord,
    attest: bool,
}

impl PreparedTransfer {
    /// Whether a signature must be attached before commit
    pub fn needs_attestation(&self) -> bool {
        self.attest
    }

    /// Canonical tuple the signer covers
    pub fn attestation_message(&self) -> AttestationMessage {
        AttestationMessage::from(&self.record)
    }

    /// Transfer payload as it will be recorded
    pub fn record(&self) -> &TransferRecord {
        &self.record
    }
}

/// Regulated ledger engine
#[derive(Debug)]
pub struct Ledger {
    /// Account registry and counters
    state: LedgerState,

    /// Audit log
    events: EventLog,

    /// Attestation capability
    signer: Arc<dyn AttestationSigner>,

    /// KYC verification policy
    kyc_policy: KycPolicy,

    /// Metrics collector
    metrics: Metrics,
}

impl Ledger {
    /// Empty ledger using the given signer
    pub fn new(signer: Arc<dyn AttestationSigner>) -> Self {
        Self {
            state: LedgerState::new(),
            events: EventLog::new(),
            signer,
            kyc_policy: KycPolicy::default(),
            metrics: Metrics::default(),
        }
    }

    /// Empty ledger with a freshly generated Ed25519 key
    pub fn with_generated_key() -> Self {
        Self::new(Arc::new(Ed25519Signer::generate()))
    }

    /// Empty ledger built from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let keypair = match &config.attestation.key_seed_hex {
            Some(seed) => KeyPair::from_hex_seed(seed)?,
            None => KeyPair::generate(),
        };
        let signer = Ed25519Signer::new(keypair);
        tracing::info!(
            service = %config.service_name,
            public_key = %signer.public_key_hex(),
            strict_kyc = config.kyc.require_submission_before_verify,
            "Ledger initialized"
        );
        Ok(Self::new(Arc::new(signer)).with_kyc_policy(config.kyc.clone()))
    }

    /// Override the KYC policy
    pub fn with_kyc_policy(mut self, policy: KycPolicy) -> Self {
        self.kyc_policy = policy;
        self
    }

    /// Attestation signer in use
    pub fn signer(&self) -> Arc<dyn AttestationSigner> {
        Arc::clone(&self.signer)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // ------------------------------------------------------------------
    // Lifecycle and compliance flags
    // ------------------------------------------------------------------

    /// Register an account. Returns `false` (and emits nothing) when the ID
    /// already exists.
    pub fn register(&mut self, id: impl Into<AccountId>) -> Result<bool> {
        let id = id.into();
        if id.is_empty() {
            return Err(self.rejected("register", Error::InvalidAccountId(id.to_string())));
        }
        if self.state.contains(&id) {
            tracing::debug!(account = %id, "Account already registered");
            return Ok(false);
        }
        self.commit(EventKind::AccountRegistered { account_id: id })?;
        Ok(true)
    }

    /// Store a KYC attestation hash and mark the account SUBMITTED
    pub fn submit_kyc(&mut self, id: impl Into<AccountId>, kyc_hash: impl Into<String>) -> Result<()> {
        let id = self.existing("submit_kyc", id.into())?;
        self.commit(EventKind::KycUploaded {
            account_id: id,
            kyc_hash: kyc_hash.into(),
        })
    }

    /// Mark the account VERIFIED
    ///
    /// Under the default policy no prior submission is required. With
    /// `require_submission_before_verify`, the account must be SUBMITTED
    /// (or already VERIFIED).
    pub fn verify_kyc(&mut self, id: impl Into<AccountId>) -> Result<()> {
        let id = self.existing("verify_kyc", id.into())?;
        if self.kyc_policy.require_submission_before_verify {
            let status = self.state.account(&id)?.kyc_status;
            if status == KycStatus::Pending {
                return Err(self.rejected(
                    "verify_kyc",
                    Error::compliance(&id, ComplianceReason::KycNotSubmitted(status)),
                ));
            }
        }
        self.commit(EventKind::KycVerified { account_id: id })
    }

    /// Freeze an account. Re-freezing still emits an event.
    pub fn freeze_account(&mut self, id: impl Into<AccountId>) -> Result<()> {
        let id = self.existing("freeze_account", id.into())?;
        self.commit(EventKind::AccountFrozen { account_id: id })
    }

    /// Lift a freeze. Always emits an event.
    pub fn unfreeze_account(&mut self, id: impl Into<AccountId>) -> Result<()> {
        let id = self.existing("unfreeze_account", id.into())?;
        self.commit(EventKind::AccountUnfrozen { account_id: id })
    }

    /// Sanction an account. Always emits an event.
    pub fn sanction_account(&mut self, id: impl Into<AccountId>) -> Result<()> {
        let id = self.existing("sanction_account", id.into())?;
        self.commit(EventKind::AccountSanctioned { account_id: id })
    }

    /// Lift a sanction. Always emits an event.
    pub fn unsanction_account(&mut self, id: impl Into<AccountId>) -> Result<()> {
        let id = self.existing("unsanction_account", id.into())?;
        self.commit(EventKind::AccountUnsanctioned { account_id: id })
    }

    // ------------------------------------------------------------------
    // Reserves, mint, transfer
    // ------------------------------------------------------------------

    /// Record the issuer's reserve attestation. Reserves below current supply
    /// are accepted; they only block further minting.
    pub fn set_reserve_report(&mut self, amount: Amount) -> Result<()> {
        if amount < 0 {
            return Err(self.rejected(
                "set_reserve_report",
                Error::InvalidAmount {
                    amount,
                    reason: "reserves must be non-negative",
                },
            ));
        }
        if amount < self.state.supply() {
            tracing::warn!(
                reserves = amount,
                supply = self.state.supply(),
                "Reserve report below outstanding supply; minting blocked"
            );
        }
        self.commit(EventKind::ReserveUpdated { reserves: amount })
    }

    /// Issue new supply to a verified, unrestricted account
    pub fn mint(&mut self, to: impl Into<AccountId>, amount: Amount) -> Result<()> {
        let to = to.into();
        let supply = self
            .check_mint(&to, amount)
            .map_err(|e| self.rejected("mint", e))?;
        self.commit(EventKind::Mint { to, amount, supply })
    }

    /// Preconditions in order; returns the supply after the mint
    fn check_mint(&self, to: &AccountId, amount: Amount) -> Result<Amount> {
        if amount <= 0 {
            return Err(Error::InvalidAmount {
                amount,
                reason: "mint amount must be positive",
            });
        }

        let supply = self.state.supply();
        let reserves = self.state.reserves();
        let new_supply = match supply.checked_add(amount) {
            Some(s) if s <= reserves => s,
            _ => {
                return Err(Error::ReserveExceeded {
                    amount,
                    supply,
                    reserves,
                })
            }
        };

        let account = self.state.account(to)?;
        if account.kyc_status != KycStatus::Verified {
            return Err(Error::compliance(
                to,
                ComplianceReason::KycNotVerified(account.kyc_status),
            ));
        }
        if account.frozen {
            return Err(Error::compliance(to, ComplianceReason::Frozen));
        }
        if account.sanctioned {
            return Err(Error::compliance(to, ComplianceReason::Sanctioned));
        }

        Ok(new_supply)
    }

    /// Move funds between two verified, unrestricted accounts
    ///
    /// Returns the recorded transfer payload. When attestation is requested the
    /// signature is obtained before anything is committed; a signer failure
    /// fails the whole transfer.
    pub fn transfer(&mut self, request: TransferRequest) -> Result<TransferRecord> {
        let prepared = self.prepare_transfer(&request)?;
        let signature = if prepared.needs_attestation() {
            let message = prepared.attestation_message();
            let started = Instant::now();
            let signed = message
                .to_value()
                .and_then(|value| self.signer.sign(&value));
            self.metrics
                .record_attestation_duration(started.elapsed().as_secs_f64());
            Some(signed.map_err(|e| self.rejected("transfer", into_attestation_error(e)))?)
        } else {
            None
        };
        self.commit_transfer(prepared, signature)
    }

    /// Validate a transfer and compute its travel-rule hash without mutating
    /// anything
    pub fn prepare_transfer(&self, request: &TransferRequest) -> Result<PreparedTransfer> {
        self.check_transfer(&request.from, &request.to, request.amount)
            .map_err(|e| self.rejected("transfer", e))?;

        let travel_rule_hash = match &request.travel_rule {
            Some(payload) if !payload.is_empty() => payload
                .hash()
                .map_err(|e| self.rejected("transfer", e))?,
            _ => String::new(),
        };

        Ok(PreparedTransfer {
            record: TransferRecord {
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount,
                travel_rule_hash,
                signature: None,
            },
            attest: request.attest,
        })
    }

    /// Commit a prepared transfer. Preconditions are checked again, so a stale
    /// preparation can never overdraw or bypass a freeze.
    pub fn commit_transfer(
        &mut self,
        prepared: PreparedTransfer,
        signature: Option<String>,
    ) -> Result<TransferRecord> {
        let PreparedTransfer { mut record, attest } = prepared;
        if attest && signature.is_none() {
            return Err(self.rejected(
                "transfer",
                Error::Attestation("attestation requested but no signature supplied".to_string()),
            ));
        }
        self.check_transfer(&record.from, &record.to, record.amount)
            .map_err(|e| self.rejected("transfer", e))?;

        record.signature = signature;
        self.commit(EventKind::Transfer(record.clone()))?;
        Ok(record)
    }

    /// Preconditions in order: existence, KYC, freeze, sanction, amount, funds
    fn check_transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        let sender = self.state.account(from)?;
        let recipient = self.state.account(to)?;
        let parties = [sender, recipient];

        for account in parties {
            if account.kyc_status != KycStatus::Verified {
                return Err(Error::compliance(
                    &account.id,
                    ComplianceReason::KycNotVerified(account.kyc_status),
                ));
            }
        }
        for account in parties {
            if account.frozen {
                return Err(Error::compliance(&account.id, ComplianceReason::Frozen));
            }
        }
        for account in parties {
            if account.sanctioned {
                return Err(Error::compliance(&account.id, ComplianceReason::Sanctioned));
            }
        }

        if amount <= 0 {
            return Err(Error::InvalidAmount {
                amount,
                reason: "transfer amount must be positive",
            });
        }
        if sender.balance < amount {
            return Err(Error::InsufficientFunds {
                account_id: from.clone(),
                balance: sender.balance,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Append a caller-supplied `TransferBlocked` audit entry. The core never
    /// calls this on its own.
    pub fn record_blocked_transfer(&mut self, reason: impl Into<String>) -> Result<()> {
        self.commit(EventKind::TransferBlocked {
            reason: reason.into(),
        })
    }

    // ------------------------------------------------------------------
    // Queries (read-only)
    // ------------------------------------------------------------------

    /// All accounts keyed by ID
    pub fn list_accounts(&self) -> BTreeMap<AccountId, AccountView> {
        self.state
            .accounts()
            .map(|a| (a.id.clone(), a.view()))
            .collect()
    }

    /// Balance per account
    pub fn balances(&self) -> BTreeMap<AccountId, Amount> {
        self.state
            .accounts()
            .map(|a| (a.id.clone(), a.balance))
            .collect()
    }

    /// Full account record, including metadata
    pub fn account(&self, id: impl Into<AccountId>) -> Result<Account> {
        self.state.account(&id.into()).cloned()
    }

    /// Full event log in audit order
    pub fn events(&self) -> &[LedgerEvent] {
        self.events.read_all()
    }

    /// Events touching one account, in audit order
    pub fn account_history(&self, id: impl Into<AccountId>) -> Result<Vec<LedgerEvent>> {
        let id = id.into();
        self.state.account(&id)?;
        Ok(self.events.history_for(&id).cloned().collect())
    }

    /// Read-only state snapshot
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Outstanding supply
    pub fn supply(&self) -> Amount {
        self.state.supply()
    }

    /// Attested reserves
    pub fn reserves(&self) -> Amount {
        self.state.reserves()
    }

    /// Aggregate figures
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            supply: self.state.supply(),
            reserves: self.state.reserves(),
            accounts: self.state.account_count(),
            events: self.events.len(),
        }
    }

    /// Check an attached signature against the canonical transfer tuple.
    /// Unsigned records verify as `false`.
    pub fn verify_transfer_attestation(&self, record: &TransferRecord) -> Result<bool> {
        let Some(signature) = &record.signature else {
            return Ok(false);
        };
        let message = AttestationMessage::from(record).to_value()?;
        Ok(self.signer.verify(&message, signature))
    }

    /// Verify money conservation and that replaying the log reproduces the
    /// live state
    pub fn check_invariants(&self) -> Result<()> {
        self.state.check_conservation()?;
        let replayed = LedgerState::replay(self.events.read_all())?;
        if replayed != self.state {
            return Err(Error::InvariantViolation(
                "Replayed state diverges from live state".to_string(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Apply to state, then append. Apply checks before mutating, so a failure
    /// leaves both untouched.
    fn commit(&mut self, kind: EventKind) -> Result<()> {
        self.state.apply(&kind)?;
        let event = self.events.append(kind);
        tracing::info!(
            sequence = event.sequence,
            event_type = event.kind.event_type(),
            supply = self.state.supply(),
            reserves = self.state.reserves(),
            "Committed event"
        );
        self.metrics.record_event(event.kind.event_type());
        self.metrics
            .update_totals(self.state.supply(), self.state.reserves());
        Ok(())
    }

    fn existing(&self, operation: &'static str, id: AccountId) -> Result<AccountId> {
        if self.state.contains(&id) {
            Ok(id)
        } else {
            Err(self.rejected(operation, Error::not_found(&id)))
        }
    }

    pub(crate) fn rejected(&self, operation: &'static str, err: Error) -> Error {
        tracing::warn!(operation, kind = err.kind(), error = %err, "Operation rejected");
        self.metrics.record_rejection(err.kind());
        err
    }
}

pub(crate) fn into_attestation_error(err: Error) -> Error {
    match err {
        Error::Attestation(_) => err,
        other => Error::Attestation(other.to_string()),
    }
}
