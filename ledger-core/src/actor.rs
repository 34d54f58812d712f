//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns the [`Ledger`]; every caller goes through its mailbox
//! - Each message runs to completion before the next is received, so
//!   check-then-act can never interleave across callers
//! - Attested transfers sign on the blocking pool between validation and
//!   commit; a signer error or timeout fails the transfer with nothing applied
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │                                                       │
//! │   Transfer: prepare ─► sign (spawn_blocking,          │
//! │             optional timeout) ─► commit               │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::Config,
    events::{LedgerEvent, TransferRecord},
    ledger::{into_attestation_error, Ledger, TransferRequest},
    types::{Account, AccountId, AccountView, Amount, LedgerStats},
    Error, Result,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

type Reply<T> = oneshot::Sender<T>;

/// Compliance flag change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagChange {
    /// Freeze the account
    Freeze,
    /// Lift a freeze
    Unfreeze,
    /// Sanction the account
    Sanction,
    /// Lift a sanction
    Unsanction,
}

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Register an account
    Register {
        id: AccountId,
        response: Reply<Result<bool>>,
    },

    /// Submit a KYC hash
    SubmitKyc {
        id: AccountId,
        kyc_hash: String,
        response: Reply<Result<()>>,
    },

    /// Verify KYC
    VerifyKyc {
        id: AccountId,
        response: Reply<Result<()>>,
    },

    /// Freeze / sanction flag change
    SetFlag {
        id: AccountId,
        change: FlagChange,
        response: Reply<Result<()>>,
    },

    /// Reserve report
    SetReserveReport {
        amount: Amount,
        response: Reply<Result<()>>,
    },

    /// Mint
    Mint {
        to: AccountId,
        amount: Amount,
        response: Reply<Result<()>>,
    },

    /// Transfer
    Transfer {
        request: TransferRequest,
        response: Reply<Result<TransferRecord>>,
    },

    /// Caller-logged rejection
    RecordBlockedTransfer {
        reason: String,
        response: Reply<Result<()>>,
    },

    /// List accounts
    ListAccounts {
        response: Reply<BTreeMap<AccountId, AccountView>>,
    },

    /// Balances
    Balances {
        response: Reply<BTreeMap<AccountId, Amount>>,
    },

    /// Single account
    GetAccount {
        id: AccountId,
        response: Reply<Result<Account>>,
    },

    /// Full event log
    Events {
        response: Reply<Vec<LedgerEvent>>,
    },

    /// Events for one account
    AccountHistory {
        id: AccountId,
        response: Reply<Result<Vec<LedgerEvent>>>,
    },

    /// Aggregate figures
    Stats {
        response: Reply<LedgerStats>,
    },

    /// Verify a transfer attestation
    VerifyAttestation {
        record: TransferRecord,
        response: Reply<Result<bool>>,
    },

    /// Run invariant checks
    CheckInvariants {
        response: Reply<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the ledger
#[derive(Debug)]
pub struct LedgerActor {
    /// The ledger (exclusively owned)
    ledger: Ledger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Attestation timeout
    attestation_timeout: Option<Duration>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        ledger: Ledger,
        mailbox: mpsc::Receiver<LedgerMessage>,
        attestation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            ledger,
            mailbox,
            attestation_timeout,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                tracing::info!("Ledger actor shutting down");
                break;
            }
            self.handle_message(msg).await;
        }
        tracing::debug!(events = self.ledger.events().len(), "Ledger actor stopped");
    }

    /// Handle a single message. A dropped reply channel only means the caller
    /// gave up waiting.
    async fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Register { id, response } => {
                let _ = response.send(self.ledger.register(id));
            }

            LedgerMessage::SubmitKyc {
                id,
                kyc_hash,
                response,
            } => {
                let _ = response.send(self.ledger.submit_kyc(id, kyc_hash));
            }

            LedgerMessage::VerifyKyc { id, response } => {
                let _ = response.send(self.ledger.verify_kyc(id));
            }

            LedgerMessage::SetFlag {
                id,
                change,
                response,
            } => {
                let result = match change {
                    FlagChange::Freeze => self.ledger.freeze_account(id),
                    FlagChange::Unfreeze => self.ledger.unfreeze_account(id),
                    FlagChange::Sanction => self.ledger.sanction_account(id),
                    FlagChange::Unsanction => self.ledger.unsanction_account(id),
                };
                let _ = response.send(result);
            }

            LedgerMessage::SetReserveReport { amount, response } => {
                let _ = response.send(self.ledger.set_reserve_report(amount));
            }

            LedgerMessage::Mint {
                to,
                amount,
                response,
            } => {
                let _ = response.send(self.ledger.mint(to, amount));
            }

            LedgerMessage::Transfer { request, response } => {
                let result = self.transfer(request).await;
                let _ = response.send(result);
            }

            LedgerMessage::RecordBlockedTransfer { reason, response } => {
                let _ = response.send(self.ledger.record_blocked_transfer(reason));
            }

            LedgerMessage::ListAccounts { response } => {
                let _ = response.send(self.ledger.list_accounts());
            }

            LedgerMessage::Balances { response } => {
                let _ = response.send(self.ledger.balances());
            }

            LedgerMessage::GetAccount { id, response } => {
                let _ = response.send(self.ledger.account(id));
            }

            LedgerMessage::Events { response } => {
                let _ = response.send(self.ledger.events().to_vec());
            }

            LedgerMessage::AccountHistory { id, response } => {
                let _ = response.send(self.ledger.account_history(id));
            }

            LedgerMessage::Stats { response } => {
                let _ = response.send(self.ledger.stats());
            }

            LedgerMessage::VerifyAttestation { record, response } => {
                let _ = response.send(self.ledger.verify_transfer_attestation(&record));
            }

            LedgerMessage::CheckInvariants { response } => {
                let _ = response.send(self.ledger.check_invariants());
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Prepare, sign off-thread, commit. No other message is processed until
    /// this returns.
    async fn transfer(&mut self, request: TransferRequest) -> Result<TransferRecord> {
        let prepared = self.ledger.prepare_transfer(&request)?;
        if !prepared.needs_attestation() {
            return self.ledger.commit_transfer(prepared, None);
        }

        let message = prepared.attestation_message().to_value()?;
        let signer = self.ledger.signer();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || signer.sign(&message));

        let joined = match self.attestation_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(self.ledger.rejected(
                        "transfer",
                        Error::Attestation(format!("signer timed out after {:?}", limit)),
                    ))
                }
            },
            None => task.await,
        };
        self.ledger
            .metrics()
            .record_attestation_duration(started.elapsed().as_secs_f64());

        let signature = match joined {
            Ok(Ok(signature)) => signature,
            Ok(Err(e)) => {
                return Err(self
                    .ledger
                    .rejected("transfer", into_attestation_error(e)))
            }
            Err(e) => {
                return Err(self.ledger.rejected(
                    "transfer",
                    Error::Attestation(format!("signer task failed: {}", e)),
                ))
            }
        };

        self.ledger.commit_transfer(prepared, Some(signature))
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> LedgerMessage) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Register an account
    pub async fn register(&self, id: impl Into<AccountId>) -> Result<bool> {
        let id = id.into();
        self.request(|response| LedgerMessage::Register { id, response })
            .await?
    }

    /// Submit a KYC hash
    pub async fn submit_kyc(
        &self,
        id: impl Into<AccountId>,
        kyc_hash: impl Into<String>,
    ) -> Result<()> {
        let (id, kyc_hash) = (id.into(), kyc_hash.into());
        self.request(|response| LedgerMessage::SubmitKyc {
            id,
            kyc_hash,
            response,
        })
        .await?
    }

    /// Verify KYC
    pub async fn verify_kyc(&self, id: impl Into<AccountId>) -> Result<()> {
        let id = id.into();
        self.request(|response| LedgerMessage::VerifyKyc { id, response })
            .await?
    }

    /// Apply a freeze / sanction flag change
    pub async fn set_flag(&self, id: impl Into<AccountId>, change: FlagChange) -> Result<()> {
        let id = id.into();
        self.request(|response| LedgerMessage::SetFlag {
            id,
            change,
            response,
        })
        .await?
    }

    /// Freeze an account
    pub async fn freeze_account(&self, id: impl Into<AccountId>) -> Result<()> {
        self.set_flag(id, FlagChange::Freeze).await
    }

    /// Unfreeze an account
    pub async fn unfreeze_account(&self, id: impl Into<AccountId>) -> Result<()> {
        self.set_flag(id, FlagChange::Unfreeze).await
    }

    /// Sanction an account
    pub async fn sanction_account(&self, id: impl Into<AccountId>) -> Result<()> {
        self.set_flag(id, FlagChange::Sanction).await
    }

    /// Lift a sanction
    pub async fn unsanction_account(&self, id: impl Into<AccountId>) -> Result<()> {
        self.set_flag(id, FlagChange::Unsanction).await
    }

    /// Record a reserve report
    pub async fn set_reserve_report(&self, amount: Amount) -> Result<()> {
        self.request(|response| LedgerMessage::SetReserveReport { amount, response })
            .await?
    }

    /// Mint
    pub async fn mint(&self, to: impl Into<AccountId>, amount: Amount) -> Result<()> {
        let to = to.into();
        self.request(|response| LedgerMessage::Mint {
            to,
            amount,
            response,
        })
        .await?
    }

    /// Transfer
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferRecord> {
        self.request(|response| LedgerMessage::Transfer { request, response })
            .await?
    }

    /// Append a caller-supplied `TransferBlocked` entry
    pub async fn record_blocked_transfer(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.request(|response| LedgerMessage::RecordBlockedTransfer { reason, response })
            .await?
    }

    /// All accounts keyed by ID
    pub async fn list_accounts(&self) -> Result<BTreeMap<AccountId, AccountView>> {
        self.request(|response| LedgerMessage::ListAccounts { response })
            .await
    }

    /// Balance per account
    pub async fn balances(&self) -> Result<BTreeMap<AccountId, Amount>> {
        self.request(|response| LedgerMessage::Balances { response })
            .await
    }

    /// Single account
    pub async fn account(&self, id: impl Into<AccountId>) -> Result<Account> {
        let id = id.into();
        self.request(|response| LedgerMessage::GetAccount { id, response })
            .await?
    }

    /// Snapshot of the event log
    pub async fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.request(|response| LedgerMessage::Events { response })
            .await
    }

    /// Events touching one account
    pub async fn account_history(&self, id: impl Into<AccountId>) -> Result<Vec<LedgerEvent>> {
        let id = id.into();
        self.request(|response| LedgerMessage::AccountHistory { id, response })
            .await?
    }

    /// Aggregate figures
    pub async fn stats(&self) -> Result<LedgerStats> {
        self.request(|response| LedgerMessage::Stats { response })
            .await
    }

    /// Verify a transfer attestation
    pub async fn verify_transfer_attestation(&self, record: TransferRecord) -> Result<bool> {
        self.request(|response| LedgerMessage::VerifyAttestation { record, response })
            .await?
    }

    /// Run invariant checks
    pub async fn check_invariants(&self) -> Result<()> {
        self.request(|response| LedgerMessage::CheckInvariants { response })
            .await?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    ledger: Ledger,
    mailbox_capacity: usize,
    attestation_timeout: Option<Duration>,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, rx, attestation_timeout);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

/// Build a ledger from configuration and spawn its actor
pub fn spawn_from_config(config: &Config) -> Result<LedgerHandle> {
    let ledger = Ledger::from_config(config)?;
    Ok(spawn_ledger_actor(
        ledger,
        config.actor.mailbox_capacity,
        config.attestation.timeout(),
    ))
}
