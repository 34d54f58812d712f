//! USDw ledger runner: applies a JSON-lines command script and prints the
//! resulting event log

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use usdw_ledger::{
    actor::spawn_from_config, AccountId, Amount, Config, LedgerHandle, TransferRequest,
    TravelRulePayload,
};

#[derive(Parser)]
#[command(name = "usdw-ledger", about = "Run a command script against a fresh USDw ledger")]
struct Cli {
    /// JSON-lines script, one command per line (`#` starts a comment)
    script: PathBuf,

    /// TOML configuration file; environment variables are used when absent
    #[arg(long, env = "LEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Append a TransferBlocked event for every rejected transfer
    #[arg(long)]
    log_blocked: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// One script line
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    Register { id: AccountId },
    SubmitKyc { id: AccountId, kyc_hash: String },
    VerifyKyc { id: AccountId },
    Freeze { id: AccountId },
    Unfreeze { id: AccountId },
    Sanction { id: AccountId },
    Unsanction { id: AccountId },
    SetReserveReport { amount: Amount },
    Mint { to: AccountId, amount: Amount },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
        #[serde(default)]
        travel_rule: Option<serde_json::Map<String, serde_json::Value>>,
        #[serde(default)]
        attest: bool,
    },
}

async fn apply(handle: &LedgerHandle, command: Command, log_blocked: bool) -> usdw_ledger::Result<()> {
    match command {
        Command::Register { id } => handle.register(id).await.map(|_| ()),
        Command::SubmitKyc { id, kyc_hash } => handle.submit_kyc(id, kyc_hash).await,
        Command::VerifyKyc { id } => handle.verify_kyc(id).await,
        Command::Freeze { id } => handle.freeze_account(id).await,
        Command::Unfreeze { id } => handle.unfreeze_account(id).await,
        Command::Sanction { id } => handle.sanction_account(id).await,
        Command::Unsanction { id } => handle.unsanction_account(id).await,
        Command::SetReserveReport { amount } => handle.set_reserve_report(amount).await,
        Command::Mint { to, amount } => handle.mint(to, amount).await,
        Command::Transfer {
            from,
            to,
            amount,
            travel_rule,
            attest,
        } => {
            let mut request = TransferRequest::new(from, to, amount);
            if let Some(payload) = travel_rule {
                request = request.with_travel_rule(TravelRulePayload::from(payload));
            }
            if attest {
                request = request.with_attestation();
            }
            match handle.transfer(request).await {
                Ok(_) => Ok(()),
                Err(e) if log_blocked => {
                    handle.record_blocked_transfer(e.to_string()).await?;
                    Err(e)
                }
                Err(e) => Err(e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env()?,
    };

    let script = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("reading script {}", cli.script.display()))?;

    let handle = spawn_from_config(&config)?;
    tracing::info!(script = %cli.script.display(), "Running ledger script");

    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: Command = serde_json::from_str(line)
            .with_context(|| format!("line {}: malformed command", index + 1))?;
        if let Err(e) = apply(&handle, command, cli.log_blocked).await {
            tracing::warn!(line = index + 1, kind = e.kind(), "{}", e);
        }
    }

    handle.check_invariants().await?;
    let stats = handle.stats().await?;
    tracing::info!(
        supply = stats.supply,
        reserves = stats.reserves,
        accounts = stats.accounts,
        events = stats.events,
        "Script complete"
    );

    let events = handle.events().await?;
    println!("{}", serde_json::to_string_pretty(&events)?);

    handle.shutdown().await?;
    Ok(())
}
