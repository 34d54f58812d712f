//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// KYC policy
    pub kyc: KycPolicy,

    /// Attestation signer configuration
    pub attestation: AttestationConfig,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "usdw-ledger".to_string(),
            kyc: KycPolicy::default(),
            attestation: AttestationConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// KYC policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KycPolicy {
    /// Refuse `verify_kyc` unless the account is SUBMITTED.
    /// Off by default: the issuer may attest an account directly.
    pub require_submission_before_verify: bool,
}

/// Attestation signer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// Hex 32-byte Ed25519 seed; a random key is generated when absent
    pub key_seed_hex: Option<String>,

    /// Signing timeout (milliseconds) applied by the async handle
    pub timeout_ms: Option<u64>,
}

impl AttestationConfig {
    /// Signing timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Mailbox capacity (bounded for backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("LEDGER_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(flag) = std::env::var("LEDGER_KYC_REQUIRE_SUBMISSION") {
            config.kyc.require_submission_before_verify = parse_bool(&flag)?;
        }

        if let Ok(seed) = std::env::var("LEDGER_ATTESTATION_SEED") {
            config.attestation.key_seed_hex = Some(seed);
        }

        if let Ok(ms) = std::env::var("LEDGER_ATTESTATION_TIMEOUT_MS") {
            let ms = ms.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_ATTESTATION_TIMEOUT_MS: {}", e))
            })?;
            config.attestation.timeout_ms = Some(ms);
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(crate::Error::Config(format!("Invalid boolean: {}", other))),
    }
}
