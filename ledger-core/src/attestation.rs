//! Attestation signer capability
//!
//! The ledger only needs two operations from a signer: `sign` and `verify`.
//! Both take the message as a JSON value and canonicalize it before touching
//! the key, so the signed bytes never depend on field insertion order.
//!
//! - Default: [`Ed25519Signer`] (software Ed25519, deterministic per key)
//! - Anything else (HSM, post-quantum scheme) plugs in behind the same trait

use crate::{
    canonical::to_canonical_bytes,
    crypto::KeyPair,
    events::TransferRecord,
    types::{AccountId, Amount},
    Error, Result,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Signing capability injected into the ledger
pub trait AttestationSigner: Send + Sync + fmt::Debug {
    /// Sign the canonical form of `message`, returning a hex signature
    fn sign(&self, message: &Value) -> Result<String>;

    /// Check a hex signature over the canonical form of `message`.
    /// Malformed signatures yield `false`, never an error.
    fn verify(&self, message: &Value, signature: &str) -> bool;
}

/// Canonical transfer tuple covered by an attestation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMessage {
    /// Sender
    pub from: AccountId,
    /// Recipient
    pub to: AccountId,
    /// Amount
    pub amount: Amount,
    /// Travel-rule hash (empty when absent)
    pub travel_rule_hash: String,
}

impl AttestationMessage {
    /// JSON value handed to the signer
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl From<&TransferRecord> for AttestationMessage {
    fn from(record: &TransferRecord) -> Self {
        Self {
            from: record.from.clone(),
            to: record.to.clone(),
            amount: record.amount,
            travel_rule_hash: record.travel_rule_hash.clone(),
        }
    }
}

/// Software Ed25519 signer
pub struct Ed25519Signer {
    keypair: KeyPair,
}

impl Ed25519Signer {
    /// Signer over an existing key pair
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Signer with a freshly generated key
    pub fn generate() -> Self {
        Self::new(KeyPair::generate())
    }

    /// Hex public key, for auditors verifying out of band
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public_key())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl AttestationSigner for Ed25519Signer {
    fn sign(&self, message: &Value) -> Result<String> {
        let bytes = to_canonical_bytes(message)
            .map_err(|e| Error::Attestation(format!("Cannot canonicalize message: {}", e)))?;
        Ok(hex::encode(self.keypair.sign(&bytes)))
    }

    fn verify(&self, message: &Value, signature: &str) -> bool {
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match to_canonical_bytes(message) {
            Ok(bytes) => self.keypair.verify(&bytes, &signature),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> AttestationMessage {
        AttestationMessage {
            from: AccountId::new("alice"),
            to: AccountId::new("bob"),
            amount: 120,
            travel_rule_hash: "abc".to_string(),
        }
    }

    #[test]
    fn test_message_field_names() {
        let value = message().to_value().unwrap();
        assert_eq!(
            value,
            json!({"from": "alice", "to": "bob", "amount": 120, "travelRuleHash": "abc"})
        );
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = Ed25519Signer::new(KeyPair::from_seed(&[3u8; 32]));
        let value = message().to_value().unwrap();

        let signature = signer.sign(&value).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(signer.verify(&value, &signature));
        assert_eq!(signer.sign(&value).unwrap(), signature);
    }

    #[test]
    fn test_verify_is_order_independent() {
        let signer = Ed25519Signer::generate();
        let signature = signer
            .sign(&json!({"from": "a", "to": "b", "amount": 1, "travelRuleHash": ""}))
            .unwrap();
        assert!(signer.verify(
            &json!({"travelRuleHash": "", "amount": 1, "to": "b", "from": "a"}),
            &signature
        ));
    }

    #[test]
    fn test_verify_rejects_bad_input() {
        let signer = Ed25519Signer::generate();
        let value = message().to_value().unwrap();
        let signature = signer.sign(&value).unwrap();

        assert!(!signer.verify(&value, "not hex"));
        assert!(!signer.verify(&value, "abcd"));
        assert!(!signer.verify(&json!({"from": "mallory"}), &signature));

        let other = Ed25519Signer::generate();
        assert!(!other.verify(&value, &signature));
    }
}
