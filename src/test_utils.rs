// src/test_utils.rs
//! Test-only wallet that signs challenges the way a client wallet would.
//!
//! Mirrors `personal_sign`: Keccak-256 over the EIP-191 prefixed message,
//! secp256k1 recoverable ECDSA, 65-byte `r || s || v` hex output.

use crate::models::challenge::Proof;
use crate::models::did::KeyEntry;
use crate::utils::crypto::personal_message_hash;
use ethers::utils::{hex, secret_key_to_address};
use k256::ecdsa::SigningKey;
use k256::SecretKey;

/// A freshly generated secp256k1 key standing in for one of a DID's devices.
pub struct TestSigner {
    pub id: String,
    secret_key: SecretKey,
}

impl TestSigner {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            secret_key: SecretKey::random(&mut rand::thread_rng()),
        }
    }

    /// Checksum-free lowercase `0x` address of this key.
    pub fn address(&self) -> String {
        let address = secret_key_to_address(&SigningKey::from(&self.secret_key));
        format!("0x{:x}", address)
    }

    /// Same address with uppercase hex digits, to exercise case-insensitive matching.
    pub fn address_upper(&self) -> String {
        format!("0x{}", self.address()[2..].to_uppercase())
    }

    pub fn key_entry(&self) -> KeyEntry {
        KeyEntry {
            id: self.id.clone(),
            address: self.address(),
        }
    }

    pub fn sign(&self, message: &str) -> String {
        let hash = personal_message_hash(message.as_bytes());
        let signing_key = SigningKey::from(&self.secret_key);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&hash)
            .expect("Failed to sign message hash");

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(bytes))
    }

    pub fn proof(&self, message: &str) -> Proof {
        Proof {
            key_id: self.id.clone(),
            signature: self.sign(message),
        }
    }
}

/// Signers named `k1..=kn`.
pub fn signers(n: usize) -> Vec<TestSigner> {
    (1..=n).map(|i| TestSigner::new(&format!("k{i}"))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Signature, H256};
    use std::str::FromStr;

    #[test]
    fn address_matches_recovered_signer() {
        let signer = TestSigner::new("k1");
        let address = signer.address();
        assert_eq!(address.len(), 42);
        assert!(address.starts_with("0x"));
        assert_eq!(address, address.to_lowercase());

        let signature = Signature::from_str(&signer.sign("nonce")).unwrap();
        let recovered = signature
            .recover(H256::from(personal_message_hash(b"nonce")))
            .unwrap();
        assert_eq!(format!("0x{:x}", recovered), address);
    }
}
