// src/models/challenge.rs
//! Challenge, proof and decision types for the challenge-response protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single-use nonce issued to a DID.
///
/// At most one challenge is live per DID. Issuing a new one replaces the
/// previous nonce, which then can no longer be used to authenticate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// DID the challenge was issued to
    pub did: String,

    /// Opaque random token; the exact string is the signed message
    pub nonce: String,

    /// Issue time
    pub issued_at: DateTime<Utc>,

    /// After this instant the challenge is treated as absent
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Evidence of control over one registered key.
///
/// Not persisted. The signature format is whatever the configured
/// [`crate::crypto::signature_verifier::SignatureVerifier`] understands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub key_id: String,
    pub signature: String,
}

/// Outcome of a quorum verification.
///
/// A negative decision is a normal result, not an error: the challenge stays
/// live and the caller may retry with more proofs before it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub authenticated: bool,
    /// Distinct key ids whose proofs matched, sorted
    pub valid_keys: BTreeSet<String>,
    pub quorum: usize,
}

impl Decision {
    pub fn valid_count(&self) -> usize {
        self.valid_keys.len()
    }

    /// Human-readable `valid/quorum` count, safe to return to callers.
    pub fn tally(&self) -> String {
        format!("{}/{}", self.valid_count(), self.quorum)
    }
}
