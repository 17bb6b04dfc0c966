// src/models/did.rs
//! Decentralized Identifier (DID) data model for quorum authentication.
//!
//! A DID is controlled by several keys at once. Each key is registered under a
//! short identifier that is unique within the DID, and the record carries the
//! quorum: how many distinct keys must sign a challenge before the DID is
//! considered authenticated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single registered public key.
///
/// # Fields
/// - `id`: Key identifier, unique within its DID (e.g. "key1", "laptop")
/// - `address`: Canonical identifier of the public key as produced by the
///   signature verifier (a lowercase `0x`-prefixed Ethereum address)
///
/// # Wire Format
/// Older clients send the address under `key`; both names are accepted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Key identifier
    /// Example: "key1"
    pub id: String,

    /// Canonical public-key identifier
    /// Example: "0x9858effd232b4033e47d90003d41ec34ecaeda94"
    #[serde(alias = "key")]
    pub address: String,
}

/// The stored state of one registered DID.
///
/// # Invariants
/// - `keys` is non-empty and key ids are unique
/// - `1 <= quorum <= keys.len()`
/// - every `address` is in canonical form
///
/// Records are only built through [`crate::registry::key_registry::KeyRegistry`],
/// which enforces the invariants above.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DidRecord {
    /// The complete DID string identifier
    /// Example: "did:example:1"
    pub did: String,

    /// Registered keys, in registration order
    pub keys: Vec<KeyEntry>,

    /// Minimum number of distinct keys that must sign a challenge
    pub quorum: usize,

    /// When the current key set was registered (or rotated in)
    pub registered_at: DateTime<Utc>,
}

impl DidRecord {
    /// Finds a registered key by its identifier.
    pub fn key(&self, key_id: &str) -> Option<&KeyEntry> {
        self.keys.iter().find(|k| k.id == key_id)
    }

    /// Diagnostic summary without key material.
    pub fn summary(&self) -> DidSummary {
        DidSummary {
            did: self.did.clone(),
            key_count: self.keys.len(),
            quorum: self.quorum,
        }
    }
}

/// Public listing entry for a registered DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidSummary {
    pub did: String,
    pub key_count: usize,
    pub quorum: usize,
}
