// src/registry/key_registry.rs
//! In-memory registry of DIDs, their keys and quorum thresholds.
//!
//! The registry exclusively owns every [`DidRecord`]. Readers get a shared
//! snapshot (`Arc<DidRecord>`), so a verification in progress keeps evaluating
//! against the record it started with even if the DID is rotated meanwhile.

use crate::config::RegistrationPolicy;
use crate::crypto::signature_verifier::SignatureVerifier;
use crate::error::{AuthError, Result};
use crate::models::did::{DidRecord, DidSummary, KeyEntry};
use chrono::Utc;
use log::info;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe DID → record map.
pub struct KeyRegistry {
    records: RwLock<HashMap<String, Arc<DidRecord>>>,
    verifier: Arc<dyn SignatureVerifier>,
    policy: RegistrationPolicy,
}

impl KeyRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    /// * `verifier` - Used to canonicalize key addresses at registration time
    /// * `policy` - Behavior when an already registered DID registers again
    pub fn new(verifier: Arc<dyn SignatureVerifier>, policy: RegistrationPolicy) -> Self {
        KeyRegistry {
            records: RwLock::new(HashMap::new()),
            verifier,
            policy,
        }
    }

    /// Registers a DID with its keys and quorum.
    ///
    /// # Errors
    /// - `AuthError::Validation` if the input breaks a record invariant
    ///   (see [`KeyRegistry::build_record`])
    /// - `AuthError::DidAlreadyRegistered` if the DID exists and the policy is
    ///   [`RegistrationPolicy::Reject`]
    ///
    /// # Behavior
    /// Under [`RegistrationPolicy::Overwrite`] the previous record is replaced.
    pub fn register(
        &self,
        did: &str,
        keys: Vec<KeyEntry>,
        quorum: usize,
    ) -> Result<Arc<DidRecord>> {
        let record = Arc::new(self.build_record(did, keys, quorum)?);

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.did) {
            match self.policy {
                RegistrationPolicy::Reject => {
                    return Err(AuthError::DidAlreadyRegistered(record.did.clone()));
                }
                RegistrationPolicy::Overwrite => {
                    info!("Overwriting existing registration for {}", record.did);
                }
            }
        }
        records.insert(record.did.clone(), record.clone());

        info!(
            "Registered {} with {} keys (quorum: {})",
            record.did,
            record.keys.len(),
            record.quorum
        );
        Ok(record)
    }

    /// Replaces the record of an existing DID. Used by authenticated key rotation.
    pub fn replace(&self, record: DidRecord) -> Result<Arc<DidRecord>> {
        let record = Arc::new(record);
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(&record.did) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(AuthError::UnknownDid(record.did.clone())),
        }
    }

    /// Returns the current record for a DID.
    pub fn lookup(&self, did: &str) -> Result<Arc<DidRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(did)
            .cloned()
            .ok_or_else(|| AuthError::UnknownDid(did.to_string()))
    }

    pub fn contains(&self, did: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(did)
    }

    /// Lists every registered DID without key material, sorted by DID.
    pub fn list(&self) -> Vec<DidSummary> {
        let mut summaries: Vec<DidSummary> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|record| record.summary())
            .collect();
        summaries.sort_by(|a, b| a.did.cmp(&b.did));
        summaries
    }

    /// Validates input and produces a record with canonical addresses.
    ///
    /// Does not touch the registry, so rotation can validate the new key set
    /// before it authenticates.
    ///
    /// # Errors
    /// `AuthError::Validation` when:
    /// - `did` or a key id is blank or carries surrounding whitespace
    /// - `keys` is empty
    /// - a key id appears twice
    /// - an address is not a valid identifier for the signature scheme
    /// - two key ids resolve to the same address
    /// - `quorum` is outside `[1, keys.len()]`
    pub fn build_record(
        &self,
        did: &str,
        keys: Vec<KeyEntry>,
        quorum: usize,
    ) -> Result<DidRecord> {
        check_identifier("DID", did)?;
        if keys.is_empty() {
            return Err(AuthError::Validation("at least one public key is required".into()));
        }
        if quorum < 1 || quorum > keys.len() {
            return Err(AuthError::Validation(format!(
                "quorum must be between 1 and {}",
                keys.len()
            )));
        }

        let mut ids = HashSet::with_capacity(keys.len());
        let mut addresses = HashSet::with_capacity(keys.len());
        let mut canonical = Vec::with_capacity(keys.len());
        for KeyEntry { id, address } in keys {
            check_identifier("key id", &id)?;
            if !ids.insert(id.clone()) {
                return Err(AuthError::Validation(format!("duplicate key id {:?}", id)));
            }
            let address = self
                .verifier
                .canonicalize(&address)
                .map_err(|e| AuthError::Validation(format!("key {:?}: {}", id, e)))?;
            // One private key must never count twice towards the quorum.
            if !addresses.insert(address.clone()) {
                return Err(AuthError::Validation(format!(
                    "duplicate address {} (key {:?})",
                    address, id
                )));
            }
            canonical.push(KeyEntry { id, address });
        }

        Ok(DidRecord {
            did: did.to_string(),
            keys: canonical,
            quorum,
            registered_at: Utc::now(),
        })
    }
}

/// Identifiers are matched byte for byte, so padding is refused rather than trimmed.
fn check_identifier(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("{} must not be empty", what)));
    }
    if value.trim() != value {
        return Err(AuthError::Validation(format!(
            "{} {:?} has surrounding whitespace",
            what, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature_verifier::EthereumVerifier;
    use crate::test_utils::signers;

    fn registry(policy: RegistrationPolicy) -> KeyRegistry {
        KeyRegistry::new(Arc::new(EthereumVerifier::new()), policy)
    }

    fn keys(n: usize) -> Vec<KeyEntry> {
        signers(n).iter().map(|s| s.key_entry()).collect()
    }

    #[test]
    fn register_and_lookup() {
        let registry = registry(RegistrationPolicy::Reject);
        let keys = keys(3);

        registry.register("did:example:1", keys.clone(), 2).unwrap();

        let record = registry.lookup("did:example:1").unwrap();
        assert_eq!(record.keys, keys);
        assert_eq!(record.quorum, 2);
        assert!(registry.contains("did:example:1"));
    }

    #[test]
    fn lookup_unknown_did() {
        let registry = registry(RegistrationPolicy::Reject);
        assert_eq!(
            registry.lookup("did:example:missing").unwrap_err(),
            AuthError::UnknownDid("did:example:missing".into())
        );
    }

    #[test]
    fn quorum_must_be_in_range() {
        let registry = registry(RegistrationPolicy::Reject);

        for quorum in [0, 4, 100] {
            assert!(matches!(
                registry.register("did:example:1", keys(3), quorum),
                Err(AuthError::Validation(_))
            ));
        }
        for quorum in 1..=3 {
            let did = format!("did:example:q{quorum}");
            assert!(registry.register(&did, keys(3), quorum).is_ok());
        }
    }

    #[test]
    fn rejects_empty_did_and_empty_keys() {
        let registry = registry(RegistrationPolicy::Reject);

        assert!(matches!(
            registry.register("   ", keys(1), 1),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            registry.register("did:example:1", Vec::new(), 1),
            Err(AuthError::Validation(_))
        ));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn rejects_duplicate_key_ids() {
        let registry = registry(RegistrationPolicy::Reject);
        let mut keys = keys(2);
        keys[1].id = keys[0].id.clone();

        let err = registry.register("did:example:1", keys, 1).unwrap_err();
        assert!(matches!(err, AuthError::Validation(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_same_key_under_two_ids() {
        let registry = registry(RegistrationPolicy::Reject);
        let signer = &signers(1)[0];
        let keys = vec![
            KeyEntry {
                id: "a".into(),
                address: signer.address(),
            },
            KeyEntry {
                id: "b".into(),
                address: signer.address_upper(),
            },
        ];

        let err = registry.register("did:example:1", keys, 2).unwrap_err();
        assert!(matches!(err, AuthError::Validation(msg) if msg.contains("duplicate address")));
        assert!(!registry.contains("did:example:1"));
    }

    #[test]
    fn rejects_padded_identifiers() {
        let registry = registry(RegistrationPolicy::Reject);

        let err = registry.register("did:example:1 ", keys(1), 1).unwrap_err();
        assert!(matches!(err, AuthError::Validation(msg) if msg.contains("whitespace")));
        assert!(!registry.contains("did:example:1"));
        assert!(!registry.contains("did:example:1 "));

        let mut padded = keys(1);
        padded[0].id = " k1".into();
        assert!(matches!(
            registry.register("did:example:1", padded, 1),
            Err(AuthError::Validation(_))
        ));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn rejects_bad_addresses() {
        let registry = registry(RegistrationPolicy::Reject);
        let bad = vec![KeyEntry {
            id: "k1".into(),
            address: "not-an-address".into(),
        }];

        assert!(matches!(
            registry.register("did:example:1", bad, 1),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn stores_canonical_addresses() {
        let registry = registry(RegistrationPolicy::Reject);
        let signer = &signers(1)[0];
        let entry = KeyEntry {
            id: signer.id.clone(),
            address: signer.address_upper(),
        };

        let record = registry.register("did:example:1", vec![entry], 1).unwrap();
        assert_eq!(record.keys[0].address, signer.address());
    }

    #[test]
    fn reject_policy_refuses_re_registration() {
        let registry = registry(RegistrationPolicy::Reject);
        let original = keys(2);
        registry.register("did:example:1", original.clone(), 1).unwrap();

        assert_eq!(
            registry.register("did:example:1", keys(3), 2).unwrap_err(),
            AuthError::DidAlreadyRegistered("did:example:1".into())
        );
        assert_eq!(registry.lookup("did:example:1").unwrap().keys, original);
    }

    #[test]
    fn overwrite_policy_replaces_record() {
        let registry = registry(RegistrationPolicy::Overwrite);
        registry.register("did:example:1", keys(2), 1).unwrap();

        let replacement = keys(3);
        registry.register("did:example:1", replacement.clone(), 3).unwrap();

        let record = registry.lookup("did:example:1").unwrap();
        assert_eq!(record.keys, replacement);
        assert_eq!(record.quorum, 3);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn replace_requires_existing_did() {
        let registry = registry(RegistrationPolicy::Reject);
        let record = registry.build_record("did:example:1", keys(1), 1).unwrap();

        assert!(matches!(
            registry.replace(record.clone()),
            Err(AuthError::UnknownDid(_))
        ));

        registry.register("did:example:1", keys(2), 2).unwrap();
        registry.replace(record.clone()).unwrap();
        assert_eq!(*registry.lookup("did:example:1").unwrap(), record);
    }

    #[test]
    fn list_is_sorted_summary() {
        let registry = registry(RegistrationPolicy::Reject);
        registry.register("did:example:b", keys(3), 2).unwrap();
        registry.register("did:example:a", keys(1), 1).unwrap();

        let list = registry.list();
        assert_eq!(
            list,
            vec![
                DidSummary {
                    did: "did:example:a".into(),
                    key_count: 1,
                    quorum: 1,
                },
                DidSummary {
                    did: "did:example:b".into(),
                    key_count: 3,
                    quorum: 2,
                },
            ]
        );
    }
}
