// src/services/quorum_evaluator.rs
//! Quorum verification of challenge responses.
//!
//! Verification is compute-then-commit: the outstanding nonce is read, every
//! proof is checked without holding any lock, and only then is the challenge
//! consumed with a compare-and-remove on the nonce. A challenge re-issued while
//! proofs were being checked makes the commit fail, so a stale nonce can never
//! authenticate.

use crate::crypto::signature_verifier::SignatureVerifier;
use crate::error::{AuthError, Result};
use crate::models::challenge::{Decision, Proof};
use crate::models::did::{DidRecord, KeyEntry};
use crate::registry::key_registry::KeyRegistry;
use crate::services::challenge_store::ChallengeStore;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Orchestrates registry, challenge store and signature verifier.
///
/// Reads the registry and the store; the only write it performs is consuming
/// a challenge after a successful decision.
pub struct QuorumEvaluator {
    registry: Arc<KeyRegistry>,
    challenges: Arc<ChallengeStore>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl QuorumEvaluator {
    pub fn new(
        registry: Arc<KeyRegistry>,
        challenges: Arc<ChallengeStore>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        QuorumEvaluator {
            registry,
            challenges,
            verifier,
        }
    }

    /// Verifies `proofs` against the live challenge of `did`.
    ///
    /// # Returns
    /// - `Ok(decision)` with `authenticated == true` once at least `quorum`
    ///   distinct registered keys signed the nonce; the challenge is consumed
    /// - `Ok(decision)` with `authenticated == false` otherwise; the challenge
    ///   stays live so the caller can retry with more proofs
    ///
    /// # Errors
    /// - `AuthError::UnknownDid` if the DID is not registered
    /// - `AuthError::NoActiveChallenge` if there is no live challenge, or it was
    ///   re-issued or consumed while the proofs were being checked
    /// - `AuthError::ChallengeExpired` if the challenge outlived its TTL
    pub fn verify(&self, did: &str, proofs: &[Proof]) -> Result<Decision> {
        let record = self.registry.lookup(did)?;
        let challenge = self.challenges.peek(did)?;

        let decision = self.evaluate(&record, &challenge.nonce, proofs);

        if !decision.authenticated {
            info!("Quorum not met for {} ({})", did, decision.tally());
            return Ok(decision);
        }

        if !self.challenges.consume_if_matches(did, &challenge.nonce) {
            warn!("Challenge for {} changed during verification; rejecting", did);
            return Err(AuthError::NoActiveChallenge(did.to_string()));
        }

        info!("Authenticated {} ({})", did, decision.tally());
        Ok(decision)
    }

    /// Checks each proof against `record` over `nonce` and tallies distinct valid keys.
    ///
    /// Pure with respect to shared state. A proof naming an unknown key id, or
    /// carrying a signature that does not recover, is skipped; it never aborts
    /// the evaluation of the remaining proofs. A signer address counts at most
    /// once even if a record lists it under several ids.
    pub fn evaluate(&self, record: &DidRecord, nonce: &str, proofs: &[Proof]) -> Decision {
        let mut valid_keys = BTreeSet::new();
        let mut signers = HashSet::new();

        for proof in proofs {
            let Some(entry) = record.key(&proof.key_id) else {
                debug!("{}: ignoring proof for unknown key {:?}", record.did, proof.key_id);
                continue;
            };

            if valid_keys.contains(&entry.id) {
                continue;
            }

            if signers.contains(&entry.address) {
                debug!("{}: key {:?} repeats a counted signer", record.did, entry.id);
                continue;
            }

            if self.proof_matches(entry, nonce, proof) {
                signers.insert(entry.address.clone());
                valid_keys.insert(entry.id.clone());
            }
        }

        Decision {
            authenticated: valid_keys.len() >= record.quorum,
            valid_keys,
            quorum: record.quorum,
        }
    }

    fn proof_matches(&self, entry: &KeyEntry, nonce: &str, proof: &Proof) -> bool {
        match self.verifier.recover(nonce, &proof.signature) {
            // Both sides are canonical, so plain equality is the normalized comparison.
            Ok(recovered) => {
                let matched = recovered == entry.address;
                if !matched {
                    debug!("Key {:?}: signature recovered to a different signer", entry.id);
                }
                matched
            }
            Err(e) => {
                warn!("Key {:?}: {}", entry.id, e);
                false
            }
        }
    }

    /// Replaces the key set of `did` after authenticating with the current one.
    ///
    /// The new key set is validated before anything else, so bad input never
    /// burns a challenge. The proofs must sign the live challenge with a quorum
    /// of the *current* keys.
    ///
    /// # Errors
    /// - `AuthError::Validation` if the new key set is invalid
    /// - any error of [`QuorumEvaluator::verify`]
    /// - `AuthError::QuorumNotMet` if the current keys did not reach quorum;
    ///   the challenge stays live
    pub fn rotate(
        &self,
        did: &str,
        proofs: &[Proof],
        new_keys: Vec<KeyEntry>,
        new_quorum: usize,
    ) -> Result<Arc<DidRecord>> {
        let replacement = self.registry.build_record(did, new_keys, new_quorum)?;

        let decision = self.verify(did, proofs)?;
        if !decision.authenticated {
            return Err(AuthError::QuorumNotMet {
                valid: decision.valid_count(),
                required: decision.quorum,
            });
        }

        let record = self.registry.replace(replacement)?;
        info!(
            "Rotated keys for {} ({} keys, quorum: {})",
            record.did,
            record.keys.len(),
            record.quorum
        );
        Ok(record)
    }
}
