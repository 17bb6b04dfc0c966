// src/services/challenge_store.rs
//! Single-use challenge issuance and tracking.
//!
//! Each registered DID has at most one live challenge. Its lifecycle:
//!
//! ```text
//! NoChallenge --issue--> Issued --consume / expire--> NoChallenge
//!                          |  ^
//!                          +--+ re-issue (new nonce replaces the old one)
//! ```
//!
//! Expired challenges are dropped lazily when peeked and periodically by
//! [`spawn_sweeper`].

use crate::error::{AuthError, Result};
use crate::models::challenge::Challenge;
use crate::registry::key_registry::KeyRegistry;
use chrono::{DateTime, Utc};
use ethers::utils::hex;
use log::{debug, info};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Nonce entropy in bytes (256 bits).
const NONCE_BYTES: usize = 32;

/// Thread-safe DID → live challenge map.
pub struct ChallengeStore {
    challenges: RwLock<HashMap<String, Challenge>>,
    registry: Arc<KeyRegistry>,
    ttl: chrono::Duration,
}

impl ChallengeStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `registry` - Consulted to refuse challenges for unregistered DIDs
    /// * `ttl` - How long an issued challenge stays valid
    pub fn new(registry: Arc<KeyRegistry>, ttl: Duration) -> Self {
        ChallengeStore {
            challenges: RwLock::new(HashMap::new()),
            registry,
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    /// Issues a fresh challenge for `did`, replacing any outstanding one.
    ///
    /// # Errors
    /// `AuthError::UnknownDid` if the DID is not registered.
    pub fn issue(&self, did: &str) -> Result<Challenge> {
        self.issue_at(did, Utc::now())
    }

    pub fn issue_at(&self, did: &str, now: DateTime<Utc>) -> Result<Challenge> {
        if !self.registry.contains(did) {
            return Err(AuthError::UnknownDid(did.to_string()));
        }

        let challenge = Challenge {
            did: did.to_string(),
            nonce: generate_nonce(),
            issued_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let replaced = self
            .challenges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(did.to_string(), challenge.clone())
            .is_some();

        info!(
            "Issued challenge for {} (expires {}{})",
            did,
            challenge.expires_at.to_rfc3339(),
            if replaced { ", replaced previous" } else { "" }
        );
        Ok(challenge)
    }

    /// Returns the live challenge for `did` without consuming it.
    ///
    /// # Errors
    /// - `AuthError::NoActiveChallenge` if none was issued or it was consumed
    /// - `AuthError::ChallengeExpired` if it outlived its TTL; the stale entry
    ///   is removed so the next peek reports `NoActiveChallenge`
    pub fn peek(&self, did: &str) -> Result<Challenge> {
        self.peek_at(did, Utc::now())
    }

    pub fn peek_at(&self, did: &str, now: DateTime<Utc>) -> Result<Challenge> {
        let challenge = self
            .challenges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(did)
            .cloned()
            .ok_or_else(|| AuthError::NoActiveChallenge(did.to_string()))?;

        if challenge.is_expired_at(now) {
            // Only evict the nonce we saw; a concurrent re-issue must survive.
            let mut challenges = self.challenges.write().unwrap_or_else(PoisonError::into_inner);
            if challenges.get(did).map(|c| c.nonce == challenge.nonce).unwrap_or(false) {
                challenges.remove(did);
            }
            debug!("Challenge for {} expired at {}", did, challenge.expires_at.to_rfc3339());
            return Err(AuthError::ChallengeExpired(did.to_string()));
        }

        Ok(challenge)
    }

    /// Removes the challenge for `did`. Removing an absent challenge is not an error.
    pub fn consume(&self, did: &str) {
        self.challenges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(did);
    }

    /// Atomically removes the challenge for `did` if and only if its nonce is
    /// still `nonce` and it has not expired.
    ///
    /// Returns `false` when the challenge was re-issued, consumed or expired
    /// since it was peeked; the caller must then treat the nonce as dead.
    pub fn consume_if_matches(&self, did: &str, nonce: &str) -> bool {
        self.consume_if_matches_at(did, nonce, Utc::now())
    }

    pub fn consume_if_matches_at(&self, did: &str, nonce: &str, now: DateTime<Utc>) -> bool {
        let mut challenges = self.challenges.write().unwrap_or_else(PoisonError::into_inner);
        let live = challenges
            .get(did)
            .map(|c| c.nonce == nonce && !c.is_expired_at(now))
            .unwrap_or(false);
        if live {
            challenges.remove(did);
        }
        live
    }

    /// Drops every challenge that has expired by `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut challenges = self.challenges.write().unwrap_or_else(PoisonError::into_inner);
        let before = challenges.len();
        challenges.retain(|_, challenge| !challenge.is_expired_at(now));
        before - challenges.len()
    }

    /// Number of challenges currently held, expired or not.
    pub fn len(&self) -> usize {
        self.challenges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Hex-encoded nonce drawn from the operating system CSPRNG.
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Spawns a background task that purges expired challenges every `interval`.
///
/// The task runs until the runtime shuts down or the handle is aborted.
pub fn spawn_sweeper(store: Arc<ChallengeStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired(Utc::now());
            if purged > 0 {
                debug!("Purged {} expired challenges, {} live", purged, store.len());
            }
        }
    })
}
