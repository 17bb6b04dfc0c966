// src/error.rs
//! Error taxonomy for the quorum authentication core.
//!
//! Request-level failures abort the whole call and are surfaced to the caller
//! as a structured failure. Per-proof failures live in [`SignatureError`] and
//! never escape the quorum evaluator: a bad proof is skipped, not fatal.

use thiserror::Error;

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Request-level errors raised by the registry, challenge store and evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Registration input rejected (empty DID, empty key set, quorum out of range...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The DID has never been registered
    #[error("Unknown DID: {0}")]
    UnknownDid(String),

    /// Re-registration refused under the `reject` policy
    #[error("DID already registered: {0}")]
    DidAlreadyRegistered(String),

    /// No live challenge: never issued, already consumed, or superseded
    #[error("No active challenge for DID: {0}")]
    NoActiveChallenge(String),

    /// The outstanding challenge outlived its TTL
    #[error("Challenge expired for DID: {0}")]
    ChallengeExpired(String),

    /// Only raised by key rotation; a plain verify reports this as a negative decision
    #[error("Quorum not met ({valid}/{required})")]
    QuorumNotMet { valid: usize, required: usize },
}

impl AuthError {
    /// Stable machine-readable name, used as the `error` field on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "ValidationError",
            AuthError::UnknownDid(_) => "UnknownDID",
            AuthError::DidAlreadyRegistered(_) => "DIDAlreadyRegistered",
            AuthError::NoActiveChallenge(_) => "NoActiveChallenge",
            AuthError::ChallengeExpired(_) => "ChallengeExpired",
            AuthError::QuorumNotMet { .. } => "QuorumNotMet",
        }
    }
}

/// Per-proof failure from the signature recovery primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_wire_names() {
        assert_eq!(AuthError::UnknownDid("d".into()).kind(), "UnknownDID");
        assert_eq!(AuthError::NoActiveChallenge("d".into()).kind(), "NoActiveChallenge");
        assert_eq!(
            AuthError::QuorumNotMet { valid: 1, required: 2 }.to_string(),
            "Quorum not met (1/2)"
        );
    }
}
