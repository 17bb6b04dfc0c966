// src/crypto/signature_verifier.rs
//! Recoverable-signature verification.
//!
//! The quorum evaluator never sees a curve or a hash function: it asks a
//! [`SignatureVerifier`] which identifier signed a message and compares that
//! with the registered address. Swapping the scheme means providing another
//! implementation of the trait.

use crate::error::SignatureError;
use crate::utils::crypto::personal_message_hash;
use ethers::types::{Address, Signature, H256};
use std::str::FromStr;

/// Capability interface over one recoverable-signature scheme.
pub trait SignatureVerifier: Send + Sync {
    /// Recovers the canonical identifier of whoever signed `message`.
    ///
    /// # Errors
    /// `SignatureError::InvalidSignature` for malformed input. A well-formed
    /// signature over a different message is not an error: it recovers to some
    /// other identifier, which simply will not match.
    fn recover(&self, message: &str, signature: &str) -> Result<String, SignatureError>;

    /// Normalizes a registered identifier so it compares equal to [`recover`]'s output.
    ///
    /// [`recover`]: SignatureVerifier::recover
    fn canonicalize(&self, identifier: &str) -> Result<String, SignatureError>;
}

/// Ethereum `personal_sign` (EIP-191) over secp256k1.
///
/// # Signature Format
/// 65 bytes `r || s || v`, hex encoded, with or without `0x`. `v` may be
/// 0/1 or 27/28.
///
/// # Identifier Format
/// 20-byte address rendered as lowercase hex with `0x` prefix. Registration
/// accepts any casing, including EIP-55 checksummed addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct EthereumVerifier;

impl EthereumVerifier {
    pub fn new() -> Self {
        EthereumVerifier
    }

    /// Formats an Ethereum address as a lowercase hex string with 0x prefix.
    fn format_address(addr: Address) -> String {
        format!("0x{:x}", addr)
    }
}

impl SignatureVerifier for EthereumVerifier {
    fn recover(&self, message: &str, signature: &str) -> Result<String, SignatureError> {
        let signature = Signature::from_str(signature.trim())
            .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

        if !matches!(signature.v, 0 | 1 | 27 | 28) {
            return Err(SignatureError::InvalidSignature(format!(
                "unsupported recovery byte {}",
                signature.v
            )));
        }
        if signature.r.is_zero() || signature.s.is_zero() {
            return Err(SignatureError::InvalidSignature("zero scalar".into()));
        }

        let digest = H256::from(personal_message_hash(message.as_bytes()));
        let address = signature
            .recover(digest)
            .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

        Ok(Self::format_address(address))
    }

    fn canonicalize(&self, identifier: &str) -> Result<String, SignatureError> {
        let trimmed = identifier.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SignatureError::InvalidIdentifier(format!(
                "expected a 20-byte hex address, got {:?}",
                identifier
            )));
        }

        Address::from_str(hex_part)
            .map(Self::format_address)
            .map_err(|e| SignatureError::InvalidIdentifier(e.to_string()))
    }
}
