// src/utils/crypto.rs
//! Cryptographic hashing helpers for Ethereum-style message signing.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for all operations.

use ethers::utils::keccak256;

/// Prefix prepended to every message under the `personal_sign` convention (EIP-191).
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Computes the digest a wallet actually signs for a `personal_sign` message.
///
/// The message is prefixed with [`PERSONAL_MESSAGE_PREFIX`] followed by its
/// byte length in decimal, then hashed with Keccak-256. This is the digest
/// produced by `signMessage` in ethers.js and `encode_defunct` in eth-account,
/// so challenges signed by those wallets recover correctly.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    prefixed.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    prefixed.extend_from_slice(message.len().to_string().as_bytes());
    prefixed.extend_from_slice(message);
    hash_data(&prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::hash_message;

    #[test]
    fn personal_hash_matches_eip191() {
        for message in ["", "hello world", "0f1e2d3c4b5a69788796a5b4c3d2e1f0"] {
            assert_eq!(
                personal_message_hash(message.as_bytes()),
                hash_message(message).0
            );
        }
    }

    #[test]
    fn personal_hash_differs_from_plain_hash() {
        assert_ne!(personal_message_hash(b"nonce"), hash_data(b"nonce"));
    }
}
