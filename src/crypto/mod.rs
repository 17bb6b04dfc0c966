// src/crypto/mod.rs
//! Signature recovery behind a scheme-agnostic interface.

pub mod signature_verifier;
