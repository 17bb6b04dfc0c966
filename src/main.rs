// src/main.rs

//! # Quorum DID Authentication - Main Entry Point
//!
//! Authenticates a decentralized identity controlled by several keys by
//! requiring that a quorum (M-of-N) of them sign a fresh, single-use
//! challenge.
//!
//! ## Architecture Overview
//! 1. **Registry Layer**: `KeyRegistry` holds each DID's keys and quorum
//! 2. **Services Layer**: `ChallengeStore`, `QuorumEvaluator` and the HTTP API
//! 3. **Cryptography Layer**: `SignatureVerifier` recovers signers from
//!    Ethereum `personal_sign` signatures
//!
//! ## Configuration
//! See [`config::Settings`]. Values come from defaults, an optional
//! `quorum-auth.toml`, `.env` and `QUORUM_AUTH__*` environment variables.
//! `RUST_LOG` overrides the configured log level.
//!
//! All state is in memory; restarting the process clears every DID and challenge.

use crate::config::Settings;
use crate::crypto::signature_verifier::{EthereumVerifier, SignatureVerifier};
use crate::registry::key_registry::KeyRegistry;
use crate::services::api_server::ApiServer;
use crate::services::challenge_store::{spawn_sweeper, ChallengeStore};
use crate::services::quorum_evaluator::QuorumEvaluator;
use anyhow::Context;
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod config;        // Layered settings
mod crypto;        // Signature recovery
mod error;         // Error taxonomy
mod models;        // Data structures
mod registry;      // DID key registry
mod services;      // Challenges, quorum evaluation and API
mod utils;         // Hashing helpers
#[cfg(test)]
mod test_utils;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and settings
/// 2. Initialize logging
/// 3. Build registry, challenge store and evaluator
/// 4. Start the expired-challenge sweeper
/// 5. Serve the API
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let settings = Settings::load().context("failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    let addr: SocketAddr = settings
        .server
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {:?}", settings.server.bind_address))?;

    // Initialize core components
    let verifier: Arc<dyn SignatureVerifier> = Arc::new(EthereumVerifier::new());
    let registry = Arc::new(KeyRegistry::new(
        verifier.clone(),
        settings.auth.registration_policy,
    ));
    let challenges = Arc::new(ChallengeStore::new(
        registry.clone(),
        settings.auth.challenge_ttl(),
    ));
    let evaluator = Arc::new(QuorumEvaluator::new(
        registry.clone(),
        challenges.clone(),
        verifier,
    ));

    let _sweeper = spawn_sweeper(challenges.clone(), settings.auth.sweep_interval());

    info!(
        "Challenge TTL {}s, registration policy {:?}",
        settings.auth.challenge_ttl_secs, settings.auth.registration_policy
    );
    info!("Available endpoints:");
    info!("- POST /auth/register");
    info!("- GET  /auth/challenge/:did");
    info!("- POST /auth/verify");
    info!("- POST /auth/rotate");
    info!("- GET  /auth/users");

    let api_server = ApiServer::new(registry, challenges, evaluator);
    api_server
        .run(addr)
        .await
        .context("API server terminated")?;

    Ok(())
}
