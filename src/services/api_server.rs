// src/services/api_server.rs
//! API Server for quorum DID authentication
//!
//! This module provides the REST API in front of the authentication core.
//! Handlers only translate JSON into core calls and core results into JSON;
//! every rule lives in the registry, challenge store and quorum evaluator.
//!
//! The API is built using Axum and includes endpoints for:
//! - DID registration with an M-of-N key set
//! - Challenge issuance
//! - Quorum verification of signed challenges
//! - Authenticated key rotation
//! - Diagnostics (registered DID listing, health)
//!
//! Errors are always returned as `{ "error": <kind>, "message": <text> }`.

use crate::error::AuthError;
use crate::models::challenge::{Challenge, Decision, Proof};
use crate::models::did::{DidRecord, DidSummary, KeyEntry};
use crate::registry::key_registry::KeyRegistry;
use crate::services::challenge_store::ChallengeStore;
use crate::services::quorum_evaluator::QuorumEvaluator;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// API request and response structures

/// Request payload for registering a DID
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RegisterRequest {
    did: String,
    #[serde(alias = "keys")]
    public_keys: Vec<KeyEntry>,
    quorum: usize,
}

/// Response for registration and rotation
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    success: bool,
    did: String,
    key_count: usize,
    quorum: usize,
    message: String,
}

impl RegisterResponse {
    fn from_record(record: &DidRecord, verb: &str) -> Self {
        RegisterResponse {
            success: true,
            did: record.did.clone(),
            key_count: record.keys.len(),
            quorum: record.quorum,
            message: format!(
                "DID {} {} with {} keys (quorum: {})",
                record.did,
                verb,
                record.keys.len(),
                record.quorum
            ),
        }
    }
}

/// Request payload for verifying a signed challenge
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct VerifyRequest {
    did: String,
    #[serde(alias = "signatures")]
    proofs: Vec<Proof>,
}

/// Response for a verification attempt
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<Decision> for VerifyResponse {
    fn from(decision: Decision) -> Self {
        if decision.authenticated {
            VerifyResponse {
                authenticated: true,
                message: Some(format!("{} valid signatures", decision.tally())),
                valid_keys: Some(decision.valid_keys.into_iter().collect()),
                reason: None,
            }
        } else {
            VerifyResponse {
                authenticated: false,
                valid_keys: None,
                message: None,
                reason: Some(format!("Quorum not met ({})", decision.tally())),
            }
        }
    }
}

/// Request payload for rotating the key set of a DID
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RotateRequest {
    did: String,
    #[serde(alias = "signatures")]
    proofs: Vec<Proof>,
    #[serde(alias = "keys")]
    public_keys: Vec<KeyEntry>,
    quorum: usize,
}

/// Structured failure body
#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Error returned by handlers
struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AuthError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownDid(_) => StatusCode::NOT_FOUND,
            AuthError::DidAlreadyRegistered(_) => StatusCode::CONFLICT,
            AuthError::NoActiveChallenge(_) => StatusCode::BAD_REQUEST,
            AuthError::ChallengeExpired(_) => StatusCode::GONE,
            AuthError::QuorumNotMet { .. } => StatusCode::UNAUTHORIZED,
        };

        let body = ErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// API server state containing the authentication core
#[derive(Clone)]
pub struct ApiServer {
    /// DID → keys and quorum
    registry: Arc<KeyRegistry>,

    /// DID → live challenge
    challenges: Arc<ChallengeStore>,

    /// Quorum decisions and rotation
    evaluator: Arc<QuorumEvaluator>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `registry` - Registered DIDs
    /// * `challenges` - Outstanding challenges
    /// * `evaluator` - Verifier built over the same registry and store
    pub fn new(
        registry: Arc<KeyRegistry>,
        challenges: Arc<ChallengeStore>,
        evaluator: Arc<QuorumEvaluator>,
    ) -> Self {
        ApiServer {
            registry,
            challenges,
            evaluator,
        }
    }

    /// Builds the router with every route and a permissive CORS layer.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/auth/register", post(Self::register_handler))
            .route("/auth/challenge/:did", get(Self::challenge_handler))
            .route("/auth/verify", post(Self::verify_handler))
            .route("/auth/rotate", post(Self::rotate_handler))
            .route("/auth/users", get(Self::list_users_handler))
            .route("/health", get(Self::health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and serves requests until the listener fails
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server running at http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Registration
    // =====================

    /// Registers a DID with its keys and quorum
    ///
    /// # Endpoint
    /// POST /auth/register
    ///
    /// # Request Body
    /// `{ "did", "publicKeys": [{ "id", "address" }], "quorum" }`
    ///
    /// # Responses
    /// - 200 OK: Registration summary
    /// - 400 Bad Request: Invalid input
    /// - 409 Conflict: DID already registered
    ///
    /// A challenge issued before an overwrite was meant for the previous key
    /// set and is dropped.
    async fn register_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<RegisterRequest>, JsonRejection>,
    ) -> ApiResult<RegisterResponse> {
        let Json(payload) = payload?;
        let record = state
            .registry
            .register(&payload.did, payload.public_keys, payload.quorum)?;
        state.challenges.consume(&record.did);
        Ok(Json(RegisterResponse::from_record(&record, "registered")))
    }

    // =====================
    // Challenge-Response
    // =====================

    /// Issues a fresh challenge, replacing any outstanding one
    ///
    /// # Endpoint
    /// GET /auth/challenge/:did
    ///
    /// # Responses
    /// - 200 OK: `{ "did", "nonce", "issuedAt", "expiresAt" }`
    /// - 404 Not Found: Unknown DID
    async fn challenge_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> ApiResult<Challenge> {
        Ok(Json(state.challenges.issue(&did)?))
    }

    /// Verifies signed challenge proofs against the DID's quorum
    ///
    /// # Endpoint
    /// POST /auth/verify
    ///
    /// # Request Body
    /// `{ "did", "proofs": [{ "keyId", "signature" }] }`
    ///
    /// # Responses
    /// - 200 OK: Decision; `authenticated` may be false when quorum is not met
    /// - 400 Bad Request: No active challenge
    /// - 404 Not Found: Unknown DID
    /// - 410 Gone: Challenge expired
    async fn verify_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<VerifyRequest>, JsonRejection>,
    ) -> ApiResult<VerifyResponse> {
        let Json(payload) = payload?;
        let decision = state.evaluator.verify(&payload.did, &payload.proofs)?;
        Ok(Json(decision.into()))
    }

    /// Replaces a DID's keys after a quorum of the current keys signs the challenge
    ///
    /// # Endpoint
    /// POST /auth/rotate
    ///
    /// # Request Body
    /// `{ "did", "proofs", "publicKeys", "quorum" }`
    ///
    /// # Responses
    /// - 200 OK: New registration summary
    /// - 401 Unauthorized: Quorum of current keys not met
    /// - plus every error of `/auth/verify` and `/auth/register`
    async fn rotate_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<RotateRequest>, JsonRejection>,
    ) -> ApiResult<RegisterResponse> {
        let Json(payload) = payload?;
        let record = state.evaluator.rotate(
            &payload.did,
            &payload.proofs,
            payload.public_keys,
            payload.quorum,
        )?;
        Ok(Json(RegisterResponse::from_record(&record, "rotated")))
    }

    // =====================
    // Diagnostics
    // =====================

    /// Lists registered DIDs without key material
    ///
    /// # Endpoint
    /// GET /auth/users
    async fn list_users_handler(State(state): State<Arc<ApiServer>>) -> Json<Vec<DidSummary>> {
        Json(state.registry.list())
    }

    async fn health_handler() -> impl IntoResponse {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}
