// src/services/mod.rs
pub mod api_server;
pub mod challenge_store;
pub mod quorum_evaluator;
