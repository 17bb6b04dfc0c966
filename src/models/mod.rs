// src/models/mod.rs
//! Data structures shared by the registry, challenge store and API layer.

pub mod challenge;
pub mod did;
