// src/registry/mod.rs
pub mod key_registry;
