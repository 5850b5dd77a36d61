//! Core types: configuration, errors, and the key-value store.

pub mod config;
pub mod errors;
pub mod kv;
