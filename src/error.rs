//! Error types for keyshard
//!
//! Per-datagram problems never surface here: the delivery loop absorbs them.
//! These errors cover construction-time failures (files, sockets, identity)
//! and workers that stop without finishing their run.

use thiserror::Error;

/// Result type alias using KeyshardError
pub type Result<T> = std::result::Result<T, KeyshardError>;

/// Unified error type for keyshard operations
#[derive(Debug, Error)]
pub enum KeyshardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Identity Errors
    // -------------------------------------------------------------------------
    #[error("Identity error: {0}")]
    Identity(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    // -------------------------------------------------------------------------
    // Worker Errors
    // -------------------------------------------------------------------------
    #[error("Worker error: {0}")]
    Worker(String),
}
