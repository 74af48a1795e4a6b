//! Error types for the Matrixon client SDK
//!
//! This module defines the error types used throughout the client SDK.
//! The server is not fully trusted to produce well-typed data, so most
//! malformed-payload conditions are normalized by the consuming code instead
//! of being surfaced here; the variants below cover the failures that callers
//! genuinely have to handle.

use thiserror::Error;

/// Matrixon client SDK error types
#[derive(Debug, Error)]
pub enum Error {
    /// A room has no `m.room.power_levels` state event, so permissions
    /// cannot be evaluated for it.
    #[error("No power level event found")]
    NoPowerLevelEvent,

    /// A crypto-dependent operation was invoked without an encryption
    /// engine configured on the client.
    #[error("End-to-end encryption is not enabled on this client")]
    CryptoNotEnabled,

    /// Room state could not be retrieved
    #[error("Room state unavailable: {0}")]
    StateUnavailable(String),

    /// A requested state event does not exist
    #[error("State event not found: {0}")]
    StateNotFound(String),

    /// Network or homeserver error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Client storage error
    #[error("Store error: {0}")]
    Store(String),

    /// Encryption engine error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Operation is not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for Matrixon client SDK operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
