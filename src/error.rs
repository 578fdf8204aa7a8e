//! Unified error handling for the location-relay library.
//!
//! Delivery outcomes (success, transient failure, auth failure) are values, not
//! errors; this type covers the local failures that stop an operation before it
//! reaches the pipeline.

use thiserror::Error;

/// Unified error type for location-relay operations.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Delivery requested without a complete credential triple; no network call
    /// is made in this case.
    #[error("Tokens not available")]
    CredentialsMissing,

    /// The position source has no fix to report yet.
    #[error("Location not available")]
    LocationUnavailable,

    /// OS-level location permission was refused or revoked.
    #[error("Location permission denied: {message}")]
    PermissionDenied { message: String },

    /// The position source failed to start or deliver updates.
    #[error("Position source error: {message}")]
    Source { message: String },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },
}

/// Result type alias for location-relay operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
