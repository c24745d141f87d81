//! Error types for stream validation.
//!
//! Errors fall in two groups. [`ValidationError`] is the expected outcome of
//! validating untrusted content (missing manifest, hash mismatch, policy
//! violation): it fails the track and is reported. Every other variant of
//! [`C2paError`] signals a parsing primitive or programming failure and is
//! re-raised to the caller after the track has been marked failed.

use serde::Serialize;
use thiserror::Error;

use crate::bmff::BmffError;
use crate::jumbf::JumbfError;

/// Result type for streamproof operations
pub type Result<T> = std::result::Result<T, C2paError>;

/// A domain validation failure.
///
/// Carries the track the failure belongs to (when known), a human-readable
/// message and optional context such as the offending URI or hash.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}{message}", track_prefix(.track))]
pub struct ValidationError {
    /// Track name, e.g. `video`
    pub track: Option<String>,
    /// Human-readable reason
    pub message: String,
    /// Extra diagnostic payload
    pub context: Option<String>,
}

fn track_prefix(track: &Option<String>) -> String {
    match track {
        Some(name) => format!("[{name}] "),
        None => String::new(),
    }
}

impl ValidationError {
    /// Create a validation error for the given track.
    pub fn new(track: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            track: Some(track.into()),
            message: message.into(),
            context: None,
        }
    }

    /// Create a validation error that is not tied to a track.
    pub fn untracked(message: impl Into<String>) -> Self {
        Self {
            track: None,
            message: message.into(),
            context: None,
        }
    }

    /// Attach diagnostic context.
    pub fn with_context(mut self, context: impl std::fmt::Display) -> Self {
        self.context = Some(context.to_string());
        self
    }

    /// Attach the track name if none was set yet.
    pub fn on_track(mut self, track: &str) -> Self {
        if self.track.is_none() {
            self.track = Some(track.to_string());
        }
        self
    }
}

/// Errors that can occur while validating a stream
#[derive(Debug, Error)]
pub enum C2paError {
    /// Expected validation failure of untrusted content
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed JUMBF manifest store
    #[error("JUMBF error: {0}")]
    Jumbf(#[from] JumbfError),

    /// Malformed ISO BMFF segment
    #[error("BMFF error: {0}")]
    Bmff(#[from] BmffError),

    /// CBOR decode or encode failure
    #[error("CBOR error: {0}")]
    Cbor(String),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    /// A spawned validation task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl C2paError {
    /// Whether this is an expected domain failure rather than a bug or a
    /// primitive parser failure.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The domain error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Attach a track name to a domain error that has none.
    pub fn on_track(self, track: &str) -> Self {
        match self {
            Self::Validation(err) => Self::Validation(err.on_track(track)),
            other => other,
        }
    }

    pub(crate) fn cbor(err: impl std::fmt::Display) -> Self {
        Self::Cbor(err.to_string())
    }
}
