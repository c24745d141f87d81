//! Validator configuration
//!
//! Loaded from environment variables with defaults suitable for a player
//! integration.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Tracks never validated (default: `audio`)
    pub skip_tracks: Vec<String>,
    /// Instant used for certificate validity checks (default: now)
    pub verify_time: Option<DateTime<Utc>>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            skip_tracks: vec!["audio".to_string()],
            verify_time: None,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let skip_tracks = lookup("STREAMPROOF_SKIP_TRACKS")
            .map(|tracks| parse_track_list(&tracks))
            .unwrap_or(defaults.skip_tracks);

        let verify_time = lookup("STREAMPROOF_VERIFY_TIME").and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Ignoring invalid STREAMPROOF_VERIFY_TIME");
                    None
                }
            }
        });

        Self {
            skip_tracks,
            verify_time,
        }
    }

    pub fn with_skip_tracks<I, S>(mut self, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_tracks = tracks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_verify_time(mut self, at: DateTime<Utc>) -> Self {
        self.verify_time = Some(at);
        self
    }

    pub fn skips(&self, track: &str) -> bool {
        self.skip_tracks.iter().any(|t| t == track)
    }
}

fn parse_track_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
