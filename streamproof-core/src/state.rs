//! Per-track validation state and the events reported to the host.
//!
//! A track moves through [`TrackStatus`] only via the named operations on
//! [`TrackState`]; each one enforces the transition table:
//!
//! | to           | allowed from                              |
//! |--------------|-------------------------------------------|
//! | `Validating` | `Unstarted`, `Validating`, `Succeed`      |
//! | `Succeed`    | `Unstarted`, `Validating`, `Succeed`      |
//! | `NoData`     | any state except `Failed`                 |
//! | `Failed`     | any state (sticky)                        |

use serde::Serialize;

use crate::error::ValidationError;

/// Validation status of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum TrackStatus {
    /// No init segment processed yet
    #[default]
    Unstarted,
    /// Init segment pipeline in progress
    Validating,
    Succeed,
    Failed,
    /// The init segment carries no c2pa box
    NoData,
}

impl TrackStatus {
    /// Whether segments for the track are still processed.
    pub fn should_run(self) -> bool {
        matches!(self, Self::Unstarted | Self::Validating | Self::Succeed)
    }

    /// Whether a track in `self` may move to `next`.
    pub fn can_transition(self, next: TrackStatus) -> bool {
        match next {
            Self::Unstarted => self == Self::Unstarted,
            Self::Validating | Self::Succeed => {
                matches!(self, Self::Unstarted | Self::Validating | Self::Succeed)
            }
            Self::NoData => self != Self::Failed,
            Self::Failed => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "Unstarted",
            Self::Validating => "Validating",
            Self::Succeed => "Succeed",
            Self::Failed => "Failed",
            Self::NoData => "NoData",
        }
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a validated manifest claim, reported with `Succeed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimSummary {
    /// Claim generator
    pub name: String,
    pub date: Option<String>,
    pub thumbnail: Option<String>,
    /// Status of the track when the summary was reported
    pub valid: TrackStatus,
}

impl ClaimSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            thumbnail: None,
            valid: TrackStatus::Validating,
        }
    }
}

/// Outcome of validating one media chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkValidationResult {
    pub track: String,
    /// Presentation start, in seconds
    pub start: f64,
    /// Duration, in seconds
    pub duration: f64,
    pub valid: bool,
}

/// A track status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub track: String,
    pub status: TrackStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<ClaimSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
}

/// Events delivered to the host, interleaved across tracks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValidationEvent {
    Status(StatusReport),
    Chunk(ChunkValidationResult),
}

impl ValidationEvent {
    pub fn track(&self) -> &str {
        match self {
            Self::Status(report) => &report.track,
            Self::Chunk(result) => &result.track,
        }
    }
}

/// State of one track. Every mutator returns the report to emit, or `None`
/// when the transition is not allowed and the state was left untouched.
#[derive(Debug, Clone, Default)]
pub struct TrackState {
    status: TrackStatus,
    claims: Vec<ClaimSummary>,
    error: Option<ValidationError>,
}

impl TrackState {
    pub fn status(&self) -> TrackStatus {
        self.status
    }

    pub fn claims(&self) -> &[ClaimSummary] {
        &self.claims
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn should_run(&self) -> bool {
        self.status.should_run()
    }

    /// Enter `Validating` when an init segment pipeline starts.
    pub fn begin(&mut self) -> bool {
        self.transition(TrackStatus::Validating)
    }

    pub fn succeed(&mut self, track: &str, mut claims: Vec<ClaimSummary>) -> Option<StatusReport> {
        if !self.transition(TrackStatus::Succeed) {
            return None;
        }
        for claim in &mut claims {
            claim.valid = TrackStatus::Succeed;
        }
        self.claims = claims;
        Some(self.report(track))
    }

    pub fn no_data(&mut self, track: &str) -> Option<StatusReport> {
        if !self.transition(TrackStatus::NoData) {
            return None;
        }
        self.claims.clear();
        Some(self.report(track))
    }

    /// Always applies. `error` replaces any earlier one.
    pub fn fail(&mut self, track: &str, error: Option<ValidationError>) -> StatusReport {
        self.status = TrackStatus::Failed;
        self.claims.clear();
        self.error = error;
        self.report(track)
    }

    fn transition(&mut self, next: TrackStatus) -> bool {
        if !self.status.can_transition(next) {
            return false;
        }
        self.status = next;
        true
    }

    fn report(&self, track: &str) -> StatusReport {
        StatusReport {
            track: track.to_string(),
            status: self.status,
            claims: self.claims.clone(),
            error: self.error.clone(),
        }
    }
}
