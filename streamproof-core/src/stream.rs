//! Stream orchestrator: correlates each track's init segment manifest with
//! the media chunks that follow it.
//!
//! Every track runs its own pipeline. The init segment is checked first
//! (signature, assertions, hard binding) on the blocking pool; its outcome is
//! published through a `watch` channel that chunk validation waits on, so a
//! chunk never reads the content binding before the init segment produced
//! it. Results are sent to the host over an unbounded channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, instrument, warn};

use crate::bmff::{BoxIndex, C2paPurpose};
use crate::config::ValidatorConfig;
use crate::error::{C2paError, Result, ValidationError};
use crate::manifest::{BmffMerkleProof, HardBinding, ManifestStore};
use crate::state::{
    ChunkValidationResult, ClaimSummary, StatusReport, TrackState, TrackStatus, ValidationEvent,
};
use crate::validators::{AssertionValidator, ContentValidator, SignatureValidator};

/// A media chunk handed to [`StreamValidator::validate_segment`].
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub track: String,
    /// Presentation start, in seconds
    pub start: f64,
    /// Duration, in seconds
    pub duration: f64,
    pub bytes: Vec<u8>,
    /// Name used in logs, e.g. the segment URL
    pub name: Option<String>,
}

impl MediaChunk {
    pub fn new(track: impl Into<String>, start: f64, duration: f64, bytes: Vec<u8>) -> Self {
        Self {
            track: track.into(),
            start,
            duration,
            bytes,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Outcome of a track's init segment pipeline, as seen by chunk validation.
#[derive(Debug, Clone)]
enum InitOutcome {
    Pending,
    Bound(Arc<HardBinding>),
    Failed,
}

/// What the init segment left for chunk validation.
#[derive(Debug)]
struct TrackData {
    init_bytes: Vec<u8>,
    init_index: BoxIndex,
    manifest_bytes: Vec<u8>,
    outcome: watch::Receiver<InitOutcome>,
}

#[derive(Debug, Default)]
struct TrackEntry {
    state: TrackState,
    data: Option<Arc<TrackData>>,
}

struct Inner {
    config: ValidatorConfig,
    tracks: DashMap<String, TrackEntry>,
    events: mpsc::UnboundedSender<ValidationEvent>,
}

/// Validates the C2PA manifests of a fragmented MP4 stream, track by track.
///
/// Cloning is cheap; clones share the track table and the event channel.
#[derive(Clone)]
pub struct StreamValidator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StreamValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamValidator")
            .field("config", &self.inner.config)
            .field("tracks", &self.inner.tracks.len())
            .finish()
    }
}

impl StreamValidator {
    /// Create a validator and the receiver its events are delivered to.
    pub fn new(config: ValidatorConfig) -> (Self, mpsc::UnboundedReceiver<ValidationEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            config,
            tracks: DashMap::new(),
            events,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.inner.config
    }

    /// Current status of `track`; unknown tracks are `Unstarted`.
    pub fn status(&self, track: &str) -> TrackStatus {
        self.inner
            .tracks
            .get(track)
            .map(|entry| entry.state.status())
            .unwrap_or_default()
    }

    /// Snapshot of the state of `track`.
    pub fn track_state(&self, track: &str) -> Option<TrackState> {
        self.inner.tracks.get(track).map(|entry| entry.state.clone())
    }

    /// Validate an init segment for `track`.
    ///
    /// Domain failures mark the track `Failed`, are reported as an event and
    /// return `Ok`. Any other error is reported the same way and then
    /// returned.
    #[instrument(skip_all, fields(track = %track))]
    pub async fn init_segment(&self, track: &str, bytes: Vec<u8>) -> Result<()> {
        if self.inner.config.skips(track) {
            debug!(track = %track, "Skipping init segment of excluded track");
            return Ok(());
        }
        if !self.should_run(track) {
            debug!(track = %track, status = %self.status(track), "Track no longer validated");
            return Ok(());
        }

        let publish = match self.register_init_segment(track, bytes) {
            Ok(Some(publish)) => publish,
            Ok(None) => return Ok(()),
            Err(err) => return self.fail(track, err),
        };
        let (data, outcome) = publish;

        let signature = SignatureValidator::new(self.inner.config.verify_time);
        let owned_track = track.to_string();
        let pipeline = tokio::task::spawn_blocking(move || {
            validate_manifest(&data.manifest_bytes, &owned_track, signature)
        });

        let result = pipeline
            .await
            .map_err(|e| C2paError::Task(e.to_string()))
            .and_then(|result| result);

        match result {
            Ok((claims, binding)) => {
                debug!(
                    track = %track,
                    assertion = binding.label(),
                    "Successfully resolved hard-binding assertion from init segment"
                );
                outcome.send_replace(InitOutcome::Bound(Arc::new(binding)));

                let report = self
                    .inner
                    .tracks
                    .get_mut(track)
                    .and_then(|mut entry| entry.state.succeed(track, claims));
                if let Some(report) = report {
                    self.emit(ValidationEvent::Status(report));
                }
                Ok(())
            }
            Err(err) => {
                outcome.send_replace(InitOutcome::Failed);
                self.fail(track, err)
            }
        }
    }

    /// Validate one media chunk against its track's content binding.
    ///
    /// Waits for the track's init segment pipeline to finish. Returns `None`
    /// when the chunk was not validated (excluded or failed track); a hash
    /// mismatch is `valid: false`, not an error.
    #[instrument(skip_all, fields(track = %chunk.track))]
    pub async fn validate_segment(
        &self,
        chunk: MediaChunk,
    ) -> Result<Option<ChunkValidationResult>> {
        let track = chunk.track.clone();
        if self.inner.config.skips(&track) || !self.should_run(&track) {
            return Ok(None);
        }

        let data = self
            .inner
            .tracks
            .get(&track)
            .and_then(|entry| entry.data.clone());
        let Some(data) = data else {
            let err = ValidationError::new(
                &track,
                "Unable to validate a chunk before the init segment of its track.",
            );
            return self.fail(&track, err.into()).map(|_| None);
        };

        let mut outcome = data.outcome.clone();
        let binding = match outcome
            .wait_for(|o| !matches!(o, InitOutcome::Pending))
            .await
            .map(|o| o.clone())
        {
            Ok(InitOutcome::Bound(binding)) => binding,
            Ok(_) => return Ok(None),
            Err(_) => {
                let err = C2paError::Task("init segment validation was abandoned".into());
                return self.fail(&track, err).map(|_| None);
            }
        };

        let owned_track = track.clone();
        let name = chunk.name.clone().unwrap_or_default();
        let bytes = chunk.bytes;
        let check = tokio::task::spawn_blocking(move || {
            validate_chunk(&data, &binding, &bytes, &owned_track, &name)
        });

        let result = check
            .await
            .map_err(|e| C2paError::Task(e.to_string()))
            .and_then(|result| result);

        match result {
            Ok(valid) => {
                let result = ChunkValidationResult {
                    track,
                    start: chunk.start,
                    duration: chunk.duration,
                    valid,
                };
                self.emit(ValidationEvent::Chunk(result.clone()));
                Ok(Some(result))
            }
            Err(err) => self.fail(&track, err).map(|_| None),
        }
    }

    fn should_run(&self, track: &str) -> bool {
        self.inner
            .tracks
            .get(track)
            .map_or(true, |entry| entry.state.should_run())
    }

    /// Demux the init segment and store its track data. `None` when the
    /// segment carries no manifest and the track moved to `NoData`.
    fn register_init_segment(
        &self,
        track: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<(Arc<TrackData>, watch::Sender<InitOutcome>)>> {
        let index = BoxIndex::parse(&bytes)?;
        let manifest_bytes = match index.c2pa_box(&bytes)? {
            Some(c2pa) if matches!(c2pa.purpose, C2paPurpose::Manifest { .. }) => {
                c2pa.payload.to_vec()
            }
            Some(c2pa) => {
                return Err(ValidationError::new(
                    track,
                    "The c2pa box of the init segment does not carry a manifest.",
                )
                .with_context(c2pa.purpose.as_str())
                .into())
            }
            None => {
                let report = self
                    .inner
                    .tracks
                    .entry(track.to_string())
                    .or_default()
                    .state
                    .no_data(track);
                if let Some(report) = report {
                    warn!(
                        track = %track,
                        "The video is not C2PA compatible. Init segment is missing c2pa box."
                    );
                    self.emit(ValidationEvent::Status(report));
                }
                return Ok(None);
            }
        };
        debug!(
            track = %track,
            bytes = manifest_bytes.len(),
            "Extracted manifest store from init segment"
        );

        let (sender, receiver) = watch::channel(InitOutcome::Pending);
        let data = Arc::new(TrackData {
            init_bytes: bytes,
            init_index: index,
            manifest_bytes,
            outcome: receiver,
        });

        let mut entry = self.inner.tracks.entry(track.to_string()).or_default();
        if let Some(previous) = &entry.data {
            if previous.manifest_bytes != data.manifest_bytes {
                return Err(ValidationError::new(
                    track,
                    "The manifest bytes are different for the current and the first init segments.",
                )
                .into());
            }
        }
        if !entry.state.begin() {
            return Ok(None);
        }
        entry.data = Some(Arc::clone(&data));

        Ok(Some((data, sender)))
    }

    /// Mark `track` failed and report it. Domain errors are absorbed; other
    /// errors are returned to the caller.
    fn fail(&self, track: &str, err: C2paError) -> Result<()> {
        let err = err.on_track(track);
        let reported = match &err {
            C2paError::Validation(e) => e.clone(),
            other => ValidationError::new(track, "Unexpected error during validation.")
                .with_context(other),
        };

        let report = self
            .inner
            .tracks
            .entry(track.to_string())
            .or_default()
            .state
            .fail(track, Some(reported));
        self.emit(ValidationEvent::Status(report));

        match err {
            C2paError::Validation(e) => {
                error!(
                    track = %track,
                    message = %e.message,
                    context = e.context.as_deref().unwrap_or_default(),
                    "Track validation failed"
                );
                Ok(())
            }
            other => {
                error!(track = %track, error = %other, "Unexpected error during track validation");
                Err(other)
            }
        }
    }

    fn emit(&self, event: ValidationEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("Event receiver dropped, discarding validation event");
        }
    }
}

/// Init segment pipeline: manifest, claim, signature, assertions, then the
/// hard binding.
fn validate_manifest(
    manifest_bytes: &[u8],
    track: &str,
    signature: SignatureValidator,
) -> Result<(Vec<ClaimSummary>, HardBinding)> {
    let store = ManifestStore::from_bytes(manifest_bytes)?;
    let manifests = store.resolve_manifests();
    let manifest = manifests.first().ok_or_else(|| {
        ValidationError::new(track, "Unable to resolve a manifest from the c2pa box data.")
            .with_context(format!("{} bytes", manifest_bytes.len()))
    })?;
    debug!(
        track = %track,
        label = manifest.label().unwrap_or_default(),
        manifest_type = %manifest.manifest_type(),
        "Successfully extracted manifest"
    );

    let claim = manifest.resolve_claim().map_err(|e| e.on_track(track))?;
    debug!(
        track = %track,
        generator = claim.generator_name(),
        assertions = claim.assertions.len(),
        "Successfully extracted manifest claim"
    );

    signature.validate(&store, &claim, track)?;
    AssertionValidator.validate(&store, &manifest.manifest_type(), &claim, track)?;
    let binding = manifest.resolve_content_assertion(track)?;

    Ok((vec![ClaimSummary::new(claim.generator_name())], binding))
}

/// Chunk pipeline: proof extraction, init segment hash, then the Merkle
/// check of the chunk itself.
fn validate_chunk(
    data: &TrackData,
    binding: &HardBinding,
    bytes: &[u8],
    track: &str,
    name: &str,
) -> Result<bool> {
    let index = BoxIndex::parse(bytes)?;
    let c2pa = index
        .c2pa_box(bytes)?
        .filter(|c2pa| c2pa.purpose == C2paPurpose::Merkle)
        .ok_or_else(|| {
            ValidationError::new(track, "Unable to locate the c2pa Merkle box in the chunk.")
        })?;

    let proof = BmffMerkleProof::from_cbor(c2pa.payload).map_err(|e| e.on_track(track))?;
    debug!(
        track = %track,
        chunk = %name,
        location = proof.location,
        unique_id = proof.unique_id,
        local_id = proof.local_id,
        "Successfully extracted video chunk data"
    );

    let bmff = binding.as_bmff().ok_or_else(|| {
        ValidationError::new(
            track,
            "The hard-binding assertion does not support chunk validation.",
        )
        .with_context(binding.label())
    })?;
    let validator = ContentValidator::initialize(bmff, proof, track)?;

    if !validator.validate_init_segment_hash(&data.init_index, &data.init_bytes, track)? {
        warn!(
            track = %track,
            chunk = %name,
            "The calculated hash value mismatch value from the init segment."
        );
        return Ok(false);
    }
    debug!(
        track = %track,
        chunk = %name,
        "Successfully verified init segment hash for the video chunk"
    );

    let valid = validator.validate_data_segment_hash(&index, bytes, track)?;
    if valid {
        debug!(
            track = %track,
            chunk = %name,
            "Successfully verified data hash for the video chunk"
        );
    } else {
        warn!(
            track = %track,
            chunk = %name,
            "The calculated hash value mismatch value from expected Merkle tree node."
        );
    }
    Ok(valid)
}
