//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use streamproof_core::TrackStatus;
use tracing::debug;

/// Read an input file, with the path in the error message.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// File name of `path` for display, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Whether `path` names a raw JUMBF manifest store rather than a BMFF file.
pub fn is_manifest_store(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("jumbf") | Some("c2pa")
    )
}

/// Track status, colored by outcome.
pub fn status_label(status: TrackStatus) -> ColoredString {
    match status {
        TrackStatus::Succeed => status.as_str().green().bold(),
        TrackStatus::Failed => status.as_str().red().bold(),
        TrackStatus::NoData => status.as_str().yellow().bold(),
        TrackStatus::Unstarted | TrackStatus::Validating => status.as_str().dimmed(),
    }
}

/// First bytes of a hash as hex, for compact display.
pub fn short_hex(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(8)];
    if shown.len() < bytes.len() {
        format!("{}…", hex::encode(shown))
    } else {
        hex::encode(shown)
    }
}

/// Print `value` as one line of JSON on stdout.
pub fn print_json_line<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("Failed to serialize output")?;
    println!("{line}");
    Ok(())
}
