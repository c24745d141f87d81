//! Validate command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use streamproof_core::{
    MediaChunk, StatusReport, StreamValidator, TrackStatus, ValidationEvent, ValidatorConfig,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::exit_codes::{ExitCode, VALIDATION_FAILED};
use crate::utils::{display_name, print_json_line, read_file, status_label};
use crate::ValidateArgs;

/// Execute the validate command.
///
/// Feeds the init segment and then every chunk, in order, to one
/// [`StreamValidator`] and prints the events it reports.
pub async fn execute(args: ValidateArgs) -> Result<ExitCode> {
    let config = ValidatorConfig::from_env();
    if config.skips(&args.track) {
        if !args.json {
            println!(
                "{} track '{}' is excluded by STREAMPROOF_SKIP_TRACKS",
                "Notice:".yellow().bold(),
                args.track
            );
        }
        return Ok(ExitCode::success());
    }

    let (validator, mut events) = StreamValidator::new(config);

    let init = read_file(&args.init)?;
    info!(track = %args.track, path = %args.init.display(), "Validating init segment");
    validator
        .init_segment(&args.track, init)
        .await
        .with_context(|| format!("Validation of init segment {} aborted", args.init.display()))?;
    report_events(&mut events, args.json)?;

    let mut start = 0.0;
    let mut invalid = 0usize;
    for path in &args.chunks {
        if !validator.status(&args.track).should_run() {
            break;
        }

        let chunk = MediaChunk::new(&args.track, start, args.chunk_duration, read_file(path)?)
            .with_name(display_name(path));
        start += args.chunk_duration;

        let result = validator
            .validate_segment(chunk)
            .await
            .with_context(|| format!("Validation of chunk {} aborted", path.display()))?;
        if let Some(result) = result {
            if !result.valid {
                invalid += 1;
            }
            if !args.json {
                let verdict = if result.valid {
                    "VALID".green().bold()
                } else {
                    "INVALID".red().bold()
                };
                println!(
                    "   {} {:>8.3}s +{:.3}s  {}",
                    verdict,
                    result.start,
                    result.duration,
                    display_name(path).dimmed()
                );
            }
        }
        report_events(&mut events, args.json)?;
    }

    let status = validator.status(&args.track);
    info!(track = %args.track, status = %status, invalid, "Validation finished");

    Ok(match status {
        TrackStatus::NoData => {
            if !args.json {
                println!();
                println!(
                    "{} the stream carries no content credentials",
                    "Notice:".yellow().bold()
                );
            }
            ExitCode::success()
        }
        TrackStatus::Failed => ExitCode::error(
            VALIDATION_FAILED,
            format!("track '{}' failed validation", args.track),
        ),
        _ if invalid > 0 => ExitCode::error(
            VALIDATION_FAILED,
            format!("{invalid} of {} chunks failed validation", args.chunks.len()),
        ),
        _ => {
            if !args.json {
                println!();
                println!("{}", "All segments verified.".green().bold());
            }
            ExitCode::success()
        }
    })
}

/// Print the events delivered so far. Chunk results are printed by the
/// caller in text mode, so only status changes are shown there.
fn report_events(events: &mut UnboundedReceiver<ValidationEvent>, json: bool) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        if json {
            print_json_line(&event)?;
        } else if let ValidationEvent::Status(report) = &event {
            print_status(report);
        }
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!(
        "{} {}",
        format!("[{}]", report.track).cyan(),
        status_label(report.status)
    );
    for claim in &report.claims {
        println!("   {} {}", "Claim generator:".dimmed(), claim.name);
    }
    if let Some(error) = &report.error {
        println!("   {} {}", "Reason:".dimmed(), error.message.red());
        if let Some(context) = &error.context {
            println!("   {} {}", "Context:".dimmed(), context);
        }
    }
}
