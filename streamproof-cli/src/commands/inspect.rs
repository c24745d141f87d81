//! Inspect command implementation.
//!
//! Prints what a manifest store claims without validating it: manifests,
//! claim generators, assertion references and the signer chain.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use streamproof_core::bmff::{BoxIndex, C2paPurpose};
use streamproof_core::crypto::{CoseSign1, X509Chain};
use streamproof_core::{C2paError, Claim, Manifest, ManifestStore};
use tracing::{debug, warn};

use crate::exit_codes::{ExitCode, VALIDATION_FAILED};
use crate::utils::{is_manifest_store, print_json_line, read_file, short_hex};

#[derive(Debug, Serialize)]
struct StoreReport {
    file: String,
    manifests: Vec<ManifestReport>,
}

#[derive(Debug, Serialize)]
struct ManifestReport {
    label: Option<String>,
    #[serde(rename = "type")]
    manifest_type: String,
    claim_generator: String,
    format: Option<String>,
    assertions: Vec<AssertionReport>,
    signature: String,
    signer: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AssertionReport {
    url: String,
    alg: Option<String>,
    hash: String,
    #[serde(skip)]
    digest: Vec<u8>,
}

/// Execute the inspect command.
pub fn execute(file: PathBuf, json: bool) -> Result<ExitCode> {
    let bytes = read_file(&file)?;

    let store_bytes = if is_manifest_store(&file) {
        bytes
    } else {
        match extract_manifest_store(&bytes)? {
            Some(store) => store,
            None => {
                return Ok(ExitCode::error(
                    VALIDATION_FAILED,
                    format!("{} carries no C2PA manifest store", file.display()),
                ))
            }
        }
    };

    let store = ManifestStore::from_bytes(store_bytes)
        .with_context(|| format!("Failed to parse manifest store of {}", file.display()))?;

    let manifests = store
        .resolve_manifests()
        .into_iter()
        .map(|manifest| manifest_report(&store, manifest))
        .collect::<Result<Vec<_>>>()?;
    debug!(manifests = manifests.len(), "Resolved manifests");

    let report = StoreReport {
        file: file.display().to_string(),
        manifests,
    };

    if json {
        print_json_line(&report)?;
    } else {
        print_report(&report);
    }
    Ok(ExitCode::success())
}

/// The payload of the init segment's manifest `c2pa` box, if any.
fn extract_manifest_store(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let index = BoxIndex::parse(bytes)
        .map_err(C2paError::from)
        .context("Failed to demultiplex the init segment")?;

    let c2pa = index
        .c2pa_box(bytes)
        .map_err(C2paError::from)
        .context("Failed to decode the c2pa box")?;

    Ok(match c2pa {
        Some(c2pa) if matches!(c2pa.purpose, C2paPurpose::Manifest { .. }) => {
            Some(c2pa.payload.to_vec())
        }
        Some(c2pa) => {
            warn!(purpose = c2pa.purpose.as_str(), "The c2pa box does not carry a manifest");
            None
        }
        None => None,
    })
}

fn manifest_report(store: &ManifestStore, manifest: Manifest<'_>) -> Result<ManifestReport> {
    let label = manifest.label().map(str::to_string);
    let claim = manifest.resolve_claim().with_context(|| {
        format!(
            "Failed to resolve the claim of manifest {}",
            label.as_deref().unwrap_or("<unlabeled>")
        )
    })?;

    let assertions = claim
        .assertions
        .iter()
        .map(|assertion| AssertionReport {
            url: assertion.url.clone(),
            alg: assertion.alg.or(claim.alg).map(|alg| alg.name().to_string()),
            hash: hex::encode(&assertion.hash),
            digest: assertion.hash.to_vec(),
        })
        .collect();

    Ok(ManifestReport {
        label,
        manifest_type: format!("{:?}", manifest.manifest_type()),
        claim_generator: claim.generator_name().to_string(),
        format: claim.format.clone(),
        assertions,
        signature: claim.signature.clone(),
        signer: signer_subjects(store, &claim),
    })
}

/// Subjects of the signer chain, leaf first. Empty when the signature or
/// its chain cannot be decoded.
fn signer_subjects(store: &ManifestStore, claim: &Claim) -> Vec<String> {
    let chain = store
        .resolve_box(&claim.signature)
        .and_then(|payload| payload.as_cbor())
        .and_then(|value| CoseSign1::from_value(value).ok())
        .and_then(|sign1| sign1.x5chain().ok())
        .and_then(|certs| X509Chain::from_der(certs).ok());

    match chain {
        Some(chain) => chain.subjects(),
        None => {
            warn!(url = %claim.signature, "Unable to decode the signer certificate chain");
            Vec::new()
        }
    }
}

fn print_report(report: &StoreReport) {
    println!();
    println!("{} {}", "Manifest store:".bold(), report.file);
    if report.manifests.is_empty() {
        println!("   {}", "No manifests".yellow());
        return;
    }

    for manifest in &report.manifests {
        println!();
        println!(
            "{} {}",
            "Manifest".cyan().bold(),
            manifest.label.as_deref().unwrap_or("<unlabeled>")
        );
        println!("   {} {}", "Type:".dimmed(), manifest.manifest_type);
        println!("   {} {}", "Claim generator:".dimmed(), manifest.claim_generator);
        if let Some(format) = &manifest.format {
            println!("   {} {}", "Format:".dimmed(), format);
        }

        println!("   {}", "Assertions:".dimmed());
        for assertion in &manifest.assertions {
            println!(
                "     {} ({} {})",
                assertion.url,
                assertion.alg.as_deref().unwrap_or("unknown"),
                short_hex(&assertion.digest)
            );
        }

        println!("   {} {}", "Signature:".dimmed(), manifest.signature);
        if manifest.signer.is_empty() {
            println!("   {} {}", "Signer:".dimmed(), "unavailable".yellow());
        }
        for (i, subject) in manifest.signer.iter().enumerate() {
            let role = if i == 0 { "Signer:" } else { "Issuer:" };
            println!("   {} {}", role.dimmed(), subject);
        }
    }
}
