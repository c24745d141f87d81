//! Claim assertion validation: manifest-type structure rules and assertion
//! hashes.

use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::manifest::{
    Claim, ManifestStore, ManifestType, HARD_BINDING_ASSERTIONS, INGREDIENT_ASSERTION,
};

/// Checks that a claim's assertions fit its manifest type and that each
/// assertion box hashes to the value recorded in the claim.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssertionValidator;

impl AssertionValidator {
    pub fn validate(
        &self,
        store: &ManifestStore,
        manifest_type: &ManifestType,
        claim: &Claim,
        track: &str,
    ) -> Result<()> {
        check_structure(manifest_type, claim, track)?;

        for assertion in &claim.assertions {
            if store.resolve_box(&assertion.url).is_none() {
                return Err(
                    ValidationError::new(track, "Unable to locate claim assertion.")
                        .with_context(&assertion.url)
                        .into(),
                );
            }

            let alg = assertion.alg.or(claim.alg).ok_or_else(|| {
                ValidationError::new(
                    track,
                    "Unable to identify hash algorithm for claim assertion.",
                )
                .with_context(&assertion.url)
            })?;

            let bytes = store.resolve_box_bytes(&assertion.url).ok_or_else(|| {
                ValidationError::new(track, "Unable to locate claim assertion.")
                    .with_context(&assertion.url)
            })?;

            let actual = alg.digest(bytes)?;
            if actual != assertion.hash.as_slice() {
                return Err(ValidationError::new(
                    track,
                    "The hash value mismatch for claim assertion.",
                )
                .with_context(format!(
                    "{} expected={} actual={}",
                    assertion.url,
                    hex::encode(&assertion.hash),
                    hex::encode(&actual)
                ))
                .into());
            }

            debug!(track = %track, url = %assertion.url, alg = %alg, "Verified claim assertion");
        }

        debug!(
            track = %track,
            assertions = claim.assertions.len(),
            "Verified all claim assertions"
        );
        Ok(())
    }
}

/// Manifest-type rules on the assertion list.
///
/// A standard manifest needs at least one hard binding and at most one
/// ingredient; an update manifest holds exactly one assertion, an
/// ingredient.
pub fn check_structure(
    manifest_type: &ManifestType,
    claim: &Claim,
    track: &str,
) -> std::result::Result<(), ValidationError> {
    let labels = claim.assertion_labels();

    match manifest_type {
        ManifestType::Standard => {
            if !labels.iter().any(|l| HARD_BINDING_ASSERTIONS.contains(l)) {
                return Err(ValidationError::new(
                    track,
                    "Standard manifest doesn't contain hard binding to content assertions.",
                ));
            }
            if labels.iter().filter(|l| **l == INGREDIENT_ASSERTION).count() > 1 {
                return Err(ValidationError::new(
                    track,
                    "Standard manifest contains more than one ingredient assertions.",
                ));
            }
        }
        ManifestType::Update => {
            if labels.as_slice() != [INGREDIENT_ASSERTION] {
                return Err(ValidationError::new(
                    track,
                    "Update manifest should contain exactly one ingredient assertion.",
                ));
            }
        }
        ManifestType::Other(tag) => {
            return Err(ValidationError::new(track, "Unexpected manifest type.").with_context(tag));
        }
    }

    Ok(())
}
