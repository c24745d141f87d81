//! Claim signature validation.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::crypto::{ChainValidation, CoseAlgorithm, CoseSign1, X509Chain};
use crate::error::{Result, ValidationError};
use crate::manifest::{Claim, ManifestStore};

/// Verifies a claim's COSE_Sign1 signature and its signer chain.
#[derive(Debug, Clone, Copy)]
pub struct SignatureValidator {
    verify_time: Option<DateTime<Utc>>,
}

impl Default for SignatureValidator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SignatureValidator {
    /// `verify_time` pins the instant used for certificate validity; `None`
    /// uses the current time.
    pub fn new(verify_time: Option<DateTime<Utc>>) -> Self {
        Self { verify_time }
    }

    /// Steps, each short-circuiting on failure: resolve the signature box,
    /// extract and validate the `x5chain`, look up the algorithm, then verify
    /// the signature over the `Sig_structure` with the leaf key.
    pub fn validate(&self, store: &ManifestStore, claim: &Claim, track: &str) -> Result<()> {
        let value = store
            .resolve_box(&claim.signature)
            .and_then(|payload| payload.as_cbor())
            .ok_or_else(|| {
                ValidationError::new(track, "Unable to resolve a claim signature from the claim.")
                    .with_context(&claim.signature)
            })?;
        debug!(track = %track, url = %claim.signature, "Extracted manifest claim signature");

        let sign1 = CoseSign1::from_value(value).map_err(|e| {
            ValidationError::new(track, "Malformed claim signature.").with_context(e)
        })?;

        let x5chain = sign1.x5chain().map_err(|e| {
            ValidationError::new(
                track,
                "Unable to locate x5chain unprotected header in the claim signature.",
            )
            .with_context(e)
        })?;
        debug!(track = %track, certificates = x5chain.len(), "Extracted x.509 certificate chain");

        let chain = X509Chain::from_der(x5chain).map_err(|e| {
            ValidationError::new(
                track,
                concat!(
                    "Unable to parse x.509 certificate chain ",
                    "from the claim signature unprotected headers."
                ),
            )
            .with_context(e)
        })?;
        debug!(track = %track, subjects = ?chain.subjects(), "Parsed x.509 certificate chain");

        let at = self.verify_time.unwrap_or_else(Utc::now);
        if let ChainValidation::Invalid {
            index,
            subject,
            reason,
        } = chain.validate(at)?
        {
            return Err(ValidationError::new(
                track,
                "The certificate chain verification has failed.",
            )
            .with_context(format!("certificate {index} ({subject}): {reason}"))
            .into());
        }

        let algorithm = sign1
            .algorithm_id()
            .ok()
            .and_then(CoseAlgorithm::from_cose_id)
            .ok_or_else(|| {
                ValidationError::new(
                    track,
                    "Unsupported algorithm specified in the claim signature.",
                )
                .with_context(format!("{:?}", sign1.algorithm_id()))
            })?;

        let payload = sign1.sig_structure(&claim.canonical_bytes()?)?;
        let key = chain.leaf_public_key()?;

        if !algorithm.verify(&payload, &sign1.signature, &key)? {
            return Err(ValidationError::new(
                track,
                "The claim signature verification has failed.",
            )
            .with_context(format!(
                "alg={algorithm} payload={} signature={}",
                hex::encode(&payload),
                hex::encode(&sign1.signature)
            ))
            .into());
        }

        debug!(track = %track, alg = %algorithm, "The claim signature was successfully verified");
        Ok(())
    }
}
