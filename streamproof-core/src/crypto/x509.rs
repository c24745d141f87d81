//! X.509 certificate chain checks for claim signers.
//!
//! Every certificate must satisfy the C2PA signer profile (version, validity,
//! extensions, key type, signature algorithm). Once all pass, the chain is
//! path-validated with OpenSSL using its last certificate as the only trust
//! anchor.

use chrono::{DateTime, Utc};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::{X509VerifyFlags, X509VerifyParam};
use openssl::x509::{X509StoreContext, X509};
use thiserror::Error;
use tracing::debug;
use x509_parser::certificate::X509Certificate;
use x509_parser::der_parser::der::parse_der_sequence;
use x509_parser::signature_algorithm::SignatureAlgorithm;
use x509_parser::x509::X509Version;

use crate::error::Result;

mod oid {
    pub const BASIC_CONSTRAINTS: &str = "2.5.29.19";
    pub const AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
    pub const SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
    pub const KEY_USAGE: &str = "2.5.29.15";
    pub const EXTENDED_KEY_USAGE: &str = "2.5.29.37";

    pub const EMAIL_PROTECTION: &str = "1.3.6.1.5.5.7.3.4";

    pub const RSASSA_PSS: &str = "1.2.840.113549.1.1.10";

    pub const SIGNATURE_ALGORITHMS: &[&str] = &[
        "1.2.840.10045.4.3.2",   // ecdsa-with-SHA256
        "1.2.840.10045.4.3.3",   // ecdsa-with-SHA384
        "1.2.840.10045.4.3.4",   // ecdsa-with-SHA512
        "1.2.840.113549.1.1.11", // sha256WithRSAEncryption
        "1.2.840.113549.1.1.12", // sha384WithRSAEncryption
        "1.2.840.113549.1.1.13", // sha512WithRSAEncryption
        RSASSA_PSS,
        "1.3.101.112", // Ed25519
    ];

    pub const PSS_HASHES: &[&str] = &[
        "2.16.840.1.101.3.4.2.1",
        "2.16.840.1.101.3.4.2.2",
        "2.16.840.1.101.3.4.2.3",
    ];
}

const EC_CURVES: &[Nid] = &[Nid::X9_62_PRIME256V1, Nid::SECP384R1, Nid::SECP521R1];

const MIN_RSA_BITS: u32 = 2048;

/// Errors building an [`X509Chain`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("certificate chain is empty")]
    Empty,

    #[error("certificate {index} is not valid DER: {reason}")]
    Parse { index: usize, reason: String },
}

/// Outcome of [`X509Chain::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainValidation {
    Valid,
    /// The first failing certificate, its subject and the reason
    Invalid {
        index: usize,
        subject: String,
        reason: String,
    },
}

impl ChainValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

struct ChainCertificate {
    der: Vec<u8>,
    x509: X509,
}

/// Certificates from a signature's `x5chain`, leaf first.
pub struct X509Chain {
    certs: Vec<ChainCertificate>,
}

impl std::fmt::Debug for X509Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X509Chain")
            .field("subjects", &self.subjects())
            .finish()
    }
}

impl X509Chain {
    /// Parse DER certificates, leaf first.
    pub fn from_der(certs: Vec<Vec<u8>>) -> std::result::Result<Self, ChainError> {
        if certs.is_empty() {
            return Err(ChainError::Empty);
        }

        let certs = certs
            .into_iter()
            .enumerate()
            .map(|(index, der)| {
                let parse_error = |reason: String| ChainError::Parse { index, reason };
                x509_parser::parse_x509_certificate(&der)
                    .map_err(|e| parse_error(e.to_string()))?;
                let x509 = X509::from_der(&der).map_err(|e| parse_error(e.to_string()))?;
                Ok(ChainCertificate { der, x509 })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { certs })
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Subject names, leaf first.
    pub fn subjects(&self) -> Vec<String> {
        self.certs
            .iter()
            .map(|c| subject_of(&c.der))
            .collect()
    }

    /// Public key of the signing certificate.
    pub fn leaf_public_key(&self) -> Result<PKey<Public>> {
        Ok(self.certs[0].x509.public_key()?)
    }

    /// Check every certificate against the signer profile, then validate the
    /// path to the last certificate. `at` is the instant the validity checks
    /// use.
    pub fn validate(&self, at: DateTime<Utc>) -> Result<ChainValidation> {
        for (index, cert) in self.certs.iter().enumerate() {
            if let Some(reason) = check_certificate(cert, at)? {
                return Ok(ChainValidation::Invalid {
                    index,
                    subject: subject_of(&cert.der),
                    reason,
                });
            }
        }
        debug!(certificates = self.certs.len(), "Certificate profile checks passed");

        self.verify_path(at)
    }

    fn verify_path(&self, at: DateTime<Utc>) -> Result<ChainValidation> {
        let leaf = &self.certs[0];
        let anchor = &self.certs[self.certs.len() - 1];

        let mut param = X509VerifyParam::new()?;
        param.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
        param.set_time(at.timestamp() as _);

        let mut builder = X509StoreBuilder::new()?;
        builder.add_cert(anchor.x509.clone())?;
        builder.set_param(&param)?;
        let store = builder.build();

        let mut untrusted = Stack::new()?;
        for cert in &self.certs[1..] {
            untrusted.push(cert.x509.clone())?;
        }

        let mut context = X509StoreContext::new()?;
        let (verified, result) = context.init(&store, &leaf.x509, &untrusted, |ctx| {
            let verified = ctx.verify_cert()?;
            Ok((verified, ctx.error()))
        })?;

        if verified {
            Ok(ChainValidation::Valid)
        } else {
            Ok(ChainValidation::Invalid {
                index: 0,
                subject: subject_of(&leaf.der),
                reason: format!(
                    "Certificate chain path validation failed: {}",
                    result.error_string()
                ),
            })
        }
    }
}

fn subject_of(der: &[u8]) -> String {
    x509_parser::parse_x509_certificate(der)
        .map(|(_, cert)| cert.subject().to_string())
        .unwrap_or_default()
}

/// Returns the first profile violation of `cert`, if any.
fn check_certificate(cert: &ChainCertificate, at: DateTime<Utc>) -> Result<Option<String>> {
    let parsed = match x509_parser::parse_x509_certificate(&cert.der) {
        Ok((_, parsed)) => parsed,
        Err(e) => return Ok(Some(format!("Certificate could not be parsed: {e}"))),
    };

    if parsed.version() != X509Version::V3 {
        return Ok(Some("Certificate version must be v3.".into()));
    }

    if at.timestamp() < parsed.validity().not_before.timestamp() {
        return Ok(Some(
            "Certificate is not valid at the current moment in time.".into(),
        ));
    }

    if parsed.tbs_certificate.issuer_uid.is_some() || parsed.tbs_certificate.subject_uid.is_some()
    {
        return Ok(Some(
            "Certificate should not contain 'issuerUniqueID' or 'subjectUniqueID'.".into(),
        ));
    }

    if let Some(reason) = check_extensions(&parsed) {
        return Ok(Some(reason));
    }

    if let Some(reason) = check_public_key(&cert.x509)? {
        return Ok(Some(reason));
    }

    Ok(check_signature_algorithm(&parsed))
}

fn check_extensions(cert: &X509Certificate<'_>) -> Option<String> {
    let find = |wanted: &str| {
        cert.extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == wanted)
    };

    for (required, name) in [
        (oid::BASIC_CONSTRAINTS, "basicConstraints"),
        (oid::AUTHORITY_KEY_IDENTIFIER, "authorityKeyIdentifier"),
        (oid::SUBJECT_KEY_IDENTIFIER, "subjectKeyIdentifier"),
    ] {
        if find(required).is_none() {
            return Some(format!(
                "Certificate is missing the required '{name}' extension."
            ));
        }
    }

    match find(oid::KEY_USAGE) {
        None => return Some("Certificate is missing the required 'keyUsage' extension.".into()),
        Some(ext) if !ext.critical => {
            return Some("Certificate 'keyUsage' extension must be critical.".into())
        }
        Some(_) => {}
    }

    if let Some(ext) = find(oid::EXTENDED_KEY_USAGE) {
        if !first_key_purpose_allowed(ext.value) {
            return Some(
                "Certificate 'extendedKeyUsage' first key purpose must be 'emailProtection'."
                    .into(),
            );
        }
    }

    None
}

/// Key purpose policy: the first purpose listed must be emailProtection.
fn first_key_purpose_allowed(eku_value: &[u8]) -> bool {
    let Ok((_, sequence)) = parse_der_sequence(eku_value) else {
        return false;
    };
    let Ok(purposes) = sequence.as_sequence() else {
        return false;
    };

    purposes
        .first()
        .and_then(|purpose| purpose.as_oid().ok())
        .is_some_and(|purpose| purpose.to_id_string() == oid::EMAIL_PROTECTION)
}

fn check_public_key(cert: &X509) -> Result<Option<String>> {
    let key = cert.public_key()?;

    let allowed = match key.id() {
        Id::EC => {
            let curve = key.ec_key()?.group().curve_name();
            curve.is_some_and(|nid| EC_CURVES.contains(&nid))
        }
        Id::RSA | Id::RSA_PSS => key.bits() >= MIN_RSA_BITS,
        _ => true,
    };

    Ok((!allowed).then(|| "Certificate public key does not comply with C2PA spec.".to_string()))
}

fn check_signature_algorithm(cert: &X509Certificate<'_>) -> Option<String> {
    let rejected = || Some("Certificate signature does not comply with C2PA spec.".to_string());

    let algorithm = cert.signature_algorithm.algorithm.to_id_string();
    if !oid::SIGNATURE_ALGORITHMS.contains(&algorithm.as_str()) {
        return rejected();
    }

    if algorithm == oid::RSASSA_PSS {
        let Ok(SignatureAlgorithm::RSASSA_PSS(params)) =
            SignatureAlgorithm::try_from(&cert.signature_algorithm)
        else {
            return rejected();
        };

        let Some(hash) = params.hash_algorithm() else {
            return rejected();
        };
        if params.mask_gen_algorithm_raw().is_none() {
            return rejected();
        }
        let Ok(mgf) = params.mask_gen_algorithm() else {
            return rejected();
        };

        let hash = hash.algorithm.to_id_string();
        if !oid::PSS_HASHES.contains(&hash.as_str()) || mgf.hash.to_id_string() != hash {
            return rejected();
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_is_rejected() {
        assert_eq!(X509Chain::from_der(Vec::new()).unwrap_err(), ChainError::Empty);
    }

    #[test]
    fn test_garbage_der_is_rejected() {
        let err = X509Chain::from_der(vec![vec![0x30, 0x03, 0x01]]).unwrap_err();
        assert!(matches!(err, ChainError::Parse { index: 0, .. }));
    }

    #[test]
    fn test_first_key_purpose() {
        // SEQUENCE { emailProtection, codeSigning }
        let email_first = [
            0x30, 0x14, 0x06, 0x08, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x04, 0x06, 0x08,
            0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x03,
        ];
        assert!(first_key_purpose_allowed(&email_first));

        // SEQUENCE { codeSigning, emailProtection }
        let code_first = [
            0x30, 0x14, 0x06, 0x08, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x03, 0x06, 0x08,
            0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x04,
        ];
        assert!(!first_key_purpose_allowed(&code_first));

        assert!(!first_key_purpose_allowed(&[0x30, 0x00]));
        assert!(!first_key_purpose_allowed(&[0xFF]));
    }
}
