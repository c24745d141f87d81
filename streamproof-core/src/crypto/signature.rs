//! COSE algorithm registry and digital signature verification.

use std::fmt;

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKeyRef, Public};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Verifier};

use crate::crypto::HashAlg;
use crate::error::Result;

/// Signature algorithms allowed for claim signatures, keyed by their COSE
/// registry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
    /// EdDSA; only Ed25519 keys are accepted
    EdDsa,
    Ed25519,
}

/// Library parameters for one [`CoseAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureParams {
    Ecdsa { curve: Nid, digest: HashAlg },
    RsaPss { digest: HashAlg, salt_len: i32 },
    Ed25519,
}

impl CoseAlgorithm {
    pub const ALL: [CoseAlgorithm; 8] = [
        Self::Es256,
        Self::Es384,
        Self::Es512,
        Self::Ps256,
        Self::Ps384,
        Self::Ps512,
        Self::EdDsa,
        Self::Ed25519,
    ];

    /// Look up an algorithm by its COSE `alg` header value.
    pub fn from_cose_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.cose_id() == id)
    }

    pub fn cose_id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::Ps256 => -37,
            Self::Ps384 => -38,
            Self::Ps512 => -39,
            Self::EdDsa => -8,
            Self::Ed25519 => -19,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::EdDsa => "EdDSA",
            Self::Ed25519 => "Ed25519",
        }
    }

    pub fn params(self) -> SignatureParams {
        match self {
            Self::Es256 => SignatureParams::Ecdsa {
                curve: Nid::X9_62_PRIME256V1,
                digest: HashAlg::Sha256,
            },
            Self::Es384 => SignatureParams::Ecdsa {
                curve: Nid::SECP384R1,
                digest: HashAlg::Sha384,
            },
            Self::Es512 => SignatureParams::Ecdsa {
                curve: Nid::SECP521R1,
                digest: HashAlg::Sha512,
            },
            Self::Ps256 => SignatureParams::RsaPss {
                digest: HashAlg::Sha256,
                salt_len: 32,
            },
            Self::Ps384 => SignatureParams::RsaPss {
                digest: HashAlg::Sha384,
                salt_len: 48,
            },
            Self::Ps512 => SignatureParams::RsaPss {
                digest: HashAlg::Sha512,
                salt_len: 64,
            },
            Self::EdDsa | Self::Ed25519 => SignatureParams::Ed25519,
        }
    }

    /// Verify `signature` over `payload` with `key`.
    ///
    /// ECDSA signatures are expected in the raw `r || s` form used by COSE.
    /// A key of the wrong type or curve, or a malformed signature, verifies
    /// as `false`.
    pub fn verify(self, payload: &[u8], signature: &[u8], key: &PKeyRef<Public>) -> Result<bool> {
        match self.params() {
            SignatureParams::Ecdsa { curve, digest } => {
                verify_ecdsa(curve, digest.message_digest(), payload, signature, key)
            }
            SignatureParams::RsaPss { digest, salt_len } => {
                verify_rsa_pss(digest.message_digest(), salt_len, payload, signature, key)
            }
            SignatureParams::Ed25519 => verify_ed25519(payload, signature, key),
        }
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn verify_ecdsa(
    curve: Nid,
    digest: MessageDigest,
    payload: &[u8],
    signature: &[u8],
    key: &PKeyRef<Public>,
) -> Result<bool> {
    if key.id() != Id::EC {
        return Ok(false);
    }
    let ec_key = key.ec_key()?;
    if ec_key.group().curve_name() != Some(curve) {
        return Ok(false);
    }
    if signature.is_empty() || signature.len() % 2 != 0 {
        return Ok(false);
    }

    let (r, s) = signature.split_at(signature.len() / 2);
    let der = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?
        .to_der()?;

    let mut verifier = Verifier::new(digest, key)?;
    verifier.update(payload)?;
    Ok(verifier.verify(&der).unwrap_or(false))
}

fn verify_rsa_pss(
    digest: MessageDigest,
    salt_len: i32,
    payload: &[u8],
    signature: &[u8],
    key: &PKeyRef<Public>,
) -> Result<bool> {
    if key.id() != Id::RSA && key.id() != Id::RSA_PSS {
        return Ok(false);
    }

    let mut verifier = Verifier::new(digest, key)?;
    verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
    verifier.set_rsa_pss_saltlen(RsaPssSaltlen::custom(salt_len))?;
    verifier.set_rsa_mgf1_md(digest)?;
    verifier.update(payload)?;
    Ok(verifier.verify(signature).unwrap_or(false))
}

fn verify_ed25519(payload: &[u8], signature: &[u8], key: &PKeyRef<Public>) -> Result<bool> {
    if key.id() != Id::ED25519 {
        return Ok(false);
    }

    let mut verifier = Verifier::new_without_digest(key)?;
    Ok(verifier.verify_oneshot(signature, payload).unwrap_or(false))
}
