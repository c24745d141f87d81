//! COSE_Sign1 decoding for claim signatures.

use ciborium::Value;
use thiserror::Error;

use crate::error::{C2paError, Result};

/// CBOR tag of a COSE_Sign1 message.
pub const COSE_SIGN1_TAG: u64 = 18;

const HEADER_ALG: i64 = 1;
const HEADER_X5CHAIN: i64 = 33;

/// Structural problems of a COSE_Sign1 message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoseError {
    #[error("COSE_Sign1 must be an array of four elements")]
    NotSign1,

    #[error("invalid COSE_Sign1 {0} field")]
    InvalidField(&'static str),

    #[error("invalid protected header: {0}")]
    ProtectedHeader(String),

    #[error("missing x5chain header")]
    MissingX5Chain,

    #[error("missing or non-integer alg header")]
    MissingAlg,
}

/// A decoded COSE_Sign1 message.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1 {
    /// Serialized protected header map
    pub protected: Vec<u8>,
    pub unprotected: Vec<(Value, Value)>,
    /// `None` when the payload is detached
    pub payload: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    /// Decode a tagged or untagged COSE_Sign1 value.
    pub fn from_value(value: &Value) -> std::result::Result<Self, CoseError> {
        let value = match value {
            Value::Tag(COSE_SIGN1_TAG, inner) => inner.as_ref(),
            other => other,
        };

        let items = match value {
            Value::Array(items) if items.len() == 4 => items,
            _ => return Err(CoseError::NotSign1),
        };

        let protected = match &items[0] {
            Value::Bytes(bytes) => bytes.clone(),
            _ => return Err(CoseError::InvalidField("protected")),
        };
        let unprotected = match &items[1] {
            Value::Map(entries) => entries.clone(),
            _ => return Err(CoseError::InvalidField("unprotected")),
        };
        let payload = match &items[2] {
            Value::Bytes(bytes) => Some(bytes.clone()),
            Value::Null => None,
            _ => return Err(CoseError::InvalidField("payload")),
        };
        let signature = match &items[3] {
            Value::Bytes(bytes) => bytes.clone(),
            _ => return Err(CoseError::InvalidField("signature")),
        };

        Ok(Self {
            protected,
            unprotected,
            payload,
            signature,
        })
    }

    /// Decode the protected header map. An empty byte string is an empty map.
    pub fn protected_header(&self) -> std::result::Result<Vec<(Value, Value)>, CoseError> {
        if self.protected.is_empty() {
            return Ok(Vec::new());
        }

        match ciborium::from_reader::<Value, _>(self.protected.as_slice()) {
            Ok(Value::Map(entries)) => Ok(entries),
            Ok(_) => Err(CoseError::ProtectedHeader("not a map".into())),
            Err(e) => Err(CoseError::ProtectedHeader(e.to_string())),
        }
    }

    /// The `alg` value of the protected header.
    pub fn algorithm_id(&self) -> std::result::Result<i64, CoseError> {
        let header = self.protected_header()?;
        match header_value(&header, "alg", HEADER_ALG) {
            Some(Value::Integer(id)) => i64::try_from(*id).map_err(|_| CoseError::MissingAlg),
            _ => Err(CoseError::MissingAlg),
        }
    }

    /// The DER certificates of the `x5chain` header, leaf first.
    ///
    /// Looked up in the unprotected header first, then in the protected one.
    /// A single byte string is a one-certificate chain.
    pub fn x5chain(&self) -> std::result::Result<Vec<Vec<u8>>, CoseError> {
        let protected = self.protected_header()?;
        let value = header_value(&self.unprotected, "x5chain", HEADER_X5CHAIN)
            .or_else(|| header_value(&protected, "x5chain", HEADER_X5CHAIN))
            .ok_or(CoseError::MissingX5Chain)?;

        match value {
            Value::Bytes(der) => Ok(vec![der.clone()]),
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::Bytes(der) => Ok(der.clone()),
                    _ => Err(CoseError::InvalidField("x5chain")),
                })
                .collect(),
            _ => Err(CoseError::InvalidField("x5chain")),
        }
    }

    /// Encode the `Sig_structure` signed for a detached `payload`:
    /// `["Signature1", protected, h'', payload]`.
    pub fn sig_structure(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let structure = Value::Array(vec![
            Value::Text("Signature1".into()),
            Value::Bytes(self.protected.clone()),
            Value::Bytes(Vec::new()),
            Value::Bytes(payload.to_vec()),
        ]);

        let mut out = Vec::new();
        ciborium::into_writer(&structure, &mut out).map_err(C2paError::cbor)?;
        Ok(out)
    }
}

/// Find a header by text key or integer label.
fn header_value<'a>(header: &'a [(Value, Value)], name: &str, label: i64) -> Option<&'a Value> {
    header.iter().find_map(|(key, value)| {
        let matches = match key {
            Value::Text(text) => text == name,
            Value::Integer(int) => i64::try_from(*int).is_ok_and(|k| k == label),
            _ => false,
        };
        matches.then_some(value)
    })
}
