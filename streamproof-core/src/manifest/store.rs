//! Manifest store and manifest resolution over a parsed JUMBF tree.

use std::fmt;

use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::jumbf::{BoxPayload, BoxRef, BoxTree, JumbfError, JumbfNavigator, NodeId};

use super::assertion::{HardBinding, HARD_BINDING_ASSERTIONS};
use super::claim::Claim;

/// URI of the manifest store superbox.
pub const MANIFEST_STORE_URI: &str = "self#jumbf=c2pa";

const CLAIM_TYPE_TAG: &str = "c2cl";
const ASSERTION_STORE_LABEL: &str = "c2pa.assertions";

/// A parsed manifest store owning its raw bytes.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    bytes: Vec<u8>,
    tree: BoxTree,
    root: NodeId,
}

impl ManifestStore {
    /// Parse a manifest store. The first top-level box is the document root.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let tree = BoxTree::parse(&bytes)?;
        let root = tree.root().ok_or(JumbfError::Empty)?.node_id();

        debug!(
            bytes = bytes.len(),
            boxes = tree.len(),
            orphans = tree.orphan_count(),
            "Parsed manifest store"
        );

        Ok(Self { bytes, tree, root })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn document_root(&self) -> BoxRef<'_> {
        self.tree.node(self.root)
    }

    pub fn navigator(&self) -> JumbfNavigator<'_> {
        JumbfNavigator::new(self.document_root())
    }

    /// One [`Manifest`] per content box of the `c2pa` superbox; empty when
    /// the store has none.
    pub fn resolve_manifests(&self) -> Vec<Manifest<'_>> {
        self.navigator()
            .resolve_uri(MANIFEST_STORE_URI)
            .map(|store| store.content_boxes().into_iter().map(Manifest::new).collect())
            .unwrap_or_default()
    }

    /// Decoded payload of the first content box of the superbox at `uri`.
    pub fn resolve_box(&self, uri: &str) -> Option<&BoxPayload> {
        let container = self.navigator().resolve_uri(uri)?;
        container.child(1).map(|content| content.payload())
    }

    /// Raw payload bytes (everything after the header) of the superbox at
    /// `uri`.
    pub fn resolve_box_bytes(&self, uri: &str) -> Option<&[u8]> {
        let container = self.navigator().resolve_uri(uri)?;
        container.raw_range()?.slice(&self.bytes)
    }
}

/// Kind of manifest, from its description type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestType {
    /// `c2ma`
    Standard,
    /// `c2um`
    Update,
    Other(String),
}

impl ManifestType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "c2ma" => Self::Standard,
            "c2um" => Self::Update,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Standard => "c2ma",
            Self::Update => "c2um",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ManifestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Update => f.write_str("update"),
            Self::Other(tag) => write!(f, "unknown ({tag})"),
        }
    }
}

/// One manifest superbox of a store.
#[derive(Debug, Clone, Copy)]
pub struct Manifest<'s> {
    root: BoxRef<'s>,
}

impl<'s> Manifest<'s> {
    pub fn new(root: BoxRef<'s>) -> Self {
        Self { root }
    }

    pub fn manifest_type(&self) -> ManifestType {
        let tag = self
            .root
            .description()
            .map(|d| d.type_tag.as_str())
            .unwrap_or_default();
        ManifestType::from_tag(tag)
    }

    /// Manifest label, usually `urn:uuid:...`.
    pub fn label(&self) -> Option<&'s str> {
        self.root.label()
    }

    pub fn navigator(&self) -> JumbfNavigator<'s> {
        JumbfNavigator::new(self.root)
    }

    /// Decode the manifest's claim.
    pub fn resolve_claim(&self) -> Result<Claim> {
        let value = self
            .navigator()
            .resolve_type_tag(CLAIM_TYPE_TAG)
            .and_then(|boxes| boxes.first().and_then(|b| b.payload().as_cbor()))
            .ok_or_else(|| {
                ValidationError::untracked("Unable to resolve a claim from the manifest.")
            })?;

        Claim::from_value(value)
    }

    /// The first hard-binding assertion found in the assertion store.
    ///
    /// Assertion boxes are scanned in order; within each box the labels of
    /// [`HARD_BINDING_ASSERTIONS`] are tried in order.
    pub fn resolve_content_assertion(&self, track: &str) -> Result<HardBinding> {
        let assertions = self
            .navigator()
            .resolve_label(ASSERTION_STORE_LABEL)
            .unwrap_or_default();

        for assertion in assertions {
            let navigator = JumbfNavigator::new(assertion);
            for label in HARD_BINDING_ASSERTIONS {
                let Some(content) = navigator.resolve_label(label) else {
                    continue;
                };
                let value = content
                    .first()
                    .and_then(|b| b.payload().as_cbor())
                    .ok_or_else(|| {
                        ValidationError::new(track, format!("Malformed '{label}' assertion."))
                    })?;
                return HardBinding::decode(label, value).map_err(|e| e.on_track(track));
            }
        }

        Err(ValidationError::new(
            track,
            "Unable to resolve hard binding to content assertion from manifest.",
        )
        .into())
    }
}
