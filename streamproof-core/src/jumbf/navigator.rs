//! Lookup of superboxes by JUMBF URI, type tag or label.
//!
//! "Not found" is a normal outcome here and is reported as `None`; callers
//! decide whether absence is a validation failure.

use super::tree::BoxRef;

/// Prefix of a self-referencing JUMBF URI.
pub const SELF_URI_PREFIX: &str = "self#jumbf=";

/// Type tags of a manifest superbox: standard and update manifests.
pub const MANIFEST_TYPE_TAGS: &[&str] = &["c2ma", "c2um"];

/// Navigation rooted at one superbox.
#[derive(Debug, Clone, Copy)]
pub struct JumbfNavigator<'t> {
    root: BoxRef<'t>,
}

impl<'t> JumbfNavigator<'t> {
    pub fn new(root: BoxRef<'t>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> BoxRef<'t> {
        self.root
    }

    /// Resolve a URI such as `self#jumbf=c2pa/urn:uuid:.../c2pa.claim`.
    ///
    /// The root's own label must match the first path segment; every further
    /// segment selects a content box by label, depth first. A leading `/`
    /// (absolute form) is accepted.
    pub fn resolve_uri(&self, uri: &str) -> Option<BoxRef<'t>> {
        let path = uri.strip_prefix(SELF_URI_PREFIX)?;
        let path = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        resolve_path(self.root, &segments)
    }

    /// Content boxes of the child superbox whose description type tag is
    /// `tag`. The root must itself be a manifest superbox.
    pub fn resolve_type_tag(&self, tag: &str) -> Option<Vec<BoxRef<'t>>> {
        let root_tag = self.root.description()?.type_tag.as_str();
        if !MANIFEST_TYPE_TAGS.contains(&root_tag) {
            return None;
        }

        self.root
            .content_boxes()
            .into_iter()
            .find(|child| child.description().is_some_and(|d| d.type_tag == tag))
            .map(|child| child.content_boxes())
    }

    /// Content boxes of the superbox labelled `label`: the root itself if its
    /// label matches, otherwise the first matching direct child.
    pub fn resolve_label(&self, label: &str) -> Option<Vec<BoxRef<'t>>> {
        if self.root.label() == Some(label) {
            return Some(self.root.content_boxes());
        }

        self.root
            .content_boxes()
            .into_iter()
            .find(|child| child.label() == Some(label))
            .map(|child| child.content_boxes())
    }
}

fn resolve_path<'t>(node: BoxRef<'t>, segments: &[&str]) -> Option<BoxRef<'t>> {
    let (first, rest) = segments.split_first()?;
    if node.label() != Some(*first) {
        return None;
    }
    if rest.is_empty() {
        return Some(node);
    }

    node.content_boxes()
        .into_iter()
        .find_map(|child| resolve_path(child, rest))
}
