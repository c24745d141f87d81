//! JUMBF manifest store parsing.
//!
//! A C2PA manifest store is a JUMBF superbox tree. [`parse::flatten`] walks the
//! raw bytes into a flat sequence, [`BoxTree`] re-nests it, and
//! [`JumbfNavigator`] looks boxes up by URI, type tag or label.

pub mod boxes;
pub mod error;
pub mod navigator;
pub mod parse;
pub mod tree;

pub use boxes::{BoxPayload, BoxType, ByteRange, DescriptionBox, FileDescription};
pub use error::JumbfError;
pub use navigator::{JumbfNavigator, MANIFEST_TYPE_TAGS, SELF_URI_PREFIX};
pub use parse::{flatten, FlatBox};
pub use tree::{BoxRef, BoxTree, NodeId};
