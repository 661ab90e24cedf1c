//! Abstract document-tree model for the redline comparison engine.
//!
//! The engine never sees a concrete package format. Embedders decode their
//! document schema into [`Node`] trees, hand them to `redline`, and encode
//! the merged tree back out. Everything the engine needs to interpret is a
//! closed [`NodeKind`] variant; content it does not need to interpret
//! travels through as [`NodeKind::Opaque`].

pub mod builder;
mod ids;
mod node;
mod record;

pub use ids::{Fingerprint, FingerprintParseError, Unid};
pub use node::{
    BookmarkId, Node, NodeKind, NoteKind, ParagraphProps, RevisionKind, RevisionMark, RowProps,
};
pub use record::{DocPart, RevisionRecord};
