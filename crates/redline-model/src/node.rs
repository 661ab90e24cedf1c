//! Typed document-tree nodes.
//!
//! A document is an ordered tree of [`Node`]s rooted at [`NodeKind::Body`].
//! The variant set is closed: every stage of the engine matches on it
//! exhaustively, and content the engine does not interpret travels through
//! as [`NodeKind::Opaque`] without being inspected.

use serde::{Deserialize, Serialize};

use crate::ids::{Fingerprint, Unid};

// ---------------------------------------------------------------------------
// RevisionMark
// ---------------------------------------------------------------------------

/// Whether a tracked revision inserted or deleted the content it wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionKind {
    Inserted,
    Deleted,
}

impl std::fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted => write!(f, "inserted"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Tracked-revision metadata: who changed what, when, and in which direction.
///
/// Attached to [`NodeKind::Revision`] wrappers, to paragraph marks via
/// [`ParagraphProps`], and to whole table rows via [`RowProps`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionMark {
    pub kind: RevisionKind,
    pub author: String,
    pub date: String,
}

impl RevisionMark {
    /// Create a mark.
    #[must_use]
    pub fn new(kind: RevisionKind, author: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            kind,
            author: author.into(),
            date: date.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node properties
// ---------------------------------------------------------------------------

/// Paragraph-level properties the engine interprets.
///
/// `mark_revision` records a tracked insertion/deletion of the paragraph
/// mark itself — the structural edit that merges or splits paragraphs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphProps {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mark_revision: Option<RevisionMark>,
}

/// Table-row properties the engine interprets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowProps {
    /// Row-level tracked revision (a row wholly inserted or deleted is
    /// marked here rather than per-cell).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<RevisionMark>,
    /// Trailing placeholder cell span (grid columns after the last real
    /// cell). Dropped by the bookmark normalizer when it conflicts with
    /// the table's actual width.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trailing_span: Option<u32>,
}

/// Which note part a [`NodeKind::NoteReference`] points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

/// A bookmark identifier, shared by a start/end marker pair.
pub type BookmarkId = String;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The closed set of node variants the engine interprets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Document root container.
    Body,
    /// A table; children are [`NodeKind::Row`]s.
    Table,
    /// A table row; children are [`NodeKind::Cell`]s.
    Row(RowProps),
    /// A table cell; children are block-level nodes.
    Cell,
    /// A paragraph; children are runs, revision wrappers, and markers.
    Paragraph(ParagraphProps),
    /// Tracked-revision wrapper around runs.
    Revision(RevisionMark),
    /// A run; children are [`NodeKind::Text`], field markers, and note
    /// references.
    Run,
    /// Literal text inside a run. Leaf.
    Text(String),
    /// Field-code region start marker. Leaf.
    FieldBegin {
        /// Whether the field needs recalculation.
        dirty: bool,
    },
    /// Separator between a field's instruction and its cached result. Leaf.
    FieldSeparate,
    /// Field-code region end marker. Leaf.
    FieldEnd,
    /// A field instruction string. Leaf.
    FieldInstruction(String),
    /// Bookmark start marker. Leaf.
    BookmarkStart(BookmarkId),
    /// Bookmark end marker. Leaf.
    BookmarkEnd(BookmarkId),
    /// Footnote/endnote reference; `id` must be unique document-wide. Leaf.
    NoteReference { note: NoteKind, id: u32 },
    /// Content the engine does not interpret, carried through verbatim.
    Opaque(String),
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One node of a document tree.
///
/// `unid` and `fingerprint` are engine working state; input trees normally
/// arrive with both unset and the public entry points strip them from the
/// merged output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unid: Option<Unid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fingerprint: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a leaf node.
    #[must_use]
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            unid: None,
            fingerprint: None,
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    #[must_use]
    pub const fn with_children(kind: NodeKind, children: Vec<Self>) -> Self {
        Self {
            kind,
            unid: None,
            fingerprint: None,
            children,
        }
    }

    /// True for block-level nodes (paragraphs and table rows), the
    /// granularity at which content fingerprints are attached.
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self.kind, NodeKind::Paragraph(_) | NodeKind::Row(_))
    }

    /// True if this node is a paragraph.
    #[must_use]
    pub const fn is_paragraph(&self) -> bool {
        matches!(self.kind, NodeKind::Paragraph(_))
    }

    /// Concatenated literal content of this subtree: text runs and field
    /// instructions, in document order.
    #[must_use]
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text(t) | NodeKind::FieldInstruction(t) => out.push_str(t),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Pre-order visit of this subtree.
    pub fn for_each(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    /// True if the subtree contains no literal content (no text and no
    /// field instructions).
    #[must_use]
    pub fn is_content_empty(&self) -> bool {
        let mut empty = true;
        self.for_each(&mut |n| {
            if matches!(&n.kind, NodeKind::Text(t) | NodeKind::FieldInstruction(t) if !t.is_empty())
            {
                empty = false;
            }
        });
        empty
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;

    #[test]
    fn inner_text_spans_runs_and_fields() {
        let para = builder::para_runs(vec![
            builder::run("The fee is "),
            Node::with_children(
                NodeKind::Run,
                vec![Node::new(NodeKind::FieldInstruction("REF fee".to_owned()))],
            ),
            builder::run("."),
        ]);
        assert_eq!(para.inner_text(), "The fee is REF fee.");
    }

    #[test]
    fn block_detection() {
        assert!(builder::para("x").is_block());
        assert!(Node::new(NodeKind::Row(RowProps::default())).is_block());
        assert!(!builder::run("x").is_block());
    }

    #[test]
    fn content_empty_ignores_markers() {
        let para = Node::with_children(
            NodeKind::Paragraph(ParagraphProps::default()),
            vec![
                Node::new(NodeKind::BookmarkStart("b1".to_owned())),
                Node::new(NodeKind::BookmarkEnd("b1".to_owned())),
            ],
        );
        assert!(para.is_content_empty());
        assert!(!builder::para("text").is_content_empty());
    }

    #[test]
    fn serde_round_trip_preserves_structure() {
        let doc = builder::body(vec![
            builder::para("Hello world."),
            builder::table(vec![builder::row(vec![builder::cell(vec![builder::para(
                "in cell",
            )])])]),
        ]);
        let json = serde_json::to_string(&doc).expect("serialize");
        let back: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, doc);
    }
}
