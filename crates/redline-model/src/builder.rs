//! Terse tree-construction helpers.
//!
//! Used by the engine's tests and by embedders assembling [`Node`] trees
//! from their own schema layer. Each helper returns an owned node with no
//! working state attached.

use crate::node::{Node, NodeKind, NoteKind, ParagraphProps, RevisionMark, RowProps};

/// A document body with the given block-level children.
#[must_use]
pub fn body(children: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Body, children)
}

/// A paragraph containing a single run of text.
#[must_use]
pub fn para(text: &str) -> Node {
    para_runs(vec![run(text)])
}

/// A paragraph with explicit children (runs, wrappers, markers).
#[must_use]
pub fn para_runs(children: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Paragraph(ParagraphProps::default()), children)
}

/// A run containing one text node.
#[must_use]
pub fn run(text: &str) -> Node {
    Node::with_children(
        NodeKind::Run,
        vec![Node::new(NodeKind::Text(text.to_owned()))],
    )
}

/// A run containing one field instruction.
#[must_use]
pub fn field_instruction(instr: &str) -> Node {
    Node::with_children(
        NodeKind::Run,
        vec![Node::new(NodeKind::FieldInstruction(instr.to_owned()))],
    )
}

/// A field-begin marker run (not dirty).
#[must_use]
pub fn field_begin() -> Node {
    Node::with_children(
        NodeKind::Run,
        vec![Node::new(NodeKind::FieldBegin { dirty: false })],
    )
}

/// A field-separate marker run.
#[must_use]
pub fn field_separate() -> Node {
    Node::with_children(NodeKind::Run, vec![Node::new(NodeKind::FieldSeparate)])
}

/// A field-end marker run.
#[must_use]
pub fn field_end() -> Node {
    Node::with_children(NodeKind::Run, vec![Node::new(NodeKind::FieldEnd)])
}

/// A revision wrapper around the given runs.
#[must_use]
pub fn revision(mark: RevisionMark, children: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Revision(mark), children)
}

/// A table with the given rows.
#[must_use]
pub fn table(rows: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Table, rows)
}

/// A table row with the given cells.
#[must_use]
pub fn row(cells: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Row(RowProps::default()), cells)
}

/// A table row with a trailing placeholder cell span.
#[must_use]
pub fn row_with_span(cells: Vec<Node>, span: u32) -> Node {
    Node::with_children(
        NodeKind::Row(RowProps {
            revision: None,
            trailing_span: Some(span),
        }),
        cells,
    )
}

/// A table cell with the given block-level children.
#[must_use]
pub fn cell(children: Vec<Node>) -> Node {
    Node::with_children(NodeKind::Cell, children)
}

/// A bookmark start marker.
#[must_use]
pub fn bookmark_start(id: &str) -> Node {
    Node::new(NodeKind::BookmarkStart(id.to_owned()))
}

/// A bookmark end marker.
#[must_use]
pub fn bookmark_end(id: &str) -> Node {
    Node::new(NodeKind::BookmarkEnd(id.to_owned()))
}

/// A footnote reference run.
#[must_use]
pub fn footnote_ref(id: u32) -> Node {
    Node::with_children(
        NodeKind::Run,
        vec![Node::new(NodeKind::NoteReference {
            note: NoteKind::Footnote,
            id,
        })],
    )
}
