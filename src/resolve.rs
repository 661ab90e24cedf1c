//! Revision resolution: accept/reject of pre-existing tracked revisions.
//!
//! The pipeline needs each input in two forms: as-is (with its tracked
//! revisions) and resolved (every revision applied or every revision
//! undone). Resolution is a seam: embedders with a richer schema can plug
//! their own [`RevisionResolver`]; [`MarkupResolver`] handles the markup
//! the abstract tree itself can express.
//!
//! Resolving a paragraph-mark revision coalesces paragraphs: accepting a
//! deleted mark (or rejecting an inserted one) merges the paragraph into
//! its successor. The first paragraph's unid survives; the others'
//! identities are lost, which downstream stages treat as a normal
//! fingerprint-less fallback.

use redline_model::{Node, NodeKind, ParagraphProps, RevisionKind};

// ---------------------------------------------------------------------------
// RevisionResolver
// ---------------------------------------------------------------------------

/// Produces the accept/reject variants of a tree with tracked revisions.
///
/// Both methods are pure: unids are preserved wherever the node survives
/// structurally.
pub trait RevisionResolver {
    /// Apply every tracked revision (inserted content stays, deleted
    /// content goes).
    fn accept(&self, tree: Node) -> Node;

    /// Undo every tracked revision (inserted content goes, deleted
    /// content stays).
    fn reject(&self, tree: Node) -> Node;
}

/// Default resolver over the abstract tree's own revision markup.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkupResolver;

impl RevisionResolver for MarkupResolver {
    fn accept(&self, tree: Node) -> Node {
        resolve(tree, RevisionKind::Inserted)
    }

    fn reject(&self, tree: Node) -> Node {
        resolve(tree, RevisionKind::Deleted)
    }
}

// ---------------------------------------------------------------------------
// Resolution transform
// ---------------------------------------------------------------------------

/// Resolve the tree, keeping content whose revision kind is `keep` and
/// dropping the other kind.
fn resolve(mut node: Node, keep: RevisionKind) -> Node {
    node.children = resolve_children(node.children, keep);
    node
}

fn resolve_children(children: Vec<Node>, keep: RevisionKind) -> Vec<Node> {
    // The mark kind whose resolution removes a paragraph mark: accepting a
    // Deleted mark removes it, rejecting an Inserted mark removes it.
    let coalesce_kind = match keep {
        RevisionKind::Inserted => RevisionKind::Deleted,
        RevisionKind::Deleted => RevisionKind::Inserted,
    };

    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    // Paragraph accumulating content from predecessors whose marks were
    // resolved away.
    let mut pending: Option<Node> = None;

    for child in children {
        match child.kind {
            NodeKind::Revision(ref mark) => {
                if mark.kind == keep {
                    // Unwrap: splice resolved children inline.
                    out.extend(resolve_children(child.children, keep));
                }
                // Otherwise the wrapped content is dropped entirely.
            }
            NodeKind::Paragraph(ref props) => {
                let mark = props.mark_revision.clone();
                let mut para = resolve(child, keep);
                para.kind = NodeKind::Paragraph(ParagraphProps::default());
                match mark {
                    Some(m) if m.kind == coalesce_kind => {
                        // Mark resolved away: merge into the following
                        // paragraph. The first paragraph's node (and unid)
                        // survives as the accumulator.
                        match pending.as_mut() {
                            Some(acc) => acc.children.append(&mut para.children),
                            None => pending = Some(para),
                        }
                    }
                    _ => {
                        if let Some(mut acc) = pending.take() {
                            acc.children.append(&mut para.children);
                            out.push(acc);
                        } else {
                            out.push(para);
                        }
                    }
                }
            }
            NodeKind::Row(ref props) => {
                if let Some(rev) = &props.revision {
                    if rev.kind == keep {
                        let mut row = resolve(child, keep);
                        if let NodeKind::Row(p) = &mut row.kind {
                            p.revision = None;
                        }
                        out.push(row);
                    }
                    // Row of the other kind is dropped.
                } else {
                    out.push(resolve(child, keep));
                }
            }
            _ => {
                // A non-paragraph block ends any pending coalescing run:
                // a paragraph cannot merge across a table.
                if let Some(acc) = pending.take() {
                    out.push(acc);
                }
                out.push(resolve(child, keep));
            }
        }
    }

    if let Some(acc) = pending.take() {
        // Resolved-away mark on the final paragraph: nothing to merge
        // into, the paragraph stays.
        out.push(acc);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
