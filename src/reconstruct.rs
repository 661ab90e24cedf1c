//! Tree reconstruction: a statused atom stream back into one document.
//!
//! Atoms arrive in output order with their correlation verdicts. A
//! reverse scan first re-assigns ancestor chains from the paragraph-mark
//! sentinels, so content that ended up in front of a different sentinel
//! than it started with (deleted paragraph breaks, merged gaps) adopts the
//! paragraph it now precedes. A forward pass then rebuilds the container
//! hierarchy with a frame stack keyed on ancestor unids, wrapping inserted
//! and deleted content in revision markup as it goes.

use redline_model::{
    Node, NodeKind, ParagraphProps, RevisionKind, RevisionMark, RowProps,
};

use crate::atoms::{Ancestor, AncestorKind, AtomKind, ContentAtom, assign_chains_from_sentinels};
use crate::correlate::{ComparisonUnit, CorrelationStatus};
use crate::error::CompareError;
use crate::settings::ComparerSettings;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Rebuild a body tree from comparison units, marking inserted and
/// deleted content as tracked revisions attributed per `settings`.
///
/// # Errors
/// Returns [`CompareError::MalformedTree`] if a unit still carries the
/// `Unknown` status or an inline atom arrives without a paragraph chain.
pub fn reconstruct(
    units: Vec<ComparisonUnit>,
    settings: &ComparerSettings,
) -> Result<Node, CompareError> {
    let mut statuses = Vec::new();
    let mut atoms = Vec::new();
    for unit in units {
        if unit.status == CorrelationStatus::Unknown {
            return Err(CompareError::MalformedTree {
                detail: "unresolved comparison unit reached reconstruction".to_owned(),
            });
        }
        for atom in unit.atoms {
            statuses.push(unit.status);
            atoms.push(atom);
        }
    }
    assign_chains_from_sentinels(&mut atoms);

    let mut builder = TreeBuilder::new(settings);
    for (status, atom) in statuses.into_iter().zip(atoms) {
        builder.push(status, atom)?;
    }
    Ok(builder.finish())
}

// ---------------------------------------------------------------------------
// Frame-stack builder
// ---------------------------------------------------------------------------

struct Frame {
    unid: redline_model::Unid,
    kind: AncestorKind,
    node: Node,
}

struct TreeBuilder<'a> {
    settings: &'a ComparerSettings,
    frames: Vec<Frame>,
    body: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn new(settings: &'a ComparerSettings) -> Self {
        Self {
            settings,
            frames: Vec::new(),
            body: Vec::new(),
        }
    }

    fn push(&mut self, status: CorrelationStatus, atom: ContentAtom) -> Result<(), CompareError> {
        match atom.kind {
            AtomKind::ParagraphMark(props) => {
                self.ensure(&atom.ancestors);
                self.close_top_as_paragraph(status, props);
            }
            AtomKind::RowMark(props) => {
                self.ensure(&atom.ancestors);
                self.close_top_as_row(status, &props);
            }
            AtomKind::Opaque(node) => {
                self.ensure(&atom.ancestors);
                let node = self.with_revision(status, node);
                self.append(node);
            }
            _ => {
                if atom.ancestors.last().map(|a| a.kind) != Some(AncestorKind::Paragraph) {
                    return Err(CompareError::MalformedTree {
                        detail: "inline content without an enclosing paragraph".to_owned(),
                    });
                }
                self.ensure(&atom.ancestors);
                self.append_inline(status, atom.kind);
            }
        }
        Ok(())
    }

    /// Close frames that diverge from `chain` and open the missing ones,
    /// so the open stack mirrors the chain exactly.
    fn ensure(&mut self, chain: &[Ancestor]) {
        let mut keep = 0;
        while keep < self.frames.len()
            && keep < chain.len()
            && self.frames[keep].unid == chain[keep].unid
        {
            keep += 1;
        }
        while self.frames.len() > keep {
            self.close_top();
        }
        for anc in &chain[keep..] {
            let kind = match anc.kind {
                AncestorKind::Table => NodeKind::Table,
                AncestorKind::Row => NodeKind::Row(RowProps::default()),
                AncestorKind::Cell => NodeKind::Cell,
                AncestorKind::Paragraph => NodeKind::Paragraph(ParagraphProps::default()),
            };
            let mut node = Node::new(kind);
            node.unid = Some(anc.unid);
            self.frames.push(Frame {
                unid: anc.unid,
                kind: anc.kind,
                node,
            });
        }
    }

    fn close_top(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.append(frame.node);
        }
    }

    fn close_top_as_paragraph(&mut self, status: CorrelationStatus, mut props: ParagraphProps) {
        let Some(mut frame) = self.frames.pop() else {
            return;
        };
        debug_assert_eq!(frame.kind, AncestorKind::Paragraph);
        props.mark_revision = match status {
            CorrelationStatus::Deleted => Some(self.mark(RevisionKind::Deleted)),
            CorrelationStatus::Inserted => Some(self.mark(RevisionKind::Inserted)),
            CorrelationStatus::Equal | CorrelationStatus::Unknown => None,
        };
        frame.node.kind = NodeKind::Paragraph(props);
        self.append(frame.node);
    }

    fn close_top_as_row(&mut self, status: CorrelationStatus, props: &RowProps) {
        let Some(mut frame) = self.frames.pop() else {
            return;
        };
        debug_assert_eq!(frame.kind, AncestorKind::Row);
        let revision = match status {
            CorrelationStatus::Deleted => Some(self.mark(RevisionKind::Deleted)),
            CorrelationStatus::Inserted => Some(self.mark(RevisionKind::Inserted)),
            CorrelationStatus::Equal | CorrelationStatus::Unknown => None,
        };
        frame.node.kind = NodeKind::Row(RowProps {
            revision,
            trailing_span: props.trailing_span,
        });
        self.append(frame.node);
    }

    fn append(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(frame) => frame.node.children.push(node),
            None => self.body.push(node),
        }
    }

    /// Append an inline atom's node, wrapped in revision markup when the
    /// status demands it. Adjacent content with the same verdict shares
    /// one revision wrapper.
    fn append_inline(&mut self, status: CorrelationStatus, kind: AtomKind) {
        let node = inline_node(kind);
        let revision_kind = match status {
            CorrelationStatus::Inserted => Some(RevisionKind::Inserted),
            CorrelationStatus::Deleted => Some(RevisionKind::Deleted),
            CorrelationStatus::Equal | CorrelationStatus::Unknown => None,
        };
        let new_mark = revision_kind.map(|rk| self.mark(rk));
        let Some(frame) = self.frames.last_mut() else {
            self.body.push(node);
            return;
        };
        match (revision_kind, new_mark) {
            (None, _) | (_, None) => frame.node.children.push(node),
            (Some(rk), Some(new_mark)) => {
                if let Some(last) = frame.node.children.last_mut() {
                    if let NodeKind::Revision(mark) = &last.kind {
                        if mark.kind == rk {
                            last.children.push(node);
                            return;
                        }
                    }
                }
                frame
                    .node
                    .children
                    .push(Node::with_children(
                        NodeKind::Revision(new_mark),
                        vec![node],
                    ));
            }
        }
    }

    fn with_revision(&self, status: CorrelationStatus, node: Node) -> Node {
        match status {
            CorrelationStatus::Inserted => Node::with_children(
                NodeKind::Revision(self.mark(RevisionKind::Inserted)),
                vec![node],
            ),
            CorrelationStatus::Deleted => Node::with_children(
                NodeKind::Revision(self.mark(RevisionKind::Deleted)),
                vec![node],
            ),
            CorrelationStatus::Equal | CorrelationStatus::Unknown => node,
        }
    }

    fn mark(&self, kind: RevisionKind) -> RevisionMark {
        RevisionMark::new(
            kind,
            &self.settings.author_for_revisions,
            &self.settings.date_for_revisions,
        )
    }

    fn finish(mut self) -> Node {
        while !self.frames.is_empty() {
            self.close_top();
        }
        Node::with_children(NodeKind::Body, self.body)
    }
}

fn inline_node(kind: AtomKind) -> Node {
    match kind {
        AtomKind::Text(t) => Node::with_children(
            NodeKind::Run,
            vec![Node::new(NodeKind::Text(t))],
        ),
        AtomKind::FieldInstruction(i) => Node::with_children(
            NodeKind::Run,
            vec![Node::new(NodeKind::FieldInstruction(i))],
        ),
        AtomKind::FieldBegin { dirty } => Node::with_children(
            NodeKind::Run,
            vec![Node::new(NodeKind::FieldBegin { dirty })],
        ),
        AtomKind::FieldSeparate => {
            Node::with_children(NodeKind::Run, vec![Node::new(NodeKind::FieldSeparate)])
        }
        AtomKind::FieldEnd => {
            Node::with_children(NodeKind::Run, vec![Node::new(NodeKind::FieldEnd)])
        }
        AtomKind::BookmarkStart(id) => Node::new(NodeKind::BookmarkStart(id)),
        AtomKind::BookmarkEnd(id) => Node::new(NodeKind::BookmarkEnd(id)),
        AtomKind::NoteReference { note, id } => Node::with_children(
            NodeKind::Run,
            vec![Node::new(NodeKind::NoteReference { note, id })],
        ),
        // Handled by the caller before reaching here.
        AtomKind::ParagraphMark(_) | AtomKind::RowMark(_) | AtomKind::Opaque(_) => {
            Node::new(NodeKind::Opaque("unexpected".to_owned()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use redline_model::builder;

    use super::*;
    use crate::atoms::collect_blocks;
    use crate::correlate::correlate;
    use crate::hash::hash_block_content;
    use crate::identity::{IdentityTagger, UnidAllocator};
    use crate::resolve::{MarkupResolver, RevisionResolver};

    fn compare_bodies(old: Node, new: Node) -> Node {
        let settings = ComparerSettings::default();
        let mut alloc = UnidAllocator::new();
        let old = IdentityTagger::new(&mut alloc, 1000).tag(old);
        let new = IdentityTagger::new(&mut alloc, 2000).tag(new);
        let old = hash_block_content(old.clone(), &old, &settings);
        let new = hash_block_content(new.clone(), &new, &settings);
        let old_blocks = collect_blocks(&old).expect("old blocks");
        let new_blocks = collect_blocks(&new).expect("new blocks");
        let units = correlate(&old_blocks, &new_blocks, &settings);
        reconstruct(units, &settings).expect("reconstruct")
    }

    #[test]
    fn word_insertion_produces_inserted_revision_run() {
        let result = compare_bodies(
            builder::body(vec![builder::para("Hello world.")]),
            builder::body(vec![builder::para("Hello brave world.")]),
        );
        assert_eq!(result.children.len(), 1, "one paragraph");

        let mut inserted = Vec::new();
        result.for_each(&mut |n| {
            if let NodeKind::Revision(mark) = &n.kind {
                assert_eq!(mark.kind, RevisionKind::Inserted);
                inserted.push(n.inner_text());
            }
        });
        assert_eq!(inserted, vec!["brave ".to_owned()]);
    }

    #[test]
    fn accept_of_result_equals_new_and_reject_equals_old() {
        let old = builder::body(vec![builder::para("alpha"), builder::para("beta gamma")]);
        let new = builder::body(vec![builder::para("alpha"), builder::para("beta delta")]);
        let result = compare_bodies(old, new);

        let accepted = MarkupResolver.accept(result.clone());
        assert_eq!(accepted.inner_text(), "alphabeta delta");
        let rejected = MarkupResolver.reject(result);
        assert_eq!(rejected.inner_text(), "alphabeta gamma");
    }

    #[test]
    fn deleting_a_paragraph_break_marks_the_first_mark_deleted() {
        // Old: two paragraphs. New: their concatenation.
        let result = compare_bodies(
            builder::body(vec![builder::para("first "), builder::para("second")]),
            builder::body(vec![builder::para("first second")]),
        );
        assert_eq!(result.children.len(), 2, "break survives as markup");
        let NodeKind::Paragraph(props) = &result.children[0].kind else {
            panic!("expected paragraph");
        };
        let mark = props.mark_revision.as_ref().expect("deleted mark");
        assert_eq!(mark.kind, RevisionKind::Deleted);

        // Accepting coalesces back to the new document.
        let accepted = MarkupResolver.accept(result);
        assert_eq!(accepted.children.len(), 1);
        assert_eq!(accepted.inner_text(), "first second");
    }

    #[test]
    fn wholly_deleted_row_is_marked_at_row_level() {
        let old = builder::body(vec![builder::table(vec![
            builder::row(vec![builder::cell(vec![builder::para("keep")])]),
            builder::row(vec![builder::cell(vec![builder::para("drop")])]),
        ])]);
        let new = builder::body(vec![builder::table(vec![builder::row(vec![
            builder::cell(vec![builder::para("keep")]),
        ])])]);
        let result = compare_bodies(old, new);

        assert_eq!(result.children.len(), 1, "one table");
        let table = &result.children[0];
        assert_eq!(table.children.len(), 2, "both rows present");
        let NodeKind::Row(first) = &table.children[0].kind else {
            panic!("expected row");
        };
        assert!(first.revision.is_none());
        let NodeKind::Row(second) = &table.children[1].kind else {
            panic!("expected row");
        };
        assert_eq!(
            second.revision.as_ref().map(|m| m.kind),
            Some(RevisionKind::Deleted)
        );
    }

    #[test]
    fn deleted_rows_share_the_surviving_table() {
        let old = builder::body(vec![builder::table(vec![
            builder::row(vec![builder::cell(vec![builder::para("a")])]),
            builder::row(vec![builder::cell(vec![builder::para("b")])]),
        ])]);
        let new = builder::body(vec![builder::table(vec![builder::row(vec![
            builder::cell(vec![builder::para("a")]),
        ])])]);
        let result = compare_bodies(old, new);
        let tables = result
            .children
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Table))
            .count();
        assert_eq!(tables, 1, "container identities must harmonize");
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = reconstruct(
            vec![ComparisonUnit {
                status: CorrelationStatus::Unknown,
                atoms: Vec::new(),
            }],
            &ComparerSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompareError::MalformedTree { .. }));
    }

    #[test]
    fn attribution_comes_from_settings() {
        let settings = ComparerSettings::with_author("reviewer");
        let mut alloc = UnidAllocator::new();
        let old = IdentityTagger::new(&mut alloc, 1000)
            .tag(builder::body(vec![builder::para("x")]));
        let new = IdentityTagger::new(&mut alloc, 2000)
            .tag(builder::body(vec![builder::para("x y")]));
        let old = hash_block_content(old.clone(), &old, &settings);
        let new = hash_block_content(new.clone(), &new, &settings);
        let units = correlate(
            &collect_blocks(&old).expect("old"),
            &collect_blocks(&new).expect("new"),
            &settings,
        );
        let result = reconstruct(units, &settings).expect("reconstruct");

        let mut authors = Vec::new();
        result.for_each(&mut |n| {
            if let NodeKind::Revision(mark) = &n.kind {
                authors.push(mark.author.clone());
            }
        });
        assert!(!authors.is_empty());
        assert!(authors.iter().all(|a| a == "reviewer"));
    }
}
