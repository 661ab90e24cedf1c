//! Pipeline orchestration for two-way comparison.
//!
//! `compare` stages the full pipeline: bookmark normalization, identity
//! tagging, revision resolution, fingerprinting, correlation,
//! reconstruction, and the field-dirtying post-pass. Every stage takes an
//! owned tree and returns a new one; when `debug_dir` is configured each
//! intermediate artifact is dumped as JSON.

use redline_model::Node;

use crate::atoms::collect_blocks;
use crate::bookmarks;
use crate::correlate::correlate;
use crate::debug_dump;
use crate::error::CompareError;
use crate::hash::hash_block_content;
use crate::identity::{IdentityTagger, UnidAllocator, fill_missing};
use crate::reconstruct::reconstruct;
use crate::resolve::{MarkupResolver, RevisionResolver};
use crate::settings::ComparerSettings;

/// Note-id offset for the old input's renumbering range.
const OLD_NOTE_OFFSET: u32 = 1000;
/// Note-id offset for the new input's renumbering range.
const NEW_NOTE_OFFSET: u32 = 2000;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compare two documents and return one merged tree whose markup records
/// every difference as a tracked revision attributed per `settings`.
///
/// # Errors
/// Returns [`CompareError`] when either input tree is structurally
/// invalid. Identity loss and missing fingerprints are not errors; they
/// degrade to finer-grained matching.
pub fn compare(
    old: &Node,
    new: &Node,
    settings: &ComparerSettings,
) -> Result<Node, CompareError> {
    Ok(strip_working_state(compare_keep_ids(old, new, settings)?))
}

/// Like [`compare`] but leaves unids on the result, so the triangular
/// merger can address nodes during reconciliation.
pub(crate) fn compare_keep_ids(
    old: &Node,
    new: &Node,
    settings: &ComparerSettings,
) -> Result<Node, CompareError> {
    compare_with(old.clone(), new.clone(), &MarkupResolver, settings)
}

/// Full pipeline with a caller-supplied revision resolver.
///
/// Embedders whose schema layer expresses tracked revisions beyond the
/// abstract tree's own markup plug in here. The result keeps working
/// unids; strip them with [`strip_working_state`] before handing the tree
/// out.
///
/// # Errors
/// Returns [`CompareError`] when either input tree is structurally invalid.
pub fn compare_with<R: RevisionResolver>(
    old: Node,
    new: Node,
    resolver: &R,
    settings: &ComparerSettings,
) -> Result<Node, CompareError> {
    validate(&old)?;
    validate(&new)?;

    let mut alloc = UnidAllocator::new();
    let note_base = settings.starting_id_for_footnotes_endnotes;

    let old = bookmarks::normalize(old);
    let new = bookmarks::normalize(new);
    let old = IdentityTagger::new(&mut alloc, note_base + OLD_NOTE_OFFSET).tag(old);
    let new = IdentityTagger::new(&mut alloc, note_base + NEW_NOTE_OFFSET).tag(new);
    debug_dump::dump(settings, "source1-step1-preprocess", &old);
    debug_dump::dump(settings, "source2-step1-preprocess", &new);

    // Fingerprints come from the resolved view of each input: the old
    // document with its revisions applied, the new with its revisions
    // undone, so pre-existing markup never reads as a content difference.
    let old_resolved = resolver.accept(old.clone());
    let new_resolved = resolver.reject(new.clone());
    let old = hash_block_content(old, &old_resolved, settings);
    let new = hash_block_content(new, &new_resolved, settings);
    debug_dump::dump(settings, "source1-step2-hashed", &old);
    debug_dump::dump(settings, "source2-step2-hashed", &new);

    // Correlation itself runs over the accepted views.
    let old = resolver.accept(old);
    let new = resolver.accept(new);
    let old_blocks = collect_blocks(&old)?;
    let new_blocks = collect_blocks(&new)?;
    tracing::debug!(
        old_blocks = old_blocks.len(),
        new_blocks = new_blocks.len(),
        "pipeline correlating"
    );
    let units = correlate(&old_blocks, &new_blocks, settings);
    debug_dump::dump(settings, "step3-correlated", &units);

    let tree = reconstruct(units, settings)?;
    let tree = bookmarks::mark_fields_dirty(tree);
    let tree = fill_missing(tree, &mut alloc);
    debug_dump::dump(settings, "step4-reconstructed", &tree);
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Validation / stripping
// ---------------------------------------------------------------------------

/// Check the structural invariants correlation depends on.
///
/// # Errors
/// Returns [`CompareError::MalformedTree`] when the root is not a body,
/// a table holds a non-row child, or a row holds a non-cell child.
pub fn validate(tree: &Node) -> Result<(), CompareError> {
    use redline_model::NodeKind;

    if !matches!(tree.kind, NodeKind::Body) {
        return Err(CompareError::MalformedTree {
            detail: "root node must be a body".to_owned(),
        });
    }
    let mut problem: Option<String> = None;
    tree.for_each(&mut |node| {
        if problem.is_some() {
            return;
        }
        match &node.kind {
            NodeKind::Table => {
                if let Some(bad) = node
                    .children
                    .iter()
                    .find(|c| !matches!(c.kind, NodeKind::Row(_)))
                {
                    problem = Some(format!("table child must be a row, found {:?}", bad.kind));
                }
            }
            NodeKind::Row(_) => {
                if let Some(bad) = node
                    .children
                    .iter()
                    .find(|c| !matches!(c.kind, NodeKind::Cell))
                {
                    problem = Some(format!("row child must be a cell, found {:?}", bad.kind));
                }
            }
            _ => {}
        }
    });
    match problem {
        Some(detail) => Err(CompareError::MalformedTree { detail }),
        None => Ok(()),
    }
}

/// Remove unids and fingerprints. They are working state, never part of
/// the user-visible result.
#[must_use]
pub fn strip_working_state(mut tree: Node) -> Node {
    tree.unid = None;
    tree.fingerprint = None;
    tree.children = tree
        .children
        .into_iter()
        .map(strip_working_state)
        .collect();
    tree
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use redline_model::{NodeKind, builder};

    use super::*;
    use crate::revisions::get_revisions;

    #[test]
    fn compare_of_identical_documents_yields_no_revisions() {
        let doc = builder::body(vec![
            builder::para("one"),
            builder::table(vec![builder::row(vec![builder::cell(vec![builder::para(
                "two",
            )])])]),
            builder::para("three"),
        ]);
        let settings = ComparerSettings::default();
        let merged = compare(&doc, &doc, &settings).expect("compare");
        assert!(get_revisions(&merged).is_empty());
        assert_eq!(merged.inner_text(), doc.inner_text());
    }

    #[test]
    fn output_carries_no_working_state() {
        let old = builder::body(vec![builder::para("a")]);
        let new = builder::body(vec![builder::para("a b")]);
        let merged = compare(&old, &new, &ComparerSettings::default()).expect("compare");
        merged.for_each(&mut |n| {
            assert!(n.unid.is_none());
            assert!(n.fingerprint.is_none());
        });
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let old = builder::body(vec![builder::para("alpha"), builder::para("beta")]);
        let new = builder::body(vec![builder::para("alpha"), builder::para("gamma")]);
        let settings = ComparerSettings::default();
        let first = compare(&old, &new, &settings).expect("compare");
        let second = compare(&old, &new, &settings).expect("compare");
        assert_eq!(
            serde_json::to_vec(&first).expect("json"),
            serde_json::to_vec(&second).expect("json")
        );
    }

    #[test]
    fn malformed_table_is_fatal() {
        let doc = builder::body(vec![Node::with_children(
            NodeKind::Table,
            vec![builder::para("not a row")],
        )]);
        let err = compare(&doc, &doc, &ComparerSettings::default()).unwrap_err();
        assert!(matches!(err, CompareError::MalformedTree { .. }));
    }

    #[test]
    fn non_body_root_is_fatal() {
        let doc = builder::para("floating");
        let err = validate(&doc).unwrap_err();
        assert!(matches!(err, CompareError::MalformedTree { .. }));
    }

    #[test]
    fn fields_in_output_are_marked_dirty() {
        let old = builder::body(vec![builder::para_runs(vec![
            builder::field_begin(),
            builder::field_instruction("PAGE"),
            builder::field_end(),
        ])]);
        let merged = compare(&old, &old, &ComparerSettings::default()).expect("compare");
        let mut dirty = Vec::new();
        merged.for_each(&mut |n| {
            if let NodeKind::FieldBegin { dirty: d } = n.kind {
                dirty.push(d);
            }
        });
        assert_eq!(dirty, vec![true]);
    }

    #[test]
    fn debug_dir_receives_stage_dumps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = ComparerSettings {
            debug_dir: Some(dir.path().to_path_buf()),
            ..ComparerSettings::default()
        };
        let doc = builder::body(vec![builder::para("x")]);
        compare(&doc, &doc, &settings).expect("compare");

        for name in [
            "source1-step1-preprocess.json",
            "source2-step1-preprocess.json",
            "source1-step2-hashed.json",
            "source2-step2-hashed.json",
            "step3-correlated.json",
            "step4-reconstructed.json",
        ] {
            assert!(dir.path().join(name).exists(), "missing dump {name}");
        }
    }
}
