//! Three-way reconciliation.
//!
//! Given an original baseline, a negotiated redraft, and a manually
//! updated version, the primary output is the two-way diff
//! negotiated→updated. Reconciliation then classifies that diff against
//! the manual edit stream (original→negotiated) and the update stream
//! (original→updated): an insertion the redraft already carries is left
//! alone, an insertion that merely re-applies text a manual edit deleted
//! is removed (cascading away emptied paragraphs, cells, and rows), and a
//! deletion of text a manual edit independently re-inserted is
//! materialized back into ordinary runs.
//!
//! Reconciliation is best-effort by contract: a failed step downgrades
//! the status and logs a warning, but the primary diff is always
//! returned.

use std::collections::BTreeMap;

use redline_model::{Node, NodeKind, RevisionKind, RevisionRecord, Unid};
use serde::Serialize;

use crate::bookmarks;
use crate::error::CompareError;
use crate::pipeline::{compare, compare_keep_ids, strip_working_state};
use crate::revisions::get_revisions;
use crate::settings::ComparerSettings;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How much of the reconciliation completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileStatus {
    /// Every reconciliation step completed.
    Full,
    /// A step failed; the tree carries whatever reconciliation finished.
    Partial,
    /// Reconciliation was disabled or never started.
    Unreconciled,
}

/// The reconciled tree plus an audit trail.
#[derive(Clone, Debug)]
pub struct TriangularOutcome {
    pub tree: Node,
    pub status: ReconcileStatus,
    /// Heuristic decisions worth auditing (token-subtraction matches).
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Three-way compare. The primary output is always `diff(negotiated,
/// updated)`; with `reconcile` set, manual edits already reflected in the
/// redraft are suppressed from it.
///
/// # Errors
/// Returns [`CompareError`] only when the primary diff itself cannot be
/// computed; reconciliation failures degrade the status instead.
pub fn triangular_compare(
    original: &Node,
    negotiated: &Node,
    updated: &Node,
    author: &str,
    reconcile: bool,
) -> Result<TriangularOutcome, CompareError> {
    let settings = ComparerSettings::with_author(author);
    let mut result = compare_keep_ids(negotiated, updated, &settings)?;
    if !reconcile {
        return Ok(finish(result, ReconcileStatus::Unreconciled, Vec::new()));
    }

    let streams = compare(original, negotiated, &settings)
        .and_then(|manual| compare(original, updated, &settings).map(|update| (manual, update)));
    let (manual, update) = match streams {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = %err, "reconciliation inputs failed; returning unreconciled diff");
            return Ok(finish(result, ReconcileStatus::Unreconciled, Vec::new()));
        }
    };

    // Manual revisions split to one record per line so edits spanning a
    // revised paragraph mark reconcile line by line.
    let manual_revs: Vec<RevisionRecord> = get_revisions(&manual)
        .iter()
        .flat_map(RevisionRecord::split_lines)
        .collect();
    let manual_deletions: Vec<RevisionRecord> = manual_revs
        .iter()
        .filter(|r| r.kind == RevisionKind::Deleted)
        .cloned()
        .collect();
    let manual_insertions: Vec<RevisionRecord> = manual_revs
        .into_iter()
        .filter(|r| r.kind == RevisionKind::Inserted)
        .collect();
    let mut update_insertions: Vec<RevisionRecord> = get_revisions(&update)
        .into_iter()
        .filter(|r| r.kind == RevisionKind::Inserted)
        .collect();

    let mut notes = Vec::new();
    let mut status = ReconcileStatus::Full;
    if let Err(err) = reconcile_insertions(
        &mut result,
        &manual_deletions,
        &mut update_insertions,
        &mut notes,
    ) {
        tracing::warn!(error = %err, "insertion reconciliation failed");
        status = ReconcileStatus::Partial;
    } else if let Err(err) = reconcile_deletions(&mut result, &manual_insertions) {
        tracing::warn!(error = %err, "deletion reconciliation failed");
        status = ReconcileStatus::Partial;
    }
    Ok(finish(result, status, notes))
}

fn finish(tree: Node, status: ReconcileStatus, notes: Vec<String>) -> TriangularOutcome {
    TriangularOutcome {
        tree: strip_working_state(bookmarks::mark_fields_dirty(tree)),
        status,
        notes,
    }
}

// ---------------------------------------------------------------------------
// Step 4: insertions
// ---------------------------------------------------------------------------

fn reconcile_insertions(
    tree: &mut Node,
    manual_deletions: &[RevisionRecord],
    update_insertions: &mut Vec<RevisionRecord>,
    notes: &mut Vec<String>,
) -> Result<(), CompareError> {
    let insertions = collect_wrappers(tree, RevisionKind::Inserted)?;
    let mut i = 0;
    while i < insertions.len() {
        let wrapper = &insertions[i];
        let trimmed = wrapper.text.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        // Already present in the update stream: the redraft carries this
        // change itself, it is not a manual edit to replay.
        if let Some(pos) = update_insertions
            .iter()
            .position(|r| r.text.trim() == trimmed)
        {
            update_insertions.remove(pos);
            i += 1;
            continue;
        }

        let candidates: Vec<&RevisionRecord> = manual_deletions
            .iter()
            .filter(|d| d.date == wrapper.date)
            .collect();

        // Exact match against a manual deletion: superseded, remove it.
        if candidates.iter().any(|d| d.text.trim() == trimmed) {
            remove_and_prune(tree, wrapper.unid);
            i += 1;
            continue;
        }

        // Partial containment: the deletion covers this insertion and
        // more. Accumulate adjacent insertions while the concatenation
        // stays contained, so an edit split across runs is removed whole.
        if let Some(containing) = candidates.iter().find(|d| d.text.contains(trimmed)) {
            let mut end = i;
            let mut concat = wrapper.text.clone();
            for (k, next) in insertions.iter().enumerate().skip(i + 1) {
                concat.push_str(&next.text);
                if !containing.text.contains(concat.trim()) {
                    break;
                }
                end = k;
            }
            for wrapper in &insertions[i..=end] {
                remove_and_prune(tree, wrapper.unid);
            }
            i = end + 1;
            continue;
        }

        // Token subtraction: every whitespace token of the insertion is
        // found somewhere in one candidate deletion.
        if candidates.iter().any(|d| tokens_contained(&d.text, trimmed)) {
            notes.push(format!(
                "token-subtraction match removed insertion {trimmed:?}"
            ));
            remove_and_prune(tree, wrapper.unid);
        }
        i += 1;
    }
    Ok(())
}

/// Remove each whitespace token of `needle` from a copy of `haystack`;
/// true if every token was found.
fn tokens_contained(haystack: &str, needle: &str) -> bool {
    let mut remaining = haystack.to_owned();
    let mut any = false;
    for token in needle.split_whitespace() {
        any = true;
        match remaining.find(token) {
            Some(pos) => remaining.replace_range(pos..pos + token.len(), ""),
            None => return false,
        }
    }
    any
}

// ---------------------------------------------------------------------------
// Step 5: deletions
// ---------------------------------------------------------------------------

/// Un-delete text the manual author re-inserted independently: the
/// deletion wrapper is replaced by its content as ordinary runs, encoded
/// as field instructions when the deletion sat in an active field-code
/// region.
fn reconcile_deletions(
    tree: &mut Node,
    manual_insertions: &[RevisionRecord],
) -> Result<(), CompareError> {
    let regions = field_code_regions(tree);
    let deletions = collect_wrappers(tree, RevisionKind::Deleted)?;
    for wrapper in deletions {
        let trimmed = wrapper.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let matched = manual_insertions
            .iter()
            .any(|r| r.date == wrapper.date && r.text.trim() == trimmed);
        if matched {
            let as_instruction = regions.get(&wrapper.unid).copied().unwrap_or(false);
            splice_wrapper(tree, wrapper.unid, as_instruction);
        }
    }
    Ok(())
}

/// For every revision wrapper, whether it sits inside a field's code
/// region (between a begin marker and its separator).
fn field_code_regions(tree: &Node) -> BTreeMap<Unid, bool> {
    fn walk(node: &Node, stack: &mut Vec<bool>, out: &mut BTreeMap<Unid, bool>) {
        match &node.kind {
            NodeKind::FieldBegin { .. } => stack.push(true),
            NodeKind::FieldSeparate => {
                if let Some(top) = stack.last_mut() {
                    *top = false;
                }
            }
            NodeKind::FieldEnd => {
                let _ = stack.pop();
            }
            NodeKind::Revision(_) => {
                if let Some(unid) = node.unid {
                    out.insert(unid, stack.last().copied().unwrap_or(false));
                }
            }
            _ => {}
        }
        for child in &node.children {
            walk(child, stack, out);
        }
    }
    let mut out = BTreeMap::new();
    walk(tree, &mut Vec::new(), &mut out);
    out
}

// ---------------------------------------------------------------------------
// Tree surgery
// ---------------------------------------------------------------------------

struct WrapperRef {
    unid: Unid,
    text: String,
    date: String,
}

/// Revision wrappers of one kind, in document order.
fn collect_wrappers(tree: &Node, kind: RevisionKind) -> Result<Vec<WrapperRef>, CompareError> {
    let mut out = Vec::new();
    let mut missing = false;
    tree.for_each(&mut |node| {
        if let NodeKind::Revision(mark) = &node.kind {
            if mark.kind != kind {
                return;
            }
            match node.unid {
                Some(unid) => out.push(WrapperRef {
                    unid,
                    text: node.inner_text(),
                    date: mark.date.clone(),
                }),
                None => missing = true,
            }
        }
    });
    if missing {
        return Err(CompareError::MissingUnid {
            context: "reconciliation: revision wrapper".to_owned(),
        });
    }
    Ok(out)
}

/// Remove the node with `target`, then prune any container on the path
/// that the removal emptied: a content-empty paragraph, and childless
/// cells, rows, and tables above it.
fn remove_and_prune(tree: &mut Node, target: Unid) -> bool {
    if let Some(idx) = tree.children.iter().position(|c| c.unid == Some(target)) {
        tree.children.remove(idx);
        return true;
    }
    for idx in 0..tree.children.len() {
        if remove_and_prune(&mut tree.children[idx], target) {
            let child = &tree.children[idx];
            let emptied = match &child.kind {
                NodeKind::Paragraph(_) => child.is_content_empty(),
                NodeKind::Cell | NodeKind::Row(_) | NodeKind::Table => child.children.is_empty(),
                _ => false,
            };
            if emptied {
                tree.children.remove(idx);
            }
            return true;
        }
    }
    false
}

/// Replace the wrapper with its children, spliced in place as ordinary
/// content. `as_instruction` re-encodes literal text as field
/// instructions.
fn splice_wrapper(tree: &mut Node, target: Unid, as_instruction: bool) -> bool {
    if let Some(idx) = tree.children.iter().position(|c| c.unid == Some(target)) {
        let wrapper = tree.children.remove(idx);
        let replacement: Vec<Node> = wrapper
            .children
            .into_iter()
            .map(|child| {
                if as_instruction {
                    re_encode(child)
                } else {
                    child
                }
            })
            .collect();
        tree.children.splice(idx..idx, replacement);
        return true;
    }
    tree.children
        .iter_mut()
        .any(|child| splice_wrapper(child, target, as_instruction))
}

fn re_encode(mut node: Node) -> Node {
    if let NodeKind::Text(t) = node.kind {
        node.kind = NodeKind::FieldInstruction(t);
    }
    node.children = node.children.into_iter().map(re_encode).collect();
    node
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use redline_model::builder;

    use super::*;

    fn body_of(texts: &[&str]) -> Node {
        builder::body(texts.iter().map(|t| builder::para(t)).collect())
    }

    #[test]
    fn scenario_shared_price_change_is_not_duplicated() {
        let original = body_of(&["The fee is $100."]);
        let negotiated = body_of(&["The fee is $150."]);
        let updated = body_of(&["The fee is $150, due monthly."]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", true)
                .expect("triangular");
        assert_eq!(outcome.status, ReconcileStatus::Full);

        let revisions = get_revisions(&outcome.tree);
        let inserted: Vec<&str> = revisions
            .iter()
            .filter(|r| r.kind == RevisionKind::Inserted)
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(inserted, vec![", due monthly"]);
        assert!(
            revisions.iter().all(|r| !r.text.contains("150")),
            "price change must not be duplicated"
        );
    }

    #[test]
    fn insertion_superseded_by_manual_deletion_is_removed() {
        // Manual edit deleted "x "; the redraft re-added it.
        let original = body_of(&["keep x tail"]);
        let negotiated = body_of(&["keep tail"]);
        let updated = body_of(&["keep x tail"]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", true)
                .expect("triangular");
        assert_eq!(outcome.status, ReconcileStatus::Full);
        assert!(get_revisions(&outcome.tree).is_empty());
        assert_eq!(outcome.tree.inner_text(), "keep tail");
    }

    #[test]
    fn emptied_paragraph_is_pruned_after_removal() {
        let original = body_of(&["keep", "x"]);
        let negotiated = builder::body(vec![
            builder::para("keep"),
            builder::para_runs(Vec::new()),
        ]);
        let updated = body_of(&["keep", "x"]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", true)
                .expect("triangular");
        assert!(get_revisions(&outcome.tree).is_empty());
        assert_eq!(outcome.tree.children.len(), 1, "emptied paragraph pruned");
        assert_eq!(outcome.tree.inner_text(), "keep");
    }

    #[test]
    fn deletion_matching_manual_insertion_is_materialized() {
        // Manual edit inserted " b"; the redraft dropped it again.
        let original = body_of(&["a"]);
        let negotiated = body_of(&["a b"]);
        let updated = body_of(&["a"]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", true)
                .expect("triangular");
        assert_eq!(outcome.status, ReconcileStatus::Full);
        assert!(get_revisions(&outcome.tree).is_empty(), "un-deleted");
        assert_eq!(outcome.tree.inner_text(), "a b");
    }

    #[test]
    fn token_subtraction_fires_and_is_noted() {
        let original = body_of(&["QQ WW tail"]);
        let negotiated = body_of(&["tail"]);
        let updated = body_of(&["WW QQ tail"]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", true)
                .expect("triangular");
        assert!(get_revisions(&outcome.tree).is_empty());
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].contains("token-subtraction"));
    }

    #[test]
    fn reconcile_disabled_degrades_to_plain_compare() {
        let original = body_of(&["The fee is $100."]);
        let negotiated = body_of(&["keep x tail"]);
        let updated = body_of(&["keep tail"]);

        let outcome =
            triangular_compare(&original, &negotiated, &updated, "counsel", false)
                .expect("triangular");
        assert_eq!(outcome.status, ReconcileStatus::Unreconciled);

        let settings = ComparerSettings::with_author("counsel");
        let plain = compare(&negotiated, &updated, &settings).expect("compare");
        assert_eq!(
            serde_json::to_string(&outcome.tree).expect("json"),
            serde_json::to_string(&plain).expect("json")
        );
    }

    #[test]
    fn tokens_contained_requires_every_token() {
        assert!(tokens_contained("alpha beta gamma", "beta alpha"));
        assert!(!tokens_contained("alpha beta", "beta delta"));
        assert!(!tokens_contained("anything", "   "), "no tokens, no match");
    }
}
