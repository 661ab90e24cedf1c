//! Three-way reconciliation scenarios.

use redline::{
    ComparerSettings, ReconcileStatus, compare, get_revisions, triangular_compare,
};
use redline_model::{Node, RevisionKind, builder};

fn body_of(texts: &[&str]) -> Node {
    builder::body(texts.iter().map(|t| builder::para(t)).collect())
}

#[test]
fn shared_edit_is_not_applied_twice() {
    // Both the manual edit and the redraft changed $100 to $150; the
    // redraft additionally added a clause. Only the clause may show up.
    let original = body_of(&["The fee is $100."]);
    let negotiated = body_of(&["The fee is $150."]);
    let updated = body_of(&["The fee is $150, due monthly."]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", true)
        .expect("triangular");
    assert_eq!(outcome.status, ReconcileStatus::Full);

    let revisions = get_revisions(&outcome.tree);
    let inserted: Vec<&str> = revisions
        .iter()
        .filter(|r| r.kind == RevisionKind::Inserted)
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(inserted, vec![", due monthly"]);

    // Non-duplication: no inserted segment appears twice.
    let mut sorted = inserted.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), inserted.len());
}

#[test]
fn reconciled_output_carries_the_author() {
    let original = body_of(&["base"]);
    let negotiated = body_of(&["base"]);
    let updated = body_of(&["base extended"]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", true)
        .expect("triangular");
    let revisions = get_revisions(&outcome.tree);
    assert!(!revisions.is_empty());
    assert!(revisions.iter().all(|r| r.author == "counsel"));
}

#[test]
fn redraft_reapplying_a_manual_deletion_is_suppressed() {
    let original = body_of(&["keep x tail"]);
    let negotiated = body_of(&["keep tail"]);
    let updated = body_of(&["keep x tail"]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", true)
        .expect("triangular");
    assert_eq!(outcome.status, ReconcileStatus::Full);
    assert!(get_revisions(&outcome.tree).is_empty());
    assert_eq!(outcome.tree.inner_text(), "keep tail");
}

#[test]
fn redraft_dropping_a_manual_insertion_is_undeleted() {
    let original = body_of(&["a"]);
    let negotiated = body_of(&["a b"]);
    let updated = body_of(&["a"]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", true)
        .expect("triangular");
    assert!(get_revisions(&outcome.tree).is_empty());
    assert_eq!(outcome.tree.inner_text(), "a b");
}

#[test]
fn disabled_reconciliation_equals_the_two_way_diff() {
    let original = body_of(&["irrelevant baseline"]);
    let negotiated = body_of(&["draft v2"]);
    let updated = body_of(&["draft v3"]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", false)
        .expect("triangular");
    assert_eq!(outcome.status, ReconcileStatus::Unreconciled);
    assert!(outcome.notes.is_empty());

    let plain = compare(
        &negotiated,
        &updated,
        &ComparerSettings::with_author("counsel"),
    )
    .expect("compare");
    assert_eq!(
        serde_json::to_string(&outcome.tree).expect("json"),
        serde_json::to_string(&plain).expect("json")
    );
}

#[test]
fn triangular_always_returns_the_primary_diff() {
    // Even with an unrelated original, the negotiated→updated diff is
    // intact: reconciliation may only remove duplicated edits.
    let original = body_of(&["zz"]);
    let negotiated = body_of(&["shared", "old paragraph"]);
    let updated = body_of(&["shared", "new paragraph"]);

    let outcome = triangular_compare(&original, &negotiated, &updated, "counsel", true)
        .expect("triangular");
    assert_eq!(outcome.status, ReconcileStatus::Full);
    // Deleted "old" precedes inserted "new" inside the edited paragraph.
    assert_eq!(outcome.tree.inner_text(), "sharedoldnew paragraph");
}
