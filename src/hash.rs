//! Block content fingerprinting.
//!
//! Fingerprints are computed on the *resolved* tree (revisions applied or
//! undone) and propagated back onto the *unresolved* tree by unid. A block
//! whose paragraphs coalesced during resolution keeps only the surviving
//! unid, so the lost paragraphs stay fingerprint-less and fall through to
//! finer-grained LCS matching later — intentional, not an error.

use std::collections::BTreeMap;

use redline_model::{Fingerprint, Node, NodeKind, Unid};
use sha2::{Digest, Sha256};

use crate::settings::ComparerSettings;

/// Discriminator mixed into a paragraph fingerprint.
const PARA_TAG: &[u8] = b"para\0";
/// Discriminator mixed into a table-row fingerprint.
const ROW_TAG: &[u8] = b"row\0";

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Fingerprint every paragraph and table row of `resolved`, then attach
/// each fingerprint to the structurally corresponding node of
/// `unresolved` (located by unid).
#[must_use]
pub fn hash_block_content(
    unresolved: Node,
    resolved: &Node,
    settings: &ComparerSettings,
) -> Node {
    let mut by_unid: BTreeMap<Unid, Fingerprint> = BTreeMap::new();
    collect_fingerprints(resolved, settings, &mut by_unid);
    attach(unresolved, &by_unid)
}

fn collect_fingerprints(
    node: &Node,
    settings: &ComparerSettings,
    out: &mut BTreeMap<Unid, Fingerprint>,
) {
    match &node.kind {
        NodeKind::Paragraph(_) => {
            if let Some(unid) = node.unid {
                out.insert(unid, fingerprint_of(PARA_TAG, node, settings));
            }
            // Paragraphs contain no block-level descendants.
            return;
        }
        NodeKind::Row(_) => {
            if let Some(unid) = node.unid {
                out.insert(unid, fingerprint_of(ROW_TAG, node, settings));
            }
            // Keep walking: cells may hold paragraphs and nested tables
            // that need their own fingerprints.
        }
        _ => {}
    }
    for child in &node.children {
        collect_fingerprints(child, settings, out);
    }
}

fn fingerprint_of(tag: &[u8], node: &Node, settings: &ComparerSettings) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(settings.normalize(&node.inner_text()).as_bytes());
    Fingerprint::from_bytes(hasher.finalize().into())
}

fn attach(mut node: Node, by_unid: &BTreeMap<Unid, Fingerprint>) -> Node {
    if node.is_block() {
        node.fingerprint = node.unid.and_then(|unid| by_unid.get(&unid).copied());
    }
    node.children = node
        .children
        .into_iter()
        .map(|child| attach(child, by_unid))
        .collect();
    node
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
