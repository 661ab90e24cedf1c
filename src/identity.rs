//! Identity tagging.
//!
//! Every node entering the pipeline gets a fresh [`Unid`] so later stages
//! can relocate it across tree transforms without parent pointers. Note
//! references are renumbered into a caller-supplied disjoint range so two
//! trees merged later cannot collide on document-wide unique ids.

use std::collections::BTreeMap;

use redline_model::{Node, NodeKind, NoteKind, Unid};

// ---------------------------------------------------------------------------
// UnidAllocator
// ---------------------------------------------------------------------------

/// Sequential unid allocator, scoped to one comparison invocation.
///
/// One allocator serves both input trees of a comparison so the two unid
/// universes are disjoint; sequential allocation keeps intermediate
/// artifacts deterministic.
#[derive(Debug, Default)]
pub struct UnidAllocator {
    next: u64,
}

impl UnidAllocator {
    /// Fresh allocator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next unid.
    pub const fn alloc(&mut self) -> Unid {
        let unid = Unid::new(self.next);
        self.next += 1;
        unid
    }
}

// ---------------------------------------------------------------------------
// IdentityTagger
// ---------------------------------------------------------------------------

/// Assigns unids to every node and renumbers note references.
pub struct IdentityTagger<'a> {
    alloc: &'a mut UnidAllocator,
    note_base: u32,
    note_map: BTreeMap<(NoteKind, u32), u32>,
}

impl<'a> IdentityTagger<'a> {
    /// A tagger renumbering note references upward from `note_base`.
    pub fn new(alloc: &'a mut UnidAllocator, note_base: u32) -> Self {
        Self {
            alloc,
            note_base,
            note_map: BTreeMap::new(),
        }
    }

    /// Return an equivalent tree where every node carries a fresh unid and
    /// note reference ids live in this tagger's range. Pure: the input is
    /// consumed and a new tree returned.
    #[must_use]
    pub fn tag(mut self, tree: Node) -> Node {
        self.tag_node(tree)
    }

    fn tag_node(&mut self, mut node: Node) -> Node {
        node.unid = Some(self.alloc.alloc());
        if let NodeKind::NoteReference { note, id } = node.kind {
            node.kind = NodeKind::NoteReference {
                note,
                id: self.renumber(note, id),
            };
        }
        node.children = node
            .children
            .into_iter()
            .map(|child| self.tag_node(child))
            .collect();
        node
    }

    /// Same source id always maps to the same renumbered id, so reference
    /// pairs within one tree stay consistent.
    fn renumber(&mut self, note: NoteKind, id: u32) -> u32 {
        let next = self.note_base + 1 + u32::try_from(self.note_map.len()).unwrap_or(u32::MAX);
        *self.note_map.entry((note, id)).or_insert(next)
    }
}

/// Assign unids to nodes that lost theirs (revision resolution can drop
/// wrappers and splice children, and the reconstructor creates fresh
/// markup nodes). Nodes that already have a unid keep it.
#[must_use]
pub fn fill_missing(mut node: Node, alloc: &mut UnidAllocator) -> Node {
    if node.unid.is_none() {
        node.unid = Some(alloc.alloc());
    }
    node.children = node
        .children
        .into_iter()
        .map(|child| fill_missing(child, alloc))
        .collect();
    node
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
