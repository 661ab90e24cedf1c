//! Bookmark normalization.
//!
//! Bookmarks are the most fragile markup the engine carries: their start
//! and end markers are independent nodes that editors scatter across
//! structure. The pre-pass repairs each input before hashing so a
//! bookmark never straddles the block boundaries correlation works on:
//! orphaned halves are dropped, markers outside any paragraph are pulled
//! into the nearest following paragraph, and an end separated from its
//! start (or preceding it) is moved to the tail of the start's paragraph.
//! Trailing placeholder cell spans that disagree with a table's widest
//! row are dropped for the same reason: they would read as content
//! differences.
//!
//! All repairs are local and silent. The post-pass marks every field
//! dirty, since merged field instructions may reference moved content.

use std::collections::{BTreeMap, BTreeSet};

use redline_model::{Node, NodeKind};

// ---------------------------------------------------------------------------
// Pre-pass
// ---------------------------------------------------------------------------

/// Normalize bookmark placement and table-row placeholder spans.
#[must_use]
pub fn normalize(tree: Node) -> Node {
    let tree = drop_conflicting_spans(tree);

    let mut survey = Survey::default();
    survey.visit(&tree, None);
    let plan = survey.into_plan();
    if plan.is_noop() {
        return tree;
    }
    tracing::debug!(
        dropped = plan.drop.len(),
        relocated = plan.start_front.len() + plan.end_back.len(),
        "bookmark normalization"
    );

    let mut rebuild = Rebuild {
        plan: &plan,
        para_index: 0,
        seen: BTreeMap::new(),
    };
    rebuild.apply(tree)
}

/// Mark every field begin as needing recalculation.
#[must_use]
pub fn mark_fields_dirty(mut tree: Node) -> Node {
    if let NodeKind::FieldBegin { dirty } = &mut tree.kind {
        *dirty = true;
    }
    tree.children = tree.children.into_iter().map(mark_fields_dirty).collect();
    tree
}

// ---------------------------------------------------------------------------
// Rule (d): trailing placeholder spans
// ---------------------------------------------------------------------------

fn drop_conflicting_spans(mut node: Node) -> Node {
    if matches!(node.kind, NodeKind::Table) {
        let widest = node
            .children
            .iter()
            .map(|row| row.children.len())
            .max()
            .unwrap_or(0);
        for row in &mut node.children {
            if let NodeKind::Row(props) = &mut row.kind {
                if let Some(span) = props.trailing_span {
                    if row.children.len() + span as usize != widest {
                        props.trailing_span = None;
                    }
                }
            }
        }
    }
    node.children = node.children.into_iter().map(drop_conflicting_spans).collect();
    node
}

// ---------------------------------------------------------------------------
// Survey: where every marker and paragraph sits
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Sighting {
    /// Paragraph (document-order index) the marker sits in, if any.
    para: Option<usize>,
    /// Document-order visit counter.
    seq: usize,
    occurrence: usize,
}

#[derive(Default)]
struct Survey {
    seq: usize,
    para_count: usize,
    /// Visit counter at each paragraph's entry.
    para_seqs: Vec<usize>,
    starts: BTreeMap<String, Vec<Sighting>>,
    ends: BTreeMap<String, Vec<Sighting>>,
    occurrences: BTreeMap<(String, bool), usize>,
}

impl Survey {
    fn visit(&mut self, node: &Node, para: Option<usize>) {
        self.seq += 1;
        let seq = self.seq;
        match &node.kind {
            NodeKind::Paragraph(_) => {
                let idx = self.para_count;
                self.para_count += 1;
                self.para_seqs.push(seq);
                for child in &node.children {
                    self.visit(child, Some(idx));
                }
                return;
            }
            NodeKind::BookmarkStart(id) => self.sight(id, false, para, seq),
            NodeKind::BookmarkEnd(id) => self.sight(id, true, para, seq),
            _ => {}
        }
        for child in &node.children {
            self.visit(child, para);
        }
    }

    fn sight(&mut self, id: &str, is_end: bool, para: Option<usize>, seq: usize) {
        let occ = self
            .occurrences
            .entry((id.to_owned(), is_end))
            .or_insert(0);
        let occurrence = *occ;
        *occ += 1;
        let map = if is_end { &mut self.ends } else { &mut self.starts };
        map.entry(id.to_owned()).or_default().push(Sighting {
            para,
            seq,
            occurrence,
        });
    }

    /// Nearest paragraph at or after `seq`, falling back to the last
    /// paragraph in the document.
    fn following_paragraph(&self, seq: usize) -> Option<usize> {
        self.para_seqs
            .iter()
            .position(|&p| p > seq)
            .or_else(|| self.para_count.checked_sub(1))
    }

    fn into_plan(self) -> Plan {
        let mut plan = Plan::default();
        let ids: BTreeSet<&String> = self.starts.keys().chain(self.ends.keys()).collect();
        for id in ids {
            let starts = self.starts.get(id).map_or(&[][..], Vec::as_slice);
            let ends = self.ends.get(id).map_or(&[][..], Vec::as_slice);

            // Rule (a): orphaned halves, and any duplicates beyond the
            // first pair, are dropped.
            if starts.is_empty() || ends.is_empty() {
                for s in starts {
                    plan.drop_marker(id, false, s.occurrence);
                }
                for e in ends {
                    plan.drop_marker(id, true, e.occurrence);
                }
                continue;
            }
            for s in &starts[1..] {
                plan.drop_marker(id, false, s.occurrence);
            }
            for e in &ends[1..] {
                plan.drop_marker(id, true, e.occurrence);
            }
            let start = starts[0];
            let end = ends[0];

            // Rule (b) for the start: pull into the nearest following
            // paragraph. No paragraph anywhere means the pair cannot be
            // placed at all.
            let (start_para, start_moved) = match start.para {
                Some(p) => (p, false),
                None => match self.following_paragraph(start.seq) {
                    Some(p) => (p, true),
                    None => {
                        plan.drop_marker(id, false, start.occurrence);
                        plan.drop_marker(id, true, end.occurrence);
                        continue;
                    }
                },
            };
            if start_moved {
                plan.drop_marker(id, false, start.occurrence);
                plan.start_front.entry(start_para).or_default().push(id.clone());
            }

            // Rules (b) + (c) for the end: it must live in the start's
            // paragraph and follow the start. A start moved to the
            // paragraph front precedes everything in it.
            let end_in_place = end.para == Some(start_para)
                && (start_moved || end.seq > start.seq);
            if !end_in_place {
                plan.drop_marker(id, true, end.occurrence);
                plan.end_back.entry(start_para).or_default().push(id.clone());
            }
        }
        plan
    }
}

// ---------------------------------------------------------------------------
// Plan + rebuild
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Plan {
    /// Markers to remove, keyed by (id, is_end, occurrence).
    drop: BTreeSet<(String, bool, usize)>,
    /// Start markers to insert at the front of a paragraph.
    start_front: BTreeMap<usize, Vec<String>>,
    /// End markers to append at the back of a paragraph.
    end_back: BTreeMap<usize, Vec<String>>,
}

impl Plan {
    fn drop_marker(&mut self, id: &str, is_end: bool, occurrence: usize) {
        self.drop.insert((id.to_owned(), is_end, occurrence));
    }

    fn is_noop(&self) -> bool {
        self.drop.is_empty() && self.start_front.is_empty() && self.end_back.is_empty()
    }
}

struct Rebuild<'a> {
    plan: &'a Plan,
    para_index: usize,
    seen: BTreeMap<(String, bool), usize>,
}

impl Rebuild<'_> {
    fn apply(&mut self, mut node: Node) -> Node {
        if matches!(node.kind, NodeKind::Paragraph(_)) {
            let idx = self.para_index;
            self.para_index += 1;

            let mut children = Vec::with_capacity(node.children.len());
            if let Some(ids) = self.plan.start_front.get(&idx) {
                for id in ids {
                    children.push(Node::new(NodeKind::BookmarkStart(id.clone())));
                }
            }
            for child in node.children {
                if let Some(kept) = self.keep(child) {
                    children.push(kept);
                }
            }
            if let Some(ids) = self.plan.end_back.get(&idx) {
                for id in ids {
                    children.push(Node::new(NodeKind::BookmarkEnd(id.clone())));
                }
            }
            node.children = children;
            return node;
        }

        let children = std::mem::take(&mut node.children);
        node.children = children
            .into_iter()
            .filter_map(|child| self.keep(child))
            .collect();
        node
    }

    fn keep(&mut self, node: Node) -> Option<Node> {
        let marker = match &node.kind {
            NodeKind::BookmarkStart(id) => Some((id.clone(), false)),
            NodeKind::BookmarkEnd(id) => Some((id.clone(), true)),
            _ => None,
        };
        if let Some(key) = marker {
            let occ = self.seen.entry(key.clone()).or_insert(0);
            let occurrence = *occ;
            *occ += 1;
            if self.plan.drop.contains(&(key.0, key.1, occurrence)) {
                return None;
            }
            return Some(node);
        }
        Some(self.apply(node))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
