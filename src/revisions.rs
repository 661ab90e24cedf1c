//! Flattening merged markup into revision summaries.

use redline_model::{DocPart, Node, NodeKind, RevisionMark, RevisionRecord};

/// Flatten a merged tree's tracked revisions into summary records, in
/// document order.
///
/// Adjacent markup carrying the same author, date, and kind merges into
/// one record; a revised paragraph mark between merged stretches appears
/// as `'\n'` in the record text. Row-level marks carry no text of their
/// own (their cell content is marked separately) and are skipped.
#[must_use]
pub fn get_revisions(tree: &Node) -> Vec<RevisionRecord> {
    let mut events = Vec::new();
    collect(tree, &mut events);
    merge(events)
}

struct Event {
    mark: RevisionMark,
    text: String,
}

fn collect(node: &Node, out: &mut Vec<Event>) {
    match &node.kind {
        NodeKind::Revision(mark) => {
            out.push(Event {
                mark: mark.clone(),
                text: node.inner_text(),
            });
        }
        NodeKind::Paragraph(props) => {
            for child in &node.children {
                collect(child, out);
            }
            // The mark sits at the paragraph's end; it reads as a line
            // break in the flattened text.
            if let Some(mark) = &props.mark_revision {
                out.push(Event {
                    mark: mark.clone(),
                    text: "\n".to_owned(),
                });
            }
        }
        _ => {
            for child in &node.children {
                collect(child, out);
            }
        }
    }
}

fn merge(events: Vec<Event>) -> Vec<RevisionRecord> {
    let mut records: Vec<RevisionRecord> = Vec::new();
    for event in events {
        if let Some(last) = records.last_mut() {
            if last.kind == event.mark.kind
                && last.author == event.mark.author
                && last.date == event.mark.date
            {
                last.text.push_str(&event.text);
                continue;
            }
        }
        records.push(RevisionRecord {
            author: event.mark.author,
            date: event.mark.date,
            kind: event.mark.kind,
            text: event.text,
            part: DocPart::Body,
        });
    }
    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
