//! Flattened revision summaries.

use serde::{Deserialize, Serialize};

use crate::node::RevisionKind;

// ---------------------------------------------------------------------------
// DocPart
// ---------------------------------------------------------------------------

/// The document part a revision belongs to.
///
/// The engine operates on one part's tree at a time; embedders comparing
/// footnote or endnote parts tag the resulting records accordingly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocPart {
    #[default]
    Body,
    Footnotes,
    Endnotes,
}

impl std::fmt::Display for DocPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::Footnotes => write!(f, "footnotes"),
            Self::Endnotes => write!(f, "endnotes"),
        }
    }
}

// ---------------------------------------------------------------------------
// RevisionRecord
// ---------------------------------------------------------------------------

/// One flattened tracked revision from a merged document.
///
/// Adjacent markup with the same author, date, and kind is merged into a
/// single record; a revised paragraph mark between merged stretches shows
/// up as `'\n'` in `text`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub author: String,
    pub date: String,
    pub kind: RevisionKind,
    pub text: String,
    pub part: DocPart,
}

impl RevisionRecord {
    /// Split this record into one record per line.
    ///
    /// Records whose text spans revised paragraph marks carry embedded
    /// `'\n'` separators; line-level reconciliation wants one record per
    /// line. Empty lines are dropped.
    #[must_use]
    pub fn split_lines(&self) -> Vec<Self> {
        self.text
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| Self {
                author: self.author.clone(),
                date: self.date.clone(),
                kind: self.kind,
                text: line.to_owned(),
                part: self.part,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_empty_segments() {
        let rec = RevisionRecord {
            author: "a".to_owned(),
            date: "2024-01-01T00:00:00Z".to_owned(),
            kind: RevisionKind::Inserted,
            text: "first\n\nsecond\n".to_owned(),
            part: DocPart::Body,
        };
        let lines = rec.split_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].text, "second");
        assert_eq!(lines[1].kind, RevisionKind::Inserted);
    }

    #[test]
    fn split_lines_single_line_is_identity() {
        let rec = RevisionRecord {
            author: "a".to_owned(),
            date: "d".to_owned(),
            kind: RevisionKind::Deleted,
            text: "only".to_owned(),
            part: DocPart::Body,
        };
        assert_eq!(rec.split_lines(), vec![rec.clone()]);
    }
}
