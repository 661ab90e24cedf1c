//! Comparison settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ComparerSettings
// ---------------------------------------------------------------------------

/// Configuration for a comparison run.
///
/// All fields have usable defaults; `date_for_revisions` is explicit rather
/// than wall-clock so that repeated runs on identical input produce
/// byte-identical output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ComparerSettings {
    /// Author stamped on every generated revision mark.
    pub author_for_revisions: String,

    /// Timestamp stamped on every generated revision mark (ISO-8601).
    pub date_for_revisions: String,

    /// Compare text case-insensitively when fingerprinting and matching.
    pub case_insensitive: bool,

    /// Collapse runs of whitespace to a single space (and trim) when
    /// fingerprinting and matching.
    pub normalize_whitespace: bool,

    /// Base for renumbering footnote/endnote reference ids. Each input
    /// tree gets a disjoint range above this base so the merged output
    /// cannot collide.
    pub starting_id_for_footnotes_endnotes: u32,

    /// When set, each pipeline stage serializes its tree into this
    /// directory as pretty JSON. Purely diagnostic; failures are logged
    /// and never affect the result.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ComparerSettings {
    fn default() -> Self {
        Self {
            author_for_revisions: default_author(),
            date_for_revisions: default_date(),
            case_insensitive: false,
            normalize_whitespace: false,
            starting_id_for_footnotes_endnotes: 0,
            debug_dir: None,
        }
    }
}

fn default_author() -> String {
    "redline".to_owned()
}

fn default_date() -> String {
    "2000-01-01T00:00:00Z".to_owned()
}

impl ComparerSettings {
    /// Settings with the given revision author and everything else default.
    #[must_use]
    pub fn with_author(author: impl Into<String>) -> Self {
        Self {
            author_for_revisions: author.into(),
            ..Self::default()
        }
    }

    /// Apply the configured case/whitespace policy to comparison text.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let text = if self.case_insensitive {
            text.to_lowercase()
        } else {
            text.to_owned()
        };
        if self.normalize_whitespace {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text
        }
    }
}
