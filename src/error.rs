//! Error types for the comparison engine.
//!
//! Only genuine structural-integrity violations are errors: a tree the
//! correlator cannot proceed on. Identity loss (coalesced paragraphs,
//! fingerprint-less blocks) and bookmark inconsistencies are normal
//! fallbacks handled inside the pipeline, and three-way reconciliation
//! failures degrade to a partial result instead of surfacing here.

use std::fmt;

// ---------------------------------------------------------------------------
// CompareError
// ---------------------------------------------------------------------------

/// Fatal error from a comparison run.
#[derive(Debug)]
pub enum CompareError {
    /// An input tree is structurally invalid.
    MalformedTree {
        /// What was wrong and where.
        detail: String,
    },

    /// A node that must carry a unid at this stage does not.
    ///
    /// Indicates a pipeline-ordering bug or an input tree that bypassed
    /// the identity tagger, not a recoverable identity-loss case.
    MissingUnid {
        /// The stage and node context.
        context: String,
    },
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTree { detail } => {
                write!(f, "malformed document tree: {detail}")
            }
            Self::MissingUnid { context } => {
                write!(f, "node is missing its identity ({context})")
            }
        }
    }
}

impl std::error::Error for CompareError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
