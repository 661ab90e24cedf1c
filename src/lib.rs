//! redline — document comparison with tracked-revision output.
//!
//! Compares two (or three) versions of a structured document and produces
//! one merged tree whose markup records every difference as a tracked
//! insertion or deletion, at paragraph, run, and character granularity.
//! Trees use the abstract schema in [`redline_model`]; decoding a concrete
//! package format into that schema is the embedder's concern.
//!
//! The pipeline: identity tagging, revision resolution, content
//! fingerprinting, LCS correlation with recursive refinement,
//! reconstruction, and bookmark normalization. [`triangular_compare`]
//! layers a best-effort three-way reconciliation on top.

pub mod atoms;
pub mod bookmarks;
pub mod correlate;
pub mod debug_dump;
pub mod error;
pub mod hash;
pub mod identity;
pub mod pipeline;
pub mod reconstruct;
pub mod resolve;
pub mod revisions;
pub mod settings;
pub mod telemetry;
pub mod triangular;

pub use error::CompareError;
pub use pipeline::{compare, compare_with, strip_working_state, validate};
pub use resolve::{MarkupResolver, RevisionResolver};
pub use revisions::get_revisions;
pub use settings::ComparerSettings;
pub use triangular::{ReconcileStatus, TriangularOutcome, triangular_compare};
