//! Working-state identifiers: per-node unids and block content fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Unid
// ---------------------------------------------------------------------------

/// An opaque per-node identifier, unique within a tree at assignment time.
///
/// Unids are working state: the identity tagger attaches them at pipeline
/// start, the reconstructor consumes them to reassemble ancestry, and the
/// public entry points strip them from the final output. They are allocated
/// sequentially per invocation, so intermediate artifacts (debug dumps) are
/// deterministic.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Unid(u64);

impl Unid {
    /// Wrap a raw allocation counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Unid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{:06x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// A 32-byte content fingerprint attached to paragraph and table-row nodes.
///
/// Two blocks with equal fingerprints are treated as content-identical
/// regardless of which document produced them. Serialized as lowercase hex
/// so debug dumps stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap a raw digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Error parsing a hex-encoded fingerprint.
#[derive(Debug, Error)]
#[error("invalid fingerprint {value:?}: {reason}")]
pub struct FingerprintParseError {
    /// The raw string that failed to parse.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 64 {
            return Err(FingerprintParseError {
                reason: format!("expected 64 hex characters, got {}", s.len()),
                value: s,
            });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| FingerprintParseError {
                value: s.clone(),
                reason: "not valid UTF-8".to_owned(),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| FingerprintParseError {
                value: s.clone(),
                reason: format!("invalid hex pair {hex:?}"),
            })?;
        }
        Ok(Self(bytes))
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
