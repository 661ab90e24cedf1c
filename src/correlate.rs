//! Correlation: LCS over block fingerprints with recursive refinement.
//!
//! The top-level block sequences of the two documents are aligned by
//! longest common subsequence over exact fingerprint equality (blocks
//! without a fingerprint never match). Maximal unmatched gaps between
//! matches are refined recursively: first at run granularity (each text
//! run, field instruction, marker, or sentinel is one token), then at
//! character granularity. A gap that yields no match at all is emitted as
//! one Deleted unit followed by one Inserted unit — the delete-then-insert
//! tie-break used throughout.
//!
//! # Determinism
//!
//! The same pair of inputs always produces the same unit sequence: DP
//! backtracking resolves ties by preferring the earliest match in
//! document order, and all maps iterate in unid order.

use std::collections::BTreeMap;

use redline_model::Unid;
use serde::Serialize;

use crate::atoms::{AncestorKind, AtomKind, Block, ContentAtom};
use crate::settings::ComparerSettings;

// ---------------------------------------------------------------------------
// Comparison units
// ---------------------------------------------------------------------------

/// Correlation verdict for a comparison unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationStatus {
    Equal,
    Inserted,
    Deleted,
    /// Needs recursive refinement. Never present in the correlator's
    /// output; exists only between refinement passes.
    Unknown,
}

/// A contiguous grouping of content atoms with one correlation verdict.
///
/// Equal and Inserted units carry atoms from the new document (its
/// formatting is authoritative); Deleted units carry atoms from the old
/// document.
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonUnit {
    pub status: CorrelationStatus,
    pub atoms: Vec<ContentAtom>,
}

// ---------------------------------------------------------------------------
// Top-level correlation
// ---------------------------------------------------------------------------

/// Correlate two block sequences into an ordered comparison-unit list
/// covering every atom of both documents exactly once.
#[must_use]
pub fn correlate(
    old: &[Block],
    new: &[Block],
    settings: &ComparerSettings,
) -> Vec<ComparisonUnit> {
    let old_keys: Vec<Option<String>> = old
        .iter()
        .map(|b| b.fingerprint.map(|fp| fp.to_string()))
        .collect();
    let new_keys: Vec<Option<String>> = new
        .iter()
        .map(|b| b.fingerprint.map(|fp| fp.to_string()))
        .collect();
    let pairs = lcs_pairs(&old_keys, &new_keys);
    tracing::debug!(
        old_blocks = old.len(),
        new_blocks = new.len(),
        matched = pairs.len(),
        "block correlation"
    );

    let unid_map = container_map(old, new, &pairs);

    let mut units = Vec::new();
    let (mut i, mut j) = (0, 0);
    for &(pi, pj) in &pairs {
        emit_gap(&old[i..pi], &new[j..pj], &unid_map, settings, &mut units);
        units.push(ComparisonUnit {
            status: CorrelationStatus::Equal,
            atoms: new[pj].atoms.clone(),
        });
        i = pi + 1;
        j = pj + 1;
    }
    emit_gap(&old[i..], &new[j..], &unid_map, settings, &mut units);
    units
}

fn emit_gap(
    old: &[Block],
    new: &[Block],
    unid_map: &BTreeMap<Unid, Unid>,
    settings: &ComparerSettings,
    units: &mut Vec<ComparisonUnit>,
) {
    match (old.is_empty(), new.is_empty()) {
        (true, true) => {}
        (false, true) => {
            // Pure deletion: one unit per block, so whole table rows keep
            // their block boundary for row-level marking.
            for block in old {
                units.push(ComparisonUnit {
                    status: CorrelationStatus::Deleted,
                    atoms: remap(block.atoms.clone(), unid_map),
                });
            }
        }
        (true, false) => {
            for block in new {
                units.push(ComparisonUnit {
                    status: CorrelationStatus::Inserted,
                    atoms: block.atoms.clone(),
                });
            }
        }
        (false, false) => {
            let old_atoms: Vec<ContentAtom> = old
                .iter()
                .flat_map(|b| b.atoms.iter().cloned())
                .collect();
            let new_atoms: Vec<ContentAtom> =
                new.iter().flat_map(|b| b.atoms.iter().cloned()).collect();
            let old_atoms = remap(old_atoms, unid_map);
            units.extend(refine_runs(old_atoms, new_atoms, settings));
        }
    }
}

// ---------------------------------------------------------------------------
// Container identity harmonization
// ---------------------------------------------------------------------------

/// Map old-document container unids (table/row/cell levels) onto their
/// new-document counterparts, so deleted content reconstructs inside the
/// surviving containers instead of fabricating parallel ones.
///
/// Matched blocks align their ancestor chains level by level; unmatched
/// gap regions align containers positionally per depth, in order of first
/// appearance. Paragraph identities are never mapped: a deleted paragraph
/// stays its own paragraph.
fn container_map(
    old: &[Block],
    new: &[Block],
    pairs: &[(usize, usize)],
) -> BTreeMap<Unid, Unid> {
    let mut map = BTreeMap::new();

    for &(pi, pj) in pairs {
        let old_chain = terminator_chain(&old[pi]);
        let new_chain = terminator_chain(&new[pj]);
        for (oa, na) in old_chain.iter().zip(new_chain.iter()) {
            if oa.kind == na.kind && oa.kind != AncestorKind::Paragraph {
                map.entry(oa.unid).or_insert(na.unid);
            }
        }
    }

    let (mut i, mut j) = (0, 0);
    for &(pi, pj) in pairs {
        align_gap_containers(&old[i..pi], &new[j..pj], &mut map);
        i = pi + 1;
        j = pj + 1;
    }
    align_gap_containers(&old[i..], &new[j..], &mut map);
    map
}

fn terminator_chain(block: &Block) -> &[crate::atoms::Ancestor] {
    block
        .atoms
        .last()
        .map_or(&[], |atom| atom.ancestors.as_slice())
}

fn align_gap_containers(old: &[Block], new: &[Block], map: &mut BTreeMap<Unid, Unid>) {
    let old_levels = gap_containers(old);
    let new_levels = gap_containers(new);
    for (depth, old_level) in old_levels.iter().enumerate() {
        let Some(new_level) = new_levels.get(depth) else {
            break;
        };
        for ((old_unid, old_kind), (new_unid, new_kind)) in old_level.iter().zip(new_level.iter())
        {
            if old_kind == new_kind && !map.contains_key(old_unid) {
                map.insert(*old_unid, *new_unid);
            }
        }
    }
}

/// Ordered unique non-paragraph containers per chain depth.
fn gap_containers(blocks: &[Block]) -> Vec<Vec<(Unid, AncestorKind)>> {
    let mut levels: Vec<Vec<(Unid, AncestorKind)>> = Vec::new();
    for block in blocks {
        for atom in &block.atoms {
            for (depth, anc) in atom.ancestors.iter().enumerate() {
                if anc.kind == AncestorKind::Paragraph {
                    continue;
                }
                if levels.len() <= depth {
                    levels.resize_with(depth + 1, Vec::new);
                }
                let level = &mut levels[depth];
                if !level.iter().any(|(u, _)| *u == anc.unid) {
                    level.push((anc.unid, anc.kind));
                }
            }
        }
    }
    levels
}

fn remap(mut atoms: Vec<ContentAtom>, map: &BTreeMap<Unid, Unid>) -> Vec<ContentAtom> {
    for atom in &mut atoms {
        for anc in &mut atom.ancestors {
            if anc.kind == AncestorKind::Paragraph {
                continue;
            }
            if let Some(mapped) = map.get(&anc.unid) {
                anc.unid = *mapped;
            }
        }
    }
    atoms
}

// ---------------------------------------------------------------------------
// Recursive refinement
// ---------------------------------------------------------------------------

/// Run-level refinement of an unknown gap.
fn refine_runs(
    old: Vec<ContentAtom>,
    new: Vec<ContentAtom>,
    settings: &ComparerSettings,
) -> Vec<ComparisonUnit> {
    let old_keys: Vec<Option<String>> =
        old.iter().map(|a| Some(a.cmp_key(settings))).collect();
    let new_keys: Vec<Option<String>> =
        new.iter().map(|a| Some(a.cmp_key(settings))).collect();
    let pairs = lcs_pairs(&old_keys, &new_keys);
    if pairs.is_empty() {
        return refine_chars(old, new, settings);
    }

    let mut units = Vec::new();
    let (mut i, mut j) = (0, 0);
    let mut equal_run: Vec<ContentAtom> = Vec::new();
    for &(pi, pj) in &pairs {
        if pi > i || pj > j {
            flush_equal(&mut equal_run, &mut units);
            units.extend(refine_chars(
                old[i..pi].to_vec(),
                new[j..pj].to_vec(),
                settings,
            ));
        }
        equal_run.push(new[pj].clone());
        i = pi + 1;
        j = pj + 1;
    }
    if i < old.len() || j < new.len() {
        flush_equal(&mut equal_run, &mut units);
        units.extend(refine_chars(
            old[i..].to_vec(),
            new[j..].to_vec(),
            settings,
        ));
    }
    flush_equal(&mut equal_run, &mut units);
    units
}

fn flush_equal(run: &mut Vec<ContentAtom>, units: &mut Vec<ComparisonUnit>) {
    if !run.is_empty() {
        units.push(ComparisonUnit {
            status: CorrelationStatus::Equal,
            atoms: std::mem::take(run),
        });
    }
}

/// Character-level refinement: text atoms split into single characters,
/// everything else stays whole. A gap with no character-level match is
/// emitted as Deleted then Inserted, terminating the recursion.
fn refine_chars(
    old: Vec<ContentAtom>,
    new: Vec<ContentAtom>,
    settings: &ComparerSettings,
) -> Vec<ComparisonUnit> {
    if old.is_empty() && new.is_empty() {
        return Vec::new();
    }
    if new.is_empty() {
        return vec![ComparisonUnit {
            status: CorrelationStatus::Deleted,
            atoms: old,
        }];
    }
    if old.is_empty() {
        return vec![ComparisonUnit {
            status: CorrelationStatus::Inserted,
            atoms: new,
        }];
    }

    let old_chars = explode(&old);
    let new_chars = explode(&new);
    let old_keys: Vec<Option<String>> =
        old_chars.iter().map(|a| Some(a.cmp_key(settings))).collect();
    let new_keys: Vec<Option<String>> =
        new_chars.iter().map(|a| Some(a.cmp_key(settings))).collect();
    let pairs = lcs_pairs(&old_keys, &new_keys);
    if pairs.is_empty() {
        // No further improvement: whole gap is a replacement.
        return vec![
            ComparisonUnit {
                status: CorrelationStatus::Deleted,
                atoms: old,
            },
            ComparisonUnit {
                status: CorrelationStatus::Inserted,
                atoms: new,
            },
        ];
    }

    let mut statused: Vec<(CorrelationStatus, ContentAtom)> = Vec::new();
    let (mut i, mut j) = (0, 0);
    for &(pi, pj) in &pairs {
        for atom in &old_chars[i..pi] {
            statused.push((CorrelationStatus::Deleted, atom.clone()));
        }
        for atom in &new_chars[j..pj] {
            statused.push((CorrelationStatus::Inserted, atom.clone()));
        }
        statused.push((CorrelationStatus::Equal, new_chars[pj].clone()));
        i = pi + 1;
        j = pj + 1;
    }
    for atom in &old_chars[i..] {
        statused.push((CorrelationStatus::Deleted, atom.clone()));
    }
    for atom in &new_chars[j..] {
        statused.push((CorrelationStatus::Inserted, atom.clone()));
    }
    coalesce(statused)
}

/// Split text atoms into per-character atoms; other atoms pass through.
fn explode(atoms: &[ContentAtom]) -> Vec<ContentAtom> {
    let mut out = Vec::new();
    for atom in atoms {
        if let AtomKind::Text(text) = &atom.kind {
            for ch in text.chars() {
                out.push(ContentAtom {
                    kind: AtomKind::Text(ch.to_string()),
                    ancestors: atom.ancestors.clone(),
                });
            }
        } else {
            out.push(atom.clone());
        }
    }
    out
}

/// Group a statused atom stream into units, merging adjacent text atoms
/// of the same status and ancestry back into single runs.
fn coalesce(statused: Vec<(CorrelationStatus, ContentAtom)>) -> Vec<ComparisonUnit> {
    let mut units: Vec<ComparisonUnit> = Vec::new();
    for (status, atom) in statused {
        match units.last_mut() {
            Some(unit) if unit.status == status => {
                if let (Some(last), AtomKind::Text(new_text)) =
                    (unit.atoms.last_mut(), &atom.kind)
                {
                    if let AtomKind::Text(existing) = &mut last.kind {
                        if last.ancestors == atom.ancestors {
                            existing.push_str(new_text);
                            continue;
                        }
                    }
                }
                unit.atoms.push(atom);
            }
            _ => units.push(ComparisonUnit {
                status,
                atoms: vec![atom],
            }),
        }
    }
    units
}

// ---------------------------------------------------------------------------
// LCS
// ---------------------------------------------------------------------------

/// Longest common subsequence over optional keys; `None` never matches.
///
/// Standard O(n·m) dynamic programming. Backtracking prefers the earliest
/// match in document order, and on DP ties advances the old-side cursor
/// first, so output is stable and deterministic.
pub(crate) fn lcs_pairs(a: &[Option<String>], b: &[Option<String>]) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let idx = |i: usize, j: usize| i * (m + 1) + j;
    // dp[i][j] = LCS length of a[i..] vs b[j..]
    let mut dp = vec![0u32; (n + 1) * (m + 1)];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            let eq = matches!((&a[i], &b[j]), (Some(x), Some(y)) if x == y);
            dp[idx(i, j)] = if eq {
                dp[idx(i + 1, j + 1)] + 1
            } else {
                dp[idx(i + 1, j)].max(dp[idx(i, j + 1)])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        let eq = matches!((&a[i], &b[j]), (Some(x), Some(y)) if x == y);
        if eq && dp[idx(i, j)] == dp[idx(i + 1, j + 1)] + 1 {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[idx(i + 1, j)] >= dp[idx(i, j + 1)] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
