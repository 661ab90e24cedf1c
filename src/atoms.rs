//! Content atoms: the minimal comparable units, with ancestor chains.
//!
//! An atom is one run of text, one field instruction, one marker, or a
//! paragraph-mark/row-mark sentinel. Each atom carries the ordered chain
//! of ancestor identities from the document root down to its paragraph
//! (the root body itself is implicit). All atoms of one paragraph share
//! the identical chain through the paragraph-mark atom; the chain is
//! assigned by scanning atoms in reverse document order and copying chain
//! state forward from each sentinel to its preceding atoms.

use redline_model::{
    Fingerprint, Node, NodeKind, NoteKind, ParagraphProps, RowProps, Unid,
};
use serde::Serialize;

use crate::error::CompareError;
use crate::settings::ComparerSettings;

// ---------------------------------------------------------------------------
// Ancestry
// ---------------------------------------------------------------------------

/// Container kinds that appear in an ancestor chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AncestorKind {
    Table,
    Row,
    Cell,
    Paragraph,
}

/// One entry of an atom's ancestor chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Ancestor {
    pub unid: Unid,
    pub kind: AncestorKind,
}

// ---------------------------------------------------------------------------
// ContentAtom
// ---------------------------------------------------------------------------

/// The kind and payload of a content atom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AtomKind {
    /// A stretch of literal text (one source run, or a character slice of
    /// one during refinement).
    Text(String),
    /// One field instruction.
    FieldInstruction(String),
    FieldBegin {
        dirty: bool,
    },
    FieldSeparate,
    FieldEnd,
    BookmarkStart(String),
    BookmarkEnd(String),
    NoteReference {
        note: NoteKind,
        id: u32,
    },
    /// Paragraph terminator carrying the paragraph's properties.
    ParagraphMark(ParagraphProps),
    /// Table-row terminator carrying the row's properties.
    RowMark(RowProps),
    /// An uninterpreted subtree, carried through whole.
    Opaque(Node),
}

/// One content atom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentAtom {
    pub kind: AtomKind,
    /// Ancestor chain, root-most first, ending at the enclosing paragraph
    /// (or at the row for row marks). Empty for top-level opaque content.
    pub ancestors: Vec<Ancestor>,
}

impl ContentAtom {
    /// Comparison key at run granularity. Atoms with equal keys correlate.
    ///
    /// Note reference ids are excluded: they are renumbered into disjoint
    /// ranges per input, so two references can only ever match
    /// positionally. Sentinels compare equal to every other sentinel of
    /// the same flavor; their properties carry revision state, not
    /// content.
    #[must_use]
    pub fn cmp_key(&self, settings: &ComparerSettings) -> String {
        match &self.kind {
            AtomKind::Text(t) => format!("t:{}", settings.normalize(t)),
            AtomKind::FieldInstruction(i) => format!("i:{}", settings.normalize(i)),
            AtomKind::FieldBegin { .. } => "fb".to_owned(),
            AtomKind::FieldSeparate => "fs".to_owned(),
            AtomKind::FieldEnd => "fe".to_owned(),
            AtomKind::BookmarkStart(id) => format!("bs:{id}"),
            AtomKind::BookmarkEnd(id) => format!("be:{id}"),
            AtomKind::NoteReference { note, .. } => match note {
                NoteKind::Footnote => "nr:foot".to_owned(),
                NoteKind::Endnote => "nr:end".to_owned(),
            },
            AtomKind::ParagraphMark(_) => "pm".to_owned(),
            AtomKind::RowMark(_) => "rm".to_owned(),
            AtomKind::Opaque(node) => {
                let tag = match &node.kind {
                    NodeKind::Opaque(tag) => tag.as_str(),
                    _ => "",
                };
                format!("op:{tag}:{}", settings.normalize(&node.inner_text()))
            }
        }
    }

    /// The literal text this atom contributes to block content.
    #[must_use]
    pub fn content_text(&self) -> &str {
        match &self.kind {
            AtomKind::Text(t) | AtomKind::FieldInstruction(t) => t,
            _ => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Block granularity for the top-level correlation sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    TableRow,
    Other,
}

/// A contiguous block of atoms: one body paragraph, one table row, or one
/// uninterpreted top-level node.
#[derive(Clone, Debug, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    /// The terminating node's unid.
    pub unid: Option<Unid>,
    /// Content fingerprint attached by the hasher, if the block survived
    /// resolution with its identity intact.
    pub fingerprint: Option<Fingerprint>,
    pub atoms: Vec<ContentAtom>,
}

/// Partition a document into its top-level block sequence.
///
/// Body paragraphs become one block each; each table contributes one
/// block per row (nested tables stay inside their row's block, expressed
/// through deeper ancestor chains). Requires a tagged tree.
///
/// # Errors
/// Returns [`CompareError::MalformedTree`] if the root is not a body, and
/// [`CompareError::MissingUnid`] if a structural container lacks identity.
pub fn collect_blocks(tree: &Node) -> Result<Vec<Block>, CompareError> {
    if !matches!(tree.kind, NodeKind::Body) {
        return Err(CompareError::MalformedTree {
            detail: "root node must be a body".to_owned(),
        });
    }

    let mut blocks = Vec::new();
    for child in &tree.children {
        match &child.kind {
            NodeKind::Paragraph(_) => {
                let mut atoms = Vec::new();
                paragraph_atoms(child, &[], &mut atoms)?;
                blocks.push(Block {
                    kind: BlockKind::Paragraph,
                    unid: child.unid,
                    fingerprint: child.fingerprint,
                    atoms,
                });
            }
            NodeKind::Table => {
                let table_anc = ancestor(child, AncestorKind::Table, "table")?;
                for row in &child.children {
                    match &row.kind {
                        NodeKind::Row(props) => {
                            let mut atoms = Vec::new();
                            let chain = vec![table_anc];
                            row_atoms(row, props, &chain, &mut atoms)?;
                            blocks.push(Block {
                                kind: BlockKind::TableRow,
                                unid: row.unid,
                                fingerprint: row.fingerprint,
                                atoms,
                            });
                        }
                        _ => {
                            return Err(CompareError::MalformedTree {
                                detail: format!(
                                    "table child must be a row, found {:?}",
                                    row.kind
                                ),
                            });
                        }
                    }
                }
            }
            _ => {
                blocks.push(Block {
                    kind: BlockKind::Other,
                    unid: child.unid,
                    fingerprint: None,
                    atoms: vec![ContentAtom {
                        kind: AtomKind::Opaque(child.clone()),
                        ancestors: Vec::new(),
                    }],
                });
            }
        }
    }
    Ok(blocks)
}

fn ancestor(node: &Node, kind: AncestorKind, what: &str) -> Result<Ancestor, CompareError> {
    node.unid.map_or_else(
        || {
            Err(CompareError::MissingUnid {
                context: format!("atom extraction: {what}"),
            })
        },
        |unid| Ok(Ancestor { unid, kind }),
    )
}

fn paragraph_atoms(
    para: &Node,
    chain: &[Ancestor],
    out: &mut Vec<ContentAtom>,
) -> Result<(), CompareError> {
    let mut chain = chain.to_vec();
    chain.push(ancestor(para, AncestorKind::Paragraph, "paragraph")?);

    let props = match &para.kind {
        NodeKind::Paragraph(props) => props.clone(),
        _ => ParagraphProps::default(),
    };
    inline_atoms(&para.children, &chain, out);
    out.push(ContentAtom {
        kind: AtomKind::ParagraphMark(props),
        ancestors: chain,
    });
    Ok(())
}

fn row_atoms(
    row: &Node,
    props: &RowProps,
    chain: &[Ancestor],
    out: &mut Vec<ContentAtom>,
) -> Result<(), CompareError> {
    let mut row_chain = chain.to_vec();
    row_chain.push(ancestor(row, AncestorKind::Row, "row")?);

    for cell in &row.children {
        match &cell.kind {
            NodeKind::Cell => {
                let mut cell_chain = row_chain.clone();
                cell_chain.push(ancestor(cell, AncestorKind::Cell, "cell")?);
                for block in &cell.children {
                    match &block.kind {
                        NodeKind::Paragraph(_) => paragraph_atoms(block, &cell_chain, out)?,
                        NodeKind::Table => {
                            let mut nested = cell_chain.clone();
                            nested.push(ancestor(block, AncestorKind::Table, "table")?);
                            for nested_row in &block.children {
                                if let NodeKind::Row(nested_props) = &nested_row.kind {
                                    row_atoms(nested_row, nested_props, &nested, out)?;
                                } else {
                                    return Err(CompareError::MalformedTree {
                                        detail: "table child must be a row".to_owned(),
                                    });
                                }
                            }
                        }
                        _ => out.push(ContentAtom {
                            kind: AtomKind::Opaque(block.clone()),
                            ancestors: cell_chain.clone(),
                        }),
                    }
                }
            }
            _ => {
                return Err(CompareError::MalformedTree {
                    detail: format!("row child must be a cell, found {:?}", cell.kind),
                });
            }
        }
    }

    out.push(ContentAtom {
        kind: AtomKind::RowMark(props.clone()),
        ancestors: row_chain,
    });
    Ok(())
}

/// Atoms for a paragraph's inline children. Revision wrappers should be
/// resolved away before extraction; if one is still present it is
/// traversed transparently.
fn inline_atoms(children: &[Node], chain: &[Ancestor], out: &mut Vec<ContentAtom>) {
    for child in children {
        match &child.kind {
            NodeKind::Run | NodeKind::Revision(_) => inline_atoms(&child.children, chain, out),
            NodeKind::Text(t) => out.push(ContentAtom {
                kind: AtomKind::Text(t.clone()),
                ancestors: chain.to_vec(),
            }),
            NodeKind::FieldInstruction(i) => out.push(ContentAtom {
                kind: AtomKind::FieldInstruction(i.clone()),
                ancestors: chain.to_vec(),
            }),
            NodeKind::FieldBegin { dirty } => out.push(ContentAtom {
                kind: AtomKind::FieldBegin { dirty: *dirty },
                ancestors: chain.to_vec(),
            }),
            NodeKind::FieldSeparate => out.push(ContentAtom {
                kind: AtomKind::FieldSeparate,
                ancestors: chain.to_vec(),
            }),
            NodeKind::FieldEnd => out.push(ContentAtom {
                kind: AtomKind::FieldEnd,
                ancestors: chain.to_vec(),
            }),
            NodeKind::BookmarkStart(id) => out.push(ContentAtom {
                kind: AtomKind::BookmarkStart(id.clone()),
                ancestors: chain.to_vec(),
            }),
            NodeKind::BookmarkEnd(id) => out.push(ContentAtom {
                kind: AtomKind::BookmarkEnd(id.clone()),
                ancestors: chain.to_vec(),
            }),
            NodeKind::NoteReference { note, id } => out.push(ContentAtom {
                kind: AtomKind::NoteReference {
                    note: *note,
                    id: *id,
                },
                ancestors: chain.to_vec(),
            }),
            _ => out.push(ContentAtom {
                kind: AtomKind::Opaque(child.clone()),
                ancestors: chain.to_vec(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Reverse-scan chain assignment
// ---------------------------------------------------------------------------

/// Re-assign ancestor chains across a (possibly merged) atom stream.
///
/// Scans in reverse document order: every sentinel (paragraph mark, row
/// mark) fixes the chain for the non-sentinel atoms that precede it, back
/// to the previous sentinel. Atoms after the final sentinel keep their
/// own chains.
pub fn assign_chains_from_sentinels(atoms: &mut [ContentAtom]) {
    let mut current: Option<Vec<Ancestor>> = None;
    for atom in atoms.iter_mut().rev() {
        match &atom.kind {
            AtomKind::ParagraphMark(_) => current = Some(atom.ancestors.clone()),
            AtomKind::RowMark(_) | AtomKind::Opaque(_) => current = None,
            _ => {
                if let Some(chain) = &current {
                    atom.ancestors = chain.clone();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use redline_model::builder;

    use super::*;
    use crate::identity::{IdentityTagger, UnidAllocator};

    fn tagged(doc: Node) -> Node {
        let mut alloc = UnidAllocator::new();
        IdentityTagger::new(&mut alloc, 0).tag(doc)
    }

    #[test]
    fn paragraph_block_ends_with_mark_sentinel() {
        let doc = tagged(builder::body(vec![builder::para("hello")]));
        let blocks = collect_blocks(&doc).expect("blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        let atoms = &blocks[0].atoms;
        assert!(matches!(atoms[0].kind, AtomKind::Text(ref t) if t == "hello"));
        assert!(matches!(
            atoms.last().map(|a| &a.kind),
            Some(AtomKind::ParagraphMark(_))
        ));
    }

    #[test]
    fn table_contributes_one_block_per_row() {
        let doc = tagged(builder::body(vec![builder::table(vec![
            builder::row(vec![builder::cell(vec![builder::para("a")])]),
            builder::row(vec![builder::cell(vec![builder::para("b")])]),
        ])]));
        let blocks = collect_blocks(&doc).expect("blocks");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::TableRow));
        assert!(matches!(
            blocks[0].atoms.last().map(|a| &a.kind),
            Some(AtomKind::RowMark(_))
        ));
    }

    #[test]
    fn cell_paragraph_chain_runs_table_row_cell_paragraph() {
        let doc = tagged(builder::body(vec![builder::table(vec![builder::row(
            vec![builder::cell(vec![builder::para("x")])],
        )])]));
        let blocks = collect_blocks(&doc).expect("blocks");
        let text_atom = &blocks[0].atoms[0];
        let kinds: Vec<AncestorKind> = text_atom.ancestors.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AncestorKind::Table,
                AncestorKind::Row,
                AncestorKind::Cell,
                AncestorKind::Paragraph
            ]
        );
    }

    #[test]
    fn atoms_of_one_paragraph_share_the_mark_chain() {
        let doc = tagged(builder::body(vec![builder::para_runs(vec![
            builder::run("a"),
            builder::run("b"),
        ])]));
        let blocks = collect_blocks(&doc).expect("blocks");
        let atoms = &blocks[0].atoms;
        let mark_chain = atoms.last().map(|a| a.ancestors.clone()).unwrap_or_default();
        assert!(atoms.iter().all(|a| a.ancestors == mark_chain));
    }

    #[test]
    fn reverse_scan_adopts_sentinel_chains() {
        let doc = tagged(builder::body(vec![
            builder::para("one"),
            builder::para("two"),
        ]));
        let blocks = collect_blocks(&doc).expect("blocks");
        let mut atoms: Vec<ContentAtom> =
            blocks.into_iter().flat_map(|b| b.atoms).collect();

        // Scramble the text atoms' chains, then restore via the scan.
        let mark_chains: Vec<Vec<Ancestor>> = atoms
            .iter()
            .filter(|a| matches!(a.kind, AtomKind::ParagraphMark(_)))
            .map(|a| a.ancestors.clone())
            .collect();
        for atom in &mut atoms {
            if matches!(atom.kind, AtomKind::Text(_)) {
                atom.ancestors = Vec::new();
            }
        }
        assign_chains_from_sentinels(&mut atoms);
        assert_eq!(atoms[0].ancestors, mark_chains[0]);
        assert_eq!(atoms[2].ancestors, mark_chains[1]);
    }

    #[test]
    fn non_body_root_is_malformed() {
        let doc = tagged(builder::para("stray"));
        let err = collect_blocks(&doc).unwrap_err();
        assert!(matches!(err, CompareError::MalformedTree { .. }));
    }

    #[test]
    fn cmp_key_respects_case_policy() {
        let atom = ContentAtom {
            kind: AtomKind::Text("Hello".to_owned()),
            ancestors: Vec::new(),
        };
        let exact = ComparerSettings::default();
        let loose = ComparerSettings {
            case_insensitive: true,
            ..ComparerSettings::default()
        };
        assert_eq!(atom.cmp_key(&exact), "t:Hello");
        assert_eq!(atom.cmp_key(&loose), "t:hello");
    }
}
