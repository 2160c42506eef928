// maf2daa: Convert MAF alignments into the binary DAA archive format.
//
// Copyright 2026 maf2daa contributors.
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! The edit-operation byte stream stored with each hit.
//!
//! Each operation byte carries a 2-bit class in the top bits and a 6-bit
//! payload: match runs (class 0) and insertion runs (class 1) store a run
//! length 1..=63, deletions (class 2) and substitutions (class 3) store an
//! index into [AA_ALPHABET](crate::alphabet::AA_ALPHABET). The frameshift
//! markers `/` and `\` travel as substitutions and shift the query cursor
//! by -1 and +1 nucleotides on expansion.

use crate::alphabet::{aa_char, aa_index, translate_codon};

const OP_INSERTION: u8 = 1 << 6;
const OP_DELETION: u8 = 2 << 6;
const OP_SUBSTITUTION: u8 = 3 << 6;

/// Maximum run length a single match or insertion operation can store.
pub const MAX_RUN: usize = 63;

#[derive(Clone, Copy, PartialEq)]
enum EditClass {
    Match,
    Insertion,
    Deletion,
    Substitution,
}

fn edit_class(query: u8, subject: u8) -> EditClass {
    // last-aligner frameshift markers live on the query row
    if query == b'/' || query == b'\\' {
        return EditClass::Substitution;
    }
    if query == b'-' {
        return EditClass::Deletion;
    }
    if subject == b'-' {
        return EditClass::Insertion;
    }
    if query != subject {
        return EditClass::Substitution;
    }
    EditClass::Match
}

fn push_run(ops: &mut Vec<u8>, class: EditClass, mut total: usize) {
    let class_bits = if class == EditClass::Insertion {
        OP_INSERTION
    } else {
        0
    };
    while total > 0 {
        let num = total.min(MAX_RUN);
        total -= num;
        ops.push(class_bits | num as u8);
    }
}

fn push_residue(ops: &mut Vec<u8>, class: EditClass, residue: u8) {
    let class_bits = if class == EditClass::Deletion {
        OP_DELETION
    } else {
        OP_SUBSTITUTION
    };
    ops.push(class_bits | aa_index(residue));
}

/// Compresses a pair of equal-length alignment rows into edit operations.
///
/// `query_row` is the translated query and may contain `-` gaps and the
/// `/`/`\` frameshift markers, `subject_row` is the reference row with `-`
/// gaps. Substitutions and deletions store the subject residue, frameshifts
/// store the marker itself.
///
/// ```rust
/// use maf2daa::edits::compress_alignment;
///
/// // one substitution (subject R, index 1) between two match runs
/// let ops = compress_alignment(b"MKLV", b"MRLV");
/// assert_eq!(ops, vec![0b0000_0001, 0b1100_0001, 0b0000_0010]);
/// ```
pub fn compress_alignment(query_row: &[u8], subject_row: &[u8]) -> Vec<u8> {
    let mut ops: Vec<u8> = Vec::new();
    let mut run: usize = 0;
    let mut last: Option<EditClass> = None;

    for (q, s) in query_row.iter().zip(subject_row.iter()) {
        let class = edit_class(*q, *s);
        match class {
            EditClass::Match | EditClass::Insertion => {
                if last != Some(class) && run != 0 {
                    push_run(&mut ops, last.unwrap(), run);
                    run = 0;
                }
                run += 1;
            }
            EditClass::Deletion | EditClass::Substitution => {
                if run != 0 {
                    push_run(&mut ops, last.unwrap(), run);
                    run = 0;
                }
                let residue = if *q == b'/' || *q == b'\\' { *q } else { *s };
                push_residue(&mut ops, class, residue);
            }
        }
        last = Some(class);
    }
    if run != 0 {
        push_run(&mut ops, last.unwrap(), run);
    }

    ops
}

/// Replays an operation stream and returns the aligned query length in
/// nucleotides and the aligned reference length in residues.
pub fn alignment_lengths(ops: &[u8]) -> (u32, u32) {
    let mut query_len: i64 = 0;
    let mut ref_len: i64 = 0;
    for op in ops {
        let payload = op & 63;
        match op >> 6 {
            0 => {
                query_len += payload as i64 * 3;
                ref_len += payload as i64;
            }
            1 => {
                query_len += payload as i64 * 3;
            }
            2 => {
                ref_len += 1;
            }
            _ => match aa_char(payload) {
                b'/' => query_len -= 1,
                b'\\' => query_len += 1,
                _ => {
                    query_len += 3;
                    ref_len += 1;
                }
            },
        }
    }
    (query_len.max(0) as u32, ref_len.max(0) as u32)
}

fn codon_at(dna: &[u8], pos: i64) -> u8 {
    if pos < 0 {
        return b'X';
    }
    match dna.get(pos as usize..pos as usize + 3) {
        Some(codon) => translate_codon(codon),
        None => b'X',
    }
}

/// Expands an operation stream back into the translated query row and the
/// subject row, consuming codons from the in-frame aligned query DNA.
pub fn expand_alignment(ops: &[u8], query_dna: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut query_row: Vec<u8> = Vec::new();
    let mut subject_row: Vec<u8> = Vec::new();
    let mut q: i64 = 0;

    for op in ops {
        let payload = op & 63;
        match op >> 6 {
            0 => {
                for _ in 0..payload {
                    let aa = codon_at(query_dna, q);
                    query_row.push(aa);
                    subject_row.push(aa);
                    q += 3;
                }
            }
            1 => {
                for _ in 0..payload {
                    query_row.push(codon_at(query_dna, q));
                    subject_row.push(b'-');
                    q += 3;
                }
            }
            2 => {
                query_row.push(b'-');
                subject_row.push(aa_char(payload));
            }
            _ => match aa_char(payload) {
                b'/' => {
                    query_row.push(b'/');
                    subject_row.push(b'-');
                    q -= 1;
                }
                b'\\' => {
                    query_row.push(b'\\');
                    subject_row.push(b'-');
                    q += 1;
                }
                residue => {
                    query_row.push(codon_at(query_dna, q));
                    subject_row.push(residue);
                    q += 3;
                }
            },
        }
    }

    (query_row, subject_row)
}
