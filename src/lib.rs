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

//! maf2daa is a library and a command-line client for:
//!
//!   - Converting MAF alignments of nucleotide reads against protein
//!     references into the binary DAA alignment archive format.
//!   - Merging multiple DAA archives over the same read set into one.
//!   - Inspecting DAA archives and expanding the stored alignments.
//!
//! A DAA archive is a fixed 2,448-byte little-endian header followed by an
//! alignments block, a reference-name block, and a reference-length block.
//! Query sequences are stored bit-packed at 2 or 3 bits per base and
//! alignments as a compact edit-operation byte stream; see [daa] and
//! [edits] for the codecs.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The maf2daa CLI supports the following subcommands:
//!   - `maf2daa convert` convert a MAF file into a DAA archive.
//!   - `maf2daa merge` merge the DAA archives in a directory into one.
//!   - `maf2daa view` print the header and alignments of a DAA archive.
//!
//! Note that `convert` and `merge` need access to the .fasta/.fastq reads
//! the alignments were computed from: the archive stores every query
//! sequence bit-packed in full, while MAF records only contain the aligned
//! fragments.
//!
//! ### Rust API
//!
//! [convert::run] and [merge::run] drive the full pipelines. For use cases
//! requiring access to a single record at a time, the following structs are
//! provided:
//!
//!   - [DaaWriter](daa::writer::DaaWriter): writes the header, buffered hit batches, and the end blocks.
//!   - [DaaReader](daa::reader::DaaReader): random access to query records and reference names.
//!   - [DaaCursor](daa::reader::DaaCursor): streams one archive's hits in read order.
//!   - [ShardCursor](maf::scanner::ShardCursor): streams one MAF shard's hits in read order.
//!
//! See documentation for the appropriate functions or structs for usage
//! examples.

use bstr::BString;

pub mod alphabet;
pub mod cli;
pub mod convert;
pub mod daa;
pub mod edits;
pub mod filter;
pub mod maf;
pub mod merge;
pub mod reads;

/// A query read loaded from the .fasta/.fastq input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRecord {
    /// Read id, truncated at the first space.
    pub id: BString,
    /// Bit-packed sequence, 3 bits per base when `has_n` is set.
    pub packed: Vec<u8>,
    /// Sequence length in nucleotides.
    pub length: u32,
    /// True if the sequence contains anything other than ACGT.
    pub has_n: bool,
}

/// A reference sequence the reads were aligned against.
///
/// Subject ids are ordinals into the table of all subjects sorted by name,
/// so the derived ordering here must compare names first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubjectRecord {
    pub name: BString,
    /// Reference length in residues.
    pub length: u32,
}

/// One alignment of a read against a subject, ready for archive encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HitRecord {
    pub read_name: BString,
    /// Full read length in nucleotides.
    pub total_query_length: u32,
    /// The full read, bit-packed.
    pub packed_query: Vec<u8>,
    pub has_n: bool,
    /// Ordinal into the sorted subject table.
    pub subject_id: u32,
    pub raw_score: i32,
    /// Start of the alignment on the read; reverse-strand hits store the
    /// mirrored coordinate `length - start - 1`.
    pub query_start: u32,
    /// Start of the alignment on the subject, in residues.
    pub ref_start: u32,
    /// True for reverse-strand alignments.
    pub reverse: bool,
    /// Aligned span on the read in nucleotides.
    pub query_length: u32,
    /// Edit-operation bytes, see [edits].
    pub edit_ops: Vec<u8>,
}

/// Bit score of a raw alignment score under Karlin-Altschul statistics.
///
/// ```rust
/// use maf2daa::bit_score;
///
/// assert_eq!(bit_score(100, 0.625, 0.41), 91);
/// ```
pub fn bit_score(raw_score: i32, lambda: f64, k: f64) -> i32 {
    ((lambda * raw_score as f64 - k.ln()) / 2_f64.ln()).round() as i32
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn bit_score_rounds_to_nearest() {
        use super::bit_score;

        // lambda 0.267, K 0.041 (gapped BLOSUM62)
        assert_eq!(bit_score(50, 0.267, 0.041), 24);
        assert_eq!(bit_score(100, 0.267, 0.041), 43);
    }

    #[test]
    fn subject_records_sort_by_name() {
        use super::SubjectRecord;

        let mut subjects = vec![
            SubjectRecord { name: "gi|B".into(), length: 10 },
            SubjectRecord { name: "gi|A".into(), length: 20 },
        ];
        subjects.sort();
        assert_eq!(subjects[0].name, "gi|A");
        assert_eq!(subjects[1].name, "gi|B");
    }
}
