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

//! One MAF alignment record: a score line, a subject row, and a query row.

use bstr::BString;
use bstr::ByteSlice;

use crate::edits::compress_alignment;
use crate::HitRecord;
use crate::ReadRecord;
use crate::SubjectRecord;

/// A parsed `a`/`s`/`s` line triple.
///
/// The subject row comes first in the file. Rows are uppercased on parse;
/// for reverse-strand records the query row is the aligned translation of
/// the reverse complement and `query_start` counts from the strand origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MafRecord {
    pub raw_score: i32,
    pub subject_name: BString,
    /// Subject source length in residues.
    pub subject_length: u32,
    pub ref_start: u32,
    pub subject_row: Vec<u8>,
    pub read_name: BString,
    /// Alignment start on the forward strand of the read, in nucleotides.
    pub query_start: u32,
    /// Aligned span on the read in nucleotides.
    pub query_length: u32,
    pub reverse: bool,
    pub query_row: Vec<u8>,
}

fn parse_int<T: std::str::FromStr>(field: &[u8]) -> Option<T> {
    field.to_str().ok()?.parse().ok()
}

impl MafRecord {
    /// Parses one record from its three lines. Returns `None` when any
    /// line does not have the expected shape; callers count those.
    pub fn parse(score_line: &[u8], subject_line: &[u8], query_line: &[u8]) -> Option<MafRecord> {
        let score_fields: Vec<&[u8]> = score_line.fields().collect();
        if score_fields.first() != Some(&&b"a"[..]) {
            return None;
        }
        let raw_score: i32 = parse_int(score_fields.get(1)?.strip_prefix(b"score=")?)?;

        let subject_fields: Vec<&[u8]> = subject_line.fields().collect();
        if subject_fields.first() != Some(&&b"s"[..]) || subject_fields.len() < 7 {
            return None;
        }
        let subject_name = BString::from(*subject_fields.get(1)?);
        let ref_start: u32 = parse_int(subject_fields.get(2)?)?;
        let subject_length: u32 = parse_int(subject_fields.get(5)?)?;
        let subject_row = subject_fields.get(6)?.to_ascii_uppercase();

        let query_fields: Vec<&[u8]> = query_line.fields().collect();
        if query_fields.first() != Some(&&b"s"[..]) || query_fields.len() < 7 {
            return None;
        }
        let read_name = BString::from(*query_fields.get(1)?);
        let query_start: u32 = parse_int(query_fields.get(2)?)?;
        let query_length: u32 = parse_int(query_fields.get(3)?)?;
        let reverse = match *query_fields.get(4)? {
            b"+" => false,
            b"-" => true,
            _ => return None,
        };
        let query_row = query_fields.get(6)?.to_ascii_uppercase();

        Some(MafRecord {
            raw_score,
            subject_name,
            subject_length,
            ref_start,
            subject_row,
            read_name,
            query_start,
            query_length,
            reverse,
            query_row,
        })
    }

    /// Converts the record into an archive hit against the sorted subject
    /// table. Returns `None` when the subject is unknown or the rows do not
    /// line up; such records are skipped and counted.
    pub fn to_hit(&self, read: &ReadRecord, subjects: &[SubjectRecord]) -> Option<HitRecord> {
        if self.query_row.len() != self.subject_row.len() {
            return None;
        }
        let subject_id = subjects
            .binary_search_by(|subject| subject.name.cmp(&self.subject_name))
            .ok()?;

        // reverse hits store the start mirrored onto the reverse strand
        let query_start = if self.reverse {
            read.length.checked_sub(self.query_start + 1)?
        } else {
            self.query_start
        };

        Some(HitRecord {
            read_name: read.id.clone(),
            total_query_length: read.length,
            packed_query: read.packed.clone(),
            has_n: read.has_n,
            subject_id: subject_id as u32,
            raw_score: self.raw_score,
            query_start,
            ref_start: self.ref_start,
            reverse: self.reverse,
            query_length: self.query_length,
            edit_ops: compress_alignment(&self.query_row, &self.subject_row),
        })
    }
}
