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

//! Loading the query reads the alignments refer to.

use std::path::Path;

use bstr::BString;
use needletail::parse_fastx_file;

use crate::alphabet::pack_sequence;
use crate::ReadRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

/// Reads a .fasta or .fastq file, optionally gzipped, into packed query
/// records in file order. Ids are truncated at the first space, matching
/// the names aligners put in MAF output.
pub fn read_queries(path: &Path) -> Result<Vec<ReadRecord>, E> {
    let mut reads: Vec<ReadRecord> = Vec::new();
    let mut reader = parse_fastx_file(path)?;
    while let Some(record) = reader.next() {
        let record = record?;
        let id = record
            .id()
            .split(|c| *c == b' ')
            .next()
            .unwrap_or(record.id());
        let seq = record.seq();
        let (packed, has_n) = pack_sequence(&seq);
        reads.push(ReadRecord {
            id: BString::from(id),
            packed,
            length: seq.len() as u32,
            has_n,
        });
    }
    Ok(reads)
}
