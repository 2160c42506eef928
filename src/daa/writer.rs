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

//! Writing DAA archives.

use std::fs::File;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

use crate::daa::header::encode_daa_header;
use crate::daa::header::DaaHeader;
use crate::daa::header::BLOCK_SIZE_OFFSET;
use crate::daa::header::DB_SEQS_USED_OFFSET;
use crate::daa::header::QUERY_RECORDS_OFFSET;
use crate::HitRecord;
use crate::SubjectRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

// Widest packed-integer selector for every field pair: 4-byte raw score,
// query start, and ref start.
const WIDE_HIT_FLAGS: u8 = (2 << 0) | (2 << 2) | (2 << 4);
const REVERSE_FLAG: u8 = 1 << 6;

/// Streams query records into a new archive.
///
/// [write_hits](DaaWriter::write_hits) may be called any number of times;
/// hits must arrive grouped by read and in read order. [finish](DaaWriter::finish)
/// writes the reference blocks and patches the header summary fields.
///
/// ```no_run
/// use maf2daa::daa::header::DaaHeader;
/// use maf2daa::daa::writer::DaaWriter;
/// use maf2daa::maf::header::MafHeader;
///
/// # fn run(maf: &MafHeader, hits: &[maf2daa::HitRecord], subjects: &[maf2daa::SubjectRecord]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let header = DaaHeader::new(maf);
/// let mut writer = DaaWriter::create(std::path::Path::new("out.daa"), &header)?;
/// writer.write_hits(hits)?;
/// writer.finish(subjects)?;
/// # Ok(())
/// # }
/// ```
pub struct DaaWriter {
    file: File,
    ali_block_size: u64,
    query_records: u64,
}

fn push_i32(bytes: &mut Vec<u8>, value: i32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

impl DaaWriter {
    /// Creates the archive and writes the header with zeroed summary fields.
    pub fn create(path: &Path, header: &DaaHeader) -> Result<Self, E> {
        let mut file = File::create(path)?;
        file.write_all(&encode_daa_header(header)?)?;
        Ok(DaaWriter {
            file,
            ali_block_size: 0,
            query_records: 0,
        })
    }

    /// Encodes a batch of hits into query records and appends them to the
    /// alignments block. Consecutive hits with the same read name share one
    /// record; each record starts with a length field back-filled once the
    /// record is complete.
    pub fn write_hits(&mut self, hits: &[HitRecord]) -> Result<(), E> {
        let mut bytes: Vec<u8> = Vec::new();

        let mut i = 0;
        while i < hits.len() {
            let read_hits = hits[i..]
                .iter()
                .take_while(|hit| hit.read_name == hits[i].read_name);

            let begin = bytes.len();
            // record length placeholder
            bytes.extend_from_slice(&[0_u8; 4]);
            push_i32(&mut bytes, hits[i].total_query_length as i32);
            bytes.extend_from_slice(&hits[i].read_name);
            bytes.push(0);
            bytes.push(hits[i].has_n as u8);
            bytes.extend_from_slice(&hits[i].packed_query);

            let mut n_hits = 0;
            for hit in read_hits {
                push_i32(&mut bytes, hit.subject_id as i32);
                let flags = WIDE_HIT_FLAGS | if hit.reverse { REVERSE_FLAG } else { 0 };
                bytes.push(flags);
                push_i32(&mut bytes, hit.raw_score);
                push_i32(&mut bytes, hit.query_start as i32);
                push_i32(&mut bytes, hit.ref_start as i32);
                bytes.extend_from_slice(&hit.edit_ops);
                bytes.push(0);
                n_hits += 1;
            }

            let alloc = (bytes.len() - begin - 4) as u32;
            bytes[begin..begin + 4].copy_from_slice(&alloc.to_le_bytes());

            self.query_records += 1;
            i += n_hits;
        }

        self.file.write_all(&bytes)?;
        self.ali_block_size += bytes.len() as u64;
        Ok(())
    }

    /// Writes the end-of-alignments marker and the reference blocks, then
    /// patches the summary fields the header was created with zeroed.
    pub fn finish(&mut self, subjects: &[SubjectRecord]) -> Result<(), E> {
        self.file.write_all(&0_u32.to_le_bytes())?;
        self.ali_block_size += 4;

        let mut name_block: Vec<u8> = Vec::new();
        let mut length_block: Vec<u8> = Vec::new();
        for subject in subjects {
            name_block.extend_from_slice(&subject.name);
            name_block.push(0);
            push_i32(&mut length_block, subject.length as i32);
        }
        self.file.write_all(&name_block)?;
        self.file.write_all(&length_block)?;

        self.file.seek(SeekFrom::Start(DB_SEQS_USED_OFFSET))?;
        self.file.write_all(&(subjects.len() as u64).to_le_bytes())?;
        self.file.seek(SeekFrom::Start(QUERY_RECORDS_OFFSET))?;
        self.file.write_all(&self.query_records.to_le_bytes())?;
        self.file.seek(SeekFrom::Start(BLOCK_SIZE_OFFSET))?;
        self.file.write_all(&self.ali_block_size.to_le_bytes())?;
        self.file.write_all(&(name_block.len() as u64).to_le_bytes())?;
        self.file.write_all(&(length_block.len() as u64).to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}
