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

//! Reading DAA archives.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;

use bstr::BString;

use crate::alphabet::codes_to_dna;
use crate::alphabet::packed_len;
use crate::alphabet::reverse_complement;
use crate::alphabet::unpack_sequence;
use crate::bit_score;
use crate::daa::header::read_daa_header;
use crate::daa::header::DaaHeader;
use crate::edits::alignment_lengths;
use crate::HitRecord;
use crate::ReadRecord;
use crate::SubjectRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

// Names are indexed in chunks of 64, matching the writer's block layout.
const REF_CHUNK_BITS: usize = 6;

/// A query record ended before its declared length.
#[derive(Debug)]
pub struct TruncatedRecord;

impl fmt::Display for TruncatedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query record ends before its declared length")
    }
}

impl std::error::Error for TruncatedRecord {}

struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        ByteCursor { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n_bytes: usize) -> Result<&'a [u8], E> {
        let res = self
            .bytes
            .get(self.pos..self.pos + n_bytes)
            .ok_or(TruncatedRecord)?;
        self.pos += n_bytes;
        Ok(res)
    }

    fn read_u8(&mut self) -> Result<u8, E> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, E> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into()?))
    }

    /// Reads an integer at the width the 2-bit `selector` names.
    fn read_packed_int(&mut self, selector: u8) -> Result<i32, E> {
        match selector {
            0 => Ok(self.read_u8()? as i32),
            1 => Ok(u16::from_le_bytes(self.take(2)?.try_into()?) as i32),
            _ => self.read_i32(),
        }
    }

    fn read_until_nul(&mut self) -> Result<&'a [u8], E> {
        let len = self.bytes[self.pos..]
            .iter()
            .position(|c| *c == 0)
            .ok_or(TruncatedRecord)?;
        let res = self.take(len)?;
        self.pos += 1;
        Ok(res)
    }
}

/// One decoded alignment of a query record.
#[derive(Clone, Debug, PartialEq)]
pub struct DaaHit {
    pub subject_id: u32,
    pub raw_score: i32,
    pub bit_score: i32,
    /// Alignment start on the read, mirrored for reverse hits.
    pub query_start: u32,
    pub ref_start: u32,
    pub reverse: bool,
    /// Reading frame 1..=3 forward, -1..=-3 reverse.
    pub frame: i32,
    /// Aligned span on the read in nucleotides.
    pub query_length: u32,
    /// Aligned span on the subject in residues.
    pub ref_length: u32,
    pub edit_ops: Vec<u8>,
}

/// One query record, with the hit bytes kept raw until asked for.
#[derive(Clone, Debug, PartialEq)]
pub struct DaaQueryRecord {
    pub name: BString,
    pub total_length: u32,
    pub has_n: bool,
    pub packed: Vec<u8>,
    hits_buf: Vec<u8>,
}

impl DaaQueryRecord {
    /// Parses a record from its body bytes, the declared record length
    /// worth of data after the length field.
    pub fn parse(bytes: &[u8]) -> Result<DaaQueryRecord, E> {
        let mut cursor = ByteCursor::new(bytes);
        let total_length = cursor.read_i32()? as u32;
        let name = BString::from(cursor.read_until_nul()?);
        let has_n = cursor.read_u8()? & 1 == 1;
        let bits = if has_n { 3 } else { 2 };
        let packed = cursor.take(packed_len(total_length as usize, bits))?.to_vec();
        let hits_buf = cursor.take(cursor.remaining())?.to_vec();
        Ok(DaaQueryRecord {
            name,
            total_length,
            has_n,
            packed,
            hits_buf,
        })
    }

    /// Decodes the record's hits. `header` provides the statistics for the
    /// bit scores.
    pub fn hits(&self, header: &DaaHeader) -> Result<Vec<DaaHit>, E> {
        let mut hits: Vec<DaaHit> = Vec::new();
        let mut cursor = ByteCursor::new(&self.hits_buf);
        while cursor.remaining() > 0 {
            let subject_id = cursor.read_i32()? as u32;
            let flags = cursor.read_u8()?;
            let reverse = flags & (1 << 6) != 0;
            let raw_score = cursor.read_packed_int(flags & 3)?;
            let query_start = cursor.read_packed_int((flags >> 2) & 3)? as u32;
            let ref_start = cursor.read_packed_int((flags >> 4) & 3)? as u32;
            let edit_ops = cursor.read_until_nul()?.to_vec();

            let (query_length, ref_length) = alignment_lengths(&edit_ops);
            let f = if reverse {
                3 + (self.total_length - 1 - query_start) % 3
            } else {
                query_start % 3
            } as i32;
            let frame = if f < 3 { f + 1 } else { -(f - 2) };

            hits.push(DaaHit {
                subject_id,
                raw_score,
                bit_score: bit_score(raw_score, header.lambda, header.k),
                query_start,
                ref_start,
                reverse,
                frame,
                query_length,
                ref_length,
                edit_ops,
            });
        }
        Ok(hits)
    }

    /// The full read sequence as `ACGTN` symbols.
    pub fn query_dna(&self) -> Vec<u8> {
        let bits = if self.has_n { 3 } else { 2 };
        codes_to_dna(&unpack_sequence(
            &self.packed,
            self.total_length as usize,
            bits,
        ))
    }

    /// The in-frame aligned stretch of the read for `hit`, reverse
    /// complemented for reverse-frame hits. This is the sequence
    /// [expand_alignment](crate::edits::expand_alignment) consumes.
    pub fn aligned_query_dna(&self, hit: &DaaHit) -> Vec<u8> {
        let dna = self.query_dna();
        let (dna, start) = if hit.reverse {
            (
                reverse_complement(&dna),
                (self.total_length - hit.query_start - 1) as usize,
            )
        } else {
            (dna, hit.query_start as usize)
        };
        let end = (start + hit.query_length as usize).min(dna.len());
        dna[start.min(dna.len())..end].to_vec()
    }
}

/// Random access to one archive.
///
/// Opening scans the alignments block once to index every record's offset
/// and loads the reference-length table. Reference names load lazily in
/// chunks of 64 through [reference_name](DaaReader::reference_name).
pub struct DaaReader {
    path: PathBuf,
    file: File,
    pub header: DaaHeader,
    pub ref_lengths: Vec<u32>,
    ref_locations: Vec<u64>,
    ref_names: Vec<Option<BString>>,
    pub record_offsets: Vec<u64>,
}

impl DaaReader {
    pub fn open(path: &Path) -> Result<Self, E> {
        let mut file = File::open(path)?;
        let header = read_daa_header(&mut file)?;
        let n_refs = header.db_seqs_used as usize;

        let lengths_index = header
            .ref_lengths_block_index()
            .ok_or("Archive has no reference-length block")?;
        file.seek(SeekFrom::Start(header.block_offset(lengths_index)))?;
        let mut length_bytes = vec![0_u8; n_refs * 4];
        file.read_exact(&mut length_bytes)?;
        let ref_lengths: Vec<u32> = length_bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes(chunk.try_into().unwrap()) as u32)
            .collect();

        let names_index = header
            .ref_names_block_index()
            .ok_or("Archive has no reference-name block")?;
        let names_offset = header.block_offset(names_index);
        file.seek(SeekFrom::Start(names_offset))?;
        let mut name_bytes = vec![0_u8; header.block_size[names_index] as usize];
        file.read_exact(&mut name_bytes)?;
        let mut ref_locations: Vec<u64> = Vec::with_capacity(n_refs >> REF_CHUNK_BITS);
        let mut pos: u64 = 0;
        for (i, name) in name_bytes.split(|c| *c == 0).take(n_refs).enumerate() {
            if i % (1 << REF_CHUNK_BITS) == 0 {
                ref_locations.push(names_offset + pos);
            }
            pos += name.len() as u64 + 1;
        }

        let ali_index = header
            .alignments_block_index()
            .ok_or("Archive has no alignments block")?;
        let mut offset = header.block_offset(ali_index);
        file.seek(SeekFrom::Start(offset))?;
        let mut record_offsets: Vec<u64> = Vec::with_capacity(header.query_records as usize);
        for _ in 0..header.query_records {
            let mut alloc_bytes = [0_u8; 4];
            file.read_exact(&mut alloc_bytes)?;
            let alloc = u32::from_le_bytes(alloc_bytes);
            record_offsets.push(offset);
            offset += 4 + alloc as u64;
            file.seek(SeekFrom::Start(offset))?;
        }

        Ok(DaaReader {
            path: path.to_path_buf(),
            file,
            header,
            ref_lengths,
            ref_locations,
            ref_names: vec![None; n_refs],
            record_offsets,
        })
    }

    /// Name of reference `index`, loading its 64-name chunk on first use.
    pub fn reference_name(&mut self, index: usize) -> Result<BString, E> {
        if index >= self.ref_names.len() {
            return Err(format!("Reference index {} out of range", index).into());
        }
        if self.ref_names[index].is_none() {
            let chunk = index >> REF_CHUNK_BITS;
            let first = chunk << REF_CHUNK_BITS;
            let last = ((chunk + 1) << REF_CHUNK_BITS).min(self.ref_names.len());
            self.file.seek(SeekFrom::Start(self.ref_locations[chunk]))?;
            let mut reader = std::io::BufReader::new(&self.file);
            for i in first..last {
                let mut name: Vec<u8> = Vec::new();
                std::io::BufRead::read_until(&mut reader, 0, &mut name)?;
                name.pop();
                self.ref_names[i] = Some(BString::from(name));
            }
        }
        Ok(self.ref_names[index].clone().unwrap())
    }

    /// The archive's full subject table, ordered by reference index.
    pub fn subjects(&mut self) -> Result<Vec<SubjectRecord>, E> {
        (0..self.ref_lengths.len())
            .map(|i| {
                Ok(SubjectRecord {
                    name: self.reference_name(i)?,
                    length: self.ref_lengths[i],
                })
            })
            .collect()
    }

    pub fn read_query_record(&mut self, index: usize) -> Result<DaaQueryRecord, E> {
        read_record_at(&mut self.file, self.record_offsets[index])
    }

    /// Decodes every query record's hits, partitioned over `procs` worker
    /// threads. Each worker reads through its own file handle.
    pub fn parse_all_hits(&self, procs: usize) -> Result<Vec<(BString, Vec<DaaHit>)>, E> {
        use rayon::prelude::*;

        let procs = procs.max(1);
        let chunk_size = self.record_offsets.len().div_ceil(procs).max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(procs).build()?;

        let decoded: Vec<Vec<(BString, Vec<DaaHit>)>> = pool.install(|| {
            self.record_offsets
                .par_chunks(chunk_size)
                .map(|offsets| {
                    let mut file = File::open(&self.path)?;
                    let mut records: Vec<(BString, Vec<DaaHit>)> =
                        Vec::with_capacity(offsets.len());
                    for offset in offsets {
                        let record = read_record_at(&mut file, *offset)?;
                        let hits = record.hits(&self.header)?;
                        records.push((record.name, hits));
                    }
                    Ok(records)
                })
                .collect::<Result<Vec<_>, E>>()
        })?;

        Ok(decoded.into_iter().flatten().collect())
    }
}

fn read_record_at(file: &mut File, offset: u64) -> Result<DaaQueryRecord, E> {
    file.seek(SeekFrom::Start(offset))?;
    let mut alloc_bytes = [0_u8; 4];
    file.read_exact(&mut alloc_bytes)?;
    let mut body = vec![0_u8; u32::from_le_bytes(alloc_bytes) as usize];
    file.read_exact(&mut body)?;
    DaaQueryRecord::parse(&body)
}

/// Streams one archive's hits in read order during merging.
///
/// Like [ShardCursor](crate::maf::scanner::ShardCursor), `advance` must be
/// called with the reads in query file order; hits come back with subject
/// ids remapped into the merged `subjects` table.
pub struct DaaCursor {
    reader: DaaReader,
    index: usize,
    pending: Option<DaaQueryRecord>,
}

impl DaaCursor {
    pub fn new(reader: DaaReader) -> Self {
        DaaCursor {
            reader,
            index: 0,
            pending: None,
        }
    }

    pub fn subjects(&mut self) -> Result<Vec<SubjectRecord>, E> {
        self.reader.subjects()
    }

    pub fn advance(
        &mut self,
        read: &ReadRecord,
        subjects: &[SubjectRecord],
    ) -> Result<Vec<HitRecord>, E> {
        let mut hits: Vec<HitRecord> = Vec::new();
        loop {
            let record = match self.pending.take() {
                Some(record) => record,
                None => {
                    if self.index >= self.reader.record_offsets.len() {
                        break;
                    }
                    let record = self.reader.read_query_record(self.index)?;
                    self.index += 1;
                    record
                }
            };
            if record.name != read.id {
                self.pending = Some(record);
                break;
            }
            for hit in record.hits(&self.reader.header)? {
                let name = self.reader.reference_name(hit.subject_id as usize)?;
                let subject_id = subjects
                    .binary_search_by(|subject| subject.name.cmp(&name))
                    .map_err(|_| format!("Reference {} missing from the merged table", name))?;
                hits.push(HitRecord {
                    read_name: read.id.clone(),
                    total_query_length: record.total_length,
                    packed_query: record.packed.clone(),
                    has_n: record.has_n,
                    subject_id: subject_id as u32,
                    raw_score: hit.raw_score,
                    query_start: hit.query_start,
                    ref_start: hit.ref_start,
                    reverse: hit.reverse,
                    query_length: hit.query_length,
                    edit_ops: hit.edit_ops,
                });
            }
        }
        Ok(hits)
    }
}
