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

//! Sharded scanning of MAF files.
//!
//! Conversion runs over the file twice. [partition] splits it into shards
//! at blank-line boundaries, so records never straddle a shard. Phase one
//! ([scan_shard]) collects each shard's subject table and the offsets where
//! a new record batch begins, detected as the query order restarting. Phase
//! two drives one [ShardCursor] per batch offset; within such a range the
//! records are in query order, so each cursor hands out one read's hits at
//! a time and the rounds across cursors keep the output in read order.
//!
//! The scanner seeks, so it requires an uncompressed file. Header parsing
//! and [count_lines] accept gzip.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use bstr::BString;
use bstr::ByteSlice;

use crate::maf::record::MafRecord;
use crate::HitRecord;
use crate::ReadRecord;
use crate::SubjectRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

/// Counts the lines in a possibly gzip-compressed file. A final line
/// without a terminating newline still counts.
pub fn count_lines(path: &Path) -> Result<u64, E> {
    let mut conn = crate::maf::open_maybe_gzip(path)?;
    let mut lines: u64 = 0;
    let mut last: u8 = b'\n';
    let mut buf = [0_u8; 8192];
    loop {
        let n_read = conn.read(&mut buf)?;
        if n_read == 0 {
            break;
        }
        lines += buf[0..n_read].iter().filter(|c| **c == b'\n').count() as u64;
        last = buf[n_read - 1];
    }
    if last != b'\n' {
        lines += 1;
    }
    Ok(lines)
}

/// Splits the file into at most `n_shards` byte ranges for scanning.
///
/// Returns the start offset of each shard; a shard ends where the next one
/// starts. Boundaries are placed after the first blank line once the shard
/// has seen its share of the lines, so every record lies fully inside one
/// shard.
pub fn partition(path: &Path, n_shards: usize) -> Result<Vec<u64>, E> {
    let n_shards = n_shards.max(1);
    let n_lines = count_lines(path)?;
    let chunk = n_lines.div_ceil(n_shards as u64).max(1);

    let mut starts: Vec<u64> = vec![0];
    let mut reader = BufReader::new(File::open(path)?);
    let mut pos: u64 = 0;
    let mut lines_in_shard: u64 = 0;
    let mut line: Vec<u8> = Vec::new();
    loop {
        line.clear();
        let n_read = reader.read_until(b'\n', &mut line)?;
        if n_read == 0 {
            break;
        }
        pos += n_read as u64;
        lines_in_shard += 1;
        let blank = line.iter().all(|c| c.is_ascii_whitespace());
        if blank && lines_in_shard >= chunk && starts.len() < n_shards {
            starts.push(pos);
            lines_in_shard = 0;
        }
    }
    Ok(starts)
}

fn is_score_line(line: &[u8]) -> bool {
    line.first() == Some(&b'a') && line.get(1).map_or(true, |c| c.is_ascii_whitespace())
}

/// What one shard contributes to the conversion plan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardScan {
    /// Subjects seen in the shard, ordered by name.
    pub subjects: BTreeSet<SubjectRecord>,
    /// Offsets of the first record of each batch inside the shard. A batch
    /// boundary is where the query order restarts.
    pub batch_offsets: Vec<u64>,
}

/// Phase-one scan of the byte range `[start, end)`.
///
/// `read_index` maps each read name to its position in the query file;
/// the aligner emits records in that order within a batch, so an index
/// moving backwards marks a batch boundary.
pub fn scan_shard(
    path: &Path,
    start: u64,
    end: u64,
    read_index: &HashMap<BString, usize>,
) -> Result<ShardScan, E> {
    let mut scan = ShardScan::default();
    let mut reader = BufReader::new(File::open(path)?);
    reader.seek(SeekFrom::Start(start))?;

    let mut pos = start;
    let mut last_index: Option<usize> = None;
    let mut line: Vec<u8> = Vec::new();
    while pos < end {
        line.clear();
        let n_read = reader.read_until(b'\n', &mut line)?;
        if n_read == 0 {
            break;
        }
        let record_start = pos;
        pos += n_read as u64;
        if !is_score_line(&line) {
            continue;
        }

        let mut subject_line: Vec<u8> = Vec::new();
        pos += reader.read_until(b'\n', &mut subject_line)? as u64;
        let mut query_line: Vec<u8> = Vec::new();
        pos += reader.read_until(b'\n', &mut query_line)? as u64;

        let Some(record) = MafRecord::parse(&line, &subject_line, &query_line) else {
            continue;
        };
        scan.subjects.insert(SubjectRecord {
            name: record.subject_name.clone(),
            length: record.subject_length,
        });

        let Some(index) = read_index.get(record.read_name.as_bstr()).copied() else {
            continue;
        };
        if scan.batch_offsets.is_empty() || last_index.is_some_and(|last| index < last) {
            scan.batch_offsets.push(record_start);
        }
        last_index = Some(index);
    }

    Ok(scan)
}

/// Phase-two cursor over one batch range of the file.
///
/// [advance](ShardCursor::advance) must be called with the reads in query
/// file order; each call consumes the records belonging to that read. A
/// record for a later read stays pending until its read comes up; a
/// record whose read is not in `read_index` at all would pend forever, so
/// it is dropped and counted instead.
pub struct ShardCursor<'a> {
    reader: BufReader<File>,
    pos: u64,
    end: u64,
    pending: Option<MafRecord>,
    read_index: &'a HashMap<BString, usize>,
    /// Records dropped because they were malformed or did not resolve.
    pub skipped: u64,
}

impl<'a> ShardCursor<'a> {
    pub fn open(
        path: &Path,
        start: u64,
        end: u64,
        read_index: &'a HashMap<BString, usize>,
    ) -> Result<Self, E> {
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(start))?;
        Ok(ShardCursor {
            reader,
            pos: start,
            end,
            pending: None,
            read_index,
            skipped: 0,
        })
    }

    fn next_record(&mut self) -> Result<Option<MafRecord>, E> {
        let mut line: Vec<u8> = Vec::new();
        while self.pos < self.end {
            line.clear();
            let n_read = self.reader.read_until(b'\n', &mut line)?;
            if n_read == 0 {
                break;
            }
            self.pos += n_read as u64;
            if !is_score_line(&line) {
                continue;
            }

            let mut subject_line: Vec<u8> = Vec::new();
            self.pos += self.reader.read_until(b'\n', &mut subject_line)? as u64;
            let mut query_line: Vec<u8> = Vec::new();
            self.pos += self.reader.read_until(b'\n', &mut query_line)? as u64;

            match MafRecord::parse(&line, &subject_line, &query_line) {
                Some(record) if self.read_index.contains_key(record.read_name.as_bstr()) => {
                    return Ok(Some(record))
                }
                _ => self.skipped += 1,
            }
        }
        Ok(None)
    }

    /// Returns every hit of `read` in this cursor's range.
    pub fn advance(
        &mut self,
        read: &ReadRecord,
        subjects: &[SubjectRecord],
    ) -> Result<Vec<HitRecord>, E> {
        let mut hits: Vec<HitRecord> = Vec::new();
        loop {
            let record = match self.pending.take() {
                Some(record) => record,
                None => match self.next_record()? {
                    Some(record) => record,
                    None => break,
                },
            };
            if record.read_name != read.id {
                self.pending = Some(record);
                break;
            }
            match record.to_hit(read, subjects) {
                Some(hit) => hits.push(hit),
                None => self.skipped += 1,
            }
        }
        Ok(hits)
    }
}

// Tests
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bstr::BString;

    use crate::ReadRecord;
    use crate::SubjectRecord;

    const FIXTURE: &[u8] = b"# a=11 b=1\n\
# sequences=2 letters=1000\n\
# batch 0\n\
a score=50\n\
s protA 0 3 + 120 MKW\n\
s read1 0 9 + 15 MKW\n\
\n\
a score=40\n\
s protB 2 3 + 80 MKV\n\
s read2 0 9 + 12 MKV\n\
\n\
# batch 1\n\
a score=35\n\
s protA 1 2 + 120 KW\n\
s read1 3 6 + 15 KW\n";

    fn fixture_path(tag: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("maf2daa_scanner_{}.maf", tag));
        std::fs::write(&path, FIXTURE).unwrap();
        path
    }

    fn test_reads() -> Vec<ReadRecord> {
        use crate::alphabet::pack_sequence;

        [("read1", &b"ATGAAATGGGTTTAA"[..]), ("read2", &b"ATGAAAGTTTAA"[..])]
            .iter()
            .map(|(id, seq)| {
                let (packed, has_n) = pack_sequence(seq);
                ReadRecord {
                    id: (*id).into(),
                    packed,
                    length: seq.len() as u32,
                    has_n,
                }
            })
            .collect()
    }

    fn test_read_index() -> HashMap<BString, usize> {
        test_reads()
            .iter()
            .enumerate()
            .map(|(i, read)| (read.id.clone(), i))
            .collect()
    }

    fn test_subjects() -> Vec<SubjectRecord> {
        vec![
            SubjectRecord { name: "protA".into(), length: 120 },
            SubjectRecord { name: "protB".into(), length: 80 },
        ]
    }

    #[test]
    fn count_lines_handles_missing_final_newline() {
        use super::count_lines;

        let dir = std::env::temp_dir();
        let path = dir.join("maf2daa_scanner_count.maf");

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 2);

        std::fs::write(&path, b"one\ntwo\nthree").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 3);

        std::fs::write(&path, b"").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn partition_splits_at_blank_lines() {
        use super::partition;

        let path = fixture_path("partition");
        let starts = partition(&path, 2).unwrap();

        assert_eq!(starts.len(), 2);
        assert_eq!(starts[0], 0);
        // the second shard starts right after a blank line
        let content = std::fs::read(&path).unwrap();
        assert_eq!(content[starts[1] as usize - 1], b'\n');
        assert_eq!(content[starts[1] as usize - 2], b'\n');

        // one shard spans the whole file
        assert_eq!(partition(&path, 1).unwrap(), vec![0]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn scan_collects_subjects_and_batch_offsets() {
        use super::scan_shard;

        let path = fixture_path("scan");
        let len = std::fs::metadata(&path).unwrap().len();
        let scan = scan_shard(&path, 0, len, &test_read_index()).unwrap();

        let subjects: Vec<_> = scan.subjects.iter().cloned().collect();
        assert_eq!(subjects, test_subjects());

        // two batches: the query order restarts at the third record
        assert_eq!(scan.batch_offsets.len(), 2);
        let content = std::fs::read(&path).unwrap();
        for offset in &scan.batch_offsets {
            assert!(content[*offset as usize..].starts_with(b"a score="));
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn scan_of_two_shards_matches_whole_file() {
        use super::partition;
        use super::scan_shard;

        let path = fixture_path("shards");
        let len = std::fs::metadata(&path).unwrap().len();
        let read_index = test_read_index();

        let whole = scan_shard(&path, 0, len, &read_index).unwrap();

        let starts = partition(&path, 2).unwrap();
        let mut subjects = std::collections::BTreeSet::new();
        let mut offsets: Vec<u64> = Vec::new();
        for (i, start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(len);
            let scan = scan_shard(&path, *start, end, &read_index).unwrap();
            subjects.extend(scan.subjects);
            offsets.extend(scan.batch_offsets);
        }
        offsets.sort_unstable();
        offsets.dedup();

        assert_eq!(subjects, whole.subjects);
        // shard seams may add boundaries but never lose the restarts
        for offset in &whole.batch_offsets {
            assert!(offsets.contains(offset));
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn cursor_yields_hits_in_read_order() {
        use super::scan_shard;
        use super::ShardCursor;

        let path = fixture_path("cursor");
        let len = std::fs::metadata(&path).unwrap().len();
        let reads = test_reads();
        let subjects = test_subjects();
        let read_index = test_read_index();

        let scan = scan_shard(&path, 0, len, &read_index).unwrap();
        let mut cursors: Vec<ShardCursor<'_>> = Vec::new();
        for (i, offset) in scan.batch_offsets.iter().enumerate() {
            let end = scan.batch_offsets.get(i + 1).copied().unwrap_or(len);
            cursors.push(ShardCursor::open(&path, *offset, end, &read_index).unwrap());
        }

        let mut hits_per_read: Vec<usize> = Vec::new();
        for read in &reads {
            let mut n_hits = 0;
            for cursor in cursors.iter_mut() {
                n_hits += cursor.advance(read, &subjects).unwrap().len();
            }
            hits_per_read.push(n_hits);
        }

        // read1 aligns twice (once per batch), read2 once
        assert_eq!(hits_per_read, vec![2, 1]);
        assert_eq!(cursors.iter().map(|c| c.skipped).sum::<u64>(), 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn cursor_counts_unresolvable_records() {
        use super::ShardCursor;

        let path = std::env::temp_dir().join("maf2daa_scanner_skipped.maf");
        std::fs::write(
            &path,
            b"a score=50\n\
              s unknownProt 0 3 + 50 MKW\n\
              s read1 0 9 + 15 MKW\n\
              \n\
              a score=40\n\
              s protA not-a-number 3 + 120 MKW\n\
              s read1 0 9 + 15 MKW\n",
        )
        .unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        let read_index = test_read_index();

        let mut cursor = ShardCursor::open(&path, 0, len, &read_index).unwrap();
        let hits = cursor.advance(&test_reads()[0], &test_subjects()).unwrap();

        assert!(hits.is_empty());
        assert_eq!(cursor.skipped, 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unknown_read_does_not_stall_the_cursor() {
        use super::ShardCursor;

        // the ghost record precedes read1's; it must not stay pending and
        // block everything behind it
        let path = std::env::temp_dir().join("maf2daa_scanner_ghost.maf");
        std::fs::write(
            &path,
            b"a score=60\n\
              s protA 0 3 + 120 MKW\n\
              s ghost 0 9 + 15 MKW\n\
              \n\
              a score=50\n\
              s protA 0 3 + 120 MKW\n\
              s read1 0 9 + 15 MKW\n",
        )
        .unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        let read_index = test_read_index();

        let mut cursor = ShardCursor::open(&path, 0, len, &read_index).unwrap();
        let hits = cursor.advance(&test_reads()[0], &test_subjects()).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw_score, 50);
        assert_eq!(cursor.skipped, 1);

        std::fs::remove_file(&path).unwrap();
    }
}
