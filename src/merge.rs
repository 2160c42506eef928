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

//! Merging DAA archives over the same read set.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use rayon::prelude::*;

use crate::daa::header::DaaHeader;
use crate::daa::reader::DaaCursor;
use crate::daa::reader::DaaReader;
use crate::daa::writer::DaaWriter;
use crate::maf::header::MafHeader;
use crate::reads::read_queries;
use crate::HitRecord;
use crate::SubjectRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

const WRITE_BATCH: usize = 10_000;

/// The input directory contained no `.daa` files.
#[derive(Debug)]
pub struct NoArchivesFound(pub PathBuf);

impl fmt::Display for NoArchivesFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No .daa archives found in {}", self.0.display())
    }
}

impl std::error::Error for NoArchivesFound {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub n_archives: usize,
    pub n_reads: usize,
    pub n_subjects: usize,
    /// Hits written to the merged archive.
    pub n_hits: u64,
    /// Exact duplicates dropped across the inputs.
    pub n_duplicates: u64,
}

fn find_archives(daa_dir: &Path) -> Result<Vec<PathBuf>, E> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(daa_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.extension()? == "daa").then_some(path)
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(NoArchivesFound(daa_dir.to_path_buf()).into());
    }
    Ok(paths)
}

/// Merges every `.daa` archive in `daa_dir` into one archive at `out_file`.
///
/// The subject tables are unioned and hit subject ids remapped; the header
/// parameters come from the first archive. Each read's hits are gathered
/// across the archives in read order and exact duplicates dropped, keeping
/// the first occurrence. No domination filter runs on this path.
pub fn run(
    daa_dir: &Path,
    reads_file: &Path,
    out_file: &Path,
    procs: usize,
) -> Result<MergeSummary, E> {
    let procs = procs.max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(procs).build()?;

    let paths = find_archives(daa_dir)?;
    info!("Merging {} archives from {}", paths.len(), daa_dir.display());
    let mut readers: Vec<DaaReader> = Vec::with_capacity(paths.len());
    for path in &paths {
        readers.push(DaaReader::open(path)?);
    }

    let maf_header = MafHeader::from_daa(&readers[0].header);
    let mut subject_set: BTreeSet<SubjectRecord> = BTreeSet::new();
    for reader in readers.iter_mut() {
        subject_set.extend(reader.subjects()?);
    }
    let subjects: Vec<SubjectRecord> = subject_set.into_iter().collect();

    let reads = read_queries(reads_file)?;
    let mut cursors: Vec<DaaCursor> = readers.into_iter().map(DaaCursor::new).collect();

    let mut summary = MergeSummary {
        n_archives: paths.len(),
        n_reads: reads.len(),
        n_subjects: subjects.len(),
        ..MergeSummary::default()
    };
    let mut writer = DaaWriter::create(out_file, &DaaHeader::new(&maf_header))?;
    let mut buffer: Vec<HitRecord> = Vec::new();
    for (i, read) in reads.iter().enumerate() {
        let per_cursor: Vec<Vec<HitRecord>> = pool.install(|| {
            cursors
                .par_iter_mut()
                .map(|cursor| cursor.advance(read, &subjects))
                .collect::<Result<Vec<Vec<HitRecord>>, E>>()
        })?;

        let mut hits: Vec<HitRecord> = Vec::new();
        for hit in per_cursor.into_iter().flatten() {
            if hits.contains(&hit) {
                summary.n_duplicates += 1;
            } else {
                hits.push(hit);
            }
        }

        summary.n_hits += hits.len() as u64;
        buffer.extend(hits);
        if buffer.len() > WRITE_BATCH || i == reads.len() - 1 {
            writer.write_hits(&buffer)?;
            buffer.clear();
        }
    }
    writer.finish(&subjects)?;

    info!(
        "Merged {} hits for {} reads, dropped {} duplicates",
        summary.n_hits, summary.n_reads, summary.n_duplicates
    );
    Ok(summary)
}

// Tests
#[cfg(test)]
mod tests {
    use crate::daa::header::DaaHeader;
    use crate::daa::writer::DaaWriter;
    use crate::HitRecord;
    use crate::SubjectRecord;

    fn test_maf_header() -> crate::maf::header::MafHeader {
        crate::maf::header::MafHeader {
            gap_open: 11,
            gap_extend: 1,
            db_seqs: 3,
            db_letters: 300,
            lambda: 0.625,
            k: 0.41,
        }
    }

    fn test_hit(read_name: &str, subject_id: u32, raw_score: i32) -> HitRecord {
        use crate::alphabet::pack_sequence;

        let (packed_query, has_n) = pack_sequence(b"ATGAAATGG");
        HitRecord {
            read_name: read_name.into(),
            total_query_length: 9,
            packed_query,
            has_n,
            subject_id,
            raw_score,
            query_start: 0,
            ref_start: 0,
            reverse: false,
            query_length: 9,
            edit_ops: vec![3],
        }
    }

    fn write_archive(path: &std::path::Path, hits: &[HitRecord], subjects: &[SubjectRecord]) {
        let mut writer = DaaWriter::create(path, &DaaHeader::new(&test_maf_header())).unwrap();
        writer.write_hits(hits).unwrap();
        writer.finish(subjects).unwrap();
    }

    #[test]
    fn merge_remaps_and_deduplicates() {
        use super::run;
        use crate::daa::reader::DaaReader;

        let dir = std::env::temp_dir().join("maf2daa_merge_inputs");
        std::fs::create_dir_all(&dir).unwrap();
        let reads_file = std::env::temp_dir().join("maf2daa_merge_reads.fastq");
        let out_file = std::env::temp_dir().join("maf2daa_merge_out.daa");
        std::fs::write(
            &reads_file,
            b"@r1\nATGAAATGG\n+\nIIIIIIIII\n@r2\nATGAAATGG\n+\nIIIIIIIII\n",
        )
        .unwrap();

        // archive 1 knows protB only; archive 2 knows protA and protB.
        // r1's protB hit appears in both and must merge to one.
        write_archive(
            &dir.join("part1.daa"),
            &[test_hit("r1", 0, 50)],
            &[SubjectRecord { name: "protB".into(), length: 80 }],
        );
        write_archive(
            &dir.join("part2.daa"),
            &[
                {
                    let mut hit = test_hit("r1", 1, 50);
                    hit.subject_id = 1;
                    hit
                },
                test_hit("r2", 0, 40),
            ],
            &[
                SubjectRecord { name: "protA".into(), length: 120 },
                SubjectRecord { name: "protB".into(), length: 80 },
            ],
        );

        let summary = run(&dir, &reads_file, &out_file, 2).unwrap();
        assert_eq!(summary.n_archives, 2);
        assert_eq!(summary.n_reads, 2);
        assert_eq!(summary.n_subjects, 2);
        assert_eq!(summary.n_hits, 2);
        assert_eq!(summary.n_duplicates, 1);

        let mut reader = DaaReader::open(&out_file).unwrap();
        assert_eq!(reader.header.db_seqs_used, 2);
        assert_eq!(reader.header.lambda, 0.625);
        assert_eq!(reader.reference_name(0).unwrap(), "protA");
        assert_eq!(reader.reference_name(1).unwrap(), "protB");

        // r1's surviving hit points at protB in the merged table
        let record = reader.read_query_record(0).unwrap();
        assert_eq!(record.name, "r1");
        let hits = record.hits(&reader.header).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject_id, 1);

        // r2's hit is against protA, id 0 in the merged table too
        let record = reader.read_query_record(1).unwrap();
        assert_eq!(record.name, "r2");
        assert_eq!(record.hits(&reader.header).unwrap()[0].subject_id, 0);

        std::fs::remove_file(&reads_file).unwrap();
        std::fs::remove_file(&out_file).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_an_error() {
        use super::run;

        let dir = std::env::temp_dir().join("maf2daa_merge_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let reads_file = std::env::temp_dir().join("maf2daa_merge_empty_reads.fastq");
        std::fs::write(&reads_file, b"@r1\nACGT\n+\nIIII\n").unwrap();
        let out_file = std::env::temp_dir().join("maf2daa_merge_empty_out.daa");

        let res = run(&dir, &reads_file, &out_file, 1);
        assert!(res.is_err());

        std::fs::remove_file(&reads_file).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
