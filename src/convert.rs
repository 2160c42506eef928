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

//! Converting a MAF file into a DAA archive.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use bstr::BString;
use log::info;
use log::warn;
use rayon::prelude::*;

use crate::daa::header::DaaHeader;
use crate::daa::writer::DaaWriter;
use crate::filter::filter_hits;
use crate::filter::filter_hits_parallel;
use crate::filter::PARALLEL_THRESHOLD;
use crate::maf::header::MafHeader;
use crate::maf::scanner::partition;
use crate::maf::scanner::scan_shard;
use crate::maf::scanner::ShardCursor;
use crate::maf::scanner::ShardScan;
use crate::reads::read_queries;
use crate::HitRecord;
use crate::SubjectRecord;

type E = Box<dyn std::error::Error + Send + Sync>;

// Hits are buffered and handed to the writer in batches of this size.
const WRITE_BATCH: usize = 10_000;

/// The MAF input is gzip-compressed; the sharded scanner seeks, so it
/// needs the uncompressed file.
#[derive(Debug)]
pub struct CompressedMafInput(pub PathBuf);

impl fmt::Display for CompressedMafInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAF file {} is gzip-compressed; decompress it before converting",
            self.0.display()
        )
    }
}

impl std::error::Error for CompressedMafInput {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub n_reads: usize,
    pub n_subjects: usize,
    /// Hits written to the archive, after filtering.
    pub n_hits: u64,
    /// Records dropped as malformed or unresolvable.
    pub n_skipped: u64,
}

/// Converts the alignments in `maf_file` into an archive at `out_file`.
///
/// The MAF file is scanned twice by `procs` workers: once to collect the
/// subject table and the record batch boundaries, then batch cursors hand
/// out each read's hits in turn so the archive comes out in read order.
/// When `do_filter` is set, hits dominated within their read are dropped;
/// the coverage and score thresholds both derive from `top_percent` as
/// `(100 - top_percent) / 100`.
///
/// The shard cursors seek, so the MAF file must be uncompressed; a
/// gzipped input is rejected with [CompressedMafInput].
pub fn run(
    maf_file: &Path,
    reads_file: &Path,
    out_file: &Path,
    procs: usize,
    top_percent: f64,
    do_filter: bool,
) -> Result<ConvertSummary, E> {
    if crate::maf::is_gzipped(maf_file)? {
        return Err(CompressedMafInput(maf_file.to_path_buf()).into());
    }
    let procs = procs.max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(procs).build()?;

    let maf_header = MafHeader::from_maf(maf_file)?;
    let reads = read_queries(reads_file)?;
    let read_index: HashMap<BString, usize> = reads
        .iter()
        .enumerate()
        .map(|(i, read)| (read.id.clone(), i))
        .collect();
    info!("Read {} query sequences", reads.len());

    let file_len = std::fs::metadata(maf_file)?.len();
    let starts = partition(maf_file, procs)?;
    info!("Scanning {} shards", starts.len());
    let scans: Vec<ShardScan> = pool.install(|| {
        starts
            .par_iter()
            .enumerate()
            .map(|(i, start)| {
                let end = starts.get(i + 1).copied().unwrap_or(file_len);
                scan_shard(maf_file, *start, end, &read_index)
            })
            .collect::<Result<Vec<ShardScan>, E>>()
    })?;

    let mut subject_set: BTreeSet<SubjectRecord> = BTreeSet::new();
    let mut batch_offsets: Vec<u64> = Vec::new();
    for scan in scans {
        subject_set.extend(scan.subjects);
        batch_offsets.extend(scan.batch_offsets);
    }
    batch_offsets.sort_unstable();
    batch_offsets.dedup();
    let subjects: Vec<SubjectRecord> = subject_set.into_iter().collect();
    info!(
        "Found {} subjects in {} record batches",
        subjects.len(),
        batch_offsets.len()
    );

    let mut writer = DaaWriter::create(out_file, &DaaHeader::new(&maf_header))?;
    let mut cursors: Vec<ShardCursor<'_>> = Vec::with_capacity(batch_offsets.len());
    for (i, offset) in batch_offsets.iter().enumerate() {
        let end = batch_offsets.get(i + 1).copied().unwrap_or(file_len);
        cursors.push(ShardCursor::open(maf_file, *offset, end, &read_index)?);
    }

    let min_cov = (100.0 - top_percent) / 100.0;
    let min_score = min_cov;
    let mut summary = ConvertSummary {
        n_reads: reads.len(),
        n_subjects: subjects.len(),
        ..ConvertSummary::default()
    };
    let mut buffer: Vec<HitRecord> = Vec::new();
    for (i, read) in reads.iter().enumerate() {
        let per_cursor: Vec<Vec<HitRecord>> = pool.install(|| {
            cursors
                .par_iter_mut()
                .map(|cursor| cursor.advance(read, &subjects))
                .collect::<Result<Vec<Vec<HitRecord>>, E>>()
        })?;
        let mut hits: Vec<HitRecord> = per_cursor.into_iter().flatten().collect();

        if do_filter && !hits.is_empty() {
            hits = if hits.len() > PARALLEL_THRESHOLD {
                pool.install(|| {
                    filter_hits_parallel(hits, maf_header.lambda, maf_header.k, min_cov, min_score)
                })
            } else {
                filter_hits(hits, maf_header.lambda, maf_header.k, min_cov, min_score)
            };
        }

        summary.n_hits += hits.len() as u64;
        buffer.extend(hits);
        if buffer.len() > WRITE_BATCH || i == reads.len() - 1 {
            writer.write_hits(&buffer)?;
            buffer.clear();
        }
    }
    writer.finish(&subjects)?;

    summary.n_skipped = cursors.iter().map(|cursor| cursor.skipped).sum();
    if summary.n_skipped > 0 {
        warn!("Skipped {} malformed or unresolvable records", summary.n_skipped);
    }
    info!(
        "Wrote {} hits for {} reads against {} subjects",
        summary.n_hits, summary.n_reads, summary.n_subjects
    );
    Ok(summary)
}
