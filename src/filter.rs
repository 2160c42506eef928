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

//! Dropping hits dominated by a better-scoring overlap.
//!
//! A hit is dominated when another hit of the same read covers more than
//! `min_cov` of its query span and outscores it by more than the
//! `min_score` bit-score ratio. Both thresholds come from the `--top`
//! percentage as `(100 - top) / 100`.

use rayon::prelude::*;

use crate::bit_score;
use crate::HitRecord;

/// Hit counts above this use the chunked parallel filter.
pub const PARALLEL_THRESHOLD: usize = 100_000;

/// Inclusive query span of a hit on its strand.
fn query_coordinates(hit: &HitRecord) -> (i64, i64) {
    let start = hit.query_start as i64;
    let len = hit.query_length as i64;
    if hit.reverse {
        (start - len + 1, start)
    } else {
        (start, start + len - 1)
    }
}

/// Fraction of `hit`'s span that `other` covers.
fn coverage(hit: &HitRecord, other: &HitRecord) -> f64 {
    let (start, end) = query_coordinates(hit);
    let (other_start, other_end) = query_coordinates(other);
    let overlap = (end.min(other_end) - start.max(other_start) + 1).max(0);
    overlap as f64 / (end - start + 1) as f64
}

fn dominated(hit: &HitRecord, hits: &[HitRecord], params: &FilterParams) -> bool {
    let bits = bit_score(hit.raw_score, params.lambda, params.k) as f64;
    hits.iter().any(|other| {
        !std::ptr::eq(hit, other)
            && coverage(hit, other) > params.min_cov
            && params.min_score * bit_score(other.raw_score, params.lambda, params.k) as f64 > bits
    })
}

struct FilterParams {
    lambda: f64,
    k: f64,
    min_cov: f64,
    min_score: f64,
}

/// Removes dominated hits, preserving order.
pub fn filter_hits(
    hits: Vec<HitRecord>,
    lambda: f64,
    k: f64,
    min_cov: f64,
    min_score: f64,
) -> Vec<HitRecord> {
    let params = FilterParams { lambda, k, min_cov, min_score };
    let kept: Vec<bool> = hits
        .iter()
        .map(|hit| !dominated(hit, &hits, &params))
        .collect();
    keep(hits, kept)
}

/// [filter_hits] with the domination tests spread over rayon workers.
/// Returns the same hits as the sequential filter.
pub fn filter_hits_parallel(
    hits: Vec<HitRecord>,
    lambda: f64,
    k: f64,
    min_cov: f64,
    min_score: f64,
) -> Vec<HitRecord> {
    let params = FilterParams { lambda, k, min_cov, min_score };
    let kept: Vec<bool> = hits
        .par_iter()
        .map(|hit| !dominated(hit, &hits, &params))
        .collect();
    keep(hits, kept)
}

fn keep(hits: Vec<HitRecord>, kept: Vec<bool>) -> Vec<HitRecord> {
    hits.into_iter()
        .zip(kept)
        .filter_map(|(hit, keep)| keep.then_some(hit))
        .collect()
}

// Tests
#[cfg(test)]
mod tests {
    use crate::HitRecord;

    fn test_hit(raw_score: i32, query_start: u32, query_length: u32, reverse: bool) -> HitRecord {
        HitRecord {
            read_name: "r1".into(),
            total_query_length: 100,
            packed_query: vec![0],
            has_n: false,
            subject_id: 0,
            raw_score,
            query_start,
            ref_start: 0,
            reverse,
            query_length,
            edit_ops: vec![query_length as u8 / 3],
        }
    }

    // thresholds for --top 10
    const MIN_COV: f64 = 0.9;
    const MIN_SCORE: f64 = 0.9;

    #[test]
    fn dominated_hit_is_dropped() {
        use super::filter_hits;

        let strong = test_hit(100, 0, 30, false);
        let weak = test_hit(10, 0, 30, false);
        let filtered = filter_hits(vec![strong.clone(), weak], 0.625, 0.41, MIN_COV, MIN_SCORE);
        assert_eq!(filtered, vec![strong]);
    }

    #[test]
    fn disjoint_hits_survive() {
        use super::filter_hits;

        let first = test_hit(100, 0, 30, false);
        let second = test_hit(10, 60, 30, false);
        let hits = vec![first, second];
        let filtered = filter_hits(hits.clone(), 0.625, 0.41, MIN_COV, MIN_SCORE);
        assert_eq!(filtered, hits);
    }

    #[test]
    fn close_scores_survive() {
        use super::filter_hits;

        let first = test_hit(100, 0, 30, false);
        let second = test_hit(98, 0, 30, false);
        let hits = vec![first, second];
        let filtered = filter_hits(hits.clone(), 0.625, 0.41, MIN_COV, MIN_SCORE);
        assert_eq!(filtered, hits);
    }

    #[test]
    fn reverse_spans_overlap_forward_spans() {
        use super::filter_hits;

        // reverse hit at start 29, length 30 spans [0, 29]
        let strong = test_hit(100, 0, 30, false);
        let weak = test_hit(10, 29, 30, true);
        let filtered = filter_hits(vec![strong.clone(), weak], 0.625, 0.41, MIN_COV, MIN_SCORE);
        assert_eq!(filtered, vec![strong]);
    }

    #[test]
    fn parallel_filter_matches_sequential() {
        use super::filter_hits;
        use super::filter_hits_parallel;

        let mut hits: Vec<HitRecord> = Vec::new();
        for i in 0..200 {
            let score = 10 + (i * 37) % 90;
            let start = (i * 13) % 60;
            let reverse = i % 3 == 0;
            let start = if reverse { start + 29 } else { start };
            hits.push(test_hit(score as i32, start as u32, 30, reverse));
        }

        let sequential = filter_hits(hits.clone(), 0.625, 0.41, MIN_COV, MIN_SCORE);
        let parallel = filter_hits_parallel(hits, 0.625, 0.41, MIN_COV, MIN_SCORE);
        assert_eq!(sequential, parallel);
    }
}
