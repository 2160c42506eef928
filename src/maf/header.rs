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

//! Alignment parameters from the `#` comment lines at the top of a MAF file.

use std::io::BufRead;
use std::path::Path;

use crate::daa::header::DaaHeader;

type E = Box<dyn std::error::Error + Send + Sync>;

/// Scoring and database statistics the archive header needs.
#[derive(Clone, Debug, PartialEq)]
pub struct MafHeader {
    /// Gap open penalty (`a=`).
    pub gap_open: i32,
    /// Gap extension penalty (`b=`).
    pub gap_extend: i32,
    /// Number of reference sequences (`sequences=`).
    pub db_seqs: u64,
    /// Total residues in the reference database (`letters=`).
    pub db_letters: u64,
    pub lambda: f64,
    pub k: f64,
}

impl MafHeader {
    /// Parses `key=value` pairs from the leading `#` lines of a MAF file.
    /// Reading stops at the first line that is not a comment; unknown keys
    /// are ignored.
    pub fn from_maf(path: &Path) -> Result<Self, E> {
        let mut header = MafHeader {
            gap_open: 0,
            gap_extend: 0,
            db_seqs: 0,
            db_letters: 0,
            lambda: 0.0,
            k: 0.0,
        };

        let conn = crate::maf::open_maybe_gzip(path)?;
        for line in conn.lines() {
            let line = line?;
            if !line.starts_with('#') {
                break;
            }
            for token in line[1..].split_whitespace() {
                let Some((key, value)) = token.split_once('=') else {
                    continue;
                };
                match key {
                    "a" => header.gap_open = value.parse()?,
                    "b" => header.gap_extend = value.parse()?,
                    "sequences" => header.db_seqs = value.parse()?,
                    "letters" => header.db_letters = value.parse()?,
                    "lambda" => header.lambda = value.parse()?,
                    "K" => header.k = value.parse()?,
                    _ => (),
                }
            }
        }

        Ok(header)
    }

    /// Recovers the parameters stored in an existing archive header.
    pub fn from_daa(header: &DaaHeader) -> Self {
        MafHeader {
            gap_open: header.gap_open,
            gap_extend: header.gap_extend,
            db_seqs: header.db_seqs,
            db_letters: header.db_letters,
            lambda: header.lambda,
            k: header.k,
        }
    }
}
