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

//! Reading MAF alignment files.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;

pub mod header;
pub mod record;
pub mod scanner;

type E = Box<dyn std::error::Error + Send + Sync>;

/// True if the file starts with the two-byte gzip magic.
pub fn is_gzipped(path: &Path) -> Result<bool, E> {
    let mut file = File::open(path)?;
    let mut magic = [0_u8; 2];
    let n_read = file.read(&mut magic)?;
    Ok(n_read == 2 && magic == [0x1f, 0x8b])
}

/// Opens a possibly gzip-compressed file for buffered line reading.
///
/// Sniffs the gzip magic instead of trusting the file extension.
pub fn open_maybe_gzip(path: &Path) -> Result<Box<dyn BufRead>, E> {
    let gzipped = is_gzipped(path)?;
    let file = File::open(path)?;
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
