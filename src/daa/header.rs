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

//! The fixed-size archive header.
//!
//! The header is 2,448 bytes of little-endian fields at fixed offsets. Three
//! summary fields are written as zeroes when the archive is created and
//! patched in place once the last alignment is out: the used-subject count,
//! the query-record count, and the block-size table.

use std::io::Read;

use bincode::decode_from_slice;
use bincode::encode_into_std_write;
use bincode::{Decode, Encode};

type E = Box<dyn std::error::Error + Send + Sync>;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 2448;

/// Identifies a DAA archive; the first 8 bytes of every file.
pub const MAGIC_NUMBER: u64 = 4327487858190246763;

/// Byte offset of the `db_seqs_used` field, patched by the writer.
pub const DB_SEQS_USED_OFFSET: u64 = 32;
/// Byte offset of the `query_records` field, patched by the writer.
pub const QUERY_RECORDS_OFFSET: u64 = 56;
/// Byte offset of the `block_size` table, patched by the writer.
pub const BLOCK_SIZE_OFFSET: u64 = 144;

const BLOCK_TYPE_ALIGNMENTS: u8 = 1;
const BLOCK_TYPE_REF_NAMES: u8 = 2;
const BLOCK_TYPE_REF_LENGTHS: u8 = 3;

#[derive(Encode, Decode, Clone, Debug, PartialEq)]
pub struct DaaHeader {
    pub magic_number: u64,
    pub version: u64,
    pub build: u64,
    pub db_seqs: u64,
    pub db_seqs_used: u64,
    pub db_letters: u64,
    pub flags: u64,
    pub query_records: u64,
    pub mode_rank: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub reward: i32,
    pub penalty: i32,
    pub reserved1: i32,
    pub reserved2: i32,
    pub reserved3: i32,
    pub k: f64,
    pub lambda: f64,
    pub reserved4: f64,
    pub reserved5: f64,
    pub score_matrix: [u8; 16],
    /// Size in bytes of each data block, in physical order.
    pub block_size: [u64; 256],
    /// Type rank of each physical block; 0 marks an unused slot.
    pub block_type_rank: [u8; 256],
}

impl DaaHeader {
    /// Header for a new archive with the alignment parameters from `maf`.
    /// The summary fields start zeroed.
    pub fn new(maf: &crate::maf::header::MafHeader) -> Self {
        let mut block_type_rank = [0_u8; 256];
        block_type_rank[0] = BLOCK_TYPE_ALIGNMENTS;
        block_type_rank[1] = BLOCK_TYPE_REF_NAMES;
        block_type_rank[2] = BLOCK_TYPE_REF_LENGTHS;

        DaaHeader {
            magic_number: MAGIC_NUMBER,
            version: 0,
            build: 0,
            db_seqs: maf.db_seqs,
            db_seqs_used: 0,
            db_letters: maf.db_letters,
            flags: 0,
            query_records: 0,
            // blastx-style translated search
            mode_rank: 3,
            gap_open: maf.gap_open,
            gap_extend: maf.gap_extend,
            reward: 0,
            penalty: 0,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            k: maf.k,
            lambda: maf.lambda,
            reserved4: 0.0,
            reserved5: 0.0,
            score_matrix: [0_u8; 16],
            block_size: [0_u64; 256],
            block_type_rank,
        }
    }

    /// Physical index of the block with type rank `rank`, if present.
    pub fn block_index(&self, rank: u8) -> Option<usize> {
        self.block_type_rank.iter().position(|r| *r == rank)
    }

    pub fn alignments_block_index(&self) -> Option<usize> {
        self.block_index(BLOCK_TYPE_ALIGNMENTS)
    }

    pub fn ref_names_block_index(&self) -> Option<usize> {
        self.block_index(BLOCK_TYPE_REF_NAMES)
    }

    pub fn ref_lengths_block_index(&self) -> Option<usize> {
        self.block_index(BLOCK_TYPE_REF_LENGTHS)
    }

    /// File offset where the block at physical `index` starts.
    pub fn block_offset(&self, index: usize) -> u64 {
        HEADER_SIZE as u64 + self.block_size[0..index].iter().sum::<u64>()
    }
}

pub fn encode_daa_header(header: &DaaHeader) -> Result<Vec<u8>, E> {
    let mut bytes: Vec<u8> = Vec::with_capacity(HEADER_SIZE);
    let nbytes = encode_into_std_write(
        header,
        &mut bytes,
        bincode::config::standard().with_fixed_int_encoding(),
    )?;
    assert_eq!(nbytes, HEADER_SIZE);
    Ok(bytes)
}

pub fn decode_daa_header(header_bytes: &[u8]) -> Result<DaaHeader, E> {
    let header: DaaHeader = decode_from_slice(
        header_bytes,
        bincode::config::standard().with_fixed_int_encoding(),
    )?
    .0;
    if header.magic_number != MAGIC_NUMBER {
        return Err(format!(
            "Magic number {} does not identify a DAA archive",
            header.magic_number
        )
        .into());
    }
    Ok(header)
}

pub fn read_daa_header<R: Read>(conn: &mut R) -> Result<DaaHeader, E> {
    let mut header_bytes = vec![0_u8; HEADER_SIZE];
    conn.read_exact(&mut header_bytes)?;
    let res = decode_daa_header(&header_bytes)?;
    Ok(res)
}

// Tests
#[cfg(test)]
mod tests {

    fn test_maf_header() -> crate::maf::header::MafHeader {
        crate::maf::header::MafHeader {
            gap_open: 11,
            gap_extend: 1,
            db_seqs: 3,
            db_letters: 1000,
            lambda: 0.625,
            k: 0.41,
        }
    }

    #[test]
    fn encode_is_2448_bytes() {
        use super::encode_daa_header;
        use super::DaaHeader;
        use super::HEADER_SIZE;

        let header = DaaHeader::new(&test_maf_header());
        let bytes = encode_daa_header(&header).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
    }

    #[test]
    fn field_offsets_are_fixed() {
        use super::encode_daa_header;
        use super::DaaHeader;
        use super::MAGIC_NUMBER;

        let mut header = DaaHeader::new(&test_maf_header());
        header.db_seqs_used = 2;
        header.query_records = 7;
        header.block_size[0] = 100;
        let bytes = encode_daa_header(&header).unwrap();

        assert_eq!(
            u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            MAGIC_NUMBER
        );
        assert_eq!(u64::from_le_bytes(bytes[32..40].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(bytes[56..64].try_into().unwrap()), 7);
        assert_eq!(i32::from_le_bytes(bytes[64..68].try_into().unwrap()), 3);
        assert_eq!(
            f64::from_le_bytes(bytes[104..112].try_into().unwrap()),
            0.625
        );
        assert_eq!(u64::from_le_bytes(bytes[144..152].try_into().unwrap()), 100);
        // block type ranks follow the block sizes
        assert_eq!(bytes[2192], 1);
        assert_eq!(bytes[2193], 2);
        assert_eq!(bytes[2194], 3);
    }

    #[test]
    fn roundtrip_through_reader() {
        use super::read_daa_header;
        use super::{encode_daa_header, DaaHeader};

        let mut header = DaaHeader::new(&test_maf_header());
        header.block_size[0] = 64;
        header.block_size[1] = 32;
        header.block_size[2] = 12;
        let bytes = encode_daa_header(&header).unwrap();

        let mut conn = std::io::Cursor::new(bytes);
        let decoded = read_daa_header(&mut conn).unwrap();
        assert_eq!(decoded, header);

        assert_eq!(decoded.alignments_block_index(), Some(0));
        assert_eq!(decoded.ref_names_block_index(), Some(1));
        assert_eq!(decoded.ref_lengths_block_index(), Some(2));
        assert_eq!(decoded.block_offset(0), 2448);
        assert_eq!(decoded.block_offset(1), 2448 + 64);
        assert_eq!(decoded.block_offset(2), 2448 + 96);
    }

    #[test]
    fn bad_magic_is_rejected() {
        use super::{decode_daa_header, encode_daa_header, DaaHeader};

        let mut header = DaaHeader::new(&test_maf_header());
        header.magic_number = 1;
        let bytes = encode_daa_header(&header).unwrap();
        assert!(decode_daa_header(&bytes).is_err());
    }
}
