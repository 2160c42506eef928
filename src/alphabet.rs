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

//! Nucleotide packing, the protein alphabet, and codon translation.

/// Protein alphabet indexed by the payload of deletion and substitution
/// edit operations. `/` and `\` are frameshift markers, not residues.
pub const AA_ALPHABET: &[u8] = b"ARNDCQEGHILKMFPSTWYVBJZX*/\\";

/// Nucleotide codes 0..=4 map to these symbols.
pub const NUCLEOTIDES: &[u8] = b"ACGTN";

/// Index of a residue in [AA_ALPHABET]. Unknown residues map to `*`.
pub fn aa_index(residue: u8) -> u8 {
    AA_ALPHABET
        .iter()
        .position(|c| *c == residue)
        .unwrap_or(24) as u8
}

/// Residue for an alphabet index. Out-of-range indexes map to `*`.
pub fn aa_char(index: u8) -> u8 {
    AA_ALPHABET.get(index as usize).copied().unwrap_or(b'*')
}

fn nuc_code(nucleotide: u8) -> u8 {
    match nucleotide.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

/// Number of bytes a packed sequence of `len` bases occupies at `bits` per base.
pub fn packed_len(len: usize, bits: usize) -> usize {
    (len * bits + 7) / 8
}

/// Packs a DNA sequence into 2 bits per base, or 3 bits per base when the
/// sequence contains anything other than ACGT (code 4).
///
/// Bits are packed least-significant-first and run across byte boundaries.
/// Returns the packed bytes and whether the 3-bit layout was used.
///
/// ```rust
/// use maf2daa::alphabet::{pack_sequence, unpack_sequence};
///
/// let (packed, has_n) = pack_sequence(b"ACGT");
/// assert!(!has_n);
/// // A=0b00, C=0b01, G=0b10, T=0b11 from the low bits up
/// assert_eq!(packed, vec![0b11100100]);
/// assert_eq!(unpack_sequence(&packed, 4, 2), vec![0, 1, 2, 3]);
/// ```
pub fn pack_sequence(seq: &[u8]) -> (Vec<u8>, bool) {
    let has_n = seq.iter().any(|c| nuc_code(*c) == 4);
    let bits = if has_n { 3 } else { 2 };

    let mut packed: Vec<u8> = Vec::with_capacity(packed_len(seq.len(), bits));
    let mut acc: u64 = 0;
    let mut n_bits: usize = 0;
    for c in seq {
        acc |= (nuc_code(*c) as u64) << n_bits;
        n_bits += bits;
        while n_bits >= 8 {
            packed.push((acc & 0xFF) as u8);
            acc >>= 8;
            n_bits -= 8;
        }
    }
    if n_bits > 0 {
        packed.push((acc & 0xFF) as u8);
    }

    (packed, has_n)
}

/// Unpacks `len` nucleotide codes stored at `bits` bits per base.
pub fn unpack_sequence(packed: &[u8], len: usize, bits: usize) -> Vec<u8> {
    let mask: u64 = (1 << bits) - 1;
    let mut codes: Vec<u8> = Vec::with_capacity(len);
    let mut acc: u64 = 0;
    let mut n_bits: usize = 0;
    for byte in packed {
        acc |= (*byte as u64) << n_bits;
        n_bits += 8;
        while n_bits >= bits && codes.len() < len {
            codes.push((acc & mask) as u8);
            acc >>= bits;
            n_bits -= bits;
        }
    }
    codes
}

/// Maps nucleotide codes back to `ACGTN` symbols.
pub fn codes_to_dna(codes: &[u8]) -> Vec<u8> {
    codes
        .iter()
        .map(|c| NUCLEOTIDES.get(*c as usize).copied().unwrap_or(b'N'))
        .collect()
}

/// Reverse complement of a DNA sequence. Ambiguity codes stay `N`.
pub fn reverse_complement(dna: &[u8]) -> Vec<u8> {
    dna.iter()
        .rev()
        .map(|c| match c.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            _ => b'N',
        })
        .collect()
}

/// Translates a DNA codon into a protein residue.
///
/// Stop codons and codons containing ambiguity codes translate to `X`,
/// matching how the archive format encodes untranslatable positions.
pub fn translate_codon(codon: &[u8]) -> u8 {
    if codon.len() != 3 {
        return b'X';
    }
    let c: [u8; 3] = [
        codon[0].to_ascii_uppercase(),
        codon[1].to_ascii_uppercase(),
        codon[2].to_ascii_uppercase(),
    ];
    match &c {
        b"TTT" | b"TTC" => b'F',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => b'L',
        b"ATT" | b"ATC" | b"ATA" => b'I',
        b"ATG" => b'M',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => b'V',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => b'S',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => b'P',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => b'T',
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => b'A',
        b"TAT" | b"TAC" => b'Y',
        b"CAT" | b"CAC" => b'H',
        b"CAA" | b"CAG" => b'Q',
        b"AAT" | b"AAC" => b'N',
        b"AAA" | b"AAG" => b'K',
        b"GAT" | b"GAC" => b'D',
        b"GAA" | b"GAG" => b'E',
        b"TGT" | b"TGC" => b'C',
        b"TGG" => b'W',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => b'R',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => b'G',
        _ => b'X',
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn pack_two_bit_roundtrip() {
        use super::{pack_sequence, unpack_sequence};

        let seq = b"ACGTACGTTTGCA";
        let (packed, has_n) = pack_sequence(seq);

        assert!(!has_n);
        assert_eq!(packed.len(), 4);

        let codes = unpack_sequence(&packed, seq.len(), 2);
        let expected: Vec<u8> = vec![0, 1, 2, 3, 0, 1, 2, 3, 3, 3, 2, 1, 0];
        assert_eq!(codes, expected);
    }

    #[test]
    fn pack_three_bit_when_ambiguous() {
        use super::{codes_to_dna, pack_sequence, unpack_sequence};

        let seq = b"ACGNT";
        let (packed, has_n) = pack_sequence(seq);

        assert!(has_n);
        // 5 bases at 3 bits each fit in 2 bytes
        assert_eq!(packed.len(), 2);

        let codes = unpack_sequence(&packed, seq.len(), 3);
        assert_eq!(codes, vec![0, 1, 2, 4, 3]);
        assert_eq!(codes_to_dna(&codes), b"ACGNT".to_vec());
    }

    #[test]
    fn pack_crosses_byte_boundaries() {
        use super::{pack_sequence, unpack_sequence};

        // 3-bit codes straddle bytes from the third base onwards
        let seq = b"TTTNNNTTT";
        let (packed, has_n) = pack_sequence(seq);

        assert!(has_n);
        let codes = unpack_sequence(&packed, seq.len(), 3);
        assert_eq!(codes, vec![3, 3, 3, 4, 4, 4, 3, 3, 3]);
    }

    #[test]
    fn aa_index_unknown_is_star() {
        use super::{aa_char, aa_index};

        assert_eq!(aa_index(b'A'), 0);
        assert_eq!(aa_index(b'R'), 1);
        assert_eq!(aa_index(b'*'), 24);
        assert_eq!(aa_index(b'/'), 25);
        assert_eq!(aa_index(b'\\'), 26);
        assert_eq!(aa_index(b'U'), 24);

        assert_eq!(aa_char(0), b'A');
        assert_eq!(aa_char(26), b'\\');
        assert_eq!(aa_char(63), b'*');
    }

    #[test]
    fn translate_codon_table() {
        use super::translate_codon;

        assert_eq!(translate_codon(b"ATG"), b'M');
        assert_eq!(translate_codon(b"AAA"), b'K');
        assert_eq!(translate_codon(b"TGG"), b'W');
        assert_eq!(translate_codon(b"AGA"), b'R');
        // stop codons and ambiguous codons are untranslatable
        assert_eq!(translate_codon(b"TAA"), b'X');
        assert_eq!(translate_codon(b"TAG"), b'X');
        assert_eq!(translate_codon(b"TGA"), b'X');
        assert_eq!(translate_codon(b"ANG"), b'X');
    }

    #[test]
    fn reverse_complement_basic() {
        use super::reverse_complement;

        assert_eq!(reverse_complement(b"ACGT"), b"ACGT".to_vec());
        assert_eq!(reverse_complement(b"AACGTT"), b"AACGTT".to_vec());
        assert_eq!(reverse_complement(b"AAACCC"), b"GGGTTT".to_vec());
        assert_eq!(reverse_complement(b"ANT"), b"ANT".to_vec());
    }
}
