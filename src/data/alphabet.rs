//! # Symbol Alphabet
//!
//! Maps residue letters to the integer codes stored in alignments and
//! describes which code, if any, is the gap symbol.

use serde::{Deserialize, Serialize};

/// Amino acid letters in code order. The trailing `-` is the gap.
pub const AMINO_ACIDS: &[u8; 21] = b"ARNDCQEGHILKMFPSTWYV-";

/// Categorical alphabet used for alignment cells and potentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    n_states: usize,
    gap: Option<u8>,
}

impl Alphabet {
    /// Create an alphabet of `n_states` symbols, `0..n_states`.
    ///
    /// `gap` must be one of those symbols when given.
    pub fn new(n_states: usize, gap: Option<u8>) -> Self {
        debug_assert!(n_states > 0 && n_states <= u8::MAX as usize + 1);
        debug_assert!(gap.map_or(true, |g| (g as usize) < n_states));
        Self { n_states, gap }
    }

    /// The 20 amino acids plus gap (code 20).
    pub fn amino_acids() -> Self {
        Self::new(AMINO_ACIDS.len(), Some(20))
    }

    /// Number of symbols, gap included
    #[inline]
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Gap code, if the alphabet has one
    #[inline]
    pub fn gap(&self) -> Option<u8> {
        self.gap
    }

    #[inline]
    pub fn is_gap(&self, code: u8) -> bool {
        self.gap == Some(code)
    }

    #[inline]
    pub fn contains(&self, code: u8) -> bool {
        (code as usize) < self.n_states
    }

    /// Encode an amino acid letter. Unknown letters become the gap.
    pub fn encode_amino_acid(letter: u8) -> u8 {
        let upper = letter.to_ascii_uppercase();
        AMINO_ACIDS
            .iter()
            .position(|&aa| aa == upper)
            .map_or(20, |p| p as u8)
    }

    /// Decode an amino acid code back to its letter.
    pub fn decode_amino_acid(code: u8) -> u8 {
        AMINO_ACIDS.get(code as usize).copied().unwrap_or(b'-')
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::amino_acids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        assert_eq!(Alphabet::encode_amino_acid(b'A'), 0);
        assert_eq!(Alphabet::encode_amino_acid(b'v'), 19);
        assert_eq!(Alphabet::encode_amino_acid(b'-'), 20);
        assert_eq!(Alphabet::encode_amino_acid(b'X'), 20);
        assert_eq!(Alphabet::decode_amino_acid(4), b'C');
    }

    #[test]
    fn test_gap() {
        let aa = Alphabet::amino_acids();
        assert_eq!(aa.n_states(), 21);
        assert!(aa.is_gap(20));
        assert!(!aa.is_gap(0));

        let binary = Alphabet::new(2, None);
        assert!(!binary.is_gap(1));
        assert!(binary.contains(1));
        assert!(!binary.contains(2));
    }
}
