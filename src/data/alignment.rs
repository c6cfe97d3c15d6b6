//! # Multiple Sequence Alignment
//!
//! Row-major matrix of symbol codes (sequences x columns).

use crate::data::alphabet::Alphabet;
use crate::error::{PottsError, Result};

/// An immutable multiple sequence alignment.
///
/// Cell `(row, col)` lives at `data[row * n_cols + col]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    n_rows: usize,
    n_cols: usize,
    alphabet: Alphabet,
    data: Vec<u8>,
}

impl Alignment {
    /// Build an alignment from a flat row-major buffer.
    ///
    /// Fails if the buffer length is not `n_rows * n_cols` or if any code
    /// falls outside the alphabet.
    pub fn new(n_rows: usize, n_cols: usize, alphabet: Alphabet, data: Vec<u8>) -> Result<Self> {
        if n_rows == 0 || n_cols == 0 {
            return Err(PottsError::invalid_data(format!(
                "alignment must be non-empty, got {} x {}",
                n_rows, n_cols
            )));
        }
        if data.len() != n_rows * n_cols {
            return Err(PottsError::invalid_data(format!(
                "alignment buffer has {} cells, expected {} x {} = {}",
                data.len(),
                n_rows,
                n_cols,
                n_rows * n_cols
            )));
        }
        if let Some(pos) = data.iter().position(|&c| !alphabet.contains(c)) {
            return Err(PottsError::invalid_data(format!(
                "symbol {} at row {} column {} is outside the alphabet of {} states",
                data[pos],
                pos / n_cols,
                pos % n_cols,
                alphabet.n_states()
            )));
        }
        Ok(Self {
            n_rows,
            n_cols,
            alphabet,
            data,
        })
    }

    /// Build an alignment from equally long rows.
    pub fn from_rows(rows: &[Vec<u8>], alphabet: Alphabet) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(PottsError::invalid_data(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        let data = rows.concat();
        Self::new(rows.len(), n_cols, alphabet, data)
    }

    /// Number of sequences
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of aligned columns
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Get one sequence
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    /// Iterate over sequences
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.n_cols)
    }

    /// Get symbol at (row, col)
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.n_cols + col]
    }

    /// The raw row-major buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
