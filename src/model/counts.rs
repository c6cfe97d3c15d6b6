//! # Sufficient Statistics
//!
//! Weighted single-site and pair-site symbol frequencies of an alignment.
//!
//! Pair frequencies are accumulated for `i < j` only and then mirrored into
//! `(j, i, b, a)`, so the tables satisfy the pair symmetry exactly. Diagonal
//! blocks `(i, i)` are left at zero: a column is never paired with itself.

use rayon::prelude::*;

use crate::model::parameters::ParameterLayout;

/// Frequency tables laid out like the parameter vector.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyTables {
    layout: ParameterLayout,
    /// `f[i,a]`, `L x S`
    pub single: Vec<f64>,
    /// `f[i,j,a,b]`, `L x L x S x S`
    pub pair: Vec<f64>,
}

impl FrequencyTables {
    /// Zeroed tables for the given layout
    pub fn new(layout: ParameterLayout) -> Self {
        Self {
            layout,
            single: vec![0.0; layout.single_len()],
            pair: vec![0.0; layout.pair_len()],
        }
    }

    /// Frequencies of a row-major alignment buffer
    pub fn from_rows(layout: ParameterLayout, rows: &[u8], weights: Option<&[f64]>) -> Self {
        let mut tables = Self::new(layout);
        tables.accumulate(rows, weights);
        tables
    }

    pub fn layout(&self) -> ParameterLayout {
        self.layout
    }

    /// Overwrite the tables with the frequencies of `rows`.
    ///
    /// `rows` is row-major with `layout.n_cols` symbols per row. Without
    /// weights every row counts once. Frequencies are normalized by the total
    /// weight; an all-zero weight vector leaves the tables at zero.
    pub fn accumulate(&mut self, rows: &[u8], weights: Option<&[f64]>) {
        let layout = self.layout;
        let (l, s) = (layout.n_cols, layout.n_states);
        debug_assert_eq!(rows.len() % l.max(1), 0);
        let n_rows = rows.len() / l.max(1);
        debug_assert!(weights.map_or(true, |w| w.len() == n_rows));

        let weight = |n: usize| weights.map_or(1.0, |w| w[n]);
        let total: f64 = (0..n_rows).map(weight).sum();
        let norm = if total > 0.0 { 1.0 / total } else { 0.0 };

        self.single.fill(0.0);
        for (n, row) in rows.chunks_exact(l).enumerate() {
            let w = weight(n) * norm;
            for (i, &a) in row.iter().enumerate() {
                self.single[i * s + a as usize] += w;
            }
        }

        // Upper triangle in parallel, one column i per task
        let block = l * s * s;
        self.pair
            .par_chunks_mut(block)
            .enumerate()
            .for_each(|(i, chunk)| {
                chunk.fill(0.0);
                for (n, row) in rows.chunks_exact(l).enumerate() {
                    let w = weight(n) * norm;
                    if w == 0.0 {
                        continue;
                    }
                    let a = row[i] as usize;
                    for j in (i + 1)..l {
                        let b = row[j] as usize;
                        chunk[(j * s + a) * s + b] += w;
                    }
                }
            });

        // Mirror (i,j,a,b) -> (j,i,b,a)
        for i in 0..l {
            for j in (i + 1)..l {
                for a in 0..s {
                    for b in 0..s {
                        self.pair[layout.pair_index(j, i, b, a)] = self.pair[layout.pair_index(i, j, a, b)];
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frequencies_weighted() {
        let layout = ParameterLayout::new(2, 2);
        let rows = [0u8, 1, 1, 1];
        let f = FrequencyTables::from_rows(layout, &rows, Some(&[3.0, 1.0]));
        assert_eq!(f.single, vec![0.75, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn test_pair_frequencies_symmetric() {
        let layout = ParameterLayout::new(3, 3);
        let rows = [0u8, 1, 2, 2, 1, 0, 1, 1, 1, 0, 2, 2];
        let f = FrequencyTables::from_rows(layout, &rows, None);
        assert_eq!(layout.pair_asymmetry(&f.pair), 0.0);
        // column 0 = a and column 1 = b observed in row 0 only
        assert!((f.pair[layout.pair_index(0, 1, 0, 1)] - 0.25).abs() < 1e-12);
        assert!((f.pair[layout.pair_index(1, 0, 1, 0)] - 0.25).abs() < 1e-12);
        // diagonal blocks stay empty
        assert!(f.pair[layout.pair_block(1, 1)..layout.pair_block(1, 2)]
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn test_pair_block_sums_to_one() {
        let layout = ParameterLayout::new(3, 2);
        let rows = [0u8, 1, 0, 1, 1, 0, 0, 0, 1];
        let f = FrequencyTables::from_rows(layout, &rows, Some(&[0.5, 1.0, 2.0]));
        let start = layout.pair_block(0, 2);
        let sum: f64 = f.pair[start..start + 4].iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_accumulate_overwrites() {
        let layout = ParameterLayout::new(1, 2);
        let mut f = FrequencyTables::from_rows(layout, &[0, 0], None);
        f.accumulate(&[1, 1], None);
        assert_eq!(f.single, vec![0.0, 1.0]);
    }
}
