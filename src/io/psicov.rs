//! PSICOV alignment reader: one aligned sequence per line, no headers.

use std::io::BufRead;
use std::path::Path;

use tracing::{info, info_span};

use crate::data::alignment::Alignment;
use crate::data::alphabet::Alphabet;
use crate::error::{PottsError, Result};

/// Read a PSICOV file (plain or `.gz`) into an amino acid alignment.
pub fn read_psicov(path: &Path) -> Result<Alignment> {
    let _span = info_span!("psicov_read", path = ?path).entered();
    let msa = parse_psicov(super::open_text(path)?)?;
    info!(n_rows = msa.n_rows(), n_cols = msa.n_cols(), "alignment loaded");
    Ok(msa)
}

/// Parse PSICOV text. Blank lines are skipped; every other line must have the
/// same length as the first.
pub fn parse_psicov<R: BufRead>(reader: R) -> Result<Alignment> {
    let mut n_cols = None;
    let mut n_rows = 0;
    let mut data = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let seq = line.trim();
        if seq.is_empty() {
            continue;
        }
        let expected = *n_cols.get_or_insert(seq.len());
        if seq.len() != expected {
            return Err(PottsError::parse(
                idx + 1,
                format!("sequence has {} columns, expected {}", seq.len(), expected),
            ));
        }
        data.extend(seq.bytes().map(Alphabet::encode_amino_acid));
        n_rows += 1;
    }

    let n_cols = n_cols.ok_or_else(|| PottsError::invalid_data("alignment contains no sequences"))?;
    Alignment::new(n_rows, n_cols, Alphabet::amino_acids(), data)
}
