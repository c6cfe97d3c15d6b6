//! # Raw Parameter Binary I/O
//!
//! Format, all little-endian:
//! - [Magic 8 bytes] "POTTSRAW"
//! - [Version u32]
//! - [n_cols u32] [n_states u32]
//! - [x_single] `n_cols * n_states` f64
//! - [x_pair] `n_cols * n_states * n_cols * n_states` f64, raw `(i, a, j, b)` order

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info_span;

use crate::error::{PottsError, Result};
use crate::model::parameters::RawParameters;

const MAGIC: &[u8; 8] = b"POTTSRAW";
const VERSION: u32 = 1;

/// Symbols are stored as `u8`
const MAX_STATES: usize = 256;

/// Write raw parameters to `path`
pub fn write_raw(path: &Path, raw: &RawParameters) -> Result<()> {
    let _span = info_span!("raw_write", path = ?path).entered();
    let mut writer = BufWriter::new(File::create(path)?);
    write_raw_to(&mut writer, raw)?;
    writer.flush()?;
    Ok(())
}

/// Read raw parameters from `path`
pub fn read_raw(path: &Path) -> Result<RawParameters> {
    let _span = info_span!("raw_read", path = ?path).entered();
    read_raw_from(BufReader::new(File::open(path)?))
}

pub fn write_raw_to<W: Write>(writer: &mut W, raw: &RawParameters) -> Result<()> {
    let n_cols = u32::try_from(raw.n_cols).map_err(|_| PottsError::invalid_data("too many columns"))?;
    let n_states = u32::try_from(raw.n_states).map_err(|_| PottsError::invalid_data("too many states"))?;
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&n_cols.to_le_bytes())?;
    writer.write_all(&n_states.to_le_bytes())?;
    write_f64s(writer, &raw.x_single)?;
    write_f64s(writer, &raw.x_pair)?;
    Ok(())
}

pub fn read_raw_from<R: Read>(mut reader: R) -> Result<RawParameters> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(PottsError::invalid_data("not a raw parameter file"));
    }
    let version = read_u32(&mut reader)?;
    if version != VERSION {
        return Err(PottsError::invalid_data(format!("unsupported raw format version {}", version)));
    }
    let n_cols = read_u32(&mut reader)? as usize;
    let n_states = read_u32(&mut reader)? as usize;

    if n_states == 0 || n_states > MAX_STATES {
        return Err(PottsError::invalid_data(format!(
            "raw header declares {} states, expected 1..={}",
            n_states, MAX_STATES
        )));
    }

    let overflow = || PottsError::invalid_data(format!("raw header dimensions {} x {} overflow", n_cols, n_states));
    let single_len = n_cols.checked_mul(n_states).ok_or_else(overflow)?;
    let pair_len = single_len.checked_mul(single_len).ok_or_else(overflow)?;
    pair_len.checked_mul(8).ok_or_else(overflow)?;

    let x_single = read_f64s(&mut reader, single_len)?;
    let x_pair = read_f64s(&mut reader, pair_len)?;
    RawParameters::new(n_cols, n_states, x_single, x_pair)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_f64s<W: Write>(writer: &mut W, values: &[f64]) -> Result<()> {
    let bits: Vec<u64> = values.iter().map(|v| v.to_bits().to_le()).collect();
    writer.write_all(bytemuck::cast_slice(&bits))?;
    Ok(())
}

/// Read `n` values; the buffer grows with the bytes actually present.
fn read_f64s<R: Read>(reader: &mut R, n: usize) -> Result<Vec<f64>> {
    let n_bytes = n * 8;
    let mut bytes = Vec::new();
    reader.by_ref().take(n_bytes as u64).read_to_end(&mut bytes)?;
    if bytes.len() != n_bytes {
        return Err(PottsError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("raw payload ends after {} of {} bytes", bytes.len(), n_bytes),
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_bits(u64::from_le(bytemuck::pod_read_unaligned::<u64>(chunk))))
        .collect())
}
