//! # I/O Module
//!
//! File reading/writing boundaries. Converts between disk formats and the
//! in-memory `Alignment`, `Tree` and `RawParameters` types.

pub mod newick;
pub mod psicov;
pub mod raw;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::Result;

/// Open a text file, transparently decompressing `.gz`
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let is_gzipped = path.extension().is_some_and(|e| e == "gz");
    let reader: Box<dyn BufRead + Send> = if is_gzipped {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}
