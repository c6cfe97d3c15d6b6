//! # Newick Tree Reader
//!
//! Parses `((a:0.1,b:0.2)x:0.3,c:0.4);` into a [`Tree`]. Supports unquoted
//! and single-quoted labels, optional branch lengths (missing lengths are 0),
//! internal node labels and whitespace between tokens. Comments in square
//! brackets are skipped. A file holding several trees yields the first.

use std::io::Read;
use std::path::Path;

use tracing::{info, info_span};

use crate::data::tree::{Clade, Tree};
use crate::error::{PottsError, Result};

/// Read the first tree of a Newick file (plain or `.gz`).
pub fn read_newick(path: &Path) -> Result<Tree> {
    let _span = info_span!("newick_read", path = ?path).entered();
    let mut text = String::new();
    super::open_text(path)?.read_to_string(&mut text)?;
    let tree = parse_newick(&text)?;
    info!(n_leaves = tree.n_leaves(), "tree loaded");
    Ok(tree)
}

/// Parse one Newick tree from a string.
pub fn parse_newick(text: &str) -> Result<Tree> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
        line: 1,
    };
    let root = parser.clade()?;
    parser.skip_blank();
    match parser.peek() {
        Some(b';') => Ok(Tree::new(root)),
        Some(c) => Err(parser.error(format!("unexpected '{}' after tree", c as char))),
        None => Err(parser.error("missing ';' at end of tree")),
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> PottsError {
        PottsError::parse(self.line, message)
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.bump();
            } else if c == b'[' {
                while let Some(c) = self.bump() {
                    if c == b']' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn clade(&mut self) -> Result<Clade> {
        self.skip_blank();
        let mut clades = Vec::new();
        if self.peek() == Some(b'(') {
            self.bump();
            loop {
                clades.push(self.clade()?);
                self.skip_blank();
                match self.bump() {
                    Some(b',') => continue,
                    Some(b')') => break,
                    Some(c) => return Err(self.error(format!("expected ',' or ')', found '{}'", c as char))),
                    None => return Err(self.error("unterminated clade")),
                }
            }
        }
        let name = self.label()?;
        let branch_length = self.branch_length()?;
        Ok(Clade {
            name,
            branch_length,
            clades,
        })
    }

    fn label(&mut self) -> Result<Option<String>> {
        self.skip_blank();
        if self.peek() == Some(b'\'') {
            self.bump();
            let start = self.pos;
            loop {
                match self.bump() {
                    Some(b'\'') => break,
                    Some(_) => {}
                    None => return Err(self.error("unterminated quoted label")),
                }
            }
            let raw = &self.bytes[start..self.pos - 1];
            return Ok(Some(String::from_utf8_lossy(raw).into_owned()));
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b'(' | b')' | b',' | b':' | b';' | b'[') || c.is_ascii_whitespace() {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            return Ok(None);
        }
        let raw = &self.bytes[start..self.pos];
        Ok(Some(String::from_utf8_lossy(raw).replace('_', " ")))
    }

    fn branch_length(&mut self) -> Result<f64> {
        self.skip_blank();
        if self.peek() != Some(b':') {
            return Ok(0.0);
        }
        self.bump();
        self.skip_blank();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+' | b'e' | b'E') {
                self.bump();
            } else {
                break;
            }
        }
        let token = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        token
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid branch length '{}'", token)))
    }
}
