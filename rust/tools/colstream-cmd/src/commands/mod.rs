//! Command implementations for colstream-cmd

use anyhow::{Context, Result};
use colstream::Reader;

use crate::utils;

pub mod count;
pub mod dump;
pub mod inspect;
pub mod rechunk;

/// Opens the stream at `path` for reading.
pub fn open_reader(path: &str) -> Result<Reader<'static>> {
    utils::validate_file_exists(path)?;
    Reader::open(path).with_context(|| format!("Failed to open stream: {path}"))
}
