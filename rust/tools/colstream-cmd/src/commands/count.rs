use anyhow::{Context, Result};

use crate::commands::open_reader;

pub fn run(path: String) -> Result<()> {
    let mut reader = open_reader(&path)?;
    let mut rows = 0u64;
    while let Some(frame) = reader.next_frame().context("Failed to read frame")? {
        rows += frame.row_count() as u64;
    }
    log::info!("{} frames in {path}", reader.frames_read());
    println!("{rows}");
    Ok(())
}
