//! Bar file output.
//!
//! Every bar file carries exactly the fixed 18-column header, even when
//! a frame produced no bars, so downstream schema checks never depend
//! on row counts.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tickframe_core::{Bar, Result, BAR_COLUMNS};

/// Write one frame's bars as CSV with the fixed 18-column schema.
pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(File::create(path)?));
    writer.write_record(BAR_COLUMNS)?;
    for bar in bars {
        writer.serialize(bar)?;
    }
    writer.flush()?;
    Ok(())
}
