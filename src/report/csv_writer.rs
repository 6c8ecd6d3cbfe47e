//! Comma-separated output for rendered report tables.

use super::ReportTable;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn write_table<W: Write>(table: &ReportTable, out: W) -> Result<W, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}

/// Render the table as CSV text.
pub fn to_csv_string(table: &ReportTable) -> Result<String, ReportError> {
    let bytes = write_table(table, Vec::new())?;
    Ok(String::from_utf8(bytes)?)
}

/// Write the table to `path`, replacing any previous content.
///
/// The whole table is rewritten on each call since earlier rows may gain
/// columns when a new asset appears.
pub fn write_csv(table: &ReportTable, path: &Path) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    let mut file = write_table(table, std::io::BufWriter::new(file))?;
    file.flush()?;
    Ok(())
}
