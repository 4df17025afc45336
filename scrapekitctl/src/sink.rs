//! Writes formatted results to disk.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use scrapekit_core::{ExtractError, FormattedResult, Table};
use tracing::info;

use crate::{AppError, Result};

pub const DEFAULT_STEM: &str = "extracted_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Json,
    Csv,
    Xlsx,
}

impl SinkKind {
    /// Maps a configured format name to a file sink.
    pub fn for_format(requested: &str) -> Result<Self> {
        match requested.trim().to_lowercase().as_str() {
            "json" | "structured" => Ok(SinkKind::Json),
            "csv" | "tabular" => Ok(SinkKind::Csv),
            "excel" | "xlsx" => Ok(SinkKind::Xlsx),
            _ => Err(ExtractError::UnsupportedFormat(requested.to_string()).into()),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SinkKind::Json => "json",
            SinkKind::Csv => "csv",
            SinkKind::Xlsx => "xlsx",
        }
    }

    pub fn default_file_name(self) -> String {
        format!("{DEFAULT_STEM}.{}", self.extension())
    }
}

/// Writes `output` under `dir` with the writer for `sink`, creating the
/// directory when needed.
pub fn write_output(
    dir: &Path,
    file_name: &str,
    sink: SinkKind,
    output: &FormattedResult,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    match (sink, output) {
        (SinkKind::Json, FormattedResult::Structured(result)) => {
            fs::write(&path, serde_json::to_string_pretty(result)?)?
        }
        (SinkKind::Json, FormattedResult::Tabular(table)) => {
            fs::write(&path, serde_json::to_string_pretty(table)?)?
        }
        (SinkKind::Csv, output) => fs::write(&path, render_csv(&tabular(output)))?,
        (SinkKind::Xlsx, output) => write_xlsx(&path, &tabular(output))?,
    }
    info!(path = %path.display(), records = output.record_count(), "data saved");
    Ok(path)
}

fn tabular(output: &FormattedResult) -> Cow<'_, Table> {
    match output {
        FormattedResult::Tabular(table) => Cow::Borrowed(table),
        FormattedResult::Structured(result) => Cow::Owned(Table::from_result(result)),
    }
}

/// One worksheet: the header on row 0, then one row per record.
pub fn write_xlsx(path: &Path, table: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = std::iter::once(&table.columns);
    for (row, cells) in header.chain(table.rows.iter()).enumerate() {
        let row = u32::try_from(row).map_err(|_| AppError::SheetTooLarge)?;
        for (col, cell) in cells.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| AppError::SheetTooLarge)?;
            sheet.write_string(row, col, cell.as_str())?;
        }
    }
    workbook.save(path)?;
    Ok(())
}

/// RFC 4180 text: header row, CRLF line endings, quoting only where required.
pub fn render_csv(table: &Table) -> String {
    if table.columns.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    push_row(&mut out, &table.columns);
    for row in &table.rows {
        push_row(&mut out, row);
    }
    out
}

fn push_row(out: &mut String, cells: &[String]) {
    for (index, cell) in cells.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape(cell));
    }
    out.push_str("\r\n");
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
