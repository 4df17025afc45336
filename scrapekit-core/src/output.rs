use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::extract::{ExtractError, ExtractResult, ExtractionResult, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Structured,
    Tabular,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutputFormat::Structured => "structured",
            OutputFormat::Tabular => "tabular",
        };
        f.write_str(label)
    }
}

impl FromStr for OutputFormat {
    type Err = ExtractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "json" | "structured" => Ok(OutputFormat::Structured),
            "csv" | "excel" | "xlsx" | "tabular" => Ok(OutputFormat::Tabular),
            _ => Err(ExtractError::UnsupportedFormat(value.to_string())),
        }
    }
}

/// Rows of string cells under a header; one row per record, in result order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_result(result: &ExtractionResult) -> Self {
        let records = result.records();
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for field in record.keys() {
                if !columns.iter().any(|column| column == field) {
                    columns.push(field.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).map(FieldValue::to_cell).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormattedResult {
    Structured(ExtractionResult),
    Tabular(Table),
}

impl FormattedResult {
    pub fn format(&self) -> OutputFormat {
        match self {
            FormattedResult::Structured(_) => OutputFormat::Structured,
            FormattedResult::Tabular(_) => OutputFormat::Tabular,
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            FormattedResult::Structured(result) => result.len(),
            FormattedResult::Tabular(table) => table.len(),
        }
    }
}

/// Shapes `result` for serialization. Structured output is the result itself.
pub fn format_result(
    result: ExtractionResult,
    format: OutputFormat,
) -> ExtractResult<FormattedResult> {
    Ok(match format {
        OutputFormat::Structured => FormattedResult::Structured(result),
        OutputFormat::Tabular => FormattedResult::Tabular(Table::from_result(&result)),
    })
}

/// Like [`format_result`], taking the format name as written in configuration.
pub fn format_requested(result: ExtractionResult, requested: &str) -> ExtractResult<FormattedResult> {
    format_result(result, requested.parse()?)
}
