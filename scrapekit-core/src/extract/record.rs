use std::slice;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Separator used when a multi-valued field is flattened into one cell.
pub const CELL_SEPARATOR: &str = "; ";

/// Value extracted for one field: a single string, or every match in DOM order.
///
/// A missing match is an empty string, never an absent key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn empty() -> Self {
        FieldValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::Text(_) => None,
            FieldValue::List(items) => Some(items),
        }
    }

    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::List(items) => items.join(CELL_SEPARATOR),
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }
}

/// Field name to value, in declaration order.
pub type Record = IndexMap<String, FieldValue>;

/// Output of one run: a single record, or records in visitation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Single(Record),
    Many(Vec<Record>),
}

impl ExtractionResult {
    pub fn records(&self) -> &[Record] {
        match self {
            ExtractionResult::Single(record) => slice::from_ref(record),
            ExtractionResult::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            ExtractionResult::Single(record) => vec![record],
            ExtractionResult::Many(records) => records,
        }
    }
}
