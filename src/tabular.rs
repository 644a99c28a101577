//! Tabular Output Parser
//!
//! Turns delimited client output (tab-separated by default) into rows keyed
//! by the header line. Engine-agnostic: MySQL `--batch` and unaligned `psql`
//! both fit.

use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::engine::error::ActionError;

/// One data row, in column order; `None` marks a field the row didn't have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, Option<String>)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether the row has a (possibly null) field named `column`
    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularResult {
    /// The "no results" shape: no columns and no rows
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Vec<Option<&str>> {
        self.rows.iter().map(|r| r.get(name)).collect()
    }
}

/// Tab-separated, newline-terminated rows
pub fn parse_tsv(stdout: &str) -> Result<TabularResult, ActionError> {
    parse(stdout, '\t', '\n')
}

/// Parse delimited text whose first row is a header
///
/// - A header made of a single empty field yields zero columns and zero rows.
/// - Trailing empty rows are ignored; `\r` before a row delimiter is dropped.
/// - Short rows get `None` for their missing trailing fields.
/// - Rows with more fields than the header are reported as a parse error.
pub fn parse(
    stdout: &str,
    column_delimiter: char,
    row_delimiter: char,
) -> Result<TabularResult, ActionError> {
    let mut lines: Vec<&str> = stdout
        .split(row_delimiter)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let Some((header, data)) = lines.split_first() else {
        return Ok(TabularResult::default());
    };

    let columns: Vec<String> = header.split(column_delimiter).map(String::from).collect();
    if columns.len() == 1 && columns[0].is_empty() {
        return Ok(TabularResult::default());
    }

    let mut rows = Vec::with_capacity(data.len());
    for (idx, line) in data.iter().enumerate() {
        let values: Vec<&str> = line.split(column_delimiter).collect();
        if values.len() > columns.len() {
            return Err(ActionError::parse(format!(
                "row {} has {} fields but the header has {} columns",
                idx + 1,
                values.len(),
                columns.len()
            )));
        }
        let fields = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), values.get(i).map(|v| v.to_string())))
            .collect();
        rows.push(Row { fields });
    }

    Ok(TabularResult { columns, rows })
}

/// Parse a count for display; anything unparseable becomes 0
pub fn coerce_count(value: Option<&str>) -> u64 {
    coerce_or_default(value)
}

/// Parse `value`, falling back to `T::default()` on absence or garbage
pub fn coerce_or_default<T: FromStr + Default>(value: Option<&str>) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or_default()
}
