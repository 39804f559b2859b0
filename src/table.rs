//! Lightweight tabular values passed between providers and notebooklets.
//!
//! Query providers return [`Table`] instances; notebooklets slice, join and
//! aggregate them, then hang them off result objects. Cells are
//! `serde_json::Value` so heterogeneous provider output needs no schema up
//! front. An empty table is the normal "no rows matched" case and is never
//! an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row. Short rows are padded with nulls; long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn get_str(&self, row: usize, column: &str) -> Option<&str> {
        self.get(row, column).and_then(Value::as_str)
    }

    pub fn get_f64(&self, row: usize, column: &str) -> Option<f64> {
        let value = self.get(row, column)?;
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// All values of one column, in row order
    pub fn column_values(&self, column: &str) -> Vec<Value> {
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .map(|r| r.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Distinct non-null string values of one column, in first-seen order
    pub fn distinct_str(&self, column: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for value in self.column_values(column) {
            if let Some(s) = value.as_str()
                && !seen.iter().any(|v| v == s)
            {
                seen.push(s.to_string());
            }
        }
        seen
    }

    /// Rows whose `column` cell equals `value` (string comparison)
    pub fn filter_eq(&self, column: &str, value: &str) -> Table {
        let mut out = Table::new(self.columns.clone());
        if let Some(idx) = self.column_index(column) {
            for row in &self.rows {
                if row.get(idx).and_then(Value::as_str) == Some(value) {
                    out.rows.push(row.clone());
                }
            }
        }
        out
    }

    /// Project onto the named columns, skipping names this table lacks
    pub fn select(&self, columns: &[&str]) -> Table {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        let mut out = Table::new(
            indices
                .iter()
                .map(|&i| self.columns[i].clone())
                .collect::<Vec<_>>(),
        );
        for row in &self.rows {
            out.rows
                .push(indices.iter().map(|&i| row[i].clone()).collect());
        }
        out
    }

    /// Sort rows by a numeric column. Non-numeric cells sort last.
    pub fn sort_by_f64(&mut self, column: &str, descending: bool) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        let key = |row: &Vec<Value>| -> f64 {
            row.get(idx)
                .and_then(Value::as_f64)
                .unwrap_or(f64::NEG_INFINITY)
        };
        self.rows.sort_by(|a, b| {
            let ord = key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal);
            if descending { ord.reverse() } else { ord }
        });
    }

    /// Append a column. `values` shorter than the row count pads with nulls.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.columns.push(name.into());
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.push(values.get(i).cloned().unwrap_or(Value::Null));
        }
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Count rows grouped by the string values of `column`
    pub fn group_count(&self, column: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for value in self.column_values(column) {
            if let Some(s) = value.as_str() {
                *counts.entry(s.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Read a table from CSV text. The first record supplies column names;
    /// numeric-looking cells are stored as numbers.
    pub fn from_csv(text: &str) -> Result<Table> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = Table::new(columns);
        for record in reader.records() {
            let record = record?;
            let row = record.iter().map(parse_cell).collect();
            table.push_row(row);
        }
        Ok(table)
    }

    /// Read a table from a CSV file on disk
    pub fn from_csv_path(path: impl AsRef<std::path::Path>) -> Result<Table> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::CasekitError::Provider {
            message: format!("failed to read CSV fixture: {}", e),
        })?;
        Self::from_csv(&text)
    }
}

fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(trimmed.to_string())
}
