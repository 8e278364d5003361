//! # Loaded tables
//!
//! A [`SheetTable`] is the result of loading one sheet: a name, unique column
//! names and rectangular rows of [`CellValue`]s. Tables are immutable once built;
//! every transformation returns a new table.
pub mod column;
pub mod value;

use crate::table::column::ColumnKind;
use crate::table::value::CellValue;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("Duplicate column name '{0}'")]
    DuplicateColumnError(String),

    #[error("Row {row} has {actual} values but the table has {expected} columns")]
    RowWidthError { row: usize, expected: usize, actual: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SheetTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// Per-table scorecard: row and column counts plus filled and blank cell counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
    pub filled_cells: usize,
    pub blank_cells: usize,
}

impl SheetTable {
    /// Builds a table, rejecting duplicate column names and rows of the wrong width.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<SheetTable, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(duplicate) = columns.iter().find(|column| !seen.insert(column.as_str())) {
            return Err(TableError::DuplicateColumnError(duplicate.to_owned()));
        }
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, values)| values.len() != columns.len()) {
            return Err(TableError::RowWidthError {
                row,
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(SheetTable { name: name.into(), columns, rows })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of the named column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        self.column_index(name).map(|index| self.column_values(index).collect())
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn summary(&self) -> TableSummary {
        let cells = self.rows.len() * self.columns.len();
        let filled_cells = self
            .rows
            .iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .count();
        TableSummary {
            rows: self.rows.len(),
            columns: self.columns.len(),
            filled_cells,
            blank_cells: cells - filled_cells,
        }
    }

    pub fn column_kinds(&self) -> Vec<(&str, ColumnKind)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), ColumnKind::detect(self.column_values(index))))
            .collect()
    }

    /// Keeps the columns whose flag is set, preserving order.
    pub(crate) fn retain_columns(self, keep: &[bool]) -> SheetTable {
        let is_kept = |index: usize| keep.get(index).copied().unwrap_or(false);
        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .filter_map(|(index, column)| is_kept(index).then_some(column))
            .collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .filter_map(|(index, value)| is_kept(index).then_some(value))
                    .collect()
            })
            .collect();
        SheetTable { name: self.name, columns, rows }
    }
}
