use crate::table::value::CellValue;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

/// Value kind inferred for a whole column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Boolean,
    Integer,
    Number,
    Date,
    Time,
    DateTime,
    Text,
}

impl ColumnKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Boolean => "boolean",
            ColumnKind::Integer => "integer",
            ColumnKind::Number => "number",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Text => "text",
        }
    }

    /// Kind of a single value; missing cells carry no kind.
    pub(crate) fn from(value: &CellValue) -> Option<ColumnKind> {
        match value {
            CellValue::Empty => None,
            CellValue::Bool(_) => Some(ColumnKind::Boolean),
            CellValue::Int(_) => Some(ColumnKind::Integer),
            CellValue::Float(_) => Some(ColumnKind::Number),
            CellValue::Date(_) => Some(ColumnKind::Date),
            CellValue::Time(_) => Some(ColumnKind::Time),
            CellValue::DateTime(_) => Some(ColumnKind::DateTime),
            CellValue::Text(_) | CellValue::Error(_) => Some(ColumnKind::Text),
        }
    }

    /// Most specific kind shared by every value; text when they disagree or none exist.
    pub(crate) fn detect<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnKind {
        let kinds: Vec<ColumnKind> = values.into_iter().filter_map(ColumnKind::from).collect();
        if kinds.is_empty() {
            ColumnKind::Text
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Boolean) {
            ColumnKind::Boolean
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Integer) {
            ColumnKind::Integer
        } else if kinds.iter().all(|kind| kind.is_numeric()) {
            ColumnKind::Number
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Date) {
            ColumnKind::Date
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Time) {
            ColumnKind::Time
        } else if kinds.iter().all(|kind| kind.is_temporal()) {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Number)
    }

    #[inline]
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnKind::Date | ColumnKind::Time | ColumnKind::DateTime)
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
