use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;

/// One cell of a loaded sheet.
///
/// Only [`CellValue::Empty`] counts as missing. Error literals such as `#DIV/0!`
/// and whitespace-only text are ordinary values.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Spreadsheet error literal, e.g. `#N/A`
    Error(String),
}

impl CellValue {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text cell; the empty string is a missing value.
    pub fn text(value: impl Into<String>) -> CellValue {
        let value = value.into();
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// Numeric cell; integral values within `i64` range become [`CellValue::Int`].
    pub fn number(value: f64) -> CellValue {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            CellValue::Int(value as i64)
        } else {
            CellValue::Float(value)
        }
    }

    /// Classifies a delimited-text field.
    ///
    /// A field is numeric only when its text is exactly how that number prints,
    /// so printing a parsed table gives back the original fields.
    pub fn parse_field(field: &str) -> CellValue {
        if field.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(value) = field.parse::<i64>() {
            if value.to_string() == field {
                return CellValue::Int(value);
            }
        }
        if let Ok(value) = field.parse::<f64>() {
            if value.is_finite() && value.to_string() == field {
                return CellValue::Float(value);
            }
        }
        CellValue::Text(field.to_owned())
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Int(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Text(value) | CellValue::Error(value) => f.write_str(value),
            CellValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            CellValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
            CellValue::Time(value) => write!(f, "{}", value.format("%H:%M:%S%.f")),
        }
    }
}

/// JSON scalars for numbers and booleans, `null` for missing cells and ISO 8601
/// strings for dates and times.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Bool(value) => serializer.serialize_bool(*value),
            CellValue::Int(value) => serializer.serialize_i64(*value),
            CellValue::Float(value) => serializer.serialize_f64(*value),
            CellValue::Text(value) | CellValue::Error(value) => serializer.serialize_str(value),
            CellValue::Date(value) => serializer.collect_str(&value.format("%Y-%m-%d")),
            CellValue::DateTime(value) => serializer.collect_str(&value.format("%Y-%m-%dT%H:%M:%S%.f")),
            CellValue::Time(value) => serializer.collect_str(&value.format("%H:%M:%S%.f")),
        }
    }
}
