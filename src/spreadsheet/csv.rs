use crate::error::WellSheetError;
use crate::table::value::CellValue;
use csv::ReaderBuilder;
use csv::StringRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("Unsupported text encoding, expected UTF-8")]
    UnsupportedEncodingError,

    #[error("No columns to parse from file")]
    NoColumnsError,

    #[error("Expected {expected} fields in line {line}, saw {actual}")]
    FieldCountError { line: u64, expected: usize, actual: usize },
}

/// A delimited text file split into its header record and data records.
#[derive(Debug, PartialEq)]
pub(crate) struct CsvDocument {
    pub(crate) header: Vec<CellValue>,
    pub(crate) rows: Vec<Vec<CellValue>>,
}

/// Parses an upload with the first record as header.
///
/// Records shorter than the header are padded with empty cells; longer ones
/// are an error. Blank lines are skipped.
pub(crate) fn read_csv(data: &[u8], delimiter: u8) -> Result<CsvDocument, WellSheetError> {
    let (text, _, has_malformed_bytes) = encoding_rs::UTF_8.decode(data);
    if has_malformed_bytes {
        Err(CsvError::UnsupportedEncodingError)?
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut records = reader.records();
    let header: Vec<CellValue> = match records.next() {
        Some(record) => record?.iter().map(CellValue::text).collect(),
        None => Err(CsvError::NoColumnsError)?,
    };

    let mut rows = Vec::new();
    for record in records {
        rows.push(to_row(&record?, header.len())?);
    }
    Ok(CsvDocument { header, rows })
}

fn to_row(record: &StringRecord, width: usize) -> Result<Vec<CellValue>, CsvError> {
    if record.len() > width {
        return Err(CsvError::FieldCountError {
            line: record.position().map(|position| position.line()).unwrap_or_default(),
            expected: width,
            actual: record.len(),
        });
    }
    let mut row: Vec<CellValue> = record.iter().map(CellValue::parse_field).collect();
    row.resize(width, CellValue::Empty);
    Ok(row)
}
