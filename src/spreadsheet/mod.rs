//! # Spreadsheet readers
//!
//! Format readers that turn an uploaded workbook into raw, header-less
//! [`Grid`]s, one per worksheet. Open XML (`.xlsx`, `.xlsm`) is read from its
//! zip container, legacy Excel (`.xls`) from its compound file, and `.csv`
//! through the `csv` crate.
pub(crate) mod cell;
pub(crate) mod csv;
pub(crate) mod excel;
pub mod grid;
pub(crate) mod reference;
pub(crate) mod xls;
pub(crate) mod xlsx;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::error::WellSheetError;
use crate::loader::UploadedFile;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported file format '{0}'")]
    UnsupportedFileFormatError(String),

    #[error("Spreadsheet is password protected")]
    SpreadsheetPasswordProtectedError,

    #[error("Spreadsheet contains no worksheets")]
    SpreadsheetEmptyError,

    #[error("Missing '{0}' in spreadsheet")]
    FileError(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFoundError(String),

    #[error("Invalid cell value at '{0}'!{1}")]
    CellValueError(String, String),
}

/// Upload formats, chosen by file extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// Case-insensitive extension lookup; `None` for anything unsupported.
    pub fn from_file_name(file_name: &str) -> Option<FileKind> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xlsm" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            _ => None,
        }
    }
}

/// A workbook whose worksheets can be read as grids.
pub(crate) trait Spreadsheet {
    /// Worksheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    fn read_grid(&mut self, sheet_name: &str) -> Result<Grid, WellSheetError>;
}

/// Opens a workbook upload with the reader its extension selects.
pub(crate) fn open_spreadsheet<'a>(file: &UploadedFile<'a>) -> Result<Box<dyn Spreadsheet + 'a>, WellSheetError> {
    let spreadsheet: Box<dyn Spreadsheet + 'a> = match FileKind::from_file_name(file.name()) {
        Some(FileKind::Xlsx) => Box::new(XlsxSpreadsheet::open(file.bytes())?),
        Some(FileKind::Xls) => Box::new(XlsSpreadsheet::open(file.bytes())?),
        Some(FileKind::Csv) | None => Err(SpreadsheetError::UnsupportedFileFormatError(file.name().to_owned()))?,
    };
    Ok(spreadsheet)
}
