use thiserror::Error;

/// Main error type for the job-log loader.
/// Aggregates errors from the standard library, third-party decoders and internal modules.
#[derive(Error, Debug)]
pub enum WellSheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),

    #[error("{0}")]
    TextFileError(#[from] crate::spreadsheet::csv::CsvError),

    // Table module errors
    #[error("{0}")]
    TableError(#[from] crate::table::TableError),
}

/// An upload that could not be decoded.
///
/// This is the only error the loader hands back to callers. The message is the
/// rendered chain of the underlying [`WellSheetError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse '{file_name}': {message}")]
pub struct ParseError {
    pub file_name: String,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(file_name: &str, error: WellSheetError) -> ParseError {
        ParseError {
            file_name: file_name.to_owned(),
            message: error.to_string(),
        }
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, WellSheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| WellSheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
