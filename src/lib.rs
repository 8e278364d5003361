//! # Well Sheet
//!
//! Ingestion of oil-well job-log spreadsheets uploaded through a dashboard.
//! Title blocks and notes above the real column names are skipped by taking
//! the first sufficiently filled row of each sheet as its header.
//!
//! ## Features
//!
//! - **Formats**: CSV, Open XML workbooks (`.xlsx`, `.xlsm`) and legacy Excel (`.xls`)
//! - **Header detection**: the first row with at least three non-empty cells
//!   (configurable) becomes the header; sheets without one are reported, not failed
//! - **Column cleanup**: columns empty in every data row are dropped, unnamed and
//!   repeated header cells get unique names
//! - **Typed cells**: numbers, booleans, error literals and date-formatted numbers
//!   are kept as typed values
//! - **Validation**: required job-log columns are checked and missing ones reported
//! - **Export**: CSV and JSON downloads of a loaded table
//! - **Session**: per-user settings, current table and error log without globals
//!
//! ## Example
//!
//! ```no_run
//! use well_sheet::{Loader, UploadedFile};
//!
//! let bytes = std::fs::read("jobs.xlsx").unwrap();
//! let outcome = Loader::default().load(&UploadedFile::new("jobs.xlsx", &bytes)).unwrap();
//! for (sheet, table) in &outcome.tables {
//!     println!("{sheet}: {} rows, columns {:?}", table.row_count(), table.columns());
//! }
//! ```
pub mod error;
pub mod export;
mod helpers;
pub mod loader;
pub mod session;
pub mod spreadsheet;
pub mod table;
pub mod validation;

pub use crate::error::ParseError;
pub use crate::error::WellSheetError;
pub use crate::export::export;
pub use crate::export::Export;
pub use crate::export::ExportFormat;
pub use crate::loader::detect_header;
pub use crate::loader::drop_empty_columns;
pub use crate::loader::row_density;
pub use crate::loader::HeaderDetection;
pub use crate::loader::LoadOptions;
pub use crate::loader::LoadOutcome;
pub use crate::loader::Loader;
pub use crate::loader::UploadedFile;
pub use crate::session::SessionContext;
pub use crate::spreadsheet::grid::Grid;
pub use crate::spreadsheet::FileKind;
pub use crate::table::column::ColumnKind;
pub use crate::table::value::CellValue;
pub use crate::table::SheetTable;
pub use crate::table::TableSummary;
pub use crate::validation::RequiredColumns;
pub use crate::validation::ValidationWarning;
