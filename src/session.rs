//! # Session state
//!
//! [`SessionContext`] holds what one dashboard user works with between
//! requests: their settings, the tables of their last upload and
//! an append-only error log. It is owned by a single caller and never shared.
use crate::error::ParseError;
use crate::error::WellSheetError;
use crate::export::export;
use crate::export::Export;
use crate::export::ExportFormat;
use crate::loader::Loader;
use crate::loader::UploadedFile;
use crate::table::column::ColumnKind;
use crate::table::SheetTable;
use crate::table::TableSummary;
use crate::validation::RequiredColumns;
use crate::validation::ValidationWarning;
use chrono::Local;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;
use tracing::info;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
}

/// User preferences, keyed the way the settings form labels them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "Theme")]
    pub theme: Theme,
    #[serde(rename = "Language")]
    pub language: Language,
    #[serde(rename = "Notifications")]
    pub notifications: bool,
    #[serde(rename = "Auto-save")]
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            theme: Theme::Dark,
            language: Language::English,
            notifications: true,
            auto_save: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorStatus {
    Open,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    #[serde(rename = "Error ID")]
    pub id: String,
    #[serde(rename = "Type")]
    pub severity: Severity,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Status")]
    pub status: ErrorStatus,
}

/// What one loaded sheet looks like.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetReport {
    pub name: String,
    pub summary: TableSummary,
    pub column_kinds: Vec<(String, ColumnKind)>,
}

/// Result of a successful upload, shown to the user right after it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadReport {
    pub file_name: String,
    pub sheets: Vec<SheetReport>,
    pub undetected_sheets: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    settings: Settings,
    /// Stem of the last successfully loaded file name
    source: Option<String>,
    tables: Vec<(String, SheetTable)>,
    error_log: Vec<ErrorLogEntry>,
}

impl SessionContext {
    pub fn new() -> SessionContext {
        SessionContext::default()
    }

    /// Forgets everything, back to the state of [`SessionContext::new`].
    pub fn reset(&mut self) {
        *self = SessionContext::new();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn tables(&self) -> &[(String, SheetTable)] {
        &self.tables
    }

    /// First table of the last upload, `None` when it failed
    pub fn current_table(&self) -> Option<&SheetTable> {
        self.tables.first().map(|(_, table)| table)
    }

    pub fn current_fields(&self) -> &[String] {
        self.current_table().map(SheetTable::columns).unwrap_or_default()
    }

    pub fn error_log(&self) -> &[ErrorLogEntry] {
        &self.error_log
    }

    pub fn log_error(&mut self, entry: ErrorLogEntry) {
        self.error_log.push(entry);
    }

    /// Loads an upload and makes its tables the session's.
    ///
    /// The previous tables are dropped first, so after a failed upload nothing
    /// is current. The failure is recorded in the error log before the error
    /// is returned.
    pub fn upload(&mut self, loader: &Loader, file: &UploadedFile) -> Result<UploadReport, ParseError> {
        self.tables.clear();
        self.source = None;
        let outcome = match loader.load(file) {
            Ok(outcome) => outcome,
            Err(parse_error) => {
                let id = format!("ERR-UPLOAD-{}", self.error_log.len() + 1);
                error!(id = %id, file = file.name(), "{}", parse_error.message);
                self.log_error(ErrorLogEntry {
                    id,
                    severity: Severity::High,
                    message: parse_error.message.to_owned(),
                    date: Local::now().date_naive(),
                    status: ErrorStatus::Open,
                });
                return Err(parse_error);
            }
        };

        let required = RequiredColumns::job_log();
        let sheets = outcome
            .tables
            .iter()
            .map(|(name, table)| SheetReport {
                name: name.to_owned(),
                summary: table.summary(),
                column_kinds: table
                    .column_kinds()
                    .into_iter()
                    .map(|(column, kind)| (column.to_owned(), kind))
                    .collect(),
            })
            .collect();
        let warnings: Vec<ValidationWarning> = outcome
            .tables
            .iter()
            .filter_map(|(_, table)| required.check(table))
            .collect();
        for warning in &warnings {
            info!(table = %warning.table, missing = warning.missing.len(), "Required columns missing");
        }

        let file_name = file.name().to_owned();
        self.source = Some(match file_name.rsplit_once('.') {
            Some((stem, _)) => stem.to_owned(),
            None => file_name.to_owned(),
        });
        self.tables = outcome.tables;
        Ok(UploadReport {
            file_name,
            sheets,
            undetected_sheets: outcome.undetected_sheets,
            warnings,
        })
    }

    /// Renders the current table, `None` when nothing is loaded.
    pub fn export_current(&self, format: ExportFormat) -> Result<Option<Export>, WellSheetError> {
        let Some(table) = self.current_table() else {
            return Ok(None);
        };
        let stem = self.source.as_deref().unwrap_or(table.name());
        Ok(Some(export(table, format, stem)?))
    }
}
