//! Required-column checks for loaded tables
use crate::table::SheetTable;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::LazyLock;

/// Columns of the job-log upload form
const JOB_LOG_COLUMNS: [&str; 10] = [
    "Customer Name",
    "State",
    "Zip Code",
    "Supervisor Name",
    "Well Name",
    "Date",
    "Materials Used",
    "Tools Used",
    "Observations",
    "Status",
];

static WHITESPACE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));

/// Trimmed, inner whitespace collapsed to one space, ASCII lowercase
fn normalize(name: &str) -> String {
    WHITESPACE_PATTERN.replace_all(name.trim(), " ").to_ascii_lowercase()
}

/// A declared list of column names a table is expected to carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredColumns {
    names: Vec<String>,
}

/// Required columns missing from one table. Loading goes on regardless.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub table: String,
    pub missing: Vec<String>,
}

impl Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is missing required columns: {}", self.table, self.missing.join(", "))
    }
}

impl RequiredColumns {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> RequiredColumns {
        RequiredColumns {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn job_log() -> RequiredColumns {
        RequiredColumns::new(JOB_LOG_COLUMNS)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Lists the required names the table lacks, in declared order.
    ///
    /// Names match after trimming, collapsing inner whitespace and ignoring ASCII case.
    pub fn check(&self, table: &SheetTable) -> Option<ValidationWarning> {
        let present: HashSet<String> = table.columns().iter().map(|column| normalize(column.as_str())).collect();
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|name| !present.contains(&normalize(name.as_str())))
            .cloned()
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(ValidationWarning {
                table: table.name().to_owned(),
                missing,
            })
        }
    }
}
