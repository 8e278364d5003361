//! Downloads of a loaded table as CSV or JSON
use crate::error::WellSheetError;
use crate::table::value::CellValue;
use crate::table::SheetTable;
use csv::WriterBuilder;
use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// A rendered download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders a table; `stem` is the download name without extension.
pub fn export(table: &SheetTable, format: ExportFormat, stem: &str) -> Result<Export, WellSheetError> {
    let bytes = match format {
        ExportFormat::Csv => to_csv(table)?,
        ExportFormat::Json => to_json(table)?,
    };
    Ok(Export {
        file_name: format!("{stem}.{}", format.extension()),
        mime_type: format.mime_type(),
        bytes,
    })
}

fn to_csv(table: &SheetTable) -> Result<Vec<u8>, WellSheetError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(CellValue::to_string))?;
    }
    Ok(writer.into_inner().map_err(|error| error.into_error())?)
}

fn to_json(table: &SheetTable) -> Result<Vec<u8>, WellSheetError> {
    let records: Vec<Record> = table
        .rows()
        .iter()
        .map(|values| Record { columns: table.columns(), values })
        .collect();
    Ok(serde_json::to_vec(&records)?)
}

/// One row as a JSON object, keys in column order.
struct Record<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
