//! # Upload loader
//!
//! Turns one uploaded file into named tables. Text files are read as a single
//! table headed by their first record. Workbooks are read sheet by sheet: the
//! first row holding at least [`LoadOptions::min_header_density`] non-empty
//! cells becomes the header, rows above it are discarded, and every later row
//! is data. Sheets without such a row produce no table. Both paths finish by
//! dropping the columns that are empty in every data row.
use crate::error::ParseError;
use crate::error::ResultMessage;
use crate::error::WellSheetError;
use crate::spreadsheet::csv::read_csv;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::FileKind;
use crate::spreadsheet::SpreadsheetError;
use crate::table::value::CellValue;
use crate::table::SheetTable;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Raw bytes of an upload together with the file name it was declared with.
#[derive(Copy, Clone, Debug)]
pub struct UploadedFile<'a> {
    name: &'a str,
    bytes: &'a [u8],
}

impl<'a> UploadedFile<'a> {
    pub fn new(name: &'a str, bytes: &'a [u8]) -> UploadedFile<'a> {
        UploadedFile { name, bytes }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Loader settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Non-empty cells a workbook row needs to be taken as the header
    pub min_header_density: usize,
    pub csv_delimiter: u8,
    /// Name given to the single table of a text upload
    pub csv_table_name: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            min_header_density: 3,
            csv_delimiter: b',',
            csv_table_name: "CSV File".to_owned(),
        }
    }
}

/// Where a sheet's header row is, as an absolute 0-based row index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderDetection {
    Found(usize),
    NotFound,
}

/// Tables of one upload, in sheet order, plus the sheets without a header row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadOutcome {
    pub tables: Vec<(String, SheetTable)>,
    pub undetected_sheets: Vec<String>,
}

impl LoadOutcome {
    pub fn table(&self, name: &str) -> Option<&SheetTable> {
        self.tables
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, table)| table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Loader {
    options: LoadOptions,
}

impl Loader {
    pub fn new(options: LoadOptions) -> Loader {
        Loader { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Runs the whole pipeline on one upload.
    ///
    /// Any decoding failure is reported once as a [`ParseError`]; a sheet
    /// without a header row is not a failure.
    pub fn load(&self, file: &UploadedFile) -> Result<LoadOutcome, ParseError> {
        let outcome = match FileKind::from_file_name(file.name()) {
            Some(FileKind::Csv) => self.load_csv(file),
            Some(_) => self.load_workbook(file),
            None => Err(SpreadsheetError::UnsupportedFileFormatError(file.name().to_owned()).into()),
        }
        .map_err(|error| ParseError::new(file.name(), error))?;

        info!(
            file = file.name(),
            tables = outcome.tables.len(),
            undetected = outcome.undetected_sheets.len(),
            "Loaded upload"
        );
        Ok(outcome)
    }

    fn load_csv(&self, file: &UploadedFile) -> Result<LoadOutcome, WellSheetError> {
        let document = read_csv(file.bytes(), self.options.csv_delimiter)?;
        let name = self.options.csv_table_name.to_owned();
        let table = SheetTable::new(name.as_str(), column_names(&document.header), document.rows)?;
        debug!(file = file.name(), rows = table.row_count(), columns = table.column_count(), "Read text file");
        Ok(LoadOutcome {
            tables: vec![(name, drop_empty_columns(table))],
            undetected_sheets: Vec::new(),
        })
    }

    fn load_workbook(&self, file: &UploadedFile) -> Result<LoadOutcome, WellSheetError> {
        let mut spreadsheet = open_spreadsheet(file)?;
        let mut outcome = LoadOutcome::default();
        for sheet_name in spreadsheet.sheet_names() {
            let grid = spreadsheet
                .read_grid(&sheet_name)
                .with_prefix(&format!("Sheet '{sheet_name}'"))?;
            debug!(sheet = %sheet_name, dimension = grid.dimension().as_deref().unwrap_or(""), "Read sheet");

            match detect_header(&grid, self.options.min_header_density) {
                HeaderDetection::Found(header_row) => {
                    debug!(sheet = %sheet_name, header_row, "Detected header row");
                    let table = to_table(&sheet_name, grid, header_row)?;
                    outcome.tables.push((sheet_name, drop_empty_columns(table)));
                }
                HeaderDetection::NotFound => {
                    warn!(
                        sheet = %sheet_name,
                        min_header_density = self.options.min_header_density,
                        "No header row found"
                    );
                    outcome.undetected_sheets.push(sheet_name);
                }
            }
        }
        Ok(outcome)
    }
}

/// Number of non-empty cells in a row.
pub fn row_density(row: &[CellValue]) -> usize {
    row.iter().filter(|value| !value.is_empty()).count()
}

/// Finds the first row with at least `min_density` non-empty cells.
pub fn detect_header(grid: &Grid, min_density: usize) -> HeaderDetection {
    grid.rows()
        .iter()
        .position(|row| row_density(row) >= min_density)
        .map(HeaderDetection::Found)
        .unwrap_or(HeaderDetection::NotFound)
}

/// Removes every column that is empty in all rows.
///
/// A table without rows loses all of its columns.
pub fn drop_empty_columns(table: SheetTable) -> SheetTable {
    let keep: Vec<bool> = (0..table.column_count())
        .map(|index| table.column_values(index).any(|value| !value.is_empty()))
        .collect();
    table.retain_columns(&keep)
}

/// Builds the table below `header_row`, keeping only columns with data.
///
/// Rows are ragged, so the empty columns are filtered out before any row is
/// padded to the sheet width.
fn to_table(sheet_name: &str, grid: Grid, header_row: usize) -> Result<SheetTable, WellSheetError> {
    let width = grid.width();
    let mut rows = grid.into_rows().into_iter().skip(header_row);
    let mut header = rows.next().unwrap_or_default();
    header.resize(width, CellValue::Empty);
    let rows: Vec<Vec<CellValue>> = rows.collect();

    let mut keep = vec![false; width];
    for row in &rows {
        for (index, value) in row.iter().enumerate() {
            if !value.is_empty() {
                keep[index] = true;
            }
        }
    }
    let kept: Vec<usize> = (0..width).filter(|index| keep[*index]).collect();
    let names = column_names(&header);
    let columns = kept.iter().map(|index| names[*index].to_owned()).collect();
    let rows = rows
        .into_iter()
        .map(|row| kept.iter().map(|index| row.get(*index).cloned().unwrap_or_default()).collect())
        .collect();
    Ok(SheetTable::new(sheet_name, columns, rows)?)
}

/// Stringifies header cells into unique column names.
///
/// An empty cell at position `i` is named `Unnamed: i`; repeats of a name get
/// `.1`, `.2`, ... appended, skipping suffixes already taken.
fn column_names(header: &[CellValue]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let mut name = match value {
                CellValue::Empty => format!("Unnamed: {index}"),
                value => value.to_string(),
            };
            let mut count = counts.get(&name).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(name.to_owned(), count + 1);
                name = format!("{name}.{count}");
                count = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.to_owned(), 1);
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::loader::*;
    use crate::spreadsheet::fixtures;

    fn texts(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|value| CellValue::text(*value)).collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn general_sheet_header_below_title() {
        let data = fixtures::xlsx(&[(
            "General",
            vec![vec!["Report", "", ""], vec!["Customer", "Ticket", "Status"], vec!["Acme", "T-1", "Open"]],
        )]);
        let outcome = Loader::default().load(&UploadedFile::new("jobs.xlsx", &data)).unwrap();
        assert!(outcome.undetected_sheets.is_empty());
        let table = outcome.table("General").unwrap();
        assert_eq!(table.columns(), strings(&["Customer", "Ticket", "Status"]).as_slice());
        assert_eq!(table.rows(), &[texts(&["Acme", "T-1", "Open"])]);
    }

    #[test]
    fn sparse_sheet_is_undetected() {
        let data = fixtures::xlsx(&[
            ("Notes", vec![vec!["Report", "Q1"], vec!["Prepared by"], vec!["", "Ops", "Team"]]),
            ("Jobs", vec![vec!["Well", "Depth", "Status"], vec!["Alpha-1", "1200", "Open"]]),
        ]);
        let outcome = Loader::default().load(&UploadedFile::new("mixed.xlsx", &data)).unwrap();
        assert_eq!(outcome.undetected_sheets, vec!["Notes".to_owned()]);
        assert_eq!(outcome.tables.len(), 1);
        assert_eq!(outcome.tables[0].0, "Jobs");
        assert_eq!(
            outcome.tables[0].1.rows(),
            &[vec![CellValue::text("Alpha-1"), CellValue::Int(1200), CellValue::text("Open")]]
        );
    }

    #[test]
    fn header_is_first_dense_row() {
        let grid = Grid::new(vec![
            vec![],
            texts(&["a", "", "b"]),
            texts(&["a", "b", "c"]),
            texts(&["a", "b", "c", "d"]),
        ]);
        assert_eq!(detect_header(&grid, 3), HeaderDetection::Found(2));
        assert_eq!(detect_header(&grid, 2), HeaderDetection::Found(1));
        assert_eq!(detect_header(&grid, 5), HeaderDetection::NotFound);
        assert_eq!(detect_header(&Grid::default(), 3), HeaderDetection::NotFound);
    }

    #[test]
    fn density_counts_errors_and_whitespace() {
        let row = vec![
            CellValue::Empty,
            CellValue::Error("#DIV/0!".to_owned()),
            CellValue::text(" "),
            CellValue::Int(0),
        ];
        assert_eq!(row_density(&row), 3);
    }

    #[test]
    fn text_file_keeps_header_verbatim() {
        let data = b"Customer Name,Zip Code,Status\nAcme,00501,Open\nGlobex,10001,Closed\n";
        let outcome = Loader::default().load(&UploadedFile::new("JOBS.CSV", data)).unwrap();
        let table = outcome.table("CSV File").unwrap();
        assert_eq!(table.columns(), strings(&["Customer Name", "Zip Code", "Status"]).as_slice());
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], vec![CellValue::text("Acme"), CellValue::text("00501"), CellValue::text("Open")]);
        assert_eq!(table.rows()[1][1], CellValue::Int(10001));
    }

    #[test]
    fn empty_columns_are_dropped_once() {
        let data = b"a,b,c,d\n1,,3,\n,,4,\n";
        let outcome = Loader::default().load(&UploadedFile::new("jobs.csv", data)).unwrap();
        let table = outcome.table("CSV File").unwrap().clone();
        assert_eq!(table.columns(), strings(&["a", "c"]).as_slice());
        assert_eq!(drop_empty_columns(table.clone()), table);
    }

    #[test]
    fn header_only_sheet_has_no_columns() {
        let data = fixtures::xlsx(&[("Jobs", vec![vec!["", ""], vec!["Well", "Depth", "Status"]])]);
        let outcome = Loader::default().load(&UploadedFile::new("jobs.xlsx", &data)).unwrap();
        let table = outcome.table("Jobs").unwrap();
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn unnamed_and_repeated_columns() {
        let header = vec![
            CellValue::text("Well"),
            CellValue::Empty,
            CellValue::text("Well"),
            CellValue::text("Well.1"),
            CellValue::Int(2024),
        ];
        assert_eq!(column_names(&header), strings(&["Well", "Unnamed: 1", "Well.1", "Well.1.1", "2024"]));
    }

    #[test]
    fn legacy_workbook() {
        let data = fixtures::xls(&[
            ("Cover", vec![vec!["Job log"]]),
            ("Runs", vec![vec!["Run", "Depth", "Date", ""], vec!["1", "1500", "date:45306", ""]]),
        ]);
        let outcome = Loader::default().load(&UploadedFile::new("runs.xls", &data)).unwrap();
        assert_eq!(outcome.undetected_sheets, vec!["Cover".to_owned()]);
        let table = outcome.table("Runs").unwrap();
        assert_eq!(table.columns(), strings(&["Run", "Depth", "Date"]).as_slice());
        assert_eq!(table.rows()[0][1], CellValue::Int(1500));
    }

    #[test]
    fn custom_options() {
        let options = LoadOptions {
            min_header_density: 2,
            csv_delimiter: b';',
            csv_table_name: "Upload".to_owned(),
        };
        let loader = Loader::new(options);
        let outcome = loader.load(&UploadedFile::new("jobs.csv", b"Well;Depth\nA;1\n")).unwrap();
        assert_eq!(outcome.tables[0].0, "Upload");

        let data = fixtures::xlsx(&[("Notes", vec![vec!["Report", "Q1"], vec!["a", "b"]])]);
        let outcome = loader.load(&UploadedFile::new("notes.xlsx", &data)).unwrap();
        assert_eq!(outcome.table("Notes").unwrap().columns(), strings(&["Report", "Q1"]).as_slice());
    }

    #[test]
    fn options_from_partial_json() {
        let options: LoadOptions = serde_json::from_str(r#"{"min_header_density": 4}"#).unwrap();
        assert_eq!(options.min_header_density, 4);
        assert_eq!(options.csv_table_name, "CSV File");
    }

    #[test]
    fn far_cells_keep_their_column_position() {
        let data = fixtures::xlsx_cells(
            "Jobs",
            &[("A1", "Well"), ("B1", "Depth"), ("C1", "Status"), ("A2", "Alpha-1"), ("XFD2", "42")],
        );
        let outcome = Loader::default().load(&UploadedFile::new("jobs.xlsx", &data)).unwrap();
        let table = outcome.table("Jobs").unwrap();
        assert_eq!(table.columns(), strings(&["Well", "Unnamed: 16383"]).as_slice());
        assert_eq!(table.rows(), &[vec![CellValue::text("Alpha-1"), CellValue::Int(42)]]);
    }

    #[test]
    fn lone_corner_cell_is_undetected() {
        let data = fixtures::xlsx_cells("Corner", &[("XFD1048576", "1")]);
        let outcome = Loader::default().load(&UploadedFile::new("corner.xlsx", &data)).unwrap();
        assert!(outcome.tables.is_empty());
        assert_eq!(outcome.undetected_sheets, vec!["Corner".to_owned()]);
    }

    #[test]
    fn out_of_range_reference_is_a_parse_error() {
        let data = fixtures::xlsx_cells("Jobs", &[("A1", "Well"), ("B1", "Depth"), ("C1", "Status"), ("A900000000000", "1")]);
        let error = Loader::default().load(&UploadedFile::new("jobs.xlsx", &data)).unwrap_err();
        assert_eq!(error.file_name, "jobs.xlsx");
        assert!(error.message.contains("Invalid cell value at 'Jobs'!A900000000000"), "{}", error.message);
    }

    #[test]
    fn decoding_failures_are_parse_errors() {
        let error = Loader::default().load(&UploadedFile::new("jobs.ods", b"PK")).unwrap_err();
        assert_eq!(error.file_name, "jobs.ods");
        assert_eq!(error.message, "Unsupported file format 'jobs.ods'");

        let error = Loader::default().load(&UploadedFile::new("jobs.xlsx", b"not a zip")).unwrap_err();
        assert_eq!(error.file_name, "jobs.xlsx");

        let error = Loader::default().load(&UploadedFile::new("jobs.csv", b"a,b\n1,2,3\n")).unwrap_err();
        assert_eq!(error.message, "Expected 2 fields in line 2, saw 3");
    }
}
