use crate::error::ResultOptionChain;
use crate::error::WellSheetError;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::CompoundFile;
use crate::match_biff8_record;
use crate::spreadsheet::cell::number_to_value;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::excel::resolve_number_formats;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::value::CellValue;
use either::Either;
use std::collections::HashMap;
use thiserror::Error;

// BIFF8 record type identifiers
const FORMULA: u16 = 6;        // Formula with its cached result
const EOF: u16 = 10;           // End of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // Workbook is encrypted
const CODE_PAGE: u16 = 66;     // Encoding of compressed strings
const BOUND_SHEET8: u16 = 133; // Sheet name, type and substream position
const MUL_RK: u16 = 189;       // Run of RK numbers in one row
const XF: u16 = 224;           // Extended format (links a cell to its number format)
const SST: u16 = 252;          // Shared string table
const LABEL_SST: u16 = 253;    // Cell referencing the shared string table
const NUMBER: u16 = 515;       // Double-precision cell value
const LABEL: u16 = 516;        // Inline string cell value
const BOOL_ERR: u16 = 517;     // Boolean or error cell value
const ARRAY: u16 = 545;        // Array formula body following a FORMULA record
const STRING: u16 = 519;       // String result of the preceding FORMULA record
const RK: u16 = 638;           // Compressed number cell value
const SHARED_FORMULA: u16 = 1212; // Shared formula body following a FORMULA record
const FORMAT: u16 = 1054;      // Custom number format definition
const BOF: u16 = 2057;         // Beginning of a substream

const UTF_16_CODE_PAGE: u16 = 1200;
const WORKSHEET: u8 = 0;

/// Error types specific to XLS file parsing
#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),

    #[error("Shared string index '{0}' out of range")]
    SharedStringIndexError(usize),

    #[error("No worksheet substream at offset {0}")]
    SubstreamError(usize),
}

/// A cell as decoded from its record: final, or a number still to be resolved
/// through the XF's number format.
type RawCell = Either<CellValue, (usize, f64)>;

/// A BIFF8 workbook read from an in-memory upload
pub(crate) struct XlsSpreadsheet {
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Number format per XF index
    number_formats: Vec<NumberFormat>,
    date_system: DateSystem,
    /// Worksheets as (name, substream offset) in workbook order
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Parses the container and the workbook globals substream
    pub(crate) fn open(data: &[u8]) -> Result<XlsSpreadsheet, WellSheetError> {
        let cfb = CompoundFile::parse(data)?;
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?;
        }
        let mut reader = cfb
            .stream("Workbook")
            .ok_none_else(|| cfb.stream("Book"))?
            .map(Biff8Reader::new)
            .ok_or(SpreadsheetError::SpreadsheetEmptyError)?;

        let mut date_system = DateSystem::Epoch1900;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<u16, NumberFormat> = HashMap::new();
        let mut format_ids: Vec<u16> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?,
            DATE1904 if reader.read_u16()? == 1 => date_system = DateSystem::Epoch1904,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                if code_page != UTF_16_CODE_PAGE {
                    reader.narrow_encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
                }
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id, NumberFormat::parse_custom_number_format(&format));
            }
            XF => {
                reader.skip(2)?;
                format_ids.push(reader.read_u16()?);
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let _visibility = reader.read_u8()?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError)?
        }

        Ok(XlsSpreadsheet {
            reader,
            shared_strings,
            number_formats: resolve_number_formats(&format_ids, &custom_formats),
            date_system,
            sheets,
        })
    }

    fn resolve(&self, cell: RawCell) -> CellValue {
        match cell {
            Either::Left(value) => value,
            Either::Right((xf, number)) => {
                let format = self.number_formats.get(xf).copied().unwrap_or_default();
                number_to_value(number, format, self.date_system)
            }
        }
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_grid(&mut self, sheet_name: &str) -> Result<Grid, WellSheetError> {
        let pointer = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, pointer)| *pointer)
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(sheet_name.to_owned()))?;
        self.reader.goto(pointer);
        if self.reader.next()? != Some(BOF) {
            Err(XlsError::SubstreamError(pointer))?;
        }

        let mut grid = GridBuilder::default();
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.last_u16()? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let xf = self.reader.read_u16()? as usize;
                        let number = self.reader.read_rk_number()?;
                        let value = self.resolve(Either::Right((xf, number)));
                        grid.push(row, col, value);
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let cell = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader, &self.shared_strings)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let value = self.resolve(cell);
                    grid.push(row, col, value);
                }
                _ => (),
            }
        }
        Ok(grid.finish())
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, WellSheetError> {
    reader.skip(4)?;
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::with_capacity(count.min(65_536));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<RawCell, WellSheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    Ok(Either::Left(if is_error {
        CellValue::Error(to_error_value(value).to_owned())
    } else {
        CellValue::Bool(value != 0)
    }))
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<RawCell, WellSheetError> {
    let xf = reader.read_u16()? as usize;
    Ok(Either::Right((xf, reader.read_f64()?)))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<RawCell, WellSheetError> {
    let xf = reader.read_u16()? as usize;
    Ok(Either::Right((xf, reader.read_rk_number()?)))
}

fn read_label_sst_cell(reader: &mut Biff8Reader, shared_strings: &[String]) -> Result<RawCell, WellSheetError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    let text = shared_strings
        .get(index)
        .ok_or(XlsError::SharedStringIndexError(index))?;
    Ok(Either::Left(CellValue::text(text.as_str())))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<RawCell, WellSheetError> {
    reader.skip(2)?;
    Ok(Either::Left(CellValue::text(reader.read_xl_unicode_string()?)))
}

/// Reads the cached result of a formula.
///
/// String results live in the STRING record that follows, possibly after the
/// shared or array formula body.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<RawCell, WellSheetError> {
    let xf = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF_0000_0000_0000) != 0xFFFF_0000_0000_0000;
    if is_number {
        return Ok(Either::Right((xf, f64::from_bits(formula))));
    }
    match formula & 0xFF {
        0 => {
            while let Some(kind) = reader.next()? {
                match kind {
                    STRING => return Ok(Either::Left(CellValue::text(reader.read_xl_unicode_string()?))),
                    SHARED_FORMULA | ARRAY => continue,
                    _ => break,
                }
            }
            Err(XlsError::FormulaValueError(formula))?
        }
        1 => Ok(Either::Left(CellValue::Bool((formula >> 16) & 0xFF != 0))),
        2 => Ok(Either::Left(CellValue::Error(to_error_value(((formula >> 16) & 0xFF) as u8).to_owned()))),
        3 => Ok(Either::Left(CellValue::Empty)),
        _ => Err(XlsError::FormulaValueError(formula))?,
    }
}
