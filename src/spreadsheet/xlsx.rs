use crate::error::WellSheetError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::iso_to_value;
use crate::spreadsheet::cell::number_to_value;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::excel;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::is_within_sheet;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::value::CellValue;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use zip::ZipArchive;

const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";
const TAG_TEXT: &[u8] = b"t";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

/// How the `t` attribute says a cell's text should be read
#[derive(Copy, Clone, Debug, PartialEq)]
enum CellKind {
    Number(NumberFormat),
    SharedString,
    InlineString,
    Boolean,
    IsoDate,
    Error,
}

/// An Open XML workbook read from an in-memory upload
pub(crate) struct XlsxSpreadsheet<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    /// Number format per cell style index (`s` attribute)
    number_formats: Vec<NumberFormat>,
    date_system: DateSystem,
    shared_strings: Vec<String>,
    /// Worksheets as (name, archive path) in workbook order
    sheets: Vec<(String, String)>,
}

impl<'a> XlsxSpreadsheet<'a> {
    pub(crate) fn open(data: &'a [u8]) -> Result<XlsxSpreadsheet<'a>, WellSheetError> {
        if excel::is_password_protected(data) {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError)?;
        }
        let mut zip = ZipArchive::new(Cursor::new(data))?;
        let (sheets, date_system) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError)?;
        }
        let number_formats = load_number_formats(&mut zip)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(XlsxSpreadsheet {
            zip,
            number_formats,
            date_system,
            shared_strings,
            sheets,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet<'_> {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_grid(&mut self, sheet_name: &str) -> Result<Grid, WellSheetError> {
        let XlsxSpreadsheet { zip, number_formats, date_system, shared_strings, sheets } = self;
        let path = sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(sheet_name.to_owned()))?;
        let mut reader = zip
            .xml_reader(&path)?
            .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;

        let mut grid = GridBuilder::default();
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut position = (0usize, 0usize);
        let mut kind = CellKind::Number(NumberFormat::General);
        let mut value: Option<String> = None;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                if let Some(row) = event.parse_attribute_value::<usize>("r")? {
                    row_count = row.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => row_count = row_count.saturating_add(1),
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                let reference = event.get_attribute_value("r")?;
                position = match reference.as_deref() {
                    Some(reference) => reference_to_index(reference),
                    None => Some((row_count, col_count)),
                }
                .filter(|(row, col)| is_within_sheet(*row, *col))
                .ok_or_else(|| {
                    let reference = reference
                        .as_deref()
                        .map(str::to_owned)
                        .unwrap_or_else(|| index_to_reference(row_count, col_count));
                    SpreadsheetError::CellValueError(sheet_name.to_owned(), reference)
                })?;
                col_count = position.1 + 1;
                value = None;
                kind = match event.get_attribute_value("t")?.as_deref() {
                    Some("s") => CellKind::SharedString,
                    Some("inlineStr") | Some("str") => CellKind::InlineString,
                    Some("b") => CellKind::Boolean,
                    Some("d") => CellKind::IsoDate,
                    Some("e") => CellKind::Error,
                    _ => {
                        let style = event.parse_attribute_value::<usize>("s")?.unwrap_or(0);
                        CellKind::Number(number_formats.get(style).copied().unwrap_or_default())
                    }
                };
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
                value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                if let Some(text) = value.take().filter(|text| !text.is_empty()) {
                    let (row, col) = position;
                    let cell = to_cell_value(kind, text, shared_strings, *date_system)
                        .ok_or_else(|| SpreadsheetError::CellValueError(sheet_name.to_owned(), index_to_reference(row, col)))?;
                    grid.push(row, col, cell);
                }
            }
        });
        Ok(grid.finish())
    }
}

fn to_cell_value(kind: CellKind, text: String, shared_strings: &[String], date_system: DateSystem) -> Option<CellValue> {
    let value = match kind {
        CellKind::SharedString => CellValue::text(shared_strings.get(text.trim().parse::<usize>().ok()?)?.as_str()),
        CellKind::InlineString => CellValue::text(text),
        CellKind::Boolean => CellValue::Bool(matches!(text.trim(), "1" | "true" | "TRUE")),
        CellKind::IsoDate => iso_to_value(&text),
        CellKind::Error => CellValue::Error(text),
        CellKind::Number(format) => number_to_value(text.trim().parse::<f64>().ok()?, format, date_system),
    };
    Some(value)
}

/// Reads worksheet names and paths in workbook order, plus the date system flag
fn load_workbook(zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<(Vec<(String, String)>, DateSystem), WellSheetError> {
    let relationships = excel::load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut date_system = DateSystem::Epoch1900;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?),
                    b"id" => id = Some(attribute.get_value()?),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.into_owned(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            let is_1904 = event
                .get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
            if is_1904 {
                date_system = DateSystem::Epoch1904;
            }
        }
    });
    Ok((sheets, date_system))
}

/// Number format per `cellXfs` entry, from `xl/styles.xml`
fn load_number_formats(zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<NumberFormat>, WellSheetError> {
    let Some(mut reader) = zip.xml_reader("xl/styles.xml")? else {
        return Ok(Vec::new());
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u16, NumberFormat>::new();
    let mut format_indexes_context = false;
    let mut format_ids = Vec::<u16>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u16>("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, NumberFormat::parse_custom_number_format(&format));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            format_ids.push(event.parse_attribute_value::<u16>("numFmtId")?.unwrap_or(0));
        }
    });
    Ok(excel::resolve_number_formats(&format_ids, &custom_formats))
}

fn load_shared_strings(zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<String>, WellSheetError> {
    let Some(mut reader) = zip.xml_reader("xl/sharedStrings.xml")? else {
        return Ok(Vec::new());
    };
    let mut shared_strings = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text of an element up to `end_tag`, concatenating rich-text
/// runs and skipping phonetic (`rPh`) annotations.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: &[u8], is_text_content: bool) -> Result<String, WellSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
