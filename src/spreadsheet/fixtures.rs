//! In-memory workbook builders for tests.
//!
//! Cells are written as plain strings: `""` leaves the cell out, text that parses
//! as a number becomes a number, and a few prefixes select other cell types:
//! `date:<serial>`, `bool:<0|1>`, `err:<literal>`, `inline:<text>` (xlsx inline
//! string or xls LABEL) and `formula:<text>` (xls string formula result).

use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FREE_SECT: u32 = 0xFFFF_FFFF;
const FAT_SECT: u32 = 0xFFFF_FFFD;
const SECTOR_SIZE: usize = 512;

pub(crate) type Rows<'a> = Vec<Vec<&'a str>>;

/// Builds an `.xlsx` package with the given sheets in order.
pub(crate) fn xlsx(sheets: &[(&str, Rows)]) -> Vec<u8> {
    let mut shared_strings: Vec<String> = Vec::new();
    let worksheets: Vec<(&str, String)> = sheets
        .iter()
        .map(|(name, rows)| (*name, worksheet_xml(rows, &mut shared_strings)))
        .collect();
    package(&worksheets, &shared_strings)
}

/// Builds a one-sheet `.xlsx` package from `(reference, cell)` pairs written
/// in the order given, numbers as values and anything else as inline text.
pub(crate) fn xlsx_cells(sheet: &str, cells: &[(&str, &str)]) -> Vec<u8> {
    let body: String = cells
        .iter()
        .map(|(reference, cell)| match cell.parse::<f64>() {
            Ok(_) => format!(r#"<c r="{reference}"><v>{cell}</v></c>"#),
            Err(_) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(cell)),
        })
        .collect();
    let worksheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row>{body}</row></sheetData></worksheet>"#
    );
    package(&[(sheet, worksheet)], &[])
}

fn package(sheets: &[(&str, String)], shared_strings: &[String]) -> Vec<u8> {
    let mut sheet_entries = String::new();
    let mut relationships = String::new();
    for (index, (name, _)) in sheets.iter().enumerate() {
        let id = index + 1;
        sheet_entries.push_str(&format!(r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        ));
    }
    relationships.push_str(
        r#"<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    );

    let mut parts: Vec<(String, String)> = vec![
        (
            "[Content_Types].xml".to_owned(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_owned(),
        ),
        (
            "xl/workbook.xml".to_owned(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr/><sheets>{sheet_entries}</sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_owned(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
            ),
        ),
        (
            "xl/styles.xml".to_owned(),
            r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#.to_owned(),
        ),
    ];
    let items: String = shared_strings
        .iter()
        .map(|text| format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape(text)))
        .collect();
    parts.push((
        "xl/sharedStrings.xml".to_owned(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{items}</sst>"#,
            shared_strings.len()
        ),
    ));
    for (index, (_, worksheet)) in sheets.iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", index + 1), worksheet.to_owned()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn worksheet_xml(rows: &Rows, shared_strings: &mut Vec<String>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, cells) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let reference = crate::spreadsheet::reference::index_to_reference(row, col);
            let body = if let Some(serial) = cell.strip_prefix("date:") {
                format!(r#" s="1"><v>{serial}</v>"#)
            } else if let Some(flag) = cell.strip_prefix("bool:") {
                format!(r#" t="b"><v>{flag}</v>"#)
            } else if let Some(literal) = cell.strip_prefix("err:") {
                format!(r#" t="e"><v>{}</v>"#, escape(literal))
            } else if let Some(text) = cell.strip_prefix("inline:") {
                format!(r#" t="inlineStr"><is><t xml:space="preserve">{}</t></is>"#, escape(text))
            } else if cell.parse::<f64>().is_ok() {
                format!(r#"><v>{cell}</v>"#)
            } else {
                let index = shared_strings.len();
                shared_strings.push((*cell).to_owned());
                format!(r#" t="s"><v>{index}</v>"#)
            };
            xml.push_str(&format!(r#"<c r="{reference}"{body}</c>"#));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Builds a BIFF8 `.xls` workbook inside a compound file.
pub(crate) fn xls(sheets: &[(&str, Rows)]) -> Vec<u8> {
    compound_file("Workbook", &xls_stream(sheets))
}

/// The `Workbook` stream of [`xls`], globals first, padded past the mini
/// stream cutoff so it can be edited and wrapped with [`compound_file`].
pub(crate) fn xls_stream(sheets: &[(&str, Rows)]) -> Vec<u8> {
    let mut shared_strings: Vec<String> = Vec::new();
    let substreams: Vec<Vec<u8>> = sheets
        .iter()
        .map(|(_, rows)| worksheet_records(rows, &mut shared_strings))
        .collect();

    let globals_length = globals_records(sheets, &shared_strings, &vec![0; sheets.len()]).len();
    let mut offsets = Vec::with_capacity(sheets.len());
    let mut offset = globals_length;
    for substream in &substreams {
        offsets.push(offset as u32);
        offset += substream.len();
    }

    let mut stream = globals_records(sheets, &shared_strings, &offsets);
    for substream in substreams {
        stream.extend(substream);
    }
    while stream.len() < 4096 {
        stream.extend(record(0x7FFF, &[0u8; 1024]));
    }
    stream
}

/// Offsets of every record of `kind` in a BIFF8 stream.
pub(crate) fn record_offsets(stream: &[u8], kind: u16) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset + 4 <= stream.len() {
        let tag = u16::from_le_bytes([stream[offset], stream[offset + 1]]);
        let size = u16::from_le_bytes([stream[offset + 2], stream[offset + 3]]) as usize;
        if tag == kind {
            offsets.push(offset);
        }
        offset += 4 + size;
    }
    offsets
}

pub(crate) fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 4);
    bytes.extend(kind.to_le_bytes());
    bytes.extend((payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}


fn globals_records(sheets: &[(&str, Rows)], shared_strings: &[String], offsets: &[u32]) -> Vec<u8> {
    let mut stream = record(0x0809, &bof(0x0005));
    stream.extend(record(0x0042, &1200u16.to_le_bytes()));
    stream.extend(record(0x0022, &0u16.to_le_bytes()));
    for index in 0..17u16 {
        let mut xf = vec![0u8; 20];
        let format = if index == 16 { 14u16 } else { 0 };
        xf[2..4].copy_from_slice(&format.to_le_bytes());
        stream.extend(record(0x00E0, &xf));
    }
    let mut sst = Vec::new();
    sst.extend((shared_strings.len() as u32).to_le_bytes());
    sst.extend((shared_strings.len() as u32).to_le_bytes());
    for text in shared_strings {
        sst.extend(wide_string(text));
    }
    stream.extend(record(0x00FC, &sst));
    for ((name, _), offset) in sheets.iter().zip(offsets) {
        let mut bound_sheet = Vec::new();
        bound_sheet.extend(offset.to_le_bytes());
        bound_sheet.extend([0u8, 0u8]);
        let units: Vec<u16> = name.encode_utf16().collect();
        bound_sheet.push(units.len() as u8);
        bound_sheet.push(0x01);
        bound_sheet.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
        stream.extend(record(0x0085, &bound_sheet));
    }
    stream.extend(record(0x000A, &[]));
    stream
}

fn worksheet_records(rows: &Rows, shared_strings: &mut Vec<String>) -> Vec<u8> {
    let mut stream = record(0x0809, &bof(0x0010));
    for (row, cells) in rows.iter().enumerate() {
        let row = row as u16;
        let mut col = 0usize;
        while col < cells.len() {
            let cell = cells[col];
            // Runs of small integers share one MULRK record.
            let run = cells[col..].iter().take_while(|cell| rk_integer(cell).is_some()).count();
            if run >= 2 {
                let mut payload = cell_prefix(row, col as u16);
                payload.truncate(4);
                for value in cells[col..col + run].iter().filter_map(|cell| rk_integer(cell)) {
                    payload.extend(15u16.to_le_bytes());
                    payload.extend(value.to_le_bytes());
                }
                payload.extend(((col + run - 1) as u16).to_le_bytes());
                stream.extend(record(0x00BD, &payload));
                col += run;
                continue;
            }

            let mut payload = cell_prefix(row, col as u16);
            let kind = if cell.is_empty() {
                None
            } else if let Some(serial) = cell.strip_prefix("date:") {
                set_xf(&mut payload, 16);
                payload.extend(serial.parse::<f64>().unwrap().to_le_bytes());
                Some(0x0203)
            } else if let Some(flag) = cell.strip_prefix("bool:") {
                payload.extend([flag.parse::<u8>().unwrap(), 0]);
                Some(0x0205)
            } else if let Some(literal) = cell.strip_prefix("err:") {
                let code = match literal {
                    "#DIV/0!" => 0x07,
                    "#N/A" => 0x2A,
                    _ => 0x0F,
                };
                payload.extend([code, 1]);
                Some(0x0205)
            } else if let Some(text) = cell.strip_prefix("inline:") {
                payload.extend(wide_string(text));
                Some(0x0204)
            } else if let Some(text) = cell.strip_prefix("formula:") {
                payload.extend([0x00, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
                payload.extend([0u8; 8]);
                stream.extend(record(0x0006, &payload));
                stream.extend(record(0x0207, &wide_string(text)));
                None
            } else if let Some(value) = rk_integer(cell) {
                payload.extend(value.to_le_bytes());
                Some(0x027E)
            } else if let Ok(number) = cell.parse::<f64>() {
                payload.extend(number.to_le_bytes());
                Some(0x0203)
            } else {
                let index = shared_strings.len() as u32;
                shared_strings.push(cell.to_owned());
                payload.extend(index.to_le_bytes());
                Some(0x00FD)
            };
            if let Some(kind) = kind {
                stream.extend(record(kind, &payload));
            }
            col += 1;
        }
    }
    stream.extend(record(0x000A, &[]));
    stream
}

fn rk_integer(cell: &str) -> Option<u32> {
    let value = cell.parse::<i32>().ok()?;
    (value.to_string() == cell && (-(1 << 29)..(1 << 29)).contains(&value)).then(|| ((value << 2) as u32) | 0x02)
}

fn cell_prefix(row: u16, col: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(row.to_le_bytes());
    payload.extend(col.to_le_bytes());
    payload.extend(15u16.to_le_bytes());
    payload
}

fn set_xf(payload: &mut [u8], xf: u16) {
    payload[4..6].copy_from_slice(&xf.to_le_bytes());
}

fn bof(kind: u16) -> [u8; 16] {
    let mut payload = [0u8; 16];
    payload[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    payload[2..4].copy_from_slice(&kind.to_le_bytes());
    payload
}

fn wide_string(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = Vec::new();
    bytes.extend((units.len() as u16).to_le_bytes());
    bytes.push(0x01);
    bytes.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
    bytes
}


/// Wraps one stream of at least 4096 bytes in a version 3 compound file.
///
/// Layout: header, FAT in sector 0, directory in sector 1, stream from sector 2.
pub(crate) fn compound_file(stream_name: &str, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() >= 4096, "stream must live in regular sectors");
    let stream_sectors = payload.len().div_ceil(SECTOR_SIZE);
    assert!(stream_sectors + 2 <= SECTOR_SIZE / 4, "stream too large for a single FAT sector");

    let mut header = vec![0u8; SECTOR_SIZE];
    header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[76..80].copy_from_slice(&0u32.to_le_bytes());
    for slot in header[80..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE_SECT.to_le_bytes());
    }

    let mut fat = vec![FREE_SECT; SECTOR_SIZE / 4];
    fat[0] = FAT_SECT;
    fat[1] = END_OF_CHAIN;
    for sector in 2..2 + stream_sectors {
        fat[sector] = if sector == 1 + stream_sectors { END_OF_CHAIN } else { sector as u32 + 1 };
    }

    let mut directory = vec![0u8; SECTOR_SIZE];
    directory[..128].copy_from_slice(&directory_entry("Root Entry", 5, 1, END_OF_CHAIN, 0));
    directory[128..256].copy_from_slice(&directory_entry(stream_name, 2, FREE_SECT, 2, payload.len() as u64));

    let mut data = header;
    data.extend(fat.iter().flat_map(|entry| entry.to_le_bytes()));
    data.extend(directory);
    data.extend_from_slice(payload);
    data.resize(SECTOR_SIZE * (3 + stream_sectors), 0);
    data
}

fn directory_entry(name: &str, kind: u8, child: u32, start: u32, size: u64) -> [u8; 128] {
    let mut entry = [0u8; 128];
    let units: Vec<u16> = name.encode_utf16().collect();
    for (index, unit) in units.iter().enumerate() {
        entry[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    entry[64..66].copy_from_slice(&(((units.len() + 1) * 2) as u16).to_le_bytes());
    entry[66] = kind;
    entry[67] = 1;
    entry[68..72].copy_from_slice(&FREE_SECT.to_le_bytes());
    entry[72..76].copy_from_slice(&FREE_SECT.to_le_bytes());
    entry[76..80].copy_from_slice(&child.to_le_bytes());
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..128].copy_from_slice(&size.to_le_bytes());
    entry
}
