//! Pieces shared by the Open XML and BIFF8 workbook readers
use crate::error::WellSheetError;
use crate::helpers::cfb::is_compound_file;
use crate::helpers::cfb::CompoundFile;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Maps relationship ids to worksheet part paths; other relationship types are skipped.
pub(super) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, WellSheetError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let is_worksheet = event
                .get_attribute_value("Type")?
                .map(|kind| kind.ends_with("/worksheet"))
                .unwrap_or(true);
            let id = event.get_attribute_value("Id")?;
            let target = event.get_attribute_value("Target")?;
            if let Some((id, target)) = id.zip(target).filter(|_| is_worksheet) {
                relationships.insert(id.to_string(), to_zip_path(&target));
            }
        }
    });
    Ok(relationships)
}

/// Resolves each XF's format id through the custom formats, then the built-in table.
pub(super) fn resolve_number_formats(format_ids: &[u16], custom_formats: &HashMap<u16, NumberFormat>) -> Vec<NumberFormat> {
    format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberFormat::parse_builtin_number_format_id(*id))
                .unwrap_or_default()
        })
        .collect()
}

/// Normalizes a relationship target to an archive path under `xl/`.
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Office wraps password-protected workbooks in a compound file holding an `EncryptedPackage` stream.
pub(super) fn is_password_protected(data: &[u8]) -> bool {
    is_compound_file(data)
        && CompoundFile::parse(data)
            .map(|file| file.exists("EncryptedPackage"))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::excel::*;
    use crate::spreadsheet::fixtures;

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn number_formats_prefer_custom_definitions() {
        let custom = HashMap::from([(164u16, NumberFormat::Time), (14u16, NumberFormat::General)]);
        assert_eq!(
            resolve_number_formats(&[0, 14, 22, 164, 165], &custom),
            vec![
                NumberFormat::General,
                NumberFormat::General,
                NumberFormat::DateTime,
                NumberFormat::Time,
                NumberFormat::General,
            ]
        );
    }

    #[test]
    fn encrypted_package_is_detected() {
        assert!(is_password_protected(&fixtures::compound_file("EncryptedPackage", &[0u8; 4096])));
        assert!(!is_password_protected(&fixtures::compound_file("Workbook", &[0u8; 4096])));
        assert!(!is_password_protected(b"PK\x03\x04"));
    }
}
