//! ZIP archive helpers for Open XML (.xlsx) workbooks

use crate::error::WellSheetError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets an archive entry by name, ignoring case and a leading slash
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, WellSheetError>;

    /// Opens an archive entry as an XML event stream
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, WellSheetError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, WellSheetError> {
        let pattern = name.replace('\\', "/");
        let pattern = pattern.trim_start_matches('/');
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name.trim_start_matches('/')))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, WellSheetError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}
