//! OLE Compound File Binary (CFB) reader for legacy Excel (.xls) uploads
//! and for detecting encrypted Open XML packages, which are wrapped in the same container.

use crate::error::WellSheetError;
use crate::helpers::bytes::u16_at;
use crate::helpers::bytes::u64_at;
use crate::helpers::bytes::usize_at;
use crate::helpers::bytes::usize_iter;
use encoding_rs::UTF_16LE;
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const MAX_REG_SECT: usize = 0xFFFF_FFFA;
const MINI_SECTOR_SIZE: usize = 64;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const ROOT_ENTRY: &str = "root entry";

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Broken sector chain starting at sector {0}")]
    SectorChainError(usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Returns whether the bytes start with the compound file signature.
pub(crate) fn is_compound_file(data: &[u8]) -> bool {
    u64_at(data, 0) == Some(SIGNATURE)
}

/// A parsed compound file borrowing the uploaded bytes.
///
/// Stream names are matched case-insensitively, as the container format requires.
pub(crate) struct CompoundFile<'a> {
    entries: HashMap<String, Entry>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors<'a>,
    mini_file_allocation_table: Vec<usize>,
    mini_sectors: Sectors<'a>,
    mini_stream_cutoff: usize,
}

impl<'a> CompoundFile<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<CompoundFile<'a>, WellSheetError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let header = Header::new(data)?;
        let size = header.sector_size()?;
        let sectors = Sectors { data: Cow::Borrowed(data), size, base: size.max(HEADER_SIZE) };
        let file_allocation_table = load_file_allocation_table(data, &sectors, &header)?;
        let entries = load_entries(&file_allocation_table, &sectors, header.directory_start)?;

        let mini_file_allocation_table = if header.mini_file_allocation_table_count > 0 {
            let bytes = read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_start)?;
            usize_iter(&bytes).collect()
        } else {
            Vec::new()
        };
        let mini_stream = match entries.get(ROOT_ENTRY) {
            Some(root) if root.size > 0 => {
                let mut bytes = read_chain(&file_allocation_table, &sectors, root.start)?;
                bytes.truncate(root.size);
                bytes
            }
            _ => Vec::new(),
        };

        Ok(CompoundFile {
            entries,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors: Sectors { data: Cow::Owned(mini_stream), size: MINI_SECTOR_SIZE, base: 0 },
            mini_stream_cutoff: header.mini_stream_cutoff,
        })
    }

    /// Checks whether a stream or storage with this name exists
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Reads a whole stream, `None` when the name is absent
    pub(crate) fn stream(&self, name: &str) -> Result<Option<Vec<u8>>, WellSheetError> {
        let Some(entry) = self.entries.get(&name.to_lowercase()) else {
            return Ok(None);
        };
        let mut bytes = if entry.size < self.mini_stream_cutoff {
            read_chain(&self.mini_file_allocation_table, &self.mini_sectors, entry.start)?
        } else {
            read_chain(&self.file_allocation_table, &self.sectors, entry.start)?
        };
        if bytes.len() < entry.size {
            Err(CfbError::SectorChainError(entry.start))?;
        }
        bytes.truncate(entry.size);
        Ok(Some(bytes))
    }
}

/// Fixed-size sectors laid out after an optional header region
struct Sectors<'a> {
    data: Cow<'a, [u8]>,
    size: usize,
    base: usize,
}

impl Sectors<'_> {
    fn get(&self, index: usize) -> Option<&[u8]> {
        let lower = index.checked_mul(self.size)?.checked_add(self.base)?;
        if lower >= self.data.len() {
            return None;
        }
        let upper = self.data.len().min(lower + self.size);
        Some(&self.data[lower..upper])
    }
}

/// Follows a sector chain until a terminator; a chain longer than its table is a loop.
fn read_chain(table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, WellSheetError> {
    let mut content: Vec<u8> = Vec::new();
    let mut index = start;
    let mut steps = 0usize;
    while index <= MAX_REG_SECT {
        if steps > table.len() {
            Err(CfbError::SectorChainError(start))?;
        }
        let sector = sectors.get(index).ok_or(CfbError::SectorChainError(start))?;
        content.extend_from_slice(sector);
        index = *table.get(index).ok_or(CfbError::SectorChainError(start))?;
        steps += 1;
    }
    Ok(content)
}

fn load_file_allocation_table(data: &[u8], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, WellSheetError> {
    let mut double_indirect: Vec<usize> = usize_iter(&data[76..HEADER_SIZE]).collect();

    let mut count = 0usize;
    let mut index = header.double_indirect_start;
    while index <= MAX_REG_SECT {
        if count >= header.double_indirect_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_count, count + 1))?;
        }
        let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
        double_indirect.extend(usize_iter(sector));
        // The last word of every DIFAT sector links to the next one.
        index = double_indirect.pop().ok_or(CfbError::FileFormatError)?;
        count += 1;
    }
    if count != header.double_indirect_count {
        Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_count, count))?
    }

    let mut file_allocation_table: Vec<usize> = Vec::new();
    let mut count = 0usize;
    for index in double_indirect.into_iter().filter(|index| *index <= MAX_REG_SECT) {
        let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
        file_allocation_table.extend(usize_iter(sector));
        count += 1;
    }
    if count != header.file_allocation_table_count {
        Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
    }
    Ok(file_allocation_table)
}

fn load_entries(file_allocation_table: &[usize], sectors: &Sectors, start: usize) -> Result<HashMap<String, Entry>, WellSheetError> {
    let bytes = read_chain(file_allocation_table, sectors, start)?;
    let entries: HashMap<String, Entry> = bytes
        .chunks_exact(DIRECTORY_ENTRY_SIZE)
        .filter_map(Entry::new)
        .collect();
    if !entries.contains_key(ROOT_ENTRY) {
        Err(CfbError::RootDirectoryError)?
    }
    Ok(entries)
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_start: usize,
    mini_stream_cutoff: usize,
    mini_file_allocation_table_start: usize,
    mini_file_allocation_table_count: usize,
    double_indirect_start: usize,
    double_indirect_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Header, WellSheetError> {
        if !is_compound_file(data) {
            Err(CfbError::OleSignatureError)?;
        }
        let word = |at: usize| usize_at(data, at).ok_or(CfbError::FileFormatError);
        Ok(Header {
            major_version: u16_at(data, 26).ok_or(CfbError::FileFormatError)?,
            sector_shift: u16_at(data, 30).ok_or(CfbError::FileFormatError)?,
            file_allocation_table_count: word(44)?,
            directory_start: word(48)?,
            mini_stream_cutoff: word(56)?,
            mini_file_allocation_table_start: word(60)?,
            mini_file_allocation_table_count: word(64)?,
            double_indirect_start: word(68)?,
            double_indirect_count: word(72)?,
        })
    }

    fn sector_size(&self) -> Result<usize, WellSheetError> {
        match (self.major_version, self.sector_shift) {
            (3, 9) => Ok(512),
            (4, 12) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift))?,
        }
    }
}

/// Location of one stream inside the container
#[derive(Debug)]
struct Entry {
    start: usize,
    size: usize,
}

impl Entry {
    /// Decodes a 128-byte directory entry, skipping unallocated slots
    fn new(bytes: &[u8]) -> Option<(String, Entry)> {
        if bytes[66] == 0 {
            return None;
        }
        let length = (u16_at(bytes, 64)? as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..length]);
        let name = name.trim_end_matches('\0').to_lowercase();
        let start = usize_at(bytes, 116)?;
        let size = usize::try_from(u64_at(bytes, 120)?).ok()?;
        Some((name, Entry { start, size }))
    }
}
