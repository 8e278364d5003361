//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Record reader for the Excel 97-2003 workbook stream.
//!
//! A logical record is its own payload plus every CONTINUE record that follows it.
//! Numeric reads and skips cross continuation boundaries transparently; string
//! character data re-reads the option byte that each continuation starts with.

use crate::error::WellSheetError;
use crate::helpers::bytes::u16_at;
use encoding_rs::Encoding;
use encoding_rs::WINDOWS_1252;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),

    #[error("Record at offset {0} runs past the end of the stream")]
    TruncatedRecordError(usize),
}

/// Reader for BIFF8 records with continuation handling
pub(crate) struct Biff8Reader {
    /// Encoding for compressed (8-bit) strings, taken from the CODEPAGE record
    pub(crate) narrow_encoding: &'static Encoding,
    stream: Vec<u8>,
    pointer: usize,
    chunks: Vec<(usize, usize)>,
    index: usize,
    cursor: usize,
}

impl Biff8Reader {
    pub(crate) fn new(stream: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            narrow_encoding: WINDOWS_1252,
            stream,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            cursor: 0,
        }
    }

    /// Moves to the next logical record and returns its type, `None` at end of stream
    pub(crate) fn next(&mut self) -> Result<Option<u16>, WellSheetError> {
        let Some((kind, lower, upper)) = self.record_at(self.pointer)? else {
            return Ok(None);
        };
        self.pointer = upper;
        self.chunks.clear();
        self.chunks.push((lower, upper));
        while let Some((CONTINUE, lower, upper)) = self.record_at(self.pointer)? {
            self.pointer = upper;
            self.chunks.push((lower, upper));
        }
        self.index = 0;
        self.cursor = lower;
        Ok(Some(kind))
    }

    /// Repositions the reader at an absolute stream offset (a substream BOF)
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    fn record_at(&self, pointer: usize) -> Result<Option<(u16, usize, usize)>, WellSheetError> {
        let (Some(kind), Some(size)) = (u16_at(&self.stream, pointer), u16_at(&self.stream, pointer + 2)) else {
            return Ok(None);
        };
        let lower = pointer + 4;
        let upper = lower + size as usize;
        if upper > self.stream.len() {
            Err(Biff8Error::TruncatedRecordError(pointer))?;
        }
        Ok(Some((kind, lower, upper)))
    }

    fn remaining_in_chunk(&self) -> usize {
        self.chunks
            .get(self.index)
            .map(|(_, upper)| upper - self.cursor)
            .unwrap_or(0)
    }

    fn advance_chunk(&mut self) -> bool {
        self.index += 1;
        match self.chunks.get(self.index) {
            Some((lower, _)) => {
                self.cursor = *lower;
                true
            }
            None => false,
        }
    }

    /// Takes up to `length` bytes without leaving the current chunk
    fn take(&mut self, length: usize) -> &[u8] {
        let available = self.remaining_in_chunk();
        let start = self.cursor;
        let end = start + length.min(available);
        self.cursor = end;
        &self.stream[start..end]
    }

    fn fill<const N: usize>(&mut self) -> Result<[u8; N], WellSheetError> {
        let mut buffer = [0u8; N];
        let mut filled = 0usize;
        while filled < N {
            if self.remaining_in_chunk() == 0 && !self.advance_chunk() {
                Err(Biff8Error::NoEnoughDataError(N))?;
            }
            let bytes = self.take(N - filled);
            let size = bytes.len();
            buffer[filled..filled + size].copy_from_slice(bytes);
            filled += size;
        }
        Ok(buffer)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), WellSheetError> {
        let mut remaining = length;
        while remaining > 0 {
            if self.remaining_in_chunk() == 0 && !self.advance_chunk() {
                Err(Biff8Error::NoEnoughDataError(length))?;
            }
            remaining -= self.take(remaining).len();
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, WellSheetError> {
        Ok(self.fill::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, WellSheetError> {
        self.fill().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, WellSheetError> {
        self.fill().map(u32::from_le_bytes)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, WellSheetError> {
        Ok(self.read_u32()? as usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, WellSheetError> {
        self.fill().map(u64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, WellSheetError> {
        self.fill().map(f64::from_le_bytes)
    }

    /// Reads the trailing `u16` of the current record (MULRK keeps its last column there)
    pub(crate) fn last_u16(&self) -> Result<u16, WellSheetError> {
        match self.chunks.last() {
            Some((lower, upper)) if upper - lower >= 2 => {
                Ok(u16_at(&self.stream, upper - 2).ok_or(Biff8Error::NoEnoughDataError(2))?)
            }
            _ => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    /// Reads an RK number (compressed integer or truncated double, optionally divided by 100)
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, WellSheetError> {
        Ok(decode_rk_number(self.read_u32()?))
    }

    /// Reads a string with a 1-byte character count
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, WellSheetError> {
        let chars = self.read_u8()? as usize;
        self.read_plain_string(chars)
    }

    /// Reads a string with a 2-byte character count
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, WellSheetError> {
        let chars = self.read_u16()? as usize;
        self.read_plain_string(chars)
    }

    /// Reads a shared-string-table entry, discarding rich-text runs and phonetic data
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, WellSheetError> {
        let chars = self.read_u16()? as usize;
        let flag = self.read_u8()?;
        let rich_string_count = if flag & 0x08 != 0 { self.read_u16()? as usize } else { 0 };
        let phonetic_size = if flag & 0x04 != 0 { self.read_usize()? } else { 0 };
        let mut string = String::with_capacity(chars);
        self.read_characters(chars, flag & 0x01 != 0, &mut string)?;
        self.skip(4 * rich_string_count)?;
        self.skip(phonetic_size)?;
        Ok(string)
    }

    fn read_plain_string(&mut self, chars: usize) -> Result<String, WellSheetError> {
        let flag = self.read_u8()?;
        let mut string = String::with_capacity(chars);
        self.read_characters(chars, flag & 0x01 != 0, &mut string)?;
        Ok(string)
    }

    fn read_characters(&mut self, chars: usize, high_byte: bool, content: &mut String) -> Result<(), WellSheetError> {
        let narrow_encoding = self.narrow_encoding;
        let mut high_byte = high_byte;
        let mut remaining = chars;
        loop {
            let width = if high_byte { 2 } else { 1 };
            let count = remaining.min(self.remaining_in_chunk() / width);
            let bytes = self.take(count * width);
            let (decoded, _) = if high_byte {
                encoding_rs::UTF_16LE.decode_without_bom_handling(bytes)
            } else {
                narrow_encoding.decode_without_bom_handling(bytes)
            };
            content.push_str(&decoded);
            remaining -= count;
            if remaining == 0 {
                return Ok(());
            }
            if !self.advance_chunk() {
                Err(Biff8Error::NoEnoughDataError(remaining * width))?;
            }
            high_byte = self.read_u8()? & 0x01 != 0;
        }
    }
}

pub(crate) fn decode_rk_number(value: u32) -> f64 {
    let is_percentage = value & 0x01 != 0;
    let is_integer = value & 0x02 != 0;
    let number = if is_integer {
        ((value as i32) >> 2) as f64
    } else {
        f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
    };
    if is_percentage {
        number / 100.0
    } else {
        number
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
