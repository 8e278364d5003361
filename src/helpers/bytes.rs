//! Little-endian decoding over untrusted byte slices.
//! Every reader is bounds-checked and yields `None` past the end of the slice.

/// Reads a `u16` starting at `at`.
pub(crate) fn u16_at(bytes: &[u8], at: usize) -> Option<u16> {
    fixed::<2>(bytes, at).map(u16::from_le_bytes)
}

/// Reads a `u32` starting at `at`.
pub(crate) fn u32_at(bytes: &[u8], at: usize) -> Option<u32> {
    fixed::<4>(bytes, at).map(u32::from_le_bytes)
}

/// Reads a 32-bit sector or offset value as `usize`.
pub(crate) fn usize_at(bytes: &[u8], at: usize) -> Option<usize> {
    u32_at(bytes, at).and_then(|value| usize::try_from(value).ok())
}

/// Reads a `u64` starting at `at`.
pub(crate) fn u64_at(bytes: &[u8], at: usize) -> Option<u64> {
    fixed::<8>(bytes, at).map(u64::from_le_bytes)
}

/// Splits a slice into consecutive 32-bit values; a trailing partial word is ignored.
pub(crate) fn usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize)
}

fn fixed<const N: usize>(bytes: &[u8], at: usize) -> Option<[u8; N]> {
    bytes.get(at..at.checked_add(N)?)?.try_into().ok()
}
