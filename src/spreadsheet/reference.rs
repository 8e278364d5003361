//! A1-style cell references.

/// Rows in an Open XML worksheet
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns in an Open XML worksheet (`A` to `XFD`)
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Whether a 0-based position lies inside the largest sheet Excel can hold.
pub(crate) fn is_within_sheet(row: usize, col: usize) -> bool {
    row < MAX_ROWS && col < MAX_COLUMNS
}

/// Converts `"B12"` (or `"$B$12"`) into 0-based `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim();
    let split = reference
        .char_indices()
        .find(|(_, character)| character.is_ascii_digit())
        .map(|(index, _)| index)?;
    let (letters, digits) = reference.split_at(split);
    let col = col_to_index(letters.trim_end_matches('$').trim_start_matches('$'))?;
    let row = row_to_index(digits)?;
    Some((row, col))
}

/// Converts 0-based `(row, col)` into an A1 reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row as u128 + 1)
}

/// Column letters to 0-based index: `A` is 0, `Z` is 25, `AA` is 26.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0usize, |index, character| {
        character
            .is_ascii_alphabetic()
            .then(|| index * 26 + (character.to_ascii_uppercase() as usize - 'A' as usize + 1))
    })
    .map(|index| index - 1)
}

/// 1-based row digits to 0-based index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok()?.checked_sub(1)
}

fn index_to_col(col: usize) -> String {
    let mut letters = Vec::new();
    let mut rest = col + 1;
    while rest > 0 {
        let remainder = (rest - 1) % 26;
        letters.push(b'A' + remainder as u8);
        rest = (rest - 1) / 26;
    }
    letters.iter().rev().map(|byte| *byte as char).collect()
}
