//! A1-style cell references.

/// Converts a column letter sequence (`A`, `Z`, `AA`) to a 0-based index.
pub(crate) fn col_to_index(col: &str) -> Option<usize> {
    if col.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for character in col.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// Converts a 1-based row number to a 0-based index.
pub(crate) fn row_to_index(row: &str) -> Option<usize> {
    row.parse::<usize>().ok().filter(|row| *row > 0).map(|row| row - 1)
}

/// Converts a 0-based column index to its letter sequence.
pub fn index_to_col(col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parses `B3` (optionally `$B$3`) to 0-based `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|character: char| character.is_ascii_digit())?;
    let (col, row) = reference.split_at(split);
    Some((row_to_index(row)?, col_to_index(col)?))
}

pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// Inclusive rectangle of merged cells, 0-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MergedRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergedRange {
    /// Parses `A1:C2`; a single reference yields a one-cell range.
    pub(crate) fn parse(range: &str) -> Option<MergedRange> {
        let (first, last) = range.split_once(':').unwrap_or((range, range));
        let (first_row, first_col) = reference_to_index(first)?;
        let (last_row, last_col) = reference_to_index(last)?;
        Some(MergedRange {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_round_trip_at_boundaries() {
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("Z"), Some(25));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("XFD"), Some(16383));
        assert_eq!(index_to_col(0), "A");
        assert_eq!(index_to_col(27), "AB");
        assert_eq!(index_to_col(16383), "XFD");
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn references() {
        assert_eq!(reference_to_index("B3"), Some((2, 1)));
        assert_eq!(reference_to_index("$AA$10"), Some((9, 26)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(index_to_reference(5, 2), "C6");
    }

    #[test]
    fn merged_range_is_normalized() {
        let range = MergedRange::parse("C4:A1").unwrap();
        assert_eq!(range, MergedRange { first_row: 0, first_col: 0, last_row: 3, last_col: 2 });
        assert_eq!(MergedRange::parse("B2").unwrap().last_col, 1);
        assert!(MergedRange::parse("nonsense").is_none());
    }
}
