use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::MergedRange;

static EMPTY: CellValue = CellValue::Empty;

/// Rectangular grid of one worksheet as stored in the workbook.
///
/// Row 0 is Excel row 1 and column 0 is column `A`, leading blank rows and
/// columns included, so grid positions map straight back to Excel addresses.
#[derive(Clone, Debug, Default)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
    width: usize,
    merges: Vec<MergedRange>,
}

impl RawSheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Builds a sheet from literal rows, mostly for tests and legacy readers.
    pub fn from_rows(name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut sheet = Self { name: name.to_owned(), rows, width, merges: Vec::new() };
        sheet.trim();
        sheet
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn merges(&self) -> &[MergedRange] {
        &self.merges
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Stores a value, growing the grid as needed. Empty values do not grow it.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if value == CellValue::Empty {
            if let Some(cell) = self.rows.get_mut(row).and_then(|cells| cells.get_mut(col)) {
                *cell = CellValue::Empty;
            }
            return;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
        self.width = self.width.max(col + 1);
    }

    pub fn add_merge(&mut self, range: MergedRange) {
        self.merges.push(range);
    }

    /// Copies each merged range's top-left value into every cell of the range
    /// and forgets the ranges. A blank top-left value leaves the range untouched.
    pub fn unmerge(&mut self) {
        for range in std::mem::take(&mut self.merges) {
            let value = self.get(range.first_row, range.first_col).clone();
            if value == CellValue::Empty {
                continue;
            }
            for row in range.first_row..=range.last_row {
                for col in range.first_col..=range.last_col {
                    self.set(row, col, value.clone());
                }
            }
        }
    }

    /// Drops trailing rows that hold no value.
    fn trim(&mut self) {
        while self
            .rows
            .last()
            .map(|cells| cells.iter().all(|cell| *cell == CellValue::Empty))
            .unwrap_or(false)
        {
            self.rows.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_grows_grid_but_empty_values_do_not() {
        let mut sheet = RawSheet::new("Rambu");
        sheet.set(2, 3, CellValue::from("x"));
        sheet.set(9, 9, CellValue::Empty);
        assert_eq!(sheet.height(), 3);
        assert_eq!(sheet.width(), 4);
        assert_eq!(sheet.get(2, 3), &CellValue::from("x"));
        assert_eq!(sheet.get(100, 100), &CellValue::Empty);
    }

    #[test]
    fn unmerge_fills_every_cell_of_the_range() {
        let mut sheet = RawSheet::new("Sheet1");
        sheet.set(0, 0, CellValue::from("KOORDINAT"));
        sheet.add_merge(MergedRange { first_row: 0, first_col: 0, last_row: 1, last_col: 2 });
        sheet.add_merge(MergedRange { first_row: 4, first_col: 0, last_row: 5, last_col: 0 });
        sheet.unmerge();

        for row in 0..=1 {
            for col in 0..=2 {
                assert_eq!(sheet.get(row, col), &CellValue::from("KOORDINAT"));
            }
        }
        assert!(sheet.merges().is_empty());
        assert_eq!(sheet.height(), 2);
    }

    #[test]
    fn from_rows_trims_trailing_blank_rows() {
        let sheet = RawSheet::from_rows(
            "Sheet1",
            vec![vec![CellValue::from("a")], vec![CellValue::Empty, CellValue::Empty]],
        );
        assert_eq!(sheet.height(), 1);
        assert_eq!(sheet.width(), 2);
    }
}
