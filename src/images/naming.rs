//! Column classification and deterministic file names for extracted pictures.

use crate::helpers::path::sanitize_for_path;
use crate::images::registry::ImageCategory;
use crate::spreadsheet::reference::index_to_col;
use crate::spreadsheet::sheet::RawSheet;

/// Rows 1-5 hold the header block of image sheets.
pub const HEADER_ROWS: usize = 5;

const DOKUMENTASI: &str = "DOKUMENTASI";
const RAMBU: &str = "RAMBU";
const RPPJ: &str = "RPPJ";
const NAMA_RAMBU: &str = "NAMA RAMBU";
const JENIS_TIANG: &str = "JENIS TIANG";

/// Header text of every column: non-blank values of the header rows joined by
/// a space, or `Column_<letter>` when all of them are blank.
pub fn column_headers(sheet: &RawSheet) -> Vec<String> {
    (0..sheet.width())
        .map(|col| {
            let parts: Vec<String> = (0..HEADER_ROWS)
                .map(|row| sheet.get(row, col))
                .filter(|value| !value.is_blank())
                .map(|value| value.to_trimmed_string())
                .collect();
            if parts.is_empty() {
                format!("Column_{}", index_to_col(col))
            } else {
                parts.join(" ")
            }
        })
        .collect()
}

/// Picture columns of a sheet by category, plus the columns that name pictures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageColumns {
    pub dokumentasi: Vec<usize>,
    pub rambu: Vec<usize>,
    pub rppj: Vec<usize>,
    pub sign_name: Option<usize>,
    pub pole_type: Option<usize>,
}

impl ImageColumns {
    pub fn classify(headers: &[String]) -> Self {
        let mut columns = Self::default();
        for (col, header) in headers.iter().enumerate() {
            let header = header.to_uppercase();
            if header.contains(DOKUMENTASI) {
                columns.dokumentasi.push(col);
            } else if header.contains(RAMBU) && !header.contains(NAMA_RAMBU) {
                columns.rambu.push(col);
            } else if header.contains(RPPJ) {
                columns.rppj.push(col);
            }

            if header.contains(NAMA_RAMBU) {
                columns.sign_name = Some(col);
            } else if header.contains(JENIS_TIANG) {
                columns.pole_type = Some(col);
            }
        }
        columns
    }

    pub fn of(&self, category: ImageCategory) -> &[usize] {
        match category {
            ImageCategory::Dokumentasi => &self.dokumentasi,
            ImageCategory::Rambu => &self.rambu,
            ImageCategory::Rppj => &self.rppj,
        }
    }
}

/// Naming inputs of one picture.
pub struct ImageName<'a> {
    pub workbook_stem: &'a str,
    pub sheet: &'a str,
    pub column: &'a str,
    /// 1-indexed worksheet row.
    pub row: usize,
}

impl ImageName<'_> {
    fn with_column(&self, column: &str) -> String {
        format!(
            "{}_Sheet_{}_Column_{}_Row{}.png",
            sanitize_for_path(self.workbook_stem),
            sanitize_for_path(self.sheet),
            sanitize_for_path(column),
            self.row
        )
    }

    /// `<file>_Sheet_<sheet>_Column_<column>_Row<n>.png`
    pub fn default_name(&self) -> String {
        self.with_column(self.column)
    }

    /// Sign pictures are named after the sign when the row names one.
    pub fn rambu_name(&self, sign_name: Option<&str>) -> String {
        match sign_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => format!("{}.png", sanitize_for_path(name)),
            None => self.default_name(),
        }
    }

    /// Post pictures carry the pole type in place of the column name.
    pub fn rppj_name(&self, pole_type: Option<&str>) -> String {
        let pole_type = pole_type.map(str::trim).filter(|value| !value.is_empty()).unwrap_or("Unknown");
        self.with_column(pole_type)
    }
}
