//! Legacy BIFF workbooks (`.xls`), read through calamine.

use crate::error::ConvertError;
use crate::spreadsheet::cell::to_date_string;
use crate::spreadsheet::cell::to_datetime_string;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::MergedRange;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::EmbeddedImage;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use calamine::open_workbook;
use calamine::Data;
use calamine::Reader;
use calamine::Xls;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub(crate) struct XlsSpreadsheet {
    workbook: Xls<BufReader<File>>,
}

impl XlsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, ConvertError> {
        let workbook: Xls<BufReader<File>> = open_workbook(path)?;
        if workbook.sheet_names().is_empty() {
            Err(SpreadsheetError::EmptyWorkbookError(path.display().to_string()))?
        }
        Ok(XlsSpreadsheet { workbook })
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, ConvertError> {
        if !self.workbook.sheet_names().iter().any(|sheet_name| sheet_name == name) {
            Err(SpreadsheetError::SheetNotFoundError(name.to_owned()))?
        }
        let range = self.workbook.worksheet_range(name)?;
        let mut sheet = RawSheet::new(name);
        if let Some((first_row, first_col)) = range.start() {
            for (row_offset, cells) in range.rows().enumerate() {
                for (col_offset, data) in cells.iter().enumerate() {
                    let row = first_row as usize + row_offset;
                    let col = first_col as usize + col_offset;
                    sheet.set(row, col, to_cell_value(data));
                }
            }
        }
        for dimensions in self.workbook.worksheet_merge_cells(name).unwrap_or_default() {
            sheet.add_merge(MergedRange {
                first_row: dimensions.start.0 as usize,
                first_col: dimensions.start.1 as usize,
                last_row: dimensions.end.0 as usize,
                last_col: dimensions.end.1 as usize,
            });
        }
        Ok(sheet)
    }

    /// BIFF drawings are not decoded; legacy workbooks report no pictures.
    fn sheet_images(&mut self, _name: &str) -> Result<Vec<EmbeddedImage>, ConvertError> {
        Ok(Vec::new())
    }

    fn image_data(&mut self, image: &EmbeddedImage) -> Result<Vec<u8>, ConvertError> {
        Err(SpreadsheetError::MissingPartError(image.part.to_owned()))?
    }
}

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(value) => CellValue::Bool(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::String(value) => CellValue::Text(value.to_owned()),
        Data::DateTime(value) => {
            let serial = value.as_f64();
            let text = if serial.fract() == 0.0 {
                to_date_string(serial, false)
            } else {
                to_datetime_string(serial, false)
            };
            text.map(CellValue::Text).unwrap_or(CellValue::Number(serial))
        }
        Data::DateTimeIso(value) | Data::DurationIso(value) => CellValue::Text(value.replace('T', " ")),
        Data::Error(error) => CellValue::Text(error.to_string()),
    }
}
