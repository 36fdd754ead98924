use crate::error::ConvertError;
use crate::survey::coordinate::CoordinateErrorEntry;
use chrono::Local;
use rust_xlsxwriter::Format;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use std::path::PathBuf;

pub const ERROR_LOG_SHEET: &str = "Coordinate Errors";

const HEADERS: [&str; 7] = [
    "Excel File",
    "Sheet",
    "Row Index",
    "Original Lat Value",
    "Original Lon Value",
    "Error",
    "Error Summary",
];

fn row_values(entry: &CoordinateErrorEntry) -> [String; 7] {
    [
        entry.excel_file.clone(),
        entry.sheet.clone(),
        entry.row.to_string(),
        entry.original_lat.clone(),
        entry.original_lon.clone(),
        entry.error.clone(),
        entry.summary(),
    ]
}

/// Writes `Coordinate_Error_Log_<timestamp>.xlsx` into the output folder.
/// Nothing is written when there are no entries.
pub fn write_error_log(entries: &[CoordinateErrorEntry], output_root: &Path) -> Result<Option<PathBuf>, ConvertError> {
    if entries.is_empty() {
        return Ok(None);
    }
    let path = output_root.join(format!("Coordinate_Error_Log_{}.xlsx", Local::now().format("%Y%m%d_%H%M%S")));
    write_entries(entries, &path)?;
    tracing::info!("Coordinate error log saved to: {}", path.display());
    Ok(Some(path))
}

fn write_entries(entries: &[CoordinateErrorEntry], path: &Path) -> Result<(), ConvertError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(ERROR_LOG_SHEET)?;

    let header_format = Format::new().set_bold();
    let mut widths: Vec<usize> = HEADERS.iter().map(|header| header.chars().count()).collect();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, entry) in entries.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in row_values(entry).iter().enumerate() {
            if col == 2 {
                worksheet.write_number(row, col as u16, entry.row as f64)?;
            } else {
                worksheet.write_string(row, col as u16, value)?;
            }
            widths[col] = widths[col].max(value.chars().count());
        }
    }
    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width + 2) as f64)?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path)?;
    Ok(())
}
