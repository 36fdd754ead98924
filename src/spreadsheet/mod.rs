//! Workbook reading: sheet enumeration, cell values, merged ranges and embedded pictures.
//!
//! `.xlsx`/`.xlsm` packages are parsed directly from their XML parts so that
//! drawing anchors are available; legacy `.xls` files go through calamine and
//! expose cells and merged ranges only.

pub mod cell;
pub(crate) mod criteria;
pub(crate) mod drawing;
pub mod reference;
pub mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::error::ConvertError;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

pub use criteria::SheetFilter;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported workbook format '{0}' (expected .xlsx, .xlsm or .xls)")]
    UnsupportedFormatError(String),

    #[error("Workbook '{0}' is password protected")]
    PasswordProtectedError(String),

    #[error("Workbook '{0}' contains no worksheets")]
    EmptyWorkbookError(String),

    #[error("Missing package part '{0}'")]
    MissingPartError(String),

    #[error("Worksheet '{0}' not found")]
    SheetNotFoundError(String),
}

/// A picture anchored to a worksheet cell. Positions are 0-based; the anchor
/// is the picture's top-left cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub row: usize,
    pub col: usize,
    /// Package part holding the picture bytes, e.g. `xl/media/image3.png`.
    pub part: String,
}

/// Read access to one open workbook. The handle is released when the value is dropped.
pub trait Spreadsheet {
    /// Worksheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, ConvertError>;

    /// Pictures anchored on a worksheet, in document order.
    fn sheet_images(&mut self, name: &str) -> Result<Vec<EmbeddedImage>, ConvertError>;

    fn image_data(&mut self, image: &EmbeddedImage) -> Result<Vec<u8>, ConvertError>;
}

/// Workbook extensions the pipeline accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|extension| extension.to_string_lossy().to_ascii_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    extension(path)
        .map(|extension| SUPPORTED_EXTENSIONS.contains(&extension.as_str()))
        .unwrap_or(false)
}

/// Opens a workbook by extension.
pub fn open_spreadsheet(path: &Path) -> Result<Box<dyn Spreadsheet>, ConvertError> {
    match extension(path).as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(Box::new(XlsxSpreadsheet::open(path)?)),
        Some("xls") => Ok(Box::new(XlsSpreadsheet::open(path)?)),
        _ => Err(SpreadsheetError::UnsupportedFormatError(path.display().to_string()))?,
    }
}
