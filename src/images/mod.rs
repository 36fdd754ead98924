//! Extracts pictures embedded in survey workbooks.
//!
//! The workbook is opened once to list its sheets and reopened for every
//! sheet, so each scan works on a fresh package handle that is released as
//! soon as the sheet is done.

pub mod naming;
pub mod registry;

use crate::error::ConvertError;
use crate::helpers::path::file_name;
use crate::helpers::path::file_stem;
use crate::helpers::path::sanitize_for_path;
use crate::images::naming::column_headers;
use crate::images::naming::ImageColumns;
use crate::images::naming::ImageName;
use crate::images::naming::HEADER_ROWS;
use crate::images::registry::ImageCategory;
use crate::images::registry::ImageEntry;
use crate::images::registry::ImageRegistry;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::EmbeddedImage;
use crate::spreadsheet::SheetFilter;
use image::ImageFormat;
use std::collections::HashSet;
use std::ops::AddAssign;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub const IMAGES_FOLDER: &str = "Extract Images";

const CATEGORIES: [ImageCategory; 3] = [ImageCategory::Dokumentasi, ImageCategory::Rambu, ImageCategory::Rppj];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Picture at {0} could not be decoded: {1}")]
    DecodeError(String, image::ImageError),

    #[error("Picture at {0} could not be saved to '{1}': {2}")]
    SaveError(String, String, image::ImageError),
}

/// Saved and failed pictures, per category.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageCounts {
    pub dokumentasi: usize,
    pub rambu: usize,
    pub rppj: usize,
    pub failed: usize,
}

impl ImageCounts {
    pub fn saved(&self) -> usize {
        self.dokumentasi + self.rambu + self.rppj
    }

    fn record(&mut self, category: ImageCategory) {
        match category {
            ImageCategory::Dokumentasi => self.dokumentasi += 1,
            ImageCategory::Rambu => self.rambu += 1,
            ImageCategory::Rppj => self.rppj += 1,
        }
    }
}

impl AddAssign for ImageCounts {
    fn add_assign(&mut self, other: Self) {
        self.dokumentasi += other.dokumentasi;
        self.rambu += other.rambu;
        self.rppj += other.rppj;
        self.failed += other.failed;
    }
}

/// Folder a category's pictures go to. Documentation pictures are grouped per workbook.
pub fn category_folder(output_root: &Path, category: ImageCategory, workbook_stem: &str) -> PathBuf {
    let folder = output_root.join(IMAGES_FOLDER).join(category.folder());
    match category {
        ImageCategory::Dokumentasi => folder.join(sanitize_for_path(workbook_stem)),
        _ => folder,
    }
}

fn save_png(bytes: &[u8], cell: &str, path: &Path) -> Result<(), ConvertError> {
    let picture = image::load_from_memory(bytes).map_err(|e| ImageError::DecodeError(cell.to_owned(), e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    picture
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| ImageError::SaveError(cell.to_owned(), path.display().to_string(), e))?;
    Ok(())
}

/// Extracts the pictures of every selected sheet and registers them.
///
/// Failures of single sheets or pictures are logged and counted; only a
/// workbook that cannot be opened at all is an error.
pub fn extract_images(
    path: &Path,
    output_root: &Path,
    filter: &SheetFilter,
    registry: &mut ImageRegistry,
) -> Result<ImageCounts, ConvertError> {
    let sheet_names = open_spreadsheet(path)?.sheet_names();
    if path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("xls")) {
        tracing::info!("'{}' is a legacy workbook without drawing anchors, no images extracted", file_name(path));
        return Ok(ImageCounts::default());
    }

    let mut total = ImageCounts::default();
    let mut sheets_with_images = 0;
    for (index, sheet_name) in sheet_names.iter().enumerate() {
        if !filter.accept(sheet_name) {
            continue;
        }
        tracing::debug!("Scanning sheet {}/{}: {}", index + 1, sheet_names.len(), sheet_name);
        match extract_sheet(path, sheet_name, output_root, registry) {
            Ok(counts) => {
                tracing::info!(
                    "Completed sheet '{}': Dokumentasi {}, Rambu {}, RPPJ {} images",
                    sheet_name,
                    counts.dokumentasi,
                    counts.rambu,
                    counts.rppj
                );
                if counts.saved() > 0 {
                    sheets_with_images += 1;
                }
                total += counts;
            }
            Err(e) => tracing::warn!("Error extracting images from sheet '{}' in '{}': {}", sheet_name, file_name(path), e),
        }
    }
    tracing::info!(
        "Completed images of '{}': {}/{} sheets with images, {} images extracted",
        file_name(path),
        sheets_with_images,
        sheet_names.len(),
        total.saved()
    );
    Ok(total)
}

fn extract_sheet(
    path: &Path,
    sheet_name: &str,
    output_root: &Path,
    registry: &mut ImageRegistry,
) -> Result<ImageCounts, ConvertError> {
    let mut spreadsheet = open_spreadsheet(path)?;
    let images = spreadsheet.sheet_images(sheet_name)?;
    let mut counts = ImageCounts::default();
    if images.is_empty() {
        return Ok(counts);
    }

    let sheet = spreadsheet.read_sheet(sheet_name)?;
    let headers = column_headers(&sheet);
    let columns = ImageColumns::classify(&headers);
    let workbook = file_name(path);
    let workbook_stem = file_stem(path);

    for category in CATEGORIES {
        let targets = columns.of(category);
        if targets.is_empty() {
            continue;
        }
        match category {
            ImageCategory::Rambu if columns.sign_name.is_none() => {
                tracing::warn!("'Nama Rambu' column not found in '{sheet_name}', using default naming for Rambu images")
            }
            ImageCategory::Rppj if columns.pole_type.is_none() => {
                tracing::warn!("'Jenis Tiang' column not found in '{sheet_name}', using default naming for RPPJ images")
            }
            _ => {}
        }

        let mut cells: Vec<&EmbeddedImage> = images
            .iter()
            .filter(|image| image.row >= HEADER_ROWS && targets.contains(&image.col))
            .collect();
        cells.sort_by_key(|image| (image.col, image.row));
        cells.dedup_by_key(|image| (image.col, image.row));
        if cells.is_empty() {
            tracing::debug!("No images found in {} columns of '{}'", category, sheet_name);
            continue;
        }

        let folder = category_folder(output_root, category, &workbook_stem);
        let mut names = HashSet::new();
        for image in cells {
            let cell = index_to_reference(image.row, image.col);
            let column = headers.get(image.col).map(String::as_str).unwrap_or_default();
            let name = ImageName { workbook_stem: &workbook_stem, sheet: sheet_name, column, row: image.row + 1 };
            let business_key = |col: Option<usize>| col.map(|col| sheet.get(image.row, col).to_trimmed_string());
            let file_name = match category {
                ImageCategory::Rambu if columns.sign_name.is_some() => name.rambu_name(business_key(columns.sign_name).as_deref()),
                ImageCategory::Rppj if columns.pole_type.is_some() => name.rppj_name(business_key(columns.pole_type).as_deref()),
                _ => name.default_name(),
            };
            if !names.insert(file_name.clone()) {
                tracing::warn!("Duplicate image name '{file_name}' at {cell}, replacing existing image");
            }

            let target = folder.join(&file_name);
            let saved = spreadsheet
                .image_data(image)
                .and_then(|bytes| save_png(&bytes, &cell, &target));
            match saved {
                Ok(()) => {
                    counts.record(category);
                    registry.register(
                        &workbook,
                        sheet_name,
                        image.row + 1,
                        ImageEntry { category, column: column.to_owned(), path: target },
                    );
                    tracing::debug!("Saved: {file_name}");
                }
                Err(e) => {
                    counts.failed += 1;
                    tracing::warn!("Error saving image at {cell} of '{sheet_name}': {e}");
                }
            }
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Image;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn write_picture(path: &Path) {
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10])).save(path).unwrap();
    }

    #[test]
    fn pictures_are_saved_and_registered() {
        let dir = tempdir().unwrap();
        let picture = dir.path().join("photo.png");
        write_picture(&picture);

        let workbook_path = dir.path().join("Survey Ruas.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name("Rambu").unwrap();
        sheet.write_string(0, 0, "NO").unwrap();
        sheet.write_string(0, 1, "NAMA RAMBU").unwrap();
        sheet.write_string(0, 2, "FOTO RAMBU").unwrap();
        sheet.write_string(0, 3, "DOKUMENTASI").unwrap();
        sheet.write_string(5, 1, "Dilarang Parkir").unwrap();
        sheet.write_string(6, 1, "Dilarang Parkir").unwrap();
        sheet.insert_image(5, 2, &Image::new(&picture).unwrap()).unwrap();
        sheet.insert_image(6, 2, &Image::new(&picture).unwrap()).unwrap();
        sheet.insert_image(5, 3, &Image::new(&picture).unwrap()).unwrap();
        sheet.insert_image(2, 3, &Image::new(&picture).unwrap()).unwrap();
        let other = workbook.add_worksheet().set_name("RPPJ").unwrap();
        other.write_string(0, 0, "RPPJ").unwrap();
        other.write_string(0, 1, "JENIS TIANG").unwrap();
        other.write_string(7, 1, "Tiang F").unwrap();
        other.insert_image(7, 0, &Image::new(&picture).unwrap()).unwrap();
        other.insert_image(8, 0, &Image::new(&picture).unwrap()).unwrap();
        workbook.save(&workbook_path).unwrap();

        let output = dir.path().join("out");
        let mut registry = ImageRegistry::new();
        let counts = extract_images(&workbook_path, &output, &SheetFilter::default(), &mut registry).unwrap();

        assert_eq!(counts, ImageCounts { dokumentasi: 1, rambu: 2, rppj: 2, failed: 0 });
        let images = output.join(IMAGES_FOLDER);
        assert!(images.join("Rambu").join("Dilarang Parkir.png").exists());
        assert!(images
            .join("Dokumentasi")
            .join("Survey Ruas")
            .join("Survey Ruas_Sheet_Rambu_Column_DOKUMENTASI_Row6.png")
            .exists());
        assert!(images.join("RPPJ").join("Survey Ruas_Sheet_RPPJ_Column_Tiang F_Row8.png").exists());
        assert!(images.join("RPPJ").join("Survey Ruas_Sheet_RPPJ_Column_Unknown_Row9.png").exists());

        let documentation = registry.find("Survey Ruas.xlsx", "Rambu", 6, ImageCategory::Dokumentasi).unwrap();
        assert!(documentation.ends_with("Survey Ruas_Sheet_Rambu_Column_DOKUMENTASI_Row6.png"));
        assert_eq!(registry.lookup("Survey Ruas.xlsx", "Rambu", 7).len(), 1);
        assert_eq!(registry.len(), 5);

        let mut filtered = ImageRegistry::new();
        let only_rppj = SheetFilter::new(&["RPPJ".to_owned()]).unwrap();
        let counts = extract_images(&workbook_path, &output, &only_rppj, &mut filtered).unwrap();
        assert_eq!(counts.saved(), 2);
    }

    #[test]
    fn corrupt_pictures_are_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        assert!(save_png(b"not a picture", "B7", &path).is_err());
        assert!(!path.exists());
    }
}
