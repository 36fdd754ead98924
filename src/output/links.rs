//! Relative links from survey records to their extracted pictures.

use crate::helpers::path::file_stem;
use crate::helpers::path::join_link;
use crate::helpers::path::sanitize_for_path;
use crate::images::category_folder;
use crate::images::registry::ImageCategory;
use crate::images::registry::ImageRegistry;
use crate::images::IMAGES_FOLDER;
use crate::spreadsheet::cell::CellValue;
use crate::survey::frame::CleanRecord;
use crate::survey::frame::SurveyLayer;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

pub const IMAGE_DOKUMENTASI: &str = "Image Dokumentasi";
pub const IMAGE_RAMBU: &str = "Image Rambu";
pub const IMAGE_RPPJ: &str = "Image RPPJ";

static ROW_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_Row(\d+)\.png$").expect("Hardcode regex pattern"));

/// Which picture link a sheet carries besides the documentation link.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SheetLink {
    Rambu(usize),
    Rppj,
    None,
}

/// Pictures of one sheet found on disk, by worksheet row. Used when the
/// registry has no entry for the workbook, e.g. when images were extracted
/// by an earlier run.
#[derive(Debug, Default)]
struct DiskIndex {
    rows: HashMap<usize, PathBuf>,
}

impl DiskIndex {
    fn scan(folder: &Path, prefix: &str) -> Self {
        let mut rows = HashMap::new();
        let Ok(entries) = std::fs::read_dir(folder) else {
            return Self { rows };
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) {
                continue;
            }
            let row = ROW_SUFFIX
                .captures(&name)
                .and_then(|captures| captures[1].parse::<usize>().ok());
            if let Some(row) = row {
                rows.entry(row).or_insert_with(|| entry.path());
            }
        }
        Self { rows }
    }
}

/// Resolves the picture link properties of the records of one layer.
pub struct ImageLinks<'a> {
    layer: &'a SurveyLayer,
    registry: &'a ImageRegistry,
    output_root: &'a Path,
    sheet_link: SheetLink,
    fallback: Option<(DiskIndex, DiskIndex)>,
}

impl<'a> ImageLinks<'a> {
    pub fn new(layer: &'a SurveyLayer, registry: &'a ImageRegistry, output_root: &'a Path) -> Self {
        let sheet = layer.sheet.to_lowercase();
        let sheet_link = if sheet.contains("rambu") {
            layer.sign_name.map(SheetLink::Rambu).unwrap_or(SheetLink::None)
        } else if sheet.contains("rppj") {
            SheetLink::Rppj
        } else {
            SheetLink::None
        };

        let fallback = (!registry.contains_workbook(&layer.workbook)).then(|| {
            let stem = file_stem(Path::new(&layer.workbook));
            let prefix = format!("{}_Sheet_{}_Column_", sanitize_for_path(&stem), sanitize_for_path(&layer.sheet));
            (
                DiskIndex::scan(&category_folder(output_root, ImageCategory::Dokumentasi, &stem), &prefix),
                DiskIndex::scan(&category_folder(output_root, ImageCategory::Rppj, &stem), &prefix),
            )
        });

        Self { layer, registry, output_root, sheet_link, fallback }
    }

    /// Link relative to the output root, `/`-separated.
    fn link(&self, path: &Path) -> String {
        let relative = path.strip_prefix(self.output_root).unwrap_or(path);
        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        join_link(&segments.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn find(&self, record: &CleanRecord, category: ImageCategory) -> Option<String> {
        let path = match &self.fallback {
            None => self
                .registry
                .find(&self.layer.workbook, &self.layer.sheet, record.excel_row, category)
                .map(Path::to_path_buf),
            Some((documentation, rppj)) => {
                let index = if category == ImageCategory::Rppj { rppj } else { documentation };
                index.rows.get(&record.excel_row).cloned()
            }
        };
        path.map(|path| self.link(&path))
    }

    /// `(property, link)` pairs for one record; `None` links are written as null.
    pub fn properties(&self, record: &CleanRecord) -> Vec<(&'static str, Option<String>)> {
        let mut properties = vec![(IMAGE_DOKUMENTASI, self.find(record, ImageCategory::Dokumentasi))];
        match self.sheet_link {
            SheetLink::Rambu(field) => {
                let sign_name = match record.values.get(field) {
                    Some(CellValue::Empty) | None => None,
                    Some(value) => Some(value.to_trimmed_string()),
                };
                let link = sign_name
                    .filter(|name| !name.is_empty() && !matches!(name.to_lowercase().as_str(), "nan" | "none"))
                    .map(|name| {
                        let file = format!("{}.png", sanitize_for_path(&name));
                        join_link(&[IMAGES_FOLDER, ImageCategory::Rambu.folder(), &file])
                    });
                properties.push((IMAGE_RAMBU, link));
            }
            SheetLink::Rppj => properties.push((IMAGE_RPPJ, self.find(record, ImageCategory::Rppj))),
            SheetLink::None => {}
        }
        properties
    }
}
