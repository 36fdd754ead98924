use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageCategory {
    Dokumentasi,
    Rambu,
    Rppj,
}

impl ImageCategory {
    /// Folder under `Extract Images/`.
    pub fn folder(&self) -> &'static str {
        match self {
            ImageCategory::Dokumentasi => "Dokumentasi",
            ImageCategory::Rambu => "Rambu",
            ImageCategory::Rppj => "RPPJ",
        }
    }
}

impl Display for ImageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.folder())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
    pub category: ImageCategory,
    /// Header text of the column the picture was anchored in.
    pub column: String,
    pub path: PathBuf,
}

type RowImages = HashMap<usize, Vec<ImageEntry>>;

/// Saved pictures of one batch run, keyed by workbook file name, sheet name and
/// 1-indexed worksheet row. Filled by the image extractor, read by the writers.
#[derive(Clone, Debug, Default)]
pub struct ImageRegistry {
    workbooks: HashMap<String, HashMap<String, RowImages>>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, workbook: &str, sheet: &str, row: usize, entry: ImageEntry) {
        self.workbooks
            .entry(workbook.to_owned())
            .or_default()
            .entry(sheet.to_owned())
            .or_default()
            .entry(row)
            .or_default()
            .push(entry);
    }

    pub fn lookup(&self, workbook: &str, sheet: &str, row: usize) -> &[ImageEntry] {
        self.workbooks
            .get(workbook)
            .and_then(|sheets| sheets.get(sheet))
            .and_then(|rows| rows.get(&row))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First picture of a category on a row.
    pub fn find(&self, workbook: &str, sheet: &str, row: usize, category: ImageCategory) -> Option<&Path> {
        self.lookup(workbook, sheet, row)
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.path.as_path())
    }

    /// True once any picture of the workbook was registered.
    pub fn contains_workbook(&self, workbook: &str) -> bool {
        self.workbooks.contains_key(workbook)
    }

    pub fn len(&self) -> usize {
        self.workbooks
            .values()
            .flat_map(HashMap::values)
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
