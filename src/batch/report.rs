use crate::helpers::path::file_name;
use crate::images::ImageCounts;
use crate::survey::SkipReason;
use std::path::PathBuf;

/// What happened to one sheet.
#[derive(Clone, Debug, PartialEq)]
pub enum SheetOutcome {
    Written { features: usize, files: Vec<PathBuf> },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SheetReport {
    pub sheet: String,
    pub outcome: SheetOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkbookReport {
    pub path: PathBuf,
    pub sheets: Vec<SheetReport>,
    pub images: ImageCounts,
    pub coordinate_errors: usize,
    /// Set when the workbook could not be opened.
    pub error: Option<String>,
}

impl WorkbookReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path, ..Self::default() }
    }

    fn count(&self, predicate: impl Fn(&SheetOutcome) -> bool) -> usize {
        self.sheets.iter().filter(|sheet| predicate(&sheet.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|outcome| matches!(outcome, SheetOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, SheetOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, SheetOutcome::Failed(_)))
    }

    pub fn features(&self) -> usize {
        self.sheets
            .iter()
            .map(|sheet| match &sheet.outcome {
                SheetOutcome::Written { features, .. } => *features,
                _ => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        let name = file_name(&self.path);
        match &self.error {
            Some(error) => format!("{name}: failed to open ({error})"),
            None => format!(
                "{name}: {} sheets written, {} skipped, {} failed, {} features, {} images, {} coordinate errors",
                self.written(),
                self.skipped(),
                self.failed(),
                self.features(),
                self.images.saved(),
                self.coordinate_errors
            ),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub workbooks: Vec<WorkbookReport>,
    pub error_log: Option<PathBuf>,
    /// True when the run stopped early on request.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn features(&self) -> usize {
        self.workbooks.iter().map(WorkbookReport::features).sum()
    }

    pub fn images(&self) -> ImageCounts {
        let mut total = ImageCounts::default();
        for workbook in &self.workbooks {
            total += workbook.images;
        }
        total
    }

    pub fn coordinate_errors(&self) -> usize {
        self.workbooks.iter().map(|workbook| workbook.coordinate_errors).sum()
    }

    pub fn summary(&self) -> String {
        let sheets = |count: fn(&WorkbookReport) -> usize| self.workbooks.iter().map(count).sum::<usize>();
        let unreadable = self.workbooks.iter().filter(|workbook| workbook.error.is_some()).count();
        let mut summary = format!(
            "{} workbooks ({} unreadable): {} sheets written, {} skipped, {} failed, {} features, {} images, {} coordinate errors",
            self.workbooks.len(),
            unreadable,
            sheets(WorkbookReport::written),
            sheets(WorkbookReport::skipped),
            sheets(WorkbookReport::failed),
            self.features(),
            self.images().saved(),
            self.coordinate_errors()
        );
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}
