//! Batch orchestration: every workbook is fully converted (images, records,
//! files) before the next one is opened.

pub mod listener;
pub mod report;
pub mod worker;

use crate::batch::listener::Listener;
use crate::batch::report::BatchReport;
use crate::batch::report::SheetOutcome;
use crate::batch::report::SheetReport;
use crate::batch::report::WorkbookReport;
use crate::config::Config;
use crate::error::ConvertError;
use crate::helpers::path::file_name;
use crate::images::extract_images;
use crate::images::registry::ImageRegistry;
use crate::output::error_log::write_error_log;
use crate::output::region::RegionBoundaries;
use crate::output::LayerWriter;
use crate::spreadsheet::is_supported;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::SheetFilter;
use crate::spreadsheet::SUPPORTED_EXTENSIONS;
use crate::survey::coordinate::CoordinateErrorEntry;
use crate::survey::process_sheet;
use crate::survey::SkipReason;
use glob::MatchOptions;
use glob::Pattern;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Workbooks to convert: the file itself, or the supported workbooks directly
/// inside a folder in name order. Excel lock files (`~$...`) are ignored.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    if input.is_file() {
        if !is_supported(input) {
            Err(ConvertError::WithContextError(format!(
                "'{}' is not a supported workbook ({})",
                input.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )))?
        }
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        Err(ConvertError::WithContextError(format!("Input '{}' does not exist", input.display())))?
    }

    let options = MatchOptions { case_sensitive: false, ..MatchOptions::new() };
    let folder = Pattern::escape(&input.to_string_lossy());
    let mut inputs = Vec::new();
    for extension in SUPPORTED_EXTENSIONS {
        for entry in glob::glob_with(&format!("{folder}/*.{extension}"), options)? {
            match entry {
                Ok(path) if !file_name(&path).starts_with("~$") => inputs.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("Cannot read '{}': {}", e.path().display(), e.error()),
            }
        }
    }
    inputs.sort();
    inputs.dedup();
    Ok(inputs)
}

/// State shared by every workbook of one run.
struct BatchContext<'a> {
    output_root: &'a Path,
    config: &'a Config,
    filter: SheetFilter,
    boundaries: Option<RegionBoundaries>,
    registry: ImageRegistry,
    errors: Vec<CoordinateErrorEntry>,
}

/// Converts the given workbooks into `output_root`.
///
/// Only batch-level problems are errors: an invalid sheet filter, an unreadable
/// boundary file or an output folder that cannot be created. Problems with a
/// single workbook, sheet or file end up in the report.
pub fn run_batch(
    inputs: &[PathBuf],
    output_root: &Path,
    config: &Config,
    listener: &dyn Listener,
    cancel: &AtomicBool,
) -> Result<BatchReport, ConvertError> {
    let filter = SheetFilter::new(&config.pipeline.sheets)?;
    let boundaries = match &config.regions.boundary {
        Some(path) => Some(RegionBoundaries::load(path, &config.regions.name_field)?),
        None => None,
    };
    std::fs::create_dir_all(output_root)?;

    let mut context = BatchContext {
        output_root,
        config,
        filter,
        boundaries,
        registry: ImageRegistry::new(),
        errors: Vec::new(),
    };
    let mut report = BatchReport::default();
    listener.progress(0);

    for (index, path) in inputs.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            listener.log("Conversion cancelled");
            report.cancelled = true;
            break;
        }
        listener.log(&format!("Processing workbook {}/{}: {}", index + 1, inputs.len(), file_name(path)));
        let workbook = context.process_workbook(path, &|done: f64| {
            let percent = (index as f64 + done) / inputs.len() as f64 * 100.0;
            listener.progress(percent.round().clamp(0.0, 100.0) as u8);
        });
        listener.log(&workbook.summary());
        report.workbooks.push(workbook);
    }

    if config.output.error_log {
        match write_error_log(&context.errors, output_root) {
            Ok(path) => report.error_log = path,
            Err(e) => tracing::error!("Error saving coordinate error log: {e}"),
        }
    }
    if !report.cancelled {
        listener.progress(100);
    }
    listener.log(&report.summary());
    Ok(report)
}

impl BatchContext<'_> {
    fn process_workbook(&mut self, path: &Path, progress: &dyn Fn(f64)) -> WorkbookReport {
        let mut report = WorkbookReport::new(path.to_path_buf());
        let workbook = file_name(path);

        if self.config.output.images {
            match extract_images(path, self.output_root, &self.filter, &mut self.registry) {
                Ok(counts) => report.images = counts,
                Err(e) => tracing::warn!("Error extracting images from '{workbook}': {e}"),
            }
        }

        let mut spreadsheet = match open_spreadsheet(path) {
            Ok(spreadsheet) => spreadsheet,
            Err(e) => {
                tracing::error!("Error opening '{workbook}': {e}");
                report.error = Some(e.to_string());
                progress(1.0);
                return report;
            }
        };

        let writer = LayerWriter {
            output_root: self.output_root,
            output: &self.config.output,
            boundaries: self.boundaries.as_ref(),
            styles: self.config.regions.styles.as_deref(),
            registry: &self.registry,
        };
        let writes_files = self.config.output.geojson || self.config.output.shapefile;
        let sheet_names = spreadsheet.sheet_names();
        let errors_before = self.errors.len();

        for (index, sheet) in sheet_names.iter().enumerate() {
            let outcome = if !self.filter.accept(sheet) {
                SheetOutcome::Skipped(SkipReason::NotSelected)
            } else if !writes_files {
                continue;
            } else {
                match spreadsheet.read_sheet(sheet) {
                    Err(e) => SheetOutcome::Failed(e.to_string()),
                    Ok(raw) => match process_sheet(&workbook, raw, &self.config.pipeline, &mut self.errors) {
                        Err(reason) => SheetOutcome::Skipped(reason),
                        Ok(layer) => {
                            tracing::info!("Sheet '{sheet}': {} {:?} features", layer.records.len(), layer.kind);
                            let written = writer.write_layer(&layer);
                            if written.failures.is_empty() {
                                SheetOutcome::Written { features: layer.records.len(), files: written.files }
                            } else {
                                SheetOutcome::Failed(written.failures.join("; "))
                            }
                        }
                    },
                }
            };
            match &outcome {
                SheetOutcome::Skipped(reason) => tracing::warn!("Skipping sheet '{sheet}' in '{workbook}': {reason}"),
                SheetOutcome::Failed(error) => tracing::error!("Error processing sheet '{sheet}' in '{workbook}': {error}"),
                SheetOutcome::Written { .. } => {}
            }
            report.sheets.push(SheetReport { sheet: sheet.clone(), outcome });
            progress((index + 1) as f64 / sheet_names.len() as f64);
        }

        report.coordinate_errors = self.errors.len() - errors_before;
        progress(1.0);
        report
    }
}
