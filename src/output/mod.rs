//! Region-partitioned writers for survey layers.
//!
//! A layer is split by the boundary its records intersect, and every part is
//! written to `<folder>/<region>/Jalan Eksisting/<workbook>_<sheet>.<ext>`.
//! Without boundaries each layer is written as one file straight into the
//! format folder.

pub mod error_log;
pub mod geojson;
pub mod links;
pub mod region;
pub mod shapefile;

use crate::config::OutputConfig;
use crate::error::ConvertError;
use crate::error::ResultMessage;
use crate::helpers::path::file_stem;
use crate::helpers::path::sanitize_for_path;
use crate::images::registry::ImageRegistry;
use crate::output::geojson::write_geojson;
use crate::output::links::ImageLinks;
use crate::output::region::RegionBoundaries;
use crate::output::shapefile::write_shapefile;
use crate::survey::frame::CleanRecord;
use crate::survey::frame::SurveyLayer;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub const GEOJSON_FOLDER: &str = "Extract GeoJSON";
pub const SHAPEFILE_FOLDER: &str = "Extract Shapefile";
pub const CATEGORY_FOLDER: &str = "Jalan Eksisting";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Unsupported boundary file '{0}', expected .shp, .geojson or .json")]
    UnsupportedBoundaryError(String),

    #[error("Boundary file '{0}' contains no polygons")]
    EmptyBoundaryError(String),

    #[error("Boundary file '{0}' has no '{1}' attribute")]
    MissingNameFieldError(String, String),

    #[error("Invalid shapefile field name: {0}")]
    FieldNameError(String),
}

/// Records of one layer that share a region.
#[derive(Debug)]
pub struct Partition<'a> {
    /// `None` when no boundaries are configured.
    pub region: Option<String>,
    pub records: Vec<&'a CleanRecord>,
}

/// Splits a layer by region, regions in name order.
pub fn partition<'a>(layer: &'a SurveyLayer, boundaries: Option<&RegionBoundaries>) -> Vec<Partition<'a>> {
    let Some(boundaries) = boundaries else {
        return vec![Partition { region: None, records: layer.records.iter().collect() }];
    };
    let mut regions: BTreeMap<String, Vec<&CleanRecord>> = BTreeMap::new();
    for record in &layer.records {
        regions.entry(boundaries.region_of(&record.geometry)).or_default().push(record);
    }
    regions
        .into_iter()
        .map(|(region, records)| Partition { region: Some(region), records })
        .collect()
}

/// Folder of one format, with the region and category levels when partitioned.
pub fn target_folder(output_root: &Path, format_folder: &str, region: Option<&str>) -> PathBuf {
    let folder = output_root.join(format_folder);
    match region {
        Some(region) => folder.join(sanitize_for_path(region)).join(CATEGORY_FOLDER),
        None => folder,
    }
}

/// `<workbook>_<sheet>.<extension>`
pub fn layer_file_name(layer: &SurveyLayer, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_for_path(&file_stem(Path::new(&layer.workbook))),
        sanitize_for_path(&layer.sheet),
        extension
    )
}

/// Files written for one layer and the files that could not be written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrittenFiles {
    pub files: Vec<PathBuf>,
    pub failures: Vec<String>,
}

/// Everything the writers share during one batch.
pub struct LayerWriter<'a> {
    pub output_root: &'a Path,
    pub output: &'a OutputConfig,
    pub boundaries: Option<&'a RegionBoundaries>,
    pub styles: Option<&'a Path>,
    pub registry: &'a ImageRegistry,
}

impl LayerWriter<'_> {
    /// Writes every enabled format of a layer. A failing file is logged and
    /// reported; the remaining files are still written.
    pub fn write_layer(&self, layer: &SurveyLayer) -> WrittenFiles {
        let mut written = WrittenFiles::default();
        let partitions = partition(layer, self.boundaries);
        let links = ImageLinks::new(layer, self.registry, self.output_root);

        for part in &partitions {
            let region = part.region.as_deref();
            if self.output.geojson {
                let path = target_folder(self.output_root, GEOJSON_FOLDER, region).join(layer_file_name(layer, "geojson"));
                let result = write_geojson(&path, layer, &part.records, region, &links)
                    .with_prefix(&format!("Error saving GeoJSON '{}'", path.display()));
                self.settle(result.map(|()| path), &mut written);
            }
            if self.output.shapefile {
                let path = target_folder(self.output_root, SHAPEFILE_FOLDER, region).join(layer_file_name(layer, "shp"));
                let result = write_shapefile(&path, layer, &part.records, region, self.styles)
                    .with_prefix(&format!("Error saving Shapefile '{}'", path.display()));
                self.settle(result.map(|()| path), &mut written);
            }
        }
        written
    }

    fn settle(&self, result: Result<PathBuf, ConvertError>, written: &mut WrittenFiles) {
        match result {
            Ok(path) => {
                tracing::info!("Saved: {}", path.display());
                written.files.push(path);
            }
            Err(e) => {
                tracing::error!("{e}");
                written.failures.push(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use crate::survey::geometry::GeometryKind;
    use crate::survey::geometry::SurveyGeometry;
    use geo::polygon;
    use geo::MultiPolygon;
    use geo::Point;
    use tempfile::tempdir;

    fn layer() -> SurveyLayer {
        let record = |row: usize, x: f64, y: f64| CleanRecord {
            excel_row: row,
            values: vec![CellValue::Number(row as f64)],
            geometry: SurveyGeometry::Point(Point::new(x, y)),
        };
        SurveyLayer {
            workbook: "Ruas: 12.xlsx".to_owned(),
            sheet: "Rambu".to_owned(),
            kind: GeometryKind::Point,
            fields: vec!["No".to_owned()],
            sign_name: None,
            records: vec![record(7, 106.8, -6.4), record(8, 110.0, -7.0), record(9, 106.85, -6.45)],
        }
    }

    fn boundaries() -> RegionBoundaries {
        let mut boundaries = RegionBoundaries::default();
        boundaries.push(
            "Kota Depok".to_owned(),
            MultiPolygon::new(vec![polygon![
                (x: 106.7, y: -6.5),
                (x: 106.9, y: -6.5),
                (x: 106.9, y: -6.3),
                (x: 106.7, y: -6.3),
                (x: 106.7, y: -6.5),
            ]]),
        );
        boundaries
    }

    #[test]
    fn partitions_are_sorted_by_region() {
        let layer = layer();
        let boundaries = boundaries();
        let parts = partition(&layer, Some(&boundaries));
        let summary: Vec<(Option<&str>, Vec<usize>)> = parts
            .iter()
            .map(|part| (part.region.as_deref(), part.records.iter().map(|record| record.excel_row).collect()))
            .collect();
        assert_eq!(summary, vec![(Some("Kota Depok"), vec![7, 9]), (Some("Unknown"), vec![8])]);

        let single = partition(&layer, None);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].region, None);
        assert_eq!(single[0].records.len(), 3);
    }

    #[test]
    fn folders_and_file_names() {
        let root = Path::new("/out");
        assert_eq!(
            target_folder(root, GEOJSON_FOLDER, Some("Kota Depok")),
            Path::new("/out/Extract GeoJSON/Kota Depok/Jalan Eksisting")
        );
        assert_eq!(target_folder(root, SHAPEFILE_FOLDER, None), Path::new("/out/Extract Shapefile"));
        assert_eq!(layer_file_name(&layer(), "geojson"), "Ruas_ 12_Rambu.geojson");
    }

    #[test]
    fn write_layer_per_region_and_format() {
        let dir = tempdir().unwrap();
        let layer = layer();
        let boundaries = boundaries();
        let registry = ImageRegistry::new();
        let output = OutputConfig::default();
        let writer = LayerWriter {
            output_root: dir.path(),
            output: &output,
            boundaries: Some(&boundaries),
            styles: None,
            registry: &registry,
        };

        let written = writer.write_layer(&layer);
        assert!(written.failures.is_empty(), "{:?}", written.failures);
        assert_eq!(written.files.len(), 4);
        assert!(dir
            .path()
            .join("Extract GeoJSON/Unknown/Jalan Eksisting/Ruas_ 12_Rambu.geojson")
            .exists());
        assert!(dir
            .path()
            .join("Extract Shapefile/Kota Depok/Jalan Eksisting/Ruas_ 12_Rambu.shp")
            .exists());
    }
}
