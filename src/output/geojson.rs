//! GeoJSON FeatureCollections for one layer partition.

use crate::error::ConvertError;
use crate::helpers::path::file_stem;
use crate::output::links::ImageLinks;
use crate::spreadsheet::cell::CellValue;
use crate::survey::frame::CleanRecord;
use crate::survey::frame::SurveyLayer;
use geojson::Feature;
use serde::Serialize;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

pub const REGION_PROPERTY: &str = "Kota/Kabupaten";
pub const PROVENANCE_PROPERTY: &str = "original_excel_row";
const CRS84: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// JSON value of one cell. Integral numbers are written as integers.
pub fn cell_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::Bool(flag) => Value::Bool(*flag),
        CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => json!(*number as i64),
        CellValue::Number(number) => serde_json::Number::from_f64(*number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CellValue::Text(text) => Value::String(text.clone()),
    }
}

fn feature(layer: &SurveyLayer, record: &CleanRecord, region: Option<&str>, links: &ImageLinks) -> Feature {
    let mut properties = Map::new();
    for (name, value) in layer.properties(record) {
        properties.insert(name.to_owned(), cell_to_json(value));
    }
    if let Some(region) = region {
        properties.insert(REGION_PROPERTY.to_owned(), Value::String(region.to_owned()));
    }
    for (name, link) in links.properties(record) {
        properties.insert(name.to_owned(), link.map(Value::String).unwrap_or(Value::Null));
    }
    properties.insert(PROVENANCE_PROPERTY.to_owned(), json!(record.excel_row));

    let geometry = geojson::Geometry::new(geojson::Value::from(&record.geometry.to_geometry()));
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Builds the feature collection of one partition, members in the order
/// `type`, `name`, `crs`, `features`.
pub fn feature_collection(
    name: &str,
    layer: &SurveyLayer,
    records: &[&CleanRecord],
    region: Option<&str>,
    links: &ImageLinks,
) -> Result<Value, ConvertError> {
    let features = records
        .iter()
        .map(|record| feature(layer, record, region, links))
        .collect::<Vec<_>>();

    let mut document = Map::new();
    document.insert("type".to_owned(), json!("FeatureCollection"));
    document.insert("name".to_owned(), json!(name));
    document.insert("crs".to_owned(), json!({"type": "name", "properties": {"name": CRS84}}));
    document.insert("features".to_owned(), serde_json::to_value(&features)?);
    Ok(Value::Object(document))
}

/// Writes one partition as 4-space indented GeoJSON. The document is
/// serialized once with the final indentation; reparsing and re-indenting
/// the file yields the same bytes.
pub fn write_geojson(
    path: &Path,
    layer: &SurveyLayer,
    records: &[&CleanRecord],
    region: Option<&str>,
    links: &ImageLinks,
) -> Result<(), ConvertError> {
    let document = feature_collection(&file_stem(path), layer, records, region, links)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    document.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
