//! ESRI Shapefile output with `.prj`, `.cpg` and QML sidecars.

use crate::error::ConvertError;
use crate::helpers::path::file_stem;
use crate::output::OutputError;
use crate::survey::frame::CleanRecord;
use crate::survey::frame::SurveyLayer;
use crate::survey::geometry::SurveyGeometry;
use shapefile::dbase::FieldName;
use shapefile::dbase::FieldValue;
use shapefile::dbase::Record;
use shapefile::dbase::TableWriterBuilder;
use shapefile::Multipoint;
use shapefile::Point;
use shapefile::Polyline;
use shapefile::Writer;
use std::path::Path;

/// Attribute holding the region name.
pub const REGION_FIELD: &str = "NAMOBJ";

const FIELD_NAME_LENGTH: usize = 10;
const FIELD_BASE_LENGTH: usize = 7;
const CHARACTER_FIELD_LENGTH: u8 = 254;

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

fn prefix_chars(value: &str, count: usize) -> String {
    value.chars().take(count).collect()
}

/// Longest prefix that fits in `max` bytes without splitting a character.
fn prefix_bytes(value: &str, max: usize) -> &str {
    let mut end = value.len().min(max);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Shortens attribute names for the 10-character dBASE limit.
///
/// Names mentioning `name`/`nama` (and the region field) are cut to ten
/// characters and never suffixed, so two of them may collide. Every other
/// name is cut to seven characters and suffixed `_1`, `_2`, ... while it
/// collides with an earlier name and is shorter than ten characters.
pub fn truncate_field_names(names: &[String]) -> Vec<String> {
    let mut used: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let lower = name.to_lowercase();
        let short = if lower.contains("name") || lower.contains("nama") || name == REGION_FIELD {
            prefix_chars(name, FIELD_NAME_LENGTH)
        } else {
            let base = prefix_chars(name, FIELD_BASE_LENGTH);
            let mut candidate = base.clone();
            let mut suffix = 1;
            while used.contains(&candidate) && candidate.chars().count() < FIELD_NAME_LENGTH {
                candidate = prefix_chars(&format!("{base}_{suffix}"), FIELD_NAME_LENGTH);
                suffix += 1;
            }
            candidate
        };
        used.push(short);
    }
    used
}

fn to_points(coords: impl Iterator<Item = geo::Coord<f64>>) -> Vec<Point> {
    coords.map(|coord| Point::new(coord.x, coord.y)).collect()
}

fn character_value(text: String) -> FieldValue {
    if text.is_empty() {
        FieldValue::Character(None)
    } else {
        FieldValue::Character(Some(prefix_bytes(&text, CHARACTER_FIELD_LENGTH as usize).to_owned()))
    }
}

/// Writes one partition as `.shp`/`.shx`/`.dbf` plus `.prj` and `.cpg`, and
/// copies the matching `.qml` style when a styles folder is given.
pub fn write_shapefile(
    path: &Path,
    layer: &SurveyLayer,
    records: &[&CleanRecord],
    region: Option<&str>,
    styles: Option<&Path>,
) -> Result<(), ConvertError> {
    let mut names = layer.fields.clone();
    if region.is_some() {
        names.push(REGION_FIELD.to_owned());
    }
    let short_names = truncate_field_names(&names);
    let mut columns: Vec<String> = Vec::with_capacity(short_names.len());
    let mut table = TableWriterBuilder::new();
    for short in &short_names {
        let column = prefix_bytes(short, FIELD_NAME_LENGTH).to_owned();
        if columns.contains(&column) {
            tracing::warn!("Field name '{column}' repeats in '{}', values of the later column win", path.display());
            continue;
        }
        let field = FieldName::try_from(column.as_str()).map_err(|e| OutputError::FieldNameError(format!("{column}: {e:?}")))?;
        table = table.add_character_field(field, CHARACTER_FIELD_LENGTH);
        columns.push(column);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = Writer::from_path(path, table)?;
    for record in records {
        let mut row = Record::default();
        for (short, (_, value)) in short_names.iter().zip(layer.properties(record)) {
            row.insert(prefix_bytes(short, FIELD_NAME_LENGTH).to_owned(), character_value(value.to_string()));
        }
        if let Some(region) = region {
            row.insert(REGION_FIELD.to_owned(), character_value(region.to_owned()));
        }
        match &record.geometry {
            SurveyGeometry::Point(point) => writer.write_shape_and_record(&Point::new(point.x(), point.y()), &row)?,
            SurveyGeometry::LineString(line) => {
                writer.write_shape_and_record(&Polyline::new(to_points(line.coords().copied())), &row)?
            }
            SurveyGeometry::MultiPoint(points) => {
                let points = to_points(points.iter().map(|point| point.0));
                writer.write_shape_and_record(&Multipoint::new(points), &row)?
            }
        }
    }
    drop(writer);

    std::fs::write(path.with_extension("prj"), WGS84_PRJ)?;
    std::fs::write(path.with_extension("cpg"), "UTF-8")?;
    if let Some(styles) = styles {
        copy_style(path, styles)?;
    }
    Ok(())
}

/// Styles are looked up by the last `_`-separated part of the file name.
fn copy_style(path: &Path, styles: &Path) -> Result<(), ConvertError> {
    let stem = file_stem(path);
    let style_name = stem.rsplit('_').next().unwrap_or(&stem);
    let source = styles.join(format!("{style_name}.qml"));
    if !source.is_file() {
        tracing::warn!("No QML file found for {style_name}");
        return Ok(());
    }
    let target = path.with_extension("qml");
    std::fs::copy(&source, &target)?;
    tracing::info!("Applied QML style: {}", target.display());
    Ok(())
}
