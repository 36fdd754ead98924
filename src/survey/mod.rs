//! Sheet-to-record pipeline: header reconciliation, coordinate normalization,
//! column role resolution and geometry synthesis.

pub mod columns;
pub mod coordinate;
pub mod frame;
pub mod geometry;
pub mod header;

use crate::config::PipelineConfig;
use crate::spreadsheet::sheet::RawSheet;
use crate::survey::columns::ColumnRoles;
use crate::survey::coordinate::normalize;
use crate::survey::coordinate::Axis;
use crate::survey::coordinate::CoordinateErrorEntry;
use crate::survey::frame::CleanRecord;
use crate::survey::frame::SheetFrame;
use crate::survey::frame::SurveyLayer;
use crate::survey::geometry::detect_categories;
use crate::survey::geometry::GeometryKind;
use crate::survey::geometry::RowCoordinates;
use crate::survey::header::clean_output_names;
use crate::survey::header::reconcile;
use geo::Coord;
use std::fmt::Display;

/// Why a sheet produced no records. Skips are expected and never abort a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    TooFewRows,
    NoHeaderRow,
    NoDataRows,
    NotEnoughHeaderRows,
    NoStartCoordinateColumns,
    NoStartCoordinates,
    NoValidCoordinates,
    NoValidGeometry,
    NotSelected,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            SkipReason::TooFewRows => "empty sheet or insufficient data",
            SkipReason::NoHeaderRow => "no header row with 'NO' found",
            SkipReason::NoDataRows => "not enough data rows after header",
            SkipReason::NotEnoughHeaderRows => "not enough rows for headers",
            SkipReason::NoStartCoordinateColumns => "no valid start coordinate columns found",
            SkipReason::NoStartCoordinates => "no start coordinate values found",
            SkipReason::NoValidCoordinates => "no valid coordinates found in MARKA sheet",
            SkipReason::NoValidGeometry => "no valid geometry found",
            SkipReason::NotSelected => "not selected by sheet filter",
        };
        f.write_str(message)
    }
}

/// Normalizes one coordinate pair of a row, appending an error entry per failing axis.
fn normalize_pair(
    frame: &SheetFrame,
    workbook: &str,
    row: usize,
    (lat_col, lon_col): (usize, usize),
    parse_dms: bool,
    errors: &mut Vec<CoordinateErrorEntry>,
) -> Option<Coord<f64>> {
    let (lat, lon) = (frame.value(row, lat_col), frame.value(row, lon_col));
    if lat.is_blank() || lon.is_blank() {
        return None;
    }

    let latitude = normalize(lat, Axis::Latitude, parse_dms);
    let longitude = normalize(lon, Axis::Longitude, parse_dms);
    for failure in [latitude.as_ref().err(), longitude.as_ref().err()].into_iter().flatten() {
        let entry = CoordinateErrorEntry {
            excel_file: workbook.to_owned(),
            sheet: frame.sheet.to_owned(),
            row: frame.rows[row].excel_row,
            original_lat: lat.to_string(),
            original_lon: lon.to_string(),
            error: failure.to_string(),
        };
        tracing::warn!("{}", entry.summary());
        errors.push(entry);
    }
    Some(Coord { x: longitude.ok()?, y: latitude.ok()? })
}

fn has_any_pair(frame: &SheetFrame, (lat_col, lon_col): (usize, usize)) -> bool {
    (0..frame.rows.len()).any(|row| !frame.value(row, lat_col).is_blank() && !frame.value(row, lon_col).is_blank())
}

/// Turns one worksheet into a layer of geometry-bearing records.
///
/// Coordinate failures are appended to `errors` and only drop the affected
/// coordinate; structural problems skip the whole sheet.
pub fn process_sheet(
    workbook: &str,
    sheet: RawSheet,
    options: &PipelineConfig,
    errors: &mut Vec<CoordinateErrorEntry>,
) -> Result<SurveyLayer, SkipReason> {
    let frame = reconcile(sheet, options.drop_blank_rows)?;
    let (is_marka, is_pagar) = detect_categories(&frame.sheet, &frame.columns);

    let roles = ColumnRoles::resolve(&frame.columns);
    let start = roles.start().ok_or(SkipReason::NoStartCoordinateColumns)?;
    if !has_any_pair(&frame, start) {
        return Err(SkipReason::NoStartCoordinates);
    }
    let end = roles.end();

    let coordinates: Vec<RowCoordinates> = (0..frame.rows.len())
        .map(|row| RowCoordinates {
            start: normalize_pair(&frame, workbook, row, start, options.parse_dms, errors),
            end: end.and_then(|end| normalize_pair(&frame, workbook, row, end, options.parse_dms, errors)),
        })
        .collect();

    let kind = GeometryKind::choose(is_marka, is_pagar, end.is_some(), &coordinates);
    if kind == GeometryKind::Marka && coordinates.iter().all(|row| row.start.is_none() && row.end.is_none()) {
        return Err(SkipReason::NoValidCoordinates);
    }

    let excluded = roles.coordinate_columns();
    let (kept, fields): (Vec<usize>, Vec<String>) = clean_output_names(&frame.columns)
        .into_iter()
        .enumerate()
        .filter(|(col, _)| !excluded.contains(col))
        .filter_map(|(col, name)| name.map(|name| (col, name)))
        .unzip();

    let records: Vec<CleanRecord> = frame
        .rows
        .iter()
        .zip(&coordinates)
        .filter_map(|(row, coordinates)| {
            kind.build(coordinates).map(|geometry| CleanRecord {
                excel_row: row.excel_row,
                values: kept.iter().map(|&col| row.values.get(col).cloned().unwrap_or_default()).collect(),
                geometry,
            })
        })
        .collect();
    if records.is_empty() {
        return Err(SkipReason::NoValidGeometry);
    }
    let sign_name = roles.sign_name.and_then(|col| kept.iter().position(|&kept_col| kept_col == col));

    tracing::info!("Processing '{}' as {:?} geometry, {} records", frame.sheet, kind, records.len());
    Ok(SurveyLayer {
        workbook: workbook.to_owned(),
        sheet: frame.sheet,
        kind,
        fields,
        sign_name,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use crate::survey::geometry::SurveyGeometry;
    use crate::survey::geometry::DEGENERATE_OFFSET;

    fn cell(value: &str) -> CellValue {
        if value.is_empty() {
            CellValue::Empty
        } else if let Ok(number) = value.parse::<f64>() {
            CellValue::Number(number)
        } else {
            CellValue::from(value)
        }
    }

    /// A survey sheet with a two-row header block and the given data rows.
    fn survey_sheet(name: &str, header: &[(&str, &str)], data: &[&[&str]]) -> RawSheet {
        let mut rows = vec![
            header.iter().map(|(upper, _)| cell(if upper.is_empty() { "NO" } else { upper })).collect::<Vec<_>>(),
            vec![CellValue::Empty],
            header.iter().map(|(upper, _)| cell(upper)).collect(),
            header.iter().map(|(_, lower)| cell(lower)).collect(),
        ];
        rows.extend(data.iter().map(|row| row.iter().map(|value| cell(value)).collect()));
        RawSheet::from_rows(name, rows)
    }

    const START_END: [(&str, &str); 6] = [
        ("NO", ""),
        ("NAMA", ""),
        ("KOORDINAT AWAL", "LATITUDE"),
        ("KOORDINAT AWAL", "LONGITUDE"),
        ("KOORDINAT AKHIR", "LATITUDE"),
        ("KOORDINAT AKHIR", "LONGITUDE"),
    ];

    #[test]
    fn scaled_integers_become_degrees() {
        let sheet = survey_sheet(
            "Rambu",
            &[("NO", ""), ("NAMA RAMBU", ""), ("", "Latitude"), ("", "Longitude")],
            &[&["1", "Stop", "-6448977", "1068123456"], &["2", "Parkir", "-6448977", "1068123456"]],
        );
        let mut errors = Vec::new();
        let layer = process_sheet("Survey.xlsx", sheet, &PipelineConfig::default(), &mut errors).unwrap();

        assert!(errors.is_empty());
        assert_eq!(layer.kind, GeometryKind::Point);
        assert_eq!(layer.fields, vec!["No", "Nama Rambu"]);
        assert_eq!(layer.sign_name, Some(1));
        assert_eq!(layer.records.len(), 2);
        assert_eq!(layer.records[0].excel_row, 5);
        let SurveyGeometry::Point(point) = &layer.records[0].geometry else {
            panic!("expected point");
        };
        assert!((point.y() + 6.448977).abs() < 1e-9);
        assert!((point.x() - 106.8123456).abs() < 1e-9);
    }

    #[test]
    fn marka_sheet_with_start_only_yields_multipoints() {
        let sheet = survey_sheet(
            "Marka Jalan",
            &START_END,
            &[&["1", "Garis", "-6.4", "106.8", "", ""], &["2", "Zebra", "-6.5", "106.9", "", ""]],
        );
        let layer = process_sheet("Survey.xlsx", sheet, &PipelineConfig::default(), &mut Vec::new()).unwrap();
        assert_eq!(layer.kind, GeometryKind::Marka);
        assert_eq!(layer.fields, vec!["No", "Nama"]);
        assert_eq!(layer.sign_name, None);
        for record in &layer.records {
            let SurveyGeometry::MultiPoint(points) = &record.geometry else {
                panic!("expected multipoint");
            };
            assert_eq!(points.0.len(), 1);
        }
    }

    #[test]
    fn pagar_sheet_builds_segments() {
        let sheet = survey_sheet(
            "Pagar Pengaman",
            &START_END,
            &[&["1", "A", "-6.4", "106.8", "-6.41", "106.81"], &["2", "B", "-6.5", "106.9", "", ""], &["3", "C", "", "", "-6.5", "106.9"]],
        );
        let layer = process_sheet("Survey.xlsx", sheet, &PipelineConfig::default(), &mut Vec::new()).unwrap();
        assert_eq!(layer.kind, GeometryKind::PagarPengaman);
        assert_eq!(layer.records.len(), 2);
        let SurveyGeometry::LineString(line) = &layer.records[1].geometry else {
            panic!("expected line string");
        };
        assert_eq!(line.0[1].x, 106.9 + DEGENERATE_OFFSET);
        assert_eq!(line.0[1].y, -6.5 + DEGENERATE_OFFSET);
    }

    #[test]
    fn bad_coordinates_are_logged_and_dropped() {
        let sheet = survey_sheet(
            "Rambu",
            &[("NO", ""), ("", "Latitude"), ("", "Longitude")],
            &[&["1", "abc", "106.8"], &["2", "-6.4", "99999"], &["3", "-6.4", "106.8"], &["4", "", "106.8"]],
        );
        let mut errors = Vec::new();
        let layer = process_sheet("Survey.xlsx", sheet, &PipelineConfig::default(), &mut errors).unwrap();
        assert_eq!(layer.records.len(), 1);
        assert_eq!(layer.records[0].excel_row, 7);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row, 5);
        assert_eq!(errors[0].error, "Failed to parse latitude: abc");
        assert_eq!(errors[1].error, "Longitude out of range: 99999");
        assert_eq!(errors[1].original_lat, "-6.4");
    }

    #[test]
    fn structural_skips() {
        let mut errors = Vec::new();
        let options = PipelineConfig::default();

        let no_coordinates = survey_sheet("Data", &[("NO", ""), ("NAMA", "")], &[&["1", "a"]]);
        assert_eq!(process_sheet("S.xlsx", no_coordinates, &options, &mut errors), Err(SkipReason::NoStartCoordinateColumns));

        let blank = survey_sheet("Data", &[("NO", ""), ("", "Latitude"), ("", "Longitude")], &[&["1", "", ""]]);
        assert_eq!(process_sheet("S.xlsx", blank, &options, &mut errors), Err(SkipReason::NoStartCoordinates));

        let invalid = survey_sheet("Data", &[("NO", ""), ("", "Latitude"), ("", "Longitude")], &[&["1", "x", "y"]]);
        assert_eq!(process_sheet("S.xlsx", invalid, &options, &mut errors), Err(SkipReason::NoValidGeometry));

        let marka = survey_sheet("Marka", &[("NO", ""), ("", "Latitude"), ("", "Longitude")], &[&["1", "x", "y"]]);
        assert_eq!(process_sheet("S.xlsx", marka, &options, &mut errors), Err(SkipReason::NoValidCoordinates));

        let no_anchor = RawSheet::from_rows("Data", vec![vec![cell("A")], vec![cell("B")], vec![cell("C")]]);
        assert_eq!(process_sheet("S.xlsx", no_anchor, &options, &mut errors), Err(SkipReason::NoHeaderRow));
    }

    #[test]
    fn dms_can_be_disabled() {
        let sheet = || {
            survey_sheet(
                "Rambu",
                &[("NO", ""), ("", "Latitude"), ("", "Longitude")],
                &[&["1", "6°17'23.45\"S", "107°18'40.74\"E"]],
            )
        };
        assert!(process_sheet("S.xlsx", sheet(), &PipelineConfig::default(), &mut Vec::new()).is_ok());
        let options = PipelineConfig { parse_dms: false, ..PipelineConfig::default() };
        let mut errors = Vec::new();
        assert_eq!(process_sheet("S.xlsx", sheet(), &options, &mut errors), Err(SkipReason::NoValidGeometry));
        assert_eq!(errors.len(), 2);
    }
}
