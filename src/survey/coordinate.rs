//! Latitude/longitude normalization.
//!
//! Survey coordinates arrive as plain decimals, comma-grouped integers
//! (`"-6,448,977"`), integers scaled by 10^3..10^7 and degree-minute-second
//! strings (`107°18'40.74"E`). Every accepted value ends up in signed decimal
//! degrees inside the valid range of its axis.

use crate::spreadsheet::cell::CellValue;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static GROUPED_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+$").expect("Hardcode regex pattern"));

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn limit(&self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn in_range(&self, value: f64) -> bool {
        value.is_finite() && value.abs() <= self.limit()
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Latitude => f.write_str("latitude"),
            Axis::Longitude => f.write_str("longitude"),
        }
    }
}

/// Why a single coordinate value was rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinateFailure {
    Unparseable(Axis, String),
    OutOfRange(Axis, String),
}

impl Display for CoordinateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateFailure::Unparseable(axis, value) => write!(f, "Failed to parse {axis}: {value}"),
            CoordinateFailure::OutOfRange(Axis::Latitude, value) => write!(f, "Latitude out of range: {value}"),
            CoordinateFailure::OutOfRange(Axis::Longitude, value) => write!(f, "Longitude out of range: {value}"),
        }
    }
}

/// One row of the coordinate error log.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateErrorEntry {
    pub excel_file: String,
    pub sheet: String,
    /// 1-indexed worksheet row.
    pub row: usize,
    pub original_lat: String,
    pub original_lon: String,
    pub error: String,
}

impl CoordinateErrorEntry {
    pub fn summary(&self) -> String {
        format!("File: {}, Sheet: {}, Row: {}, Error: {}", self.excel_file, self.sheet, self.row, self.error)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Degree-minute-second text such as `6°17'23.45"S`. Requires a degree sign.
pub fn parse_dms(text: &str) -> Option<f64> {
    let upper = text.trim().to_uppercase();
    let negative = upper.ends_with('S') || upper.ends_with('W');
    let cleaned: String = upper
        .chars()
        .filter(|c| !matches!(c, 'N' | 'S' | 'E' | 'W' | '"' | '″'))
        .map(|c| if c == '′' { '\'' } else { c })
        .collect();

    let (degrees, rest) = cleaned.split_once('°')?;
    let degrees_negative = degrees.trim().starts_with('-');
    let degrees = parse_number(degrees)?.abs();
    let (minutes, seconds) = match rest.split_once('\'') {
        Some((minutes, seconds)) => {
            let seconds = if seconds.trim().is_empty() { 0.0 } else { parse_number(seconds)? };
            (parse_number(minutes)?, seconds)
        }
        None if rest.trim().is_empty() => (0.0, 0.0),
        None => (parse_number(rest)?, 0.0),
    };

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    Some(if negative || degrees_negative { -value } else { value })
}

/// Reads a raw cell as a number without any range handling.
pub fn parse_coordinate(value: &CellValue, allow_dms: bool) -> Option<f64> {
    match value {
        CellValue::Number(number) => Some(*number).filter(|number| number.is_finite()),
        CellValue::Text(text) => {
            let trimmed = text.trim().replace('\'', "");
            if let Some(number) = parse_number(&trimmed.replace(',', ".")) {
                return Some(number);
            }
            // Only reached with two or more groups, a single comma is a decimal mark.
            if GROUPED_INTEGER.is_match(&trimmed) {
                return parse_number(&trimmed.replace(',', ""));
            }
            if allow_dms {
                if let Some(number) = parse_dms(text) {
                    return Some(number);
                }
            }
            parse_number(text)
        }
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Undoes the integer scaling survey tools apply to degrees.
pub fn rescale(value: f64, axis: Axis) -> f64 {
    let magnitude = value.abs();
    match axis {
        Axis::Latitude => {
            let leading = format!("{}", magnitude.trunc() as u64);
            if magnitude > 1e6 && magnitude < 1e7 && leading.starts_with(['6', '7', '8', '9']) {
                value / 1e6
            } else if magnitude > 90.0 {
                if magnitude > 1e7 {
                    value / 1e7
                } else if magnitude > 1e6 {
                    value / 1e6
                } else if magnitude > 9e4 {
                    value / 1e3
                } else {
                    value
                }
            } else {
                value
            }
        }
        Axis::Longitude => {
            if magnitude > 1e8 && magnitude < 1.5e9 {
                value / 1e7
            } else if magnitude > 180.0 {
                if magnitude > 1e7 {
                    value / 1e7
                } else if magnitude > 1e6 {
                    value / 1e6
                } else if magnitude > 1.8e5 {
                    value / 1e3
                } else {
                    value
                }
            } else {
                value
            }
        }
    }
}

/// Parses, rescales and range-checks one coordinate value.
pub fn normalize(value: &CellValue, axis: Axis, allow_dms: bool) -> Result<f64, CoordinateFailure> {
    let parsed = parse_coordinate(value, allow_dms)
        .ok_or_else(|| CoordinateFailure::Unparseable(axis, value.to_string()))?;
    let scaled = rescale(parsed, axis);
    if axis.in_range(scaled) {
        return Ok(scaled);
    }
    let corrected = scaled / 100.0;
    if axis.in_range(corrected) {
        tracing::debug!("{axis} {parsed} accepted as {corrected} after /100 correction");
        return Ok(corrected);
    }
    Err(CoordinateFailure::OutOfRange(axis, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn decimals_in_range_are_idempotent() {
        for (value, axis) in [(-6.448977, Axis::Latitude), (89.9, Axis::Latitude), (106.81, Axis::Longitude), (-180.0, Axis::Longitude)] {
            let once = normalize(&CellValue::Number(value), axis, true).unwrap();
            let twice = normalize(&CellValue::Number(once), axis, true).unwrap();
            assert_eq!(once, value);
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn dms_strings_follow_hemisphere() {
        let cases = [
            ("107°18'40.74\"E", 107.0 + 18.0 / 60.0 + 40.74 / 3600.0),
            ("6°17'23.45\"S", -(6.0 + 17.0 / 60.0 + 23.45 / 3600.0)),
            ("0°30'0\"N", 0.5),
            ("95°1'2\"W", -(95.0 + 1.0 / 60.0 + 2.0 / 3600.0)),
        ];
        for (input, expected) in cases {
            let value = parse_coordinate(&text(input), true).unwrap();
            assert!(close(value, expected), "{input}: {value} != {expected}");
        }
        assert!(close(parse_dms("7°30'S").unwrap(), -7.5));
        assert_eq!(parse_dms("106.8"), None);
        assert_eq!(parse_coordinate(&text("107°18'40.74\"E"), false), None);
    }

    #[test]
    fn comma_grouped_integers_drop_grouping() {
        assert_eq!(parse_coordinate(&text("-6,448,977"), true), Some(-6448977.0));
        assert_eq!(parse_coordinate(&text("1,065,663,308"), true), Some(1065663308.0));
        assert_eq!(parse_coordinate(&text("-6,448977"), true), Some(-6.448977));
        assert_eq!(parse_coordinate(&text("'106.81"), true), Some(106.81));
        assert_eq!(parse_coordinate(&text("abc"), true), None);
        assert_eq!(parse_coordinate(&text("inf"), true), None);
        assert_eq!(parse_coordinate(&CellValue::Empty, true), None);
    }

    #[test]
    fn single_comma_is_a_decimal_mark() {
        assert_eq!(parse_coordinate(&text("-6,448"), true), Some(-6.448));
        assert_eq!(parse_coordinate(&text("106,812"), true), Some(106.812));
        assert_eq!(normalize(&text("-6,448"), Axis::Latitude, true), Ok(-6.448));
        assert_eq!(normalize(&text("106,812"), Axis::Longitude, true), Ok(106.812));
    }

    #[test]
    fn scaled_indonesian_coordinates() {
        assert!(close(normalize(&CellValue::Number(-6448977.0), Axis::Latitude, true).unwrap(), -6.448977));
        assert!(close(normalize(&CellValue::Number(1068123456.0), Axis::Longitude, true).unwrap(), 106.8123456));
        assert!(close(normalize(&text("-6,448,977"), Axis::Latitude, true).unwrap(), -6.448977));
        assert!(close(normalize(&CellValue::Number(-69694951.0), Axis::Latitude, true).unwrap(), -6.9694951));
        assert!(close(normalize(&CellValue::Number(106812.0), Axis::Latitude, true).unwrap(), 106.812 / 100.0));
        assert!(close(normalize(&CellValue::Number(106812345.0), Axis::Longitude, true).unwrap(), 10.6812345));
        assert!(close(normalize(&CellValue::Number(1068123.0), Axis::Longitude, true).unwrap(), 1.068123));
    }

    #[test]
    fn scaling_is_not_symmetric() {
        assert_eq!(rescale(6448977.0, Axis::Latitude), 6.448977);
        assert_eq!(rescale(5448977.0, Axis::Latitude), 5.448977);
        assert_eq!(rescale(150.0, Axis::Longitude), 150.0);
        assert_eq!(rescale(150.0, Axis::Latitude), 150.0);
    }

    #[test]
    fn second_correction_divides_by_hundred() {
        assert_eq!(normalize(&CellValue::Number(645.0), Axis::Latitude, true), Ok(6.45));
        assert_eq!(normalize(&CellValue::Number(10681.0), Axis::Longitude, true), Ok(106.81));
    }

    #[test]
    fn failures_carry_messages() {
        let failure = normalize(&text("x"), Axis::Latitude, true).unwrap_err();
        assert_eq!(failure.to_string(), "Failed to parse latitude: x");
        let failure = normalize(&CellValue::Number(50000.0), Axis::Longitude, true).unwrap_err();
        assert_eq!(failure.to_string(), "Longitude out of range: 50000");
        let failure = normalize(&CellValue::Number(9500.0), Axis::Latitude, true).unwrap_err();
        assert_eq!(failure.to_string(), "Latitude out of range: 9500");
    }

    #[test]
    fn error_summary_format() {
        let entry = CoordinateErrorEntry {
            excel_file: "Survey.xlsx".to_owned(),
            sheet: "Rambu".to_owned(),
            row: 9,
            original_lat: "x".to_owned(),
            original_lon: "106.8".to_owned(),
            error: "Failed to parse latitude: x".to_owned(),
        };
        assert_eq!(entry.summary(), "File: Survey.xlsx, Sheet: Rambu, Row: 9, Error: Failed to parse latitude: x");
    }
}
