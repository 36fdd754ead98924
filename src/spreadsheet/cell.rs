use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// Value of one worksheet cell after formula results and shared strings are resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Blank means no value or text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text used when a cell takes part in header names or file names.
    pub fn to_trimmed_string(&self) -> String {
        self.to_string().trim().to_owned()
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
            CellValue::Number(value) => f.write_str(&format_number(*value)),
            CellValue::Text(text) => f.write_str(text),
        }
    }
}

/// Integral values print without a fractional part, everything else in shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// How a numeric cell is rendered, decided by its number format.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum NumberFormat {
    #[default]
    General,
    Date,
    DateTime,
    Time,
}

impl NumberFormat {
    /// Built-in format ids that Excel reserves for dates and times.
    pub(crate) fn parse_builtin_number_format_id(id: &str) -> Option<Self> {
        match id {
            "22" => Some(Self::DateTime),
            "14" | "15" | "16" | "17" => Some(Self::Date),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::Time),
            _ => None,
        }
    }

    /// Scans a custom format code for date and time tokens outside of
    /// literals, escapes and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::General,
        }
    }

    /// Renders a serial number; `None` when the serial cannot be a calendar date.
    pub(crate) fn render(&self, serial: f64, is_1904: bool) -> Option<CellValue> {
        let text = match self {
            Self::General => return Some(CellValue::Number(serial)),
            Self::Date => to_date_string(serial, is_1904)?,
            Self::DateTime => to_datetime_string(serial, is_1904)?,
            Self::Time => to_time_string(serial),
        };
        Some(CellValue::Text(text))
    }
}

/// Serial day number to `YYYY-MM-DD`, honouring the Lotus 1-2-3 leap-year bug of the 1900 system.
pub(crate) fn to_date_string(serial: f64, is_1904: bool) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)? + Duration::days(days + offset);
    Some(date.format("%Y-%m-%d").to_string())
}

pub(crate) fn to_time_string(serial: f64) -> String {
    let mut rest = (serial.fract().abs() * 86_400_000f64).round() as i64;
    let milliseconds = rest % 1_000;
    rest /= 1_000;
    let seconds = rest % 60;
    rest /= 60;
    let minutes = rest % 60;
    let hours = rest / 60;
    if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

pub(crate) fn to_datetime_string(serial: f64, is_1904: bool) -> Option<String> {
    let date = to_date_string(serial, is_1904)?;
    Some(format!("{date} {}", to_time_string(serial)))
}
