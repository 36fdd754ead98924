//! Recovers a flat header from survey sheets.
//!
//! Survey templates put a title block above the table, a header row holding a
//! `NO` column, one separator row, and then a two-row header whose upper row
//! is usually merged across several sub-columns:
//!
//! ```text
//! | DATA RAMBU JALAN                                |
//! | NO | NAMA RAMBU | KOORDINAT AWAL      | REKAP   |   <- anchor row
//! |    |            |                     |         |   <- separator
//! | NO | NAMA RAMBU | KOORDINAT AWAL (merged)       |
//! |    |            | LATITUDE | LONGITUDE | REKAP  |
//! | 1  | Stop       | -6.44    | 106.81    | 1      |   <- data
//! ```

use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::RawSheet;
use crate::survey::frame::FrameRow;
use crate::survey::frame::SheetFrame;
use crate::survey::SkipReason;
use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

const ANCHOR_TOKEN: &str = "no";
const REKAP: &str = "rekap";

static NONE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^None$|None_").expect("Hardcode regex pattern"));
static NONE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\sNone\b").expect("Hardcode regex pattern"));

fn contains_rekap(name: &str) -> bool {
    name.to_lowercase().contains(REKAP)
}

/// First row holding a text cell that contains `no` in any letter case.
pub fn find_anchor_row(sheet: &RawSheet) -> Option<usize> {
    (0..sheet.height()).find(|&row| {
        (0..sheet.width()).any(|col| {
            sheet
                .get(row, col)
                .as_text()
                .map(|text| text.to_lowercase().contains(ANCHOR_TOKEN))
                .unwrap_or(false)
        })
    })
}

/// Header text of one cell. Literal `None`/`nan` strings count as blank.
fn header_text(value: &CellValue) -> String {
    let text = value.to_string();
    match text.as_str() {
        "None" | "nan" => String::new(),
        _ => text.trim().to_owned(),
    }
}

/// Merges the two physical header cells of one column. `None` marks a REKAP
/// column for removal; `position` is the column's index among all merged columns.
pub fn merge_header_cells(upper: &str, lower: &str, position: usize) -> Option<String> {
    if contains_rekap(upper) || contains_rekap(lower) {
        return None;
    }
    let merged = match (upper.is_empty(), lower.is_empty()) {
        (true, true) => format!("Column_{position}"),
        (true, false) => lower.to_owned(),
        (false, true) => upper.to_owned(),
        (false, false) => {
            let (upper_lower, lower_lower) = (upper.to_lowercase(), lower.to_lowercase());
            if lower_lower.contains(&upper_lower) {
                lower.to_owned()
            } else if upper_lower.contains(&lower_lower) {
                upper.to_owned()
            } else {
                format!("{upper} {lower}")
            }
        }
    };
    Some(merged)
}

/// Renames repeated names to `name_1`, `name_2`, ... in first-seen order.
/// A suffixed candidate that is already taken is skipped.
pub fn unique_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();
    for name in names {
        if used.insert(name.clone()) {
            counters.entry(name.clone()).or_insert(0);
            unique.push(name);
            continue;
        }
        let counter = counters.entry(name.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{name}_{counter}");
            if used.insert(candidate.clone()) {
                unique.push(candidate);
                break;
            }
        }
    }
    unique
}

/// Reconciles the header of a raw sheet and returns the data rows under it.
///
/// Merged ranges are filled first. Columns blank in every row are dropped, and
/// REKAP columns are filtered after the anchor row is read, after the two header
/// rows are merged and again after lowercasing.
pub fn reconcile(mut sheet: RawSheet, drop_blank_rows: bool) -> Result<SheetFrame, SkipReason> {
    sheet.unmerge();
    let height = sheet.height();
    if height < 3 {
        return Err(SkipReason::TooFewRows);
    }
    let anchor = find_anchor_row(&sheet).ok_or(SkipReason::NoHeaderRow)?;

    let mut columns: Vec<usize> = (0..sheet.width())
        .filter(|&col| (0..height).any(|row| *sheet.get(row, col) != CellValue::Empty))
        .collect();
    columns.retain(|&col| !contains_rekap(&sheet.get(anchor, col).to_string()));

    let upper_row = anchor + 2;
    if height <= upper_row {
        return Err(SkipReason::NoDataRows);
    }
    if height < upper_row + 2 {
        return Err(SkipReason::NotEnoughHeaderRows);
    }

    let mut merged: Vec<Option<String>> = Vec::with_capacity(columns.len());
    for &col in &columns {
        let upper = header_text(sheet.get(upper_row, col));
        let lower = header_text(sheet.get(upper_row + 1, col));
        let position = merged.len();
        merged.push(merge_header_cells(&upper, &lower, position));
    }

    let kept: Vec<(usize, String)> = columns
        .into_iter()
        .zip(merged)
        .filter_map(|(col, name)| name.map(|name| (col, name)))
        .filter(|(_, name)| !contains_rekap(name))
        .collect();
    let (columns, names): (Vec<usize>, Vec<String>) = kept.into_iter().unzip();
    let names = unique_names(names);

    let (columns, names): (Vec<usize>, Vec<String>) = columns
        .into_iter()
        .zip(names.into_iter().map(|name| name.trim().to_lowercase()))
        .filter(|(_, name)| !contains_rekap(name))
        .unzip();
    let names = unique_names(names);

    let mut rows: Vec<FrameRow> = (upper_row + 2..height)
        .map(|row| FrameRow {
            excel_row: row + 1,
            values: columns.iter().map(|&col| sheet.get(row, col).clone()).collect(),
        })
        .collect();
    if drop_blank_rows {
        rows.retain(|row| !row.values.iter().all(CellValue::is_blank));
    }

    tracing::debug!("Sheet '{}': header anchored at row {}, {} columns, {} data rows", sheet.name, anchor + 1, names.len(), rows.len());
    Ok(SheetFrame { sheet: sheet.name, columns: names, rows })
}

/// Collapses a name whose words split into two equal halves: `no no` -> `no`.
fn collapse_repeated_halves(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() >= 2 && words.len() % 2 == 0 {
        let (first, second) = words.split_at(words.len() / 2);
        if first == second {
            return first.join(" ");
        }
    }
    name.to_owned()
}

/// Upper-cases the first letter of each word and lower-cases the rest.
fn capitalize_words(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Output property names for internal column names. `None` entries are
/// columns that must not appear in the output.
pub fn clean_output_names(columns: &[String]) -> Vec<Option<String>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    columns
        .iter()
        .map(|column| {
            let column = column.trim();
            if contains_rekap(column) {
                return None;
            }
            let mut name = capitalize_words(&collapse_repeated_halves(column));
            match seen.get_mut(&name) {
                Some(count) => {
                    *count += 1;
                    name = format!("{name} {count}");
                }
                None => {
                    seen.insert(name.clone(), 0);
                }
            }
            if NONE_NAME.is_match(&name) {
                return None;
            }
            Some(NONE_WORD.replace_all(&name, "").trim().to_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::spreadsheet::open_spreadsheet;
    use rust_xlsxwriter::Format;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn text(value: &str) -> CellValue {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::from(value)
        }
    }

    fn sheet(name: &str, rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(name, rows.iter().map(|row| row.iter().map(|value| text(value)).collect()).collect())
    }

    #[test]
    fn merge_rules_follow_precedence() {
        assert_eq!(merge_header_cells("REKAP", "Jumlah", 0), None);
        assert_eq!(merge_header_cells("Lokasi", "rekap total", 0), None);
        assert_eq!(merge_header_cells("", "", 4), Some("Column_4".to_owned()));
        assert_eq!(merge_header_cells("", "Latitude", 0), Some("Latitude".to_owned()));
        assert_eq!(merge_header_cells("Nama Rambu", "", 0), Some("Nama Rambu".to_owned()));
        assert_eq!(merge_header_cells("DOKUMENTASI", "Dokumentasi Jalan", 0), Some("Dokumentasi Jalan".to_owned()));
        assert_eq!(merge_header_cells("Koordinat Awal", "awal", 0), Some("Koordinat Awal".to_owned()));
        assert_eq!(merge_header_cells("Koordinat Awal", "Latitude", 0), Some("Koordinat Awal Latitude".to_owned()));
    }

    #[test]
    fn unique_names_suffix_repeats_in_order() {
        let names = ["Lokasi", "Lokasi", "No", "Lokasi", "Lokasi_1"].map(str::to_owned);
        assert_eq!(unique_names(names), vec!["Lokasi", "Lokasi_1", "No", "Lokasi_2", "Lokasi_1_1"]);
    }

    #[test]
    fn unique_names_never_repeat() {
        let names = ["a", "a_1", "a", "a", "a_1", "b"].map(str::to_owned);
        let unique = unique_names(names);
        let distinct: HashSet<&String> = unique.iter().collect();
        assert_eq!(distinct.len(), unique.len());
    }

    #[test]
    fn anchor_ignores_blank_and_numeric_cells() {
        let sheet = sheet("S", &[&["DATA SURVEI", ""], &["", ""], &["x", "Nomor"]]);
        assert_eq!(find_anchor_row(&sheet), Some(2));
        assert_eq!(find_anchor_row(&RawSheet::from_rows("S", vec![vec![CellValue::Number(1.0)]])), None);
    }

    #[test]
    fn sheet_without_anchor_is_skipped() {
        let sheet = sheet("S", &[&["A", "B"], &["1", "2"], &["3", "4"], &["5", "6"]]);
        assert_eq!(reconcile(sheet, true), Err(SkipReason::NoHeaderRow));
    }

    #[test]
    fn short_sheets_are_skipped() {
        assert_eq!(reconcile(sheet("S", &[&["NO"], &["1"]]), true), Err(SkipReason::TooFewRows));
        assert_eq!(reconcile(sheet("S", &[&["x"], &["x"], &["NO"]]), true), Err(SkipReason::NoDataRows));
        assert_eq!(reconcile(sheet("S", &[&["NO"], &[""], &["NO"]]), true), Err(SkipReason::NotEnoughHeaderRows));
    }

    #[test]
    fn reconcile_merges_two_header_rows() {
        let mut raw = sheet(
            "Rambu",
            &[
                &["NO", "NAMA RAMBU", "KOORDINAT AWAL", "", "REKAP", ""],
                &["", "", "", "", "", ""],
                &["NO", "NAMA RAMBU", "KOORDINAT AWAL", "", "Lokasi", "Lokasi"],
                &["", "", "LATITUDE", "LONGITUDE", "", ""],
                &["1", "Stop", "-6.44", "106.81", "x", "y"],
                &["", "", "", "", "", ""],
                &["2", "Parkir", "-6.45", "106.82", "", ""],
            ],
        );
        raw.add_merge(crate::spreadsheet::reference::MergedRange::parse("C3:D3").unwrap());

        let frame = reconcile(raw, true).unwrap();
        assert_eq!(
            frame.columns,
            vec!["no", "nama rambu", "koordinat awal latitude", "koordinat awal longitude", "lokasi"]
        );
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].excel_row, 5);
        assert_eq!(frame.rows[1].excel_row, 7);
        assert_eq!(frame.rows[1].values[1], CellValue::from("Parkir"));
    }

    #[test]
    fn vertical_merges_fill_header_and_data_rows() -> Result<(), ConvertError> {
        let dir = tempdir()?;
        let path = dir.path().join("survey.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Rambu")?;
        for (col, title) in ["NO", "NAMA RAMBU", "KOORDINAT AWAL"].into_iter().enumerate() {
            worksheet.write_string(0, col as u16, title)?;
        }
        worksheet.write_string(0, 4, "RUAS")?;
        worksheet.merge_range(2, 0, 3, 0, "NO", &Format::new())?;
        worksheet.merge_range(2, 1, 3, 1, "NAMA RAMBU", &Format::new())?;
        worksheet.merge_range(2, 2, 2, 3, "KOORDINAT AWAL", &Format::new())?;
        worksheet.write_string(3, 2, "LATITUDE")?;
        worksheet.write_string(3, 3, "LONGITUDE")?;
        worksheet.merge_range(2, 4, 3, 4, "RUAS", &Format::new())?;
        for (row, (name, lat, lon)) in [("Stop", -6.44, 106.81), ("Parkir", -6.45, 106.82)].into_iter().enumerate() {
            let row = row as u32 + 4;
            worksheet.write_number(row, 0, f64::from(row - 3))?;
            worksheet.write_string(row, 1, name)?;
            worksheet.write_number(row, 2, lat)?;
            worksheet.write_number(row, 3, lon)?;
        }
        worksheet.merge_range(4, 4, 5, 4, "Jl. Merdeka", &Format::new())?;
        workbook.save(&path)?;

        let raw = open_spreadsheet(&path)?.read_sheet("Rambu")?;
        assert_eq!(raw.get(3, 0), &CellValue::Empty);
        let frame = reconcile(raw, true).unwrap();
        assert_eq!(
            frame.columns,
            vec!["no", "nama rambu", "koordinat awal latitude", "koordinat awal longitude", "ruas"]
        );
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].excel_row, 5);
        for row in &frame.rows {
            assert_eq!(row.values[4], CellValue::from("Jl. Merdeka"));
        }
        Ok(())
    }

    #[test]
    fn blank_rows_survive_when_filter_is_off() {
        let raw = sheet("S", &[&["NO", "A"], &["", ""], &["NO", "A"], &["", "B"], &["1", "x"], &["", ""], &["2", "y"]]);
        assert_eq!(reconcile(raw.clone(), false).unwrap().rows.len(), 3);
        assert_eq!(reconcile(raw, true).unwrap().rows.len(), 2);
    }

    #[test]
    fn documentation_header_keeps_single_occurrence() {
        let raw = sheet(
            "Dokumentasi",
            &[&["NO", "FOTO"], &["", ""], &["NO", ""], &["", "DOKUMENTASI Jalan"], &["1", ""]],
        );
        let frame = reconcile(raw, false).unwrap();
        assert_eq!(frame.columns, vec!["no", "dokumentasi jalan"]);
        assert_eq!(clean_output_names(&frame.columns)[1], Some("Dokumentasi Jalan".to_owned()));
    }

    #[test]
    fn identical_merged_names_get_suffix() {
        let raw = sheet(
            "Jalan",
            &[&["NO", "", ""], &["", "", ""], &["NO", "Lokasi", "Lokasi "], &["", "", ""], &["1", "a", "b"]],
        );
        let frame = reconcile(raw, false).unwrap();
        assert_eq!(frame.columns, vec!["no", "lokasi", "lokasi_1"]);
    }

    #[test]
    fn repeated_upper_and_lower_rows_collapse() {
        assert_eq!(collapse_repeated_halves("detail lokasi detail lokasi"), "detail lokasi");
        assert_eq!(collapse_repeated_halves("no no"), "no");
        assert_eq!(collapse_repeated_halves("no nama"), "no nama");
        assert_eq!(collapse_repeated_halves("a b a"), "a b a");
    }

    #[test]
    fn output_names_are_title_cased_and_cleaned() {
        let columns = ["no", "detail lokasi detail lokasi", "KONDISI", "kondisi", "none", "none_1", "jenis none", "rekap"]
            .map(str::to_owned);
        assert_eq!(
            clean_output_names(&columns),
            vec![
                Some("No".to_owned()),
                Some("Detail Lokasi".to_owned()),
                Some("Kondisi".to_owned()),
                Some("Kondisi 1".to_owned()),
                None,
                None,
                Some("Jenis".to_owned()),
                None,
            ]
        );
    }
}
