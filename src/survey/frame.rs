use crate::spreadsheet::cell::CellValue;
use crate::survey::geometry::GeometryKind;
use crate::survey::geometry::SurveyGeometry;

/// One data row of a reconciled sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRow {
    /// 1-indexed worksheet row the values were read from.
    pub excel_row: usize,
    pub values: Vec<CellValue>,
}

/// A sheet after header reconciliation: unique lowercase column names and the
/// data rows below the header block, in sheet order.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetFrame {
    pub sheet: String,
    pub columns: Vec<String>,
    pub rows: Vec<FrameRow>,
}

impl SheetFrame {
    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|row| row.values.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// One survey entry with a resolved geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanRecord {
    pub excel_row: usize,
    /// Values aligned with [`SurveyLayer::fields`].
    pub values: Vec<CellValue>,
    pub geometry: SurveyGeometry,
}

/// Every record of one sheet, ready for the writers.
#[derive(Clone, Debug, PartialEq)]
pub struct SurveyLayer {
    /// Workbook file name including extension, e.g. `Survey Ruas 12.xlsx`.
    pub workbook: String,
    pub sheet: String,
    pub kind: GeometryKind,
    /// Title-cased output property names.
    pub fields: Vec<String>,
    /// Index into `fields` of the sign name column, if the sheet has one.
    pub sign_name: Option<usize>,
    pub records: Vec<CleanRecord>,
}

impl SurveyLayer {
    /// `(name, value)` pairs of one record, in field order.
    pub fn properties<'a>(&'a self, record: &'a CleanRecord) -> impl Iterator<Item = (&'a str, &'a CellValue)> + 'a {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(record.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn value_outside_frame_is_empty() {
        let frame = SheetFrame {
            sheet: "Rambu".to_owned(),
            columns: vec!["no".to_owned(), "nama rambu".to_owned()],
            rows: vec![FrameRow { excel_row: 7, values: vec![CellValue::Number(1.0)] }],
        };
        assert_eq!(frame.value(0, 0), &CellValue::Number(1.0));
        assert_eq!(frame.value(0, 1), &CellValue::Empty);
        assert_eq!(frame.value(3, 0), &CellValue::Empty);
    }

    #[test]
    fn properties_pair_fields_with_values() {
        let layer = SurveyLayer {
            workbook: "Survey.xlsx".to_owned(),
            sheet: "Rambu".to_owned(),
            kind: GeometryKind::Point,
            fields: vec!["No".to_owned(), "Nama Rambu".to_owned()],
            sign_name: Some(1),
            records: vec![CleanRecord {
                excel_row: 7,
                values: vec![CellValue::Number(1.0), CellValue::from("Dilarang Parkir")],
                geometry: SurveyGeometry::Point(Point::new(106.8, -6.4)),
            }],
        };
        let properties: Vec<_> = layer.properties(&layer.records[0]).collect();
        assert_eq!(properties[1], ("Nama Rambu", &CellValue::from("Dilarang Parkir")));
    }
}
