//! Geometry choice per sheet and the geometry of each survey row.

use geo::Coord;
use geo::Geometry;
use geo::LineString;
use geo::MultiPoint;
use geo::Point;

/// Offset of the second vertex of a guardrail segment that only has a start point.
pub const DEGENERATE_OFFSET: f64 = 0.0001;

const MARKA: &str = "marka";
const PAGAR_PENGAMAN: &str = "pagar pengaman";

/// Geometry type chosen once per sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    /// Road markings: the valid start/end points of a row as a point set.
    Marka,
    /// Guardrails: a segment from start to end.
    PagarPengaman,
    Point,
}

/// Normalized start and end coordinates of one row (`x` = longitude, `y` = latitude).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RowCoordinates {
    pub start: Option<Coord<f64>>,
    pub end: Option<Coord<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SurveyGeometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    MultiPoint(MultiPoint<f64>),
}

impl SurveyGeometry {
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            SurveyGeometry::Point(point) => Geometry::Point(*point),
            SurveyGeometry::LineString(line) => Geometry::LineString(line.clone()),
            SurveyGeometry::MultiPoint(points) => Geometry::MultiPoint(points.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SurveyGeometry::Point(_) => "Point",
            SurveyGeometry::LineString(_) => "LineString",
            SurveyGeometry::MultiPoint(_) => "MultiPoint",
        }
    }
}

/// Sheet category flags derived from the sheet name and its column names.
pub fn detect_categories(sheet_name: &str, columns: &[String]) -> (bool, bool) {
    let sheet_name = sheet_name.to_lowercase();
    let mentions = |needle: &str| sheet_name.contains(needle) || columns.iter().any(|column| column.to_lowercase().contains(needle));
    (mentions(MARKA), mentions(PAGAR_PENGAMAN))
}

impl GeometryKind {
    /// Marking sheets always become point sets. Guardrail sheets become segments
    /// only when end columns exist and some row has both points valid.
    pub fn choose(is_marka: bool, is_pagar: bool, has_end_columns: bool, rows: &[RowCoordinates]) -> Self {
        if is_marka {
            return GeometryKind::Marka;
        }
        let complete_pair = rows.iter().any(|row| row.start.is_some() && row.end.is_some());
        if is_pagar && has_end_columns && complete_pair {
            GeometryKind::PagarPengaman
        } else {
            GeometryKind::Point
        }
    }

    /// Geometry of one row, `None` when the row lacks the coordinates this kind needs.
    pub fn build(&self, row: &RowCoordinates) -> Option<SurveyGeometry> {
        match self {
            GeometryKind::Marka => {
                let points: Vec<Point<f64>> = [row.start, row.end].into_iter().flatten().map(Point::from).collect();
                (!points.is_empty()).then(|| SurveyGeometry::MultiPoint(MultiPoint::new(points)))
            }
            GeometryKind::PagarPengaman => {
                let start = row.start?;
                let end = row.end.unwrap_or(Coord {
                    x: start.x + DEGENERATE_OFFSET,
                    y: start.y + DEGENERATE_OFFSET,
                });
                Some(SurveyGeometry::LineString(LineString::new(vec![start, end])))
            }
            GeometryKind::Point => row.start.map(|start| SurveyGeometry::Point(Point::from(start))),
        }
    }
}
