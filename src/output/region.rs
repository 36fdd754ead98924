//! Administrative boundaries used to partition outputs by region.

use crate::error::ConvertError;
use crate::output::OutputError;
use crate::survey::geometry::SurveyGeometry;
use geo::BoundingRect;
use geo::Coord;
use geo::Geometry;
use geo::Intersects;
use geo::LineString;
use geo::MultiPolygon;
use geo::Polygon;
use geo::Rect;
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use shapefile::PolygonRing;
use shapefile::Shape;
use std::path::Path;

/// Region name of records that intersect no boundary.
pub const UNKNOWN_REGION: &str = "Unknown";

#[derive(Clone, Debug)]
struct Region {
    name: String,
    shape: MultiPolygon<f64>,
    bounds: Option<Rect<f64>>,
}

/// Named boundary polygons in file order.
#[derive(Clone, Debug, Default)]
pub struct RegionBoundaries {
    regions: Vec<Region>,
}

/// Builds polygons from shapefile rings: each outer ring opens a polygon and
/// the inner rings that follow become its holes.
fn rings_to_multipolygon<P>(rings: &[PolygonRing<P>], coord: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&coord).collect();
        match ring {
            PolygonRing::Outer(_) => polygons.push(Polygon::new(line, Vec::new())),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line),
                None => polygons.push(Polygon::new(line, Vec::new())),
            },
        }
    }
    MultiPolygon::new(polygons)
}

fn field_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => Some(text.trim().to_owned()),
        FieldValue::Numeric(Some(number)) => Some(number.to_string()),
        FieldValue::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

impl RegionBoundaries {
    /// Reads an ESRI Shapefile (`.shp` + `.dbf`) or a GeoJSON file.
    pub fn load(path: &Path, name_field: &str) -> Result<Self, ConvertError> {
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let boundaries = match extension.as_str() {
            "shp" => Self::load_shapefile(path, name_field)?,
            "geojson" | "json" => Self::load_geojson(path, name_field)?,
            _ => Err(OutputError::UnsupportedBoundaryError(path.display().to_string()))?,
        };
        if boundaries.regions.is_empty() {
            Err(OutputError::EmptyBoundaryError(path.display().to_string()))?
        }
        tracing::info!("Loaded {} region boundaries from '{}'", boundaries.regions.len(), path.display());
        Ok(boundaries)
    }

    fn load_shapefile(path: &Path, name_field: &str) -> Result<Self, ConvertError> {
        let mut boundaries = Self::default();
        for (shape, record) in shapefile::read(path)? {
            let shape = match shape {
                Shape::Polygon(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
                Shape::PolygonM(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
                Shape::PolygonZ(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
                other => {
                    tracing::debug!("Ignoring non-polygon boundary shape {:?}", other.shapetype());
                    continue;
                }
            };
            let name = record
                .get(name_field)
                .ok_or_else(|| OutputError::MissingNameFieldError(path.display().to_string(), name_field.to_owned()))?;
            boundaries.push(field_text(name).unwrap_or_default(), shape);
        }
        Ok(boundaries)
    }

    fn load_geojson(path: &Path, name_field: &str) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path)?;
        let features = match content.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => Vec::new(),
        };

        let mut boundaries = Self::default();
        for feature in features {
            let name = match feature.property(name_field) {
                Some(serde_json::Value::String(name)) => name.trim().to_owned(),
                Some(serde_json::Value::Null) => String::new(),
                Some(value) => value.to_string(),
                None => Err(OutputError::MissingNameFieldError(path.display().to_string(), name_field.to_owned()))?,
            };
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let shape = match Geometry::<f64>::try_from(geometry.value)? {
                Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
                Geometry::MultiPolygon(polygons) => polygons,
                _ => continue,
            };
            boundaries.push(name, shape);
        }
        Ok(boundaries)
    }

    pub fn push(&mut self, name: String, shape: MultiPolygon<f64>) {
        let bounds = shape.bounding_rect();
        self.regions.push(Region { name, shape, bounds });
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Name of the first region the geometry intersects, in boundary order.
    pub fn locate(&self, geometry: &SurveyGeometry) -> Option<&str> {
        let bounds = geometry.to_geometry().bounding_rect();
        self.regions
            .iter()
            .filter(|region| match (region.bounds, bounds) {
                (Some(region_bounds), Some(bounds)) => region_bounds.intersects(&bounds),
                _ => false,
            })
            .find(|region| match geometry {
                SurveyGeometry::Point(point) => region.shape.intersects(point),
                SurveyGeometry::LineString(line) => region.shape.intersects(line),
                SurveyGeometry::MultiPoint(points) => region.shape.intersects(points),
            })
            .map(|region| region.name.as_str())
    }

    /// Region name for a geometry, `Unknown` when nothing matches.
    pub fn region_of(&self, geometry: &SurveyGeometry) -> String {
        self.locate(geometry).unwrap_or(UNKNOWN_REGION).to_owned()
    }
}
