/// Region geometry: query bounding boxes and the reference boundary the
/// heatmap is restricted to.

use crate::error::{HeatmapError, Result};
use crate::geometry::Position;
use crate::json_parser::JsonParser;
use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geographic bounds in degrees, ordered the way the backend expects them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest box containing every position; `None` for an empty input.
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Self> {
        positions.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => BoundingBox::new(p.lat, p.lng, p.lat, p.lng),
                Some(b) => BoundingBox::new(
                    b.south.min(p.lat),
                    b.west.min(p.lng),
                    b.north.max(p.lat),
                    b.east.max(p.lng),
                ),
            })
        })
    }

    /// Intersect with an outer envelope.
    pub fn clamp_to(&self, envelope: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.south.max(envelope.south),
            self.west.max(envelope.west),
            self.north.min(envelope.north),
            self.east.min(envelope.east),
        )
    }

    /// True when the box has no area (or is inverted, e.g. after clamping a
    /// viewport that lies outside the envelope).
    pub fn is_empty(&self) -> bool {
        !(self.south < self.north && self.west < self.east)
    }

    pub fn is_finite(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.lat >= self.south
            && position.lat <= self.north
            && position.lng >= self.west
            && position.lng <= self.east
    }

    /// Round every edge to `decimals` places.
    pub fn rounded(&self, decimals: u32) -> BoundingBox {
        BoundingBox::new(
            round_to(self.south, decimals),
            round_to(self.west, decimals),
            round_to(self.north, decimals),
            round_to(self.east, decimals),
        )
    }

    /// `"south,west,north,east"` with a fixed number of decimals.
    pub fn to_param_string(&self, decimals: u32) -> String {
        let d = decimals as usize;
        let r = self.rounded(decimals);
        format!(
            "{:.d$},{:.d$},{:.d$},{:.d$}",
            r.south, r.west, r.north, r.east
        )
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    // + 0.0 folds -0.0 into 0.0 so "-0.000" never reaches a key
    (value * scale).round() / scale + 0.0
}

/// The fixed outline (e.g. a state) that region masks are computed against.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBoundary {
    name: String,
    exterior: Vec<Position>,
    holes: Vec<Vec<Position>>,
}

impl RegionBoundary {
    pub fn new(
        name: impl Into<String>,
        exterior: Vec<Position>,
        holes: Vec<Vec<Position>>,
    ) -> Result<Self> {
        let name = name.into();
        if exterior.iter().filter(|p| p.is_finite()).count() < 3 {
            return Err(HeatmapError::Geometry(format!(
                "region {name} needs at least 3 finite exterior positions"
            )));
        }
        if exterior.iter().chain(holes.iter().flatten()).any(|p| !p.is_finite()) {
            return Err(HeatmapError::Geometry(format!(
                "region {name} has non-finite coordinates"
            )));
        }
        Ok(Self {
            name,
            exterior,
            holes,
        })
    }

    /// Axis-aligned rectangle, convenient for tests and coarse regions.
    pub fn from_bbox(name: impl Into<String>, bbox: &BoundingBox) -> Result<Self> {
        Self::new(
            name,
            vec![
                Position::new(bbox.west, bbox.south),
                Position::new(bbox.east, bbox.south),
                Position::new(bbox.east, bbox.north),
                Position::new(bbox.west, bbox.north),
            ],
            Vec::new(),
        )
    }

    /// Read a GeoJSON `Feature`, `Polygon` or `MultiPolygon`.
    ///
    /// Multipolygons contribute only their first polygon.
    pub fn from_geojson(name: impl Into<String>, geojson: &Value) -> Result<Self> {
        let name = name.into();
        let geometry = match JsonParser::get_str(geojson, &["type"]) {
            Some("Feature") => geojson
                .get("geometry")
                .ok_or_else(|| HeatmapError::Geometry(format!("region {name} has no geometry")))?,
            _ => geojson,
        };
        let coordinates = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .ok_or_else(|| HeatmapError::Geometry(format!("region {name} has no coordinates")))?;

        let rings = match JsonParser::get_str(geometry, &["type"]) {
            Some("Polygon") => coordinates,
            Some("MultiPolygon") => coordinates
                .first()
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    HeatmapError::Geometry(format!("region {name} is an empty multipolygon"))
                })?,
            other => {
                return Err(HeatmapError::Geometry(format!(
                    "region {name} has unsupported geometry type {other:?}"
                )));
            }
        };

        let mut parsed = rings.iter().map(|ring| {
            ring.as_array()
                .map(|points| {
                    points
                        .iter()
                        .filter_map(JsonParser::get_pair)
                        .map(|[lng, lat]| Position::new(lng, lat))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });
        let exterior = parsed.next().unwrap_or_default();
        let holes = parsed.filter(|hole| hole.len() >= 3).collect();
        Self::new(name, exterior, holes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exterior(&self) -> &[Position] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Position>] {
        &self.holes
    }

    pub fn bbox(&self) -> BoundingBox {
        // `new` guarantees a non-empty exterior
        BoundingBox::from_positions(&self.exterior).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// `geo` polygon in degrees, x = longitude.
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        fn line(points: &[Position]) -> LineString<f64> {
            points
                .iter()
                .map(|p| Coord { x: p.lng, y: p.lat })
                .collect::<Vec<_>>()
                .into()
        }
        Polygon::new(
            line(&self.exterior),
            self.holes.iter().map(|hole| line(hole)).collect(),
        )
    }
}
