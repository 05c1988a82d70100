/// Canonical heatmap feature
///
/// A feature is one polygon with a finite value, ready for rendering. It is
/// built by the boundary builder or the sanitizer and never mutated afterwards.

use crate::geometry::Ring;
use h3o::CellIndex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: String,
    value: f64,
    ring: Ring,
}

impl Feature {
    /// `None` when the value is not finite.
    pub fn new(id: impl Into<String>, value: f64, ring: Ring) -> Option<Feature> {
        value.is_finite().then(|| Feature {
            id: id.into(),
            value,
            ring,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// The grid cell this feature stands for, if its id is one.
    pub fn cell(&self) -> Option<CellIndex> {
        self.id.parse().ok()
    }

    /// GeoJSON `Feature` with a single-ring `Polygon` geometry.
    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "properties": { "id": self.id, "value": self.value },
            "geometry": {
                "type": "Polygon",
                "coordinates": [self.ring.to_coordinates()],
            },
        })
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Feature", 3)?;
        state.serialize_field("type", "Feature")?;
        state.serialize_field(
            "properties",
            &json!({ "id": self.id, "value": self.value }),
        )?;
        state.serialize_field(
            "geometry",
            &json!({ "type": "Polygon", "coordinates": [self.ring.to_coordinates()] }),
        )?;
        state.end()
    }
}

/// GeoJSON `FeatureCollection` for a result set.
pub fn features_to_geojson(features: &[Feature]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.iter().map(Feature::to_geojson).collect::<Vec<_>>(),
    })
}
