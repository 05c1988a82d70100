/// Feature sanitizer
///
/// Accepts polygon-shaped payloads from outside (GeoJSON `Feature` with a
/// `Polygon` geometry, or a bare `Polygon`) and produces the same canonical
/// `Feature` the boundary builder would, or rejects the payload.
/// Sanitizing a sanitized feature's GeoJSON gives back an equal feature.

use crate::cell_id::resolve_cell_id;
use crate::constants::UNKNOWN_FEATURE_ID;
use crate::feature::Feature;
use crate::geometry::Ring;
use crate::json_parser::JsonParser;
use serde_json::Value;

/// Sanitize a polygon payload into a canonical feature.
pub fn sanitize_feature(input: &Value) -> Option<Feature> {
    let (geometry, properties) = match JsonParser::get_str(input, &["type"])? {
        "Feature" => (input.get("geometry")?, input.get("properties")),
        "Polygon" => (input, input.get("properties")),
        _ => return None,
    };
    if JsonParser::get_str(geometry, &["type"])? != "Polygon" {
        return None;
    }

    let exterior = geometry.get("coordinates")?.as_array()?.first()?.as_array()?;
    let raw: Vec<[f64; 2]> = exterior.iter().filter_map(JsonParser::get_pair).collect();
    let ring = Ring::from_raw(&raw)?;

    let value = properties
        .and_then(|p| JsonParser::get_f64(p, &["value"]))
        .or_else(|| JsonParser::get_f64(input, &["value"]))?;

    Feature::new(derive_id(input, properties), value, ring)
}

fn derive_id(input: &Value, properties: Option<&Value>) -> String {
    if let Some(cell) = properties.and_then(resolve_cell_id).or_else(|| resolve_cell_id(input)) {
        return cell.to_string();
    }
    match properties.and_then(|p| p.get("id")) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN_FEATURE_ID.to_string(),
    }
}
