/// Ingestion: raw rows to canonical features.
///
/// Each row is classified once into an [`InboundRecord`] and dispatched to
/// the boundary builder or the sanitizer. Bad rows are dropped and counted;
/// they never fail the batch.

use crate::boundary_builder::build_hex_feature;
use crate::cell_id::{parse_cell_token, resolve_cell_id};
use crate::feature::Feature;
use crate::json_parser::JsonParser;
use crate::region_mask::MaskFilter;
use crate::sanitizer::sanitize_feature;
use h3o::CellIndex;
use serde_json::Value;
use tracing::debug;

/// The shape of one inbound row.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRecord<'a> {
    /// Already polygon-shaped (GeoJSON `Feature` or `Polygon`)
    Polygon(&'a Value),
    /// A cell id with a value, from `[id, value]` or `{<alias>: id, value}`
    IdValue { cell: CellIndex, value: f64 },
    Unrecognized,
}

impl<'a> InboundRecord<'a> {
    pub fn classify(row: &'a Value) -> Self {
        match row {
            Value::Array(items) => match items.as_slice() {
                [id, value, ..] => match (parse_cell_token(id), value.as_f64()) {
                    (Some(cell), Some(value)) => InboundRecord::IdValue { cell, value },
                    _ => InboundRecord::Unrecognized,
                },
                _ => InboundRecord::Unrecognized,
            },
            Value::Object(_) => match JsonParser::get_str(row, &["type"]) {
                Some("Feature") | Some("Polygon") => InboundRecord::Polygon(row),
                _ => match (resolve_cell_id(row), JsonParser::get_f64(row, &["value"])) {
                    (Some(cell), Some(value)) => InboundRecord::IdValue { cell, value },
                    _ => InboundRecord::Unrecognized,
                },
            },
            _ => InboundRecord::Unrecognized,
        }
    }

    /// Build the canonical feature for this record, if any.
    pub fn into_feature(self) -> Option<Feature> {
        match self {
            InboundRecord::Polygon(payload) => sanitize_feature(payload),
            InboundRecord::IdValue { cell, value } => build_hex_feature(cell, value),
            InboundRecord::Unrecognized => None,
        }
    }
}

/// Result of ingesting one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Canonical features, in input order
    pub features: Vec<Feature>,
    /// Rows rejected as malformed
    pub dropped: usize,
    /// Valid rows outside the region mask
    pub filtered: usize,
}

/// Turn raw rows into features, restricted to `mask` when given.
///
/// Features whose id is not a grid cell (sanitized polygons without a cell
/// identity) are not subject to the mask.
pub fn build_features(rows: &[Value], mask: Option<&MaskFilter>) -> IngestReport {
    let mut report = IngestReport {
        features: Vec::with_capacity(rows.len()),
        ..IngestReport::default()
    };

    for row in rows {
        let Some(feature) = InboundRecord::classify(row).into_feature() else {
            report.dropped += 1;
            continue;
        };
        let outside = match (mask, feature.cell()) {
            (Some(mask), Some(cell)) => !mask.contains(cell),
            _ => false,
        };
        if outside {
            report.filtered += 1;
        } else {
            report.features.push(feature);
        }
    }

    debug!(
        rows = rows.len(),
        kept = report.features.len(),
        dropped = report.dropped,
        filtered = report.filtered,
        "ingested heatmap rows"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region_mask::RegionMask;
    use h3o::Resolution;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_classify_shapes() {
        let tuple = json!(["8928308280fffff", 1.2]);
        assert!(matches!(
            InboundRecord::classify(&tuple),
            InboundRecord::IdValue { value, .. } if value == 1.2
        ));

        let object = json!({ "h3Index": "8928308280fffff", "value": 2.0 });
        assert!(matches!(InboundRecord::classify(&object), InboundRecord::IdValue { .. }));

        let polygon = json!({ "type": "Polygon", "coordinates": [] });
        assert!(matches!(InboundRecord::classify(&polygon), InboundRecord::Polygon(_)));

        for bad in [
            json!(["8928308280fffff"]),
            json!(["8928308280fffff", "1.2"]),
            json!(["nope", 1.0]),
            json!({ "h3": "8928308280fffff" }),
            json!({ "type": "FeatureCollection" }),
            json!(3),
            json!(null),
        ] {
            assert_eq!(InboundRecord::classify(&bad), InboundRecord::Unrecognized, "{bad}");
        }
    }

    #[test]
    fn test_bad_rows_dropped_order_kept() {
        let rows = vec![
            json!(["89283082807ffff", 4.5]),
            json!({ "cell": "garbage", "value": 1.0 }),
            json!(["8928308280fffff", 1.2]),
            json!({
                "type": "Feature",
                "properties": { "value": 2.0 },
                "geometry": { "type": "Point", "coordinates": [0, 0] },
            }),
        ];
        let report = build_features(&rows, None);
        assert_eq!(report.dropped, 2);
        let ids: Vec<_> = report.features.iter().map(Feature::id).collect();
        assert_eq!(ids, ["89283082807ffff", "8928308280fffff"]);
    }

    #[test]
    fn test_mask_filters_cells_but_not_plain_polygons() {
        let kept: CellIndex = "8928308280fffff".parse().unwrap();
        let mask = MaskFilter::Exact(Arc::new(RegionMask::new(
            Resolution::Nine,
            HashSet::from([kept]),
        )));
        let rows = vec![
            json!(["8928308280fffff", 1.0]),
            json!(["8928308280bffff", 2.0]),
            json!({
                "type": "Feature",
                "properties": { "id": "tract-1", "value": 3.0 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
                },
            }),
        ];
        let report = build_features(&rows, Some(&mask));
        assert_eq!(report.filtered, 1);
        assert_eq!(report.dropped, 0);
        let ids: Vec<_> = report.features.iter().map(Feature::id).collect();
        assert_eq!(ids, ["8928308280fffff", "tract-1"]);
    }
}
