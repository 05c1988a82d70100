// Region mask cache: direct masks up to the ceiling, ancestor lookups above it

use h3_heatmap::ingest::build_features;
use h3_heatmap::region::{BoundingBox, RegionBoundary};
use h3_heatmap::region_mask::{MaskFilter, RegionMaskCache};
use h3o::{CellIndex, LatLng, Resolution};
use more_asserts::assert_gt;
use serde_json::json;

fn sf_region() -> RegionBoundary {
    RegionBoundary::from_bbox("sf", &BoundingBox::new(37.75, -122.45, 37.80, -122.38)).unwrap()
}

#[test]
fn test_fine_mask_tests_ancestor_at_ceiling() {
    let cache = RegionMaskCache::new(sf_region(), Resolution::Nine);
    let nine = cache.mask(Resolution::Nine).unwrap();
    assert_eq!(cache.build_count(), 1);
    println!("res 9 mask: {} cells", nine.backing_mask().len());

    let ten = cache.mask(Resolution::Ten).unwrap();
    assert_eq!(cache.build_count(), 1, "res 10 must not enumerate its own coverage");
    assert!(matches!(ten, MaskFilter::Ancestor { .. }));

    let parent: CellIndex = "8928308280fffff".parse().unwrap();
    assert!(nine.contains(parent));
    for child in parent.children(Resolution::Ten) {
        assert!(ten.contains(child));
    }

    let nyc = LatLng::new(40.7128, -74.0060).unwrap().to_cell(Resolution::Ten);
    assert!(!ten.contains(nyc));
}

#[test]
fn test_repeat_calls_do_not_rebuild() {
    let cache = RegionMaskCache::new(sf_region(), Resolution::Nine);
    for _ in 0..3 {
        let _ = cache.mask(Resolution::Eight).unwrap();
        let _ = cache.mask(Resolution::Nine).unwrap();
        let _ = cache.mask(Resolution::Ten).unwrap();
    }
    assert_eq!(cache.build_count(), 2);
    assert_eq!(cache.cached_resolutions(), vec![Resolution::Eight, Resolution::Nine]);
}

#[test]
fn test_lower_ceiling_serves_more_resolutions() {
    let cache = RegionMaskCache::new(sf_region(), Resolution::Seven);
    let ten = cache.mask(Resolution::Ten).unwrap();
    assert_eq!(ten.backing_mask().resolution(), Resolution::Seven);
    assert_eq!(cache.cached_resolutions(), vec![Resolution::Seven]);
}

#[test]
fn test_mask_filters_ingested_rows() {
    let cache = RegionMaskCache::new(sf_region(), Resolution::Nine);
    let filter = cache.mask(Resolution::Nine).unwrap();

    let oakland = LatLng::new(37.8044, -122.2712).unwrap().to_cell(Resolution::Nine);
    let rows = vec![
        json!(["8928308280fffff", 1.2]),
        json!([oakland.to_string(), 9.9]),
    ];
    let report = build_features(&rows, Some(&filter));
    assert_eq!(report.features.len(), 1);
    assert_eq!(report.filtered, 1);
}

#[test]
fn test_geojson_region() {
    let nj = json!({
        "type": "Feature",
        "properties": { "name": "NJ" },
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [-75.56, 39.63], [-74.95, 38.93], [-73.90, 40.00],
                [-73.90, 41.36], [-74.69, 41.36], [-75.56, 39.63]
            ]],
        },
    });
    let region = RegionBoundary::from_geojson("NJ", &nj).unwrap();
    let cache = RegionMaskCache::new(region, Resolution::Nine);
    let mask = cache.mask(Resolution::Five).unwrap();
    assert_gt!(mask.backing_mask().len(), 10);

    let trenton = LatLng::new(40.2206, -74.7597).unwrap().to_cell(Resolution::Five);
    let denver = LatLng::new(39.7392, -104.9903).unwrap().to_cell(Resolution::Five);
    assert!(mask.contains(trenton));
    assert!(!mask.contains(denver));
}
