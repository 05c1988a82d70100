/// Boundary builder
///
/// Builds the canonical polygon feature for a grid cell. Every rejection is a
/// `None`; nothing here panics or returns an error to the caller.

use crate::feature::Feature;
use crate::geometry::Ring;
use h3o::CellIndex;

/// Why a cell's native boundary is unusable as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryIssue {
    /// Fewer than three vertices came back from the grid library
    RingTooShort,
    /// At least one vertex had a non-finite component
    NonFiniteCoords,
}

impl BoundaryIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryIssue::RingTooShort => "ring-too-short",
            BoundaryIssue::NonFiniteCoords => "non-finite-coords",
        }
    }
}

/// Native boundary vertices of `cell` as `[lng, lat]` pairs in degrees.
pub fn cell_boundary_pairs(cell: CellIndex) -> Vec<[f64; 2]> {
    cell.boundary()
        .iter()
        .map(|latlng| [latlng.lng(), latlng.lat()])
        .collect()
}

/// Inspect the raw boundary without repairing it.
pub fn check_cell_boundary(cell: CellIndex) -> Result<usize, BoundaryIssue> {
    let pairs = cell_boundary_pairs(cell);
    if pairs.len() < 3 {
        return Err(BoundaryIssue::RingTooShort);
    }
    if pairs.iter().any(|[a, b]| !a.is_finite() || !b.is_finite()) {
        return Err(BoundaryIssue::NonFiniteCoords);
    }
    Ok(pairs.len())
}

/// Canonical feature for `cell` carrying `value`.
///
/// Identical inputs always produce identical output: the boundary order comes
/// straight from the grid library and canonicalization is deterministic.
pub fn build_hex_feature(cell: CellIndex, value: f64) -> Option<Feature> {
    let ring = Ring::from_raw(&cell_boundary_pairs(cell))?;
    Feature::new(cell.to_string(), value, ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use h3o::{LatLng, Resolution};
    use more_asserts::{assert_ge, assert_le};

    fn sf_cell() -> CellIndex {
        "8928308280fffff".parse().unwrap()
    }

    #[test]
    fn test_hexagon_ring_is_closed_and_ccw() {
        let feature = build_hex_feature(sf_cell(), 1.2).unwrap();
        let ring = feature.ring();

        assert!(ring.is_closed());
        assert_le!(ring.signed_area(), 0.0);
        assert_eq!(ring.distinct_count(), 6);
        assert_eq!(ring.len(), 7);
        assert_eq!(feature.id(), "8928308280fffff");
        assert_eq!(feature.value(), 1.2);
    }

    #[test]
    fn test_ring_is_in_lng_lat_order() {
        let feature = build_hex_feature(sf_cell(), 0.0).unwrap();
        for p in feature.ring().positions() {
            assert!(p.lng < -122.0 && p.lng > -123.0, "lng {}", p.lng);
            assert!(p.lat > 37.0 && p.lat < 38.0, "lat {}", p.lat);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = build_hex_feature(sf_cell(), 2.8).unwrap();
        let b = build_hex_feature(sf_cell(), 2.8).unwrap();
        assert_eq!(a, b);
        let bits_a: Vec<_> = a.ring().positions().iter().map(|p| p.lng.to_bits()).collect();
        let bits_b: Vec<_> = b.ring().positions().iter().map(|p| p.lng.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_non_finite_value_rejected() {
        assert!(build_hex_feature(sf_cell(), f64::NAN).is_none());
    }

    #[test]
    fn test_pentagon_and_antimeridian_cells() {
        // every res-0 pentagon plus a cell straddling the antimeridian
        let mut cells: Vec<CellIndex> = CellIndex::base_cells()
            .filter(|cell| cell.is_pentagon())
            .collect();
        cells.push(LatLng::new(0.0, 179.99).unwrap().to_cell(Resolution::Three));

        for cell in cells {
            let feature = build_hex_feature(cell, 1.0).unwrap();
            assert!(feature.ring().is_closed());
            assert_le!(feature.ring().signed_area(), 0.0);
            assert_ge!(feature.ring().distinct_count(), 3);
            assert_eq!(check_cell_boundary(cell).map(|n| n >= 5), Ok(true));
        }
    }
}
