/// Ring canonicalization
///
/// Turns raw coordinate lists (either axis order, possibly open, either winding,
/// possibly carrying NaN/inf) into closed counter-clockwise (lng, lat) rings.
/// Both the boundary builder and the feature sanitizer go through `Ring::from_raw`.

use crate::constants::{MAX_LATITUDE, MAX_LONGITUDE};
use crate::region::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A (longitude, latitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    /// Within [-180, 180] x [-90, 90].
    pub fn in_range(&self) -> bool {
        self.lng.abs() <= MAX_LONGITUDE && self.lat.abs() <= MAX_LATITUDE
    }

    /// GeoJSON order: `[lng, lat]`
    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    // -0.0 and 0.0 compare equal, so they must hash equal too
    fn bits(&self) -> (u64, u64) {
        ((self.lng + 0.0).to_bits(), (self.lat + 0.0).to_bits())
    }
}

/// A closed exterior ring in canonical orientation.
///
/// The only constructor is [`Ring::from_raw`], so every `Ring` is closed,
/// counter-clockwise and has at least three distinct positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring(Vec<Position>);

impl Ring {
    /// Canonicalize a raw coordinate list.
    ///
    /// Returns `None` when fewer than three distinct finite positions remain,
    /// or when any position is off the globe after the axis vote.
    pub fn from_raw(raw: &[[f64; 2]]) -> Option<Ring> {
        let finite = finite_pairs(raw);
        let open = open_part(&finite);
        if open.len() < 3 {
            return None;
        }

        // the vote must not see the closing point, or re-canonicalizing could flip it
        let swap = needs_axis_swap(open);
        let mut points: Vec<Position> = open
            .iter()
            .map(|&[a, b]| if swap { Position::new(b, a) } else { Position::new(a, b) })
            .collect();

        if !points.iter().all(Position::in_range) || distinct_count(&points) < 3 {
            return None;
        }

        close_ring(&mut points);
        if signed_area(&points) > 0.0 {
            points.reverse();
        }

        Some(Ring(points))
    }

    pub fn positions(&self) -> &[Position] {
        &self.0
    }

    /// Number of stored positions, closing point included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        is_closed(&self.0)
    }

    pub fn signed_area(&self) -> f64 {
        signed_area(&self.0)
    }

    pub fn distinct_count(&self) -> usize {
        distinct_count(&self.0)
    }

    /// Mean of the vertices, closing point excluded.
    pub fn centroid(&self) -> Position {
        let open = &self.0[..self.0.len() - 1];
        let n = open.len() as f64;
        let (lng, lat) = open
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.lng, y + p.lat));
        Position::new(lng / n, lat / n)
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_positions(&self.0)
    }

    /// GeoJSON coordinate array for this ring.
    pub fn to_coordinates(&self) -> Vec<[f64; 2]> {
        self.0.iter().map(|p| p.to_array()).collect()
    }
}

/// Keep only pairs whose components are both finite.
pub fn finite_pairs(raw: &[[f64; 2]]) -> Vec<[f64; 2]> {
    raw.iter()
        .copied()
        .filter(|[a, b]| a.is_finite() && b.is_finite())
        .collect()
}

/// The pairs without a trailing copy of the first one.
fn open_part(pairs: &[[f64; 2]]) -> &[[f64; 2]] {
    match pairs {
        [first, rest @ .., last] if !rest.is_empty() && first == last => &pairs[..pairs.len() - 1],
        _ => pairs,
    }
}

/// Whole-ring vote on axis order.
///
/// A ring whose first components average ≤ 90 in magnitude while the second
/// components average > 90 was delivered as (lat, lng). Rings that satisfy
/// neither side (small longitudes near the prime meridian) are left alone.
pub fn needs_axis_swap(points: &[[f64; 2]]) -> bool {
    if points.is_empty() {
        return false;
    }
    let n = points.len() as f64;
    let (first, second) = points
        .iter()
        .fold((0.0, 0.0), |(a, b), [x, y]| (a + x.abs(), b + y.abs()));
    first / n <= 90.0 && second / n > 90.0
}

pub fn is_closed(points: &[Position]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => points.len() > 1 && first == last,
        _ => false,
    }
}

/// Append the first position when the ring is open.
pub fn close_ring(points: &mut Vec<Position>) {
    if let Some(&first) = points.first() {
        if !is_closed(points) {
            points.push(first);
        }
    }
}

/// Shoelace area, ½ Σ (x[i+1] − x[i])(y[i+1] + y[i]) over consecutive pairs.
///
/// Positive for clockwise rings and negative for counter-clockwise ones when
/// x is longitude and y is latitude. Expects a closed ring.
pub fn signed_area(points: &[Position]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].lng - w[0].lng) * (w[1].lat + w[0].lat))
        .sum::<f64>()
        * 0.5
}

pub fn distinct_count(points: &[Position]) -> usize {
    points.iter().map(Position::bits).collect::<HashSet<_>>().len()
}
