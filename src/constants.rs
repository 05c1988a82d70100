// Grid and viewport defaults

/// Field names searched, in order, for a cell identifier on an inbound record.
pub const CELL_ID_ALIASES: &[&str] = &["h3", "h3Index", "cell", "hex", "id", "index"];

/// Id given to a sanitized polygon whose payload carries no usable identifier.
pub const UNKNOWN_FEATURE_ID: &str = "unknown";

/// Canonical positions stay within these magnitudes (degrees).
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MAX_LATITUDE: f64 = 90.0;

// === Level of detail ===

pub const MIN_ZOOM: f64 = 3.2; // ≈ res 5
pub const MAX_ZOOM: f64 = 9.8; // ≈ res 10

/// (zoom below, resolution) pairs; zooms past the last threshold use `LOD_MAX_RESOLUTION`.
pub const LOD_TABLE: &[(f64, u8)] = &[
    (4.0, 5),
    (5.0, 6),
    (6.0, 7),
    (7.5, 8),
    (9.0, 9),
];
pub const LOD_MAX_RESOLUTION: u8 = 10;

// === Region mask ===

/// Finest resolution for which a region mask is enumerated directly.
pub const MASK_CEILING_RESOLUTION: u8 = 9;

// === Query keys and requests ===

pub const BBOX_PRECISION: u32 = 3; // decimals kept in query keys
pub const HEATMAP_ENDPOINT_PATH: &str = "/api/v2/heatmap/h3";
pub const DEFAULT_API_HOST: &str = "http://localhost:8080";

pub const DEFAULT_METRIC: &str = "price";
pub const DEFAULT_BUCKET: &str = "day";
pub const DEFAULT_AS_OF: &str = "2025-09-08";

// contiguous US ("lower 48"), south/west/north/east
pub const US_LOWER48_SOUTH: f64 = 24.9493;
pub const US_LOWER48_WEST: f64 = -125.00165;
pub const US_LOWER48_NORTH: f64 = 49.5904;
pub const US_LOWER48_EAST: f64 = -66.9326;

// === Scheduling ===

pub const VIEWPORT_SETTLE_MS: u64 = 150;
pub const FETCH_TIMEOUT_MS: u64 = 10_000;

// === Degraded mode ===

/// Built-in rows served when the backend cannot be reached.
pub const FALLBACK_ROWS: &[(&str, f64)] = &[
    ("852664c3fffffff", 2.9281),
    ("85268cdbfffffff", 2.8894444444444445),
    ("8928308280fffff", 1.2),
    ("8928308280bffff", 2.8),
    ("89283082807ffff", 4.5),
];

/// Domain reported for an empty result set.
pub const EMPTY_DOMAIN: (f64, f64) = (0.0, 1.0);
