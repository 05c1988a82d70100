pub mod boundary_builder;
pub mod cell_id;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod ingest;
pub mod json_parser;
pub mod lod;
pub mod pipeline;
pub mod query_cache;
pub mod region;
pub mod region_mask;
pub mod sanitizer;
pub mod scheduler;
pub mod source;
pub mod validation;

pub use config::HeatmapConfig;
pub use error::{HeatmapError, Result};
pub use feature::Feature;
pub use pipeline::{HeatmapFrame, HeatmapPipeline, LoadOutcome, Selection, Viewport};
pub use scheduler::{ViewportOutcome, ViewportScheduler};
