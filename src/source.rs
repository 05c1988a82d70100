/// Heatmap data sources
///
/// The transport is outside this crate: anything that can answer a
/// [`HeatmapRequest`] with a list of JSON rows (or fail) implements
/// [`HeatmapSource`]. Implementations should watch the cancellation token
/// and return [`HeatmapError::Cancelled`] once it fires.

use crate::constants::{FALLBACK_ROWS, HEATMAP_ENDPOINT_PATH};
use crate::error::{HeatmapError, Result};
use crate::region::BoundingBox;
use async_trait::async_trait;
use h3o::Resolution;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Parameters of one backend query.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapRequest {
    pub metric: String,
    pub bucket: String,
    pub at: String,
    pub resolution: Resolution,
    /// Already clamped to the configured envelope
    pub bbox: BoundingBox,
}

impl HeatmapRequest {
    /// Query string parameters, bbox as `south,west,north,east`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("metric", self.metric.clone()),
            ("bucket", self.bucket.clone()),
            ("at", self.at.clone()),
            ("resolution", u8::from(self.resolution).to_string()),
            (
                "bbox",
                format!(
                    "{},{},{},{}",
                    self.bbox.south, self.bbox.west, self.bbox.north, self.bbox.east
                ),
            ),
        ]
    }

    /// Endpoint URL under `api_host`, without the query string.
    pub fn endpoint(api_host: &str) -> String {
        format!("{}{}", api_host.trim_end_matches('/'), HEATMAP_ENDPOINT_PATH)
    }

    /// Full request URL with every query value percent-encoded.
    pub fn url(&self, api_host: &str) -> String {
        let query = self
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", Self::endpoint(api_host))
    }
}

#[async_trait]
pub trait HeatmapSource: Send + Sync {
    /// Fetch raw rows for `request`.
    async fn fetch(
        &self,
        request: &HeatmapRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>>;
}

/// Serves a fixed row list regardless of the request.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<Value>,
}

impl StaticSource {
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    /// The built-in degraded-mode dataset, as `[cell, value]` rows.
    pub fn fallback() -> Self {
        Self::new(fallback_rows())
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

#[async_trait]
impl HeatmapSource for StaticSource {
    async fn fetch(
        &self,
        _request: &HeatmapRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        if cancel.is_cancelled() {
            return Err(HeatmapError::Cancelled);
        }
        Ok(self.rows.clone())
    }
}

pub fn fallback_rows() -> Vec<Value> {
    FALLBACK_ROWS
        .iter()
        .map(|(cell, value)| json!([cell, value]))
        .collect()
}
