/// Heatmap loading pipeline
///
/// One `load` call turns a selection plus viewport into a frame of canonical
/// features: zoom → resolution → region mask → query key → cached or fetched
/// rows → ingestion. The outcome is always one of data, empty, failure or
/// cancellation; nothing in here panics or hangs past the fetch timeout.

use crate::config::HeatmapConfig;
use crate::constants::{DEFAULT_AS_OF, DEFAULT_BUCKET, DEFAULT_METRIC};
use crate::domain::ValueDomain;
use crate::error::{HeatmapError, Result};
use crate::feature::{Feature, features_to_geojson};
use crate::ingest::build_features;
use crate::lod::LodSelector;
use crate::query_cache::{QueryCache, QueryKey, RowOrigin};
use crate::region::{BoundingBox, RegionBoundary};
use crate::region_mask::{MaskFilter, RegionMaskCache};
use crate::source::{HeatmapRequest, HeatmapSource, fallback_rows};
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What is being mapped: metric, aggregation bucket and as-of date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub metric: String,
    pub bucket: String,
    pub at: String,
}

impl Selection {
    pub fn new(
        metric: impl Into<String>,
        bucket: impl Into<String>,
        at: impl Into<String>,
    ) -> Self {
        Self {
            metric: metric.into(),
            bucket: bucket.into(),
            at: at.into(),
        }
    }

    /// Key the colour domain is tracked under.
    pub fn domain_key(&self) -> String {
        format!("{}/{}/{}", self.metric, self.bucket, self.at)
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::new(DEFAULT_METRIC, DEFAULT_BUCKET, DEFAULT_AS_OF)
    }
}

/// Camera state. Without bounds the whole region (or envelope) is queried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub bounds: Option<BoundingBox>,
}

impl Viewport {
    pub fn new(zoom: f64, bounds: BoundingBox) -> Self {
        Self {
            zoom,
            bounds: Some(bounds),
        }
    }

    pub fn unbounded(zoom: f64) -> Self {
        Self { zoom, bounds: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Cached,
    SharedFetch,
    Fetched,
    /// Built-in dataset shown after a failed fetch
    Fallback,
}

impl From<RowOrigin> for FrameSource {
    fn from(origin: RowOrigin) -> Self {
        match origin {
            RowOrigin::Cache => FrameSource::Cached,
            RowOrigin::Shared => FrameSource::SharedFetch,
            RowOrigin::Fetch => FrameSource::Fetched,
        }
    }
}

/// Render-ready result of one load.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapFrame {
    pub resolution: Resolution,
    pub features: Vec<Feature>,
    pub domain: ValueDomain,
    /// Malformed rows
    pub dropped: usize,
    /// Rows outside the region mask
    pub filtered: usize,
    pub source: FrameSource,
}

impl HeatmapFrame {
    fn from_rows(
        rows: &[Value],
        mask: Option<&MaskFilter>,
        resolution: Resolution,
        source: FrameSource,
    ) -> Self {
        let report = build_features(rows, mask);
        let domain = ValueDomain::from_features(&report.features);
        HeatmapFrame {
            resolution,
            features: report.features,
            domain,
            dropped: report.dropped,
            filtered: report.filtered,
            source,
        }
    }

    pub fn to_geojson(&self) -> Value {
        features_to_geojson(&self.features)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Data(HeatmapFrame),
    /// The query succeeded but nothing covers the view
    Empty { resolution: Resolution },
    /// Fetch or setup failed; `fallback` is the built-in dataset when enabled
    Failed {
        reason: String,
        fallback: Option<HeatmapFrame>,
    },
    /// Superseded before completion; never shown to the user
    Cancelled,
}

impl LoadOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }

    pub fn frame(&self) -> Option<&HeatmapFrame> {
        match self {
            LoadOutcome::Data(frame) => Some(frame),
            _ => None,
        }
    }
}

pub struct HeatmapPipeline {
    config: HeatmapConfig,
    lod: LodSelector,
    masks: Option<Arc<RegionMaskCache>>,
    cache: Arc<QueryCache>,
    source: Arc<dyn HeatmapSource>,
}

impl HeatmapPipeline {
    pub fn new(config: HeatmapConfig, source: Arc<dyn HeatmapSource>) -> Result<Self> {
        config.validate().map_err(HeatmapError::Config)?;
        let lod = config.lod_selector()?;
        Ok(Self {
            config,
            lod,
            masks: None,
            cache: Arc::new(QueryCache::new()),
            source,
        })
    }

    /// Restrict results to `boundary`, with masks built per the config.
    pub fn with_region(self, boundary: RegionBoundary) -> Result<Self> {
        let masks = RegionMaskCache::new(boundary, self.config.mask_ceiling_resolution()?)
            .with_containment(self.config.mask_containment);
        Ok(self.with_mask_cache(Arc::new(masks)))
    }

    pub fn with_mask_cache(mut self, masks: Arc<RegionMaskCache>) -> Self {
        self.masks = Some(masks);
        self
    }

    pub fn with_query_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn mask_cache(&self) -> Option<&Arc<RegionMaskCache>> {
        self.masks.as_ref()
    }

    /// Resolution for a raw viewport zoom (clamped to the configured range).
    pub fn resolution_for(&self, zoom: f64) -> Resolution {
        self.lod.resolution_for_zoom(self.config.clamp_zoom(zoom))
    }

    /// Backend request for a view, or `None` when the clamped bounds are empty.
    pub fn request_for(
        &self,
        selection: &Selection,
        viewport: &Viewport,
    ) -> Option<HeatmapRequest> {
        let raw = viewport
            .bounds
            .or_else(|| self.masks.as_ref().map(|m| m.boundary().bbox()))
            .unwrap_or(self.config.envelope);
        let bbox = raw.clamp_to(&self.config.envelope);
        if !bbox.is_finite() || bbox.is_empty() {
            return None;
        }
        Some(HeatmapRequest {
            metric: selection.metric.clone(),
            bucket: selection.bucket.clone(),
            at: selection.at.clone(),
            resolution: self.resolution_for(viewport.zoom),
            bbox,
        })
    }

    pub async fn load(
        &self,
        selection: &Selection,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        if cancel.is_cancelled() {
            return LoadOutcome::Cancelled;
        }
        let resolution = self.resolution_for(viewport.zoom);
        let Some(request) = self.request_for(selection, viewport) else {
            debug!(resolution = u8::from(resolution), "view lies outside the envelope");
            return LoadOutcome::Empty { resolution };
        };

        let mask = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoadOutcome::Cancelled,
            mask = self.mask_for(resolution) => mask,
        };
        let mask = match mask {
            Ok(mask) => mask,
            Err(e) => return self.failed(e, resolution),
        };

        let key = QueryKey::for_request(&request, self.config.bbox_precision);
        let timeout = self.config.fetch_timeout();
        let fetch = self.cache.get_or_fetch(&key, || async {
            match tokio::time::timeout(timeout, self.source.fetch(&request, cancel)).await {
                Ok(result) => result,
                Err(_) => Err(HeatmapError::Timeout(timeout)),
            }
        });
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoadOutcome::Cancelled,
            fetched = fetch => fetched,
        };

        match fetched {
            Ok(cached) => {
                let frame = HeatmapFrame::from_rows(
                    &cached.rows,
                    mask.as_ref(),
                    resolution,
                    cached.origin.into(),
                );
                if frame.features.is_empty() {
                    debug!(
                        key = %key,
                        dropped = frame.dropped,
                        filtered = frame.filtered,
                        "empty heatmap"
                    );
                    LoadOutcome::Empty { resolution }
                } else {
                    LoadOutcome::Data(frame)
                }
            }
            Err(e) if e.is_cancellation() => LoadOutcome::Cancelled,
            Err(e) => self.failed(e, resolution),
        }
    }

    async fn mask_for(&self, resolution: Resolution) -> Result<Option<MaskFilter>> {
        let Some(masks) = self.masks.clone() else {
            return Ok(None);
        };
        let filter = tokio::task::spawn_blocking(move || masks.mask(resolution))
            .await
            .map_err(|e| HeatmapError::Task(e.to_string()))??;
        Ok(Some(filter))
    }

    fn failed(&self, error: HeatmapError, resolution: Resolution) -> LoadOutcome {
        warn!(error = %error, resolution = u8::from(resolution), "heatmap load failed");
        // the fallback set is a fixed sample, so it is not masked
        let fallback = self.config.fallback_enabled.then(|| {
            HeatmapFrame::from_rows(&fallback_rows(), None, resolution, FrameSource::Fallback)
        });
        LoadOutcome::Failed {
            reason: error.to_string(),
            fallback,
        }
    }
}

impl fmt::Debug for HeatmapPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeatmapPipeline")
            .field("config", &self.config)
            .field("masks", &self.masks)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
