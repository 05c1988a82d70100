// Pipeline and scheduler behaviour against scripted sources:
// caching, duplicate suppression, supersession, failure and fallback

use async_trait::async_trait;
use h3_heatmap::error::{HeatmapError, Result};
use h3_heatmap::pipeline::FrameSource;
use h3_heatmap::region::{BoundingBox, RegionBoundary};
use h3_heatmap::source::{HeatmapRequest, HeatmapSource};
use h3_heatmap::{
    HeatmapConfig, HeatmapPipeline, LoadOutcome, Selection, Viewport, ViewportOutcome,
    ViewportScheduler,
};
use h3o::Resolution;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Answers after `delay` with fixed rows, counting every call.
struct ScriptedSource {
    rows: Vec<Value>,
    delay: Duration,
    calls: AtomicUsize,
    fail_with: Option<u16>,
}

impl ScriptedSource {
    fn new(rows: Vec<Value>, delay: Duration) -> Self {
        Self {
            rows,
            delay,
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::new(vec![], Duration::ZERO)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeatmapSource for ScriptedSource {
    async fn fetch(
        &self,
        _request: &HeatmapRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => Err(HeatmapError::Cancelled),
            _ = tokio::time::sleep(self.delay) => match self.fail_with {
                Some(status) => Err(HeatmapError::Status(status)),
                None => Ok(self.rows.clone()),
            },
        }
    }
}

fn sf_rows() -> Vec<Value> {
    vec![
        json!(["8928308280fffff", 1.2]),
        json!(["8928308280bffff", 2.8]),
        json!(["89283082807ffff", 4.5]),
    ]
}

fn sf_view(zoom: f64) -> Viewport {
    Viewport::new(zoom, BoundingBox::new(37.70, -122.50, 37.85, -122.30))
}

fn pipeline(source: Arc<ScriptedSource>) -> Arc<HeatmapPipeline> {
    Arc::new(HeatmapPipeline::new(HeatmapConfig::default(), source).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_revisited_view_is_served_from_cache() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_millis(30)));
    let pipeline = pipeline(source.clone());
    let token = CancellationToken::new();

    let first = pipeline.load(&Selection::default(), &sf_view(9.2), &token).await;
    assert_eq!(first.frame().unwrap().source, FrameSource::Fetched);

    // sub-precision jitter lands on the same key
    let jittered = Viewport::new(9.2, BoundingBox::new(37.7000001, -122.5000002, 37.85, -122.30));
    let second = pipeline.load(&Selection::default(), &jittered, &token).await;
    assert_eq!(second.frame().unwrap().source, FrameSource::Cached);
    assert_eq!(source.calls(), 1);

    // a different date is a new key, the old entry stays
    let other_day = Selection::new("price", "day", "2025-09-09");
    let _ = pipeline.load(&other_day, &sf_view(9.2), &token).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(pipeline.query_cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_loads_share_one_fetch() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_millis(100)));
    let pipeline = pipeline(source.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let token = CancellationToken::new();
            pipeline.load(&Selection::default(), &sf_view(9.2), &token).await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.frame().unwrap().features.len(), 3);
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_load_does_not_touch_cache() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_millis(500)));
    let pipeline = pipeline(source.clone());
    let token = CancellationToken::new();

    let load = {
        let pipeline = pipeline.clone();
        let token = token.clone();
        tokio::spawn(async move {
            pipeline.load(&Selection::default(), &sf_view(9.2), &token).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    assert_eq!(load.await.unwrap(), LoadOutcome::Cancelled);
    assert!(pipeline.query_cache().is_empty());
    assert_eq!(pipeline.query_cache().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_secs(60)));
    let mut config = HeatmapConfig::default();
    config.fetch_timeout_ms = 1_000;
    config.fallback_enabled = false;
    let pipeline = HeatmapPipeline::new(config, source).unwrap();

    let outcome = pipeline
        .load(&Selection::default(), &sf_view(9.2), &CancellationToken::new())
        .await;
    match outcome {
        LoadOutcome::Failed { reason, fallback } => {
            assert!(reason.contains("timed out"), "{reason}");
            assert!(fallback.is_none());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(pipeline.query_cache().is_empty());
}

#[tokio::test]
async fn test_backend_failure_reports_reason_with_fallback() {
    let source = Arc::new(ScriptedSource::failing(503));
    let pipeline = pipeline(source);
    let outcome = pipeline
        .load(&Selection::default(), &sf_view(6.0), &CancellationToken::new())
        .await;

    let LoadOutcome::Failed { reason, fallback } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(reason, "HTTP 503");
    let fallback = fallback.unwrap();
    assert_eq!(fallback.source, FrameSource::Fallback);
    assert_eq!(fallback.features.len(), 5);
    assert!(pipeline.query_cache().is_empty());
}

#[tokio::test]
async fn test_region_mask_and_empty_outcomes() {
    let source = Arc::new(ScriptedSource::new(
        vec![json!(["8928308280fffff", 1.2]), json!(["852664c3fffffff", 2.9])],
        Duration::ZERO,
    ));
    let sf_box = BoundingBox::new(37.75, -122.45, 37.80, -122.38);
    let region = RegionBoundary::from_bbox("sf", &sf_box).unwrap();
    let pipeline = HeatmapPipeline::new(HeatmapConfig::default(), source)
        .unwrap()
        .with_region(region)
        .unwrap();
    let token = CancellationToken::new();

    // no viewport bounds: the region's own bbox is queried, at res 9
    let outcome = pipeline.load(&Selection::default(), &Viewport::unbounded(8.0), &token).await;
    let frame = outcome.frame().unwrap();
    assert_eq!(frame.resolution, Resolution::Nine);
    assert_eq!(frame.features.len(), 1);
    assert_eq!(frame.filtered, 1);

    // viewport entirely outside the envelope
    let offshore = Viewport::new(8.0, BoundingBox::new(10.0, -160.0, 20.0, -150.0));
    assert_eq!(
        pipeline.load(&Selection::default(), &offshore, &token).await,
        LoadOutcome::Empty { resolution: Resolution::Nine }
    );
}

#[tokio::test(start_paused = true)]
async fn test_rapid_viewport_changes_apply_only_the_last() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_millis(400)));
    let scheduler = Arc::new(ViewportScheduler::new(pipeline(source.clone())));

    let mut handles = Vec::new();
    for zoom in [6.0, 7.0, 8.0] {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler.submit(Selection::default(), sf_view(zoom)).await
        }));
        // shorter than the settle period: earlier submissions never fetch
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    assert_eq!(outcomes[0], ViewportOutcome::Superseded { generation: 1 });
    assert_eq!(outcomes[1], ViewportOutcome::Superseded { generation: 2 });
    let applied = outcomes[2].applied().unwrap();
    assert_eq!(applied.generation, 3);
    assert_eq!(applied.outcome.frame().unwrap().resolution, Resolution::Nine);
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_for_old_view_is_discarded() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::from_millis(400)));
    let scheduler = Arc::new(ViewportScheduler::new(pipeline(source.clone())));

    let old = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.submit(Selection::default(), sf_view(6.0)).await })
    };
    // let the first one settle and start fetching
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(source.calls(), 1);

    let new = scheduler.submit(Selection::default(), sf_view(8.0)).await;

    assert_eq!(old.await.unwrap(), ViewportOutcome::Superseded { generation: 1 });
    assert_eq!(new.applied().unwrap().generation, 2);
    assert_eq!(scheduler.latest().unwrap().generation, 2);
    // only the applied view's rows were cached
    assert_eq!(scheduler.pipeline().query_cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_domain_widens_within_selection() {
    let source = Arc::new(ScriptedSource::new(sf_rows(), Duration::ZERO));
    let scheduler = ViewportScheduler::new(pipeline(source));

    let first = scheduler.submit(Selection::default(), sf_view(9.2)).await;
    assert_eq!(first.applied().unwrap().domain.min, 1.2);
    assert_eq!(first.applied().unwrap().domain.max, 4.5);

    let week = Selection::new("price", "week", "2025-09-08");
    let second = scheduler.submit(week, sf_view(9.2)).await;
    assert_eq!(second.applied().unwrap().domain.max, 4.5);
    assert_eq!(scheduler.generation(), 2);
}
