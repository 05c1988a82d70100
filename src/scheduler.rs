/// Viewport scheduling
///
/// Every viewport change is submitted here. A submission gets the next
/// generation number and its own cancellation token, cancels the previous
/// submission, waits out the settle period and only then loads. Its result
/// is applied only if no newer submission arrived in the meantime, so views
/// are applied in submission order whatever order responses come back in.

use crate::domain::{DomainTracker, ValueDomain};
use crate::pipeline::{HeatmapPipeline, LoadOutcome, Selection, Viewport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A load result that made it to the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedView {
    pub generation: u64,
    pub selection: Selection,
    pub outcome: LoadOutcome,
    /// Colour domain to render with (widened across frames of one selection)
    pub domain: ValueDomain,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportOutcome {
    Applied(AppliedView),
    /// A newer submission took over; nothing was applied
    Superseded { generation: u64 },
}

impl ViewportOutcome {
    pub fn applied(&self) -> Option<&AppliedView> {
        match self {
            ViewportOutcome::Applied(view) => Some(view),
            ViewportOutcome::Superseded { .. } => None,
        }
    }
}

#[derive(Debug)]
struct SchedulerState {
    generation: u64,
    token: CancellationToken,
    /// Selection of the latest submission, the configured default before any
    selection: Selection,
    applied: Option<AppliedView>,
    domains: DomainTracker,
}

#[derive(Debug)]
pub struct ViewportScheduler {
    pipeline: Arc<HeatmapPipeline>,
    settle: Duration,
    state: Mutex<SchedulerState>,
}

impl ViewportScheduler {
    /// Scheduler with the pipeline's configured settle period.
    pub fn new(pipeline: Arc<HeatmapPipeline>) -> Self {
        let settle = pipeline.config().debounce();
        let selection = pipeline.config().default_selection.clone();
        Self {
            pipeline,
            settle,
            state: Mutex::new(SchedulerState {
                generation: 0,
                token: CancellationToken::new(),
                selection,
                applied: None,
                domains: DomainTracker::new(),
            }),
        }
    }

    pub fn pipeline(&self) -> &Arc<HeatmapPipeline> {
        &self.pipeline
    }

    /// Latest generation issued.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Selection a viewport-only change is loaded with.
    pub fn selection(&self) -> Selection {
        self.state.lock().selection.clone()
    }

    /// The most recently applied view.
    pub fn latest(&self) -> Option<AppliedView> {
        self.state.lock().applied.clone()
    }

    /// Cancel whatever is in flight without submitting a new view.
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        state.token.cancel();
        state.generation += 1;
        state.token = CancellationToken::new();
    }

    /// Submit a camera change, keeping the current selection.
    pub async fn pan(&self, viewport: Viewport) -> ViewportOutcome {
        let selection = self.selection();
        self.submit(selection, viewport).await
    }

    pub async fn submit(&self, selection: Selection, viewport: Viewport) -> ViewportOutcome {
        let (generation, token) = {
            let mut state = self.state.lock();
            state.selection = selection.clone();
            state.token.cancel();
            state.generation += 1;
            state.token = CancellationToken::new();
            (state.generation, state.token.clone())
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(generation, "viewport superseded while settling");
                return ViewportOutcome::Superseded { generation };
            }
            _ = tokio::time::sleep(self.settle) => {}
        }

        let outcome = self.pipeline.load(&selection, &viewport, &token).await;

        let mut state = self.state.lock();
        if outcome.is_cancelled() || token.is_cancelled() || state.generation != generation {
            debug!(generation, latest = state.generation, "discarding superseded result");
            return ViewportOutcome::Superseded { generation };
        }

        let key = selection.domain_key();
        let domain = match &outcome {
            LoadOutcome::Data(frame) => state.domains.observe(&key, Some(frame.domain)),
            LoadOutcome::Empty { .. } => state.domains.observe(&key, None),
            // a fallback frame is shown with its own scale and does not widen the tracked one
            LoadOutcome::Failed { fallback: Some(frame), .. } => frame.domain,
            LoadOutcome::Failed { fallback: None, .. } | LoadOutcome::Cancelled => {
                state.domains.current()
            }
        };

        let view = AppliedView {
            generation,
            selection,
            outcome,
            domain,
        };
        state.applied = Some(view.clone());
        ViewportOutcome::Applied(view)
    }
}
