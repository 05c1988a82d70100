/// Region mask builder and cache
///
/// A region mask is the set of cells covering the reference boundary at one
/// resolution. Masks are enumerated directly up to a ceiling resolution; finer
/// resolutions reuse the ceiling mask and test each cell's ancestor instead,
/// which over-includes fine cells near the edge but keeps memory bounded.
///
/// Each resolution is built at most once per boundary. Concurrent callers for
/// the same resolution block on the single build in progress.

use crate::error::{HeatmapError, Result};
use crate::region::RegionBoundary;
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, Resolution};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Which cells count as covering the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskContainment {
    /// Cell centroid inside the boundary
    Centroid,
    /// Any overlap, full or partial
    #[default]
    Covers,
}

impl From<MaskContainment> for ContainmentMode {
    fn from(value: MaskContainment) -> Self {
        match value {
            MaskContainment::Centroid => ContainmentMode::ContainsCentroid,
            MaskContainment::Covers => ContainmentMode::Covers,
        }
    }
}

/// Cells covering the region at one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    resolution: Resolution,
    cells: HashSet<CellIndex>,
}

impl RegionMask {
    pub fn new(resolution: Resolution, cells: HashSet<CellIndex>) -> Self {
        Self { resolution, cells }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        self.cells.contains(&cell)
    }

    /// Membership of `cell`'s ancestor at this mask's resolution.
    /// Cells coarser than the mask are never members.
    pub fn contains_ancestor_of(&self, cell: CellIndex) -> bool {
        cell.parent(self.resolution)
            .is_some_and(|ancestor| self.cells.contains(&ancestor))
    }

    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells.iter().copied()
    }
}

/// Membership test handed to ingestion for one requested resolution.
#[derive(Debug, Clone)]
pub enum MaskFilter {
    /// Resolution at or below the ceiling: direct set membership
    Exact(Arc<RegionMask>),
    /// Resolution above the ceiling: ancestor lookup in the ceiling mask
    Ancestor {
        resolution: Resolution,
        ceiling: Arc<RegionMask>,
    },
}

impl MaskFilter {
    pub fn contains(&self, cell: CellIndex) -> bool {
        match self {
            MaskFilter::Exact(mask) => mask.contains(cell),
            MaskFilter::Ancestor { ceiling, .. } => ceiling.contains_ancestor_of(cell),
        }
    }

    /// The resolution this filter was requested for.
    pub fn resolution(&self) -> Resolution {
        match self {
            MaskFilter::Exact(mask) => mask.resolution(),
            MaskFilter::Ancestor { resolution, .. } => *resolution,
        }
    }

    /// The mask actually consulted.
    pub fn backing_mask(&self) -> &Arc<RegionMask> {
        match self {
            MaskFilter::Exact(mask) => mask,
            MaskFilter::Ancestor { ceiling, .. } => ceiling,
        }
    }
}

type MaskSlot = Arc<OnceCell<Arc<RegionMask>>>;

/// Per-resolution memo of region masks for one reference boundary.
pub struct RegionMaskCache {
    boundary: RwLock<Arc<RegionBoundary>>,
    ceiling: Resolution,
    containment: MaskContainment,
    slots: Mutex<HashMap<Resolution, MaskSlot>>,
    builds: AtomicUsize,
}

impl RegionMaskCache {
    pub fn new(boundary: RegionBoundary, ceiling: Resolution) -> Self {
        Self {
            boundary: RwLock::new(Arc::new(boundary)),
            ceiling,
            containment: MaskContainment::default(),
            slots: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn with_containment(mut self, containment: MaskContainment) -> Self {
        self.containment = containment;
        self
    }

    pub fn ceiling(&self) -> Resolution {
        self.ceiling
    }

    pub fn containment(&self) -> MaskContainment {
        self.containment
    }

    pub fn boundary(&self) -> Arc<RegionBoundary> {
        self.boundary.read().clone()
    }

    /// Filter for `resolution`, building the backing mask on first use.
    ///
    /// Blocks while another thread builds the same mask. A failed build is
    /// not memoized; the next call tries again.
    pub fn mask(&self, resolution: Resolution) -> Result<MaskFilter> {
        let target = resolution.min(self.ceiling);
        let slot = self.slot(target);

        let mask = match slot.get() {
            Some(mask) => {
                debug!(resolution = u8::from(target), "region mask cache hit");
                mask.clone()
            }
            None => slot.get_or_try_init(|| self.build(target))?.clone(),
        };

        Ok(if resolution <= self.ceiling {
            MaskFilter::Exact(mask)
        } else {
            MaskFilter::Ancestor {
                resolution,
                ceiling: mask,
            }
        })
    }

    /// Number of masks enumerated since construction.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Acquire)
    }

    /// Resolutions with a finished mask, ascending.
    pub fn cached_resolutions(&self) -> Vec<Resolution> {
        let mut resolutions: Vec<Resolution> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(res, _)| *res)
            .collect();
        resolutions.sort();
        resolutions
    }

    /// Swap the reference boundary and forget every memoized mask.
    pub fn replace_boundary(&self, boundary: RegionBoundary) {
        let mut current = self.boundary.write();
        *current = Arc::new(boundary);
        self.slots.lock().clear();
        info!(region = current.name(), "region boundary replaced, masks invalidated");
    }

    fn slot(&self, resolution: Resolution) -> MaskSlot {
        self.slots.lock().entry(resolution).or_default().clone()
    }

    fn build(&self, resolution: Resolution) -> Result<Arc<RegionMask>> {
        let boundary = self.boundary();
        let started = Instant::now();

        let mut tiler = TilerBuilder::new(resolution)
            .containment_mode(self.containment.into())
            .build();
        tiler.add(boundary.to_geo_polygon()).map_err(|e| {
            HeatmapError::Geometry(format!("region {}: {e}", boundary.name()))
        })?;
        let cells: HashSet<CellIndex> = tiler.into_coverage().collect();

        self.builds.fetch_add(1, Ordering::AcqRel);
        info!(
            region = boundary.name(),
            resolution = u8::from(resolution),
            cells = cells.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built region mask"
        );
        Ok(Arc::new(RegionMask::new(resolution, cells)))
    }
}

impl std::fmt::Debug for RegionMaskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionMaskCache")
            .field("region", &self.boundary().name().to_string())
            .field("ceiling", &self.ceiling)
            .field("containment", &self.containment)
            .field("cached", &self.cached_resolutions())
            .field("builds", &self.build_count())
            .finish()
    }
}
