/// Level-of-detail selection: continuous map zoom to a discrete grid resolution.

use crate::constants::{LOD_MAX_RESOLUTION, LOD_TABLE};
use crate::error::{HeatmapError, Result};
use h3o::Resolution;
use serde::{Deserialize, Serialize};

/// One row of the step table: zooms strictly below `below_zoom` use `resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodStep {
    pub below_zoom: f64,
    pub resolution: u8,
}

impl LodStep {
    pub const fn new(below_zoom: f64, resolution: u8) -> Self {
        Self {
            below_zoom,
            resolution,
        }
    }
}

/// The built-in step table.
pub fn default_lod_steps() -> Vec<LodStep> {
    LOD_TABLE
        .iter()
        .map(|&(below_zoom, resolution)| LodStep::new(below_zoom, resolution))
        .collect()
}

/// Validated, monotonic zoom → resolution step function.
#[derive(Debug, Clone, PartialEq)]
pub struct LodSelector {
    steps: Vec<(f64, Resolution)>,
    max: Resolution,
}

impl LodSelector {
    pub fn new(steps: &[LodStep], max_resolution: u8) -> Result<Self> {
        let max = to_resolution(max_resolution)?;
        let mut validated: Vec<(f64, Resolution)> = Vec::with_capacity(steps.len());

        for step in steps {
            if !step.below_zoom.is_finite() {
                return Err(HeatmapError::Config(format!(
                    "LOD threshold {} is not finite",
                    step.below_zoom
                )));
            }
            let resolution = to_resolution(step.resolution)?;
            if resolution > max {
                return Err(HeatmapError::Config(format!(
                    "LOD resolution {} exceeds the maximum {max_resolution}",
                    step.resolution
                )));
            }
            if let Some(&(prev_zoom, prev_res)) = validated.last() {
                if step.below_zoom <= prev_zoom {
                    return Err(HeatmapError::Config(format!(
                        "LOD thresholds must be strictly ascending ({prev_zoom} then {})",
                        step.below_zoom
                    )));
                }
                if resolution < prev_res {
                    return Err(HeatmapError::Config(format!(
                        "LOD resolutions must not decrease ({} then {})",
                        u8::from(prev_res),
                        step.resolution
                    )));
                }
            }
            validated.push((step.below_zoom, resolution));
        }

        Ok(Self {
            steps: validated,
            max,
        })
    }

    /// Resolution for `zoom`: the first step whose threshold is still above
    /// the zoom, or the maximum past the last threshold. NaN gets the
    /// coarsest resolution.
    pub fn resolution_for_zoom(&self, zoom: f64) -> Resolution {
        if zoom.is_nan() {
            return self.coarsest();
        }
        self.steps
            .iter()
            .find(|(below, _)| zoom < *below)
            .map_or(self.max, |&(_, resolution)| resolution)
    }

    pub fn coarsest(&self) -> Resolution {
        self.steps.first().map_or(self.max, |&(_, r)| r)
    }

    pub fn max_resolution(&self) -> Resolution {
        self.max
    }
}

impl Default for LodSelector {
    fn default() -> Self {
        // LOD_TABLE is a valid table, so only the type needs building here
        let steps = LOD_TABLE
            .iter()
            .filter_map(|&(zoom, res)| Resolution::try_from(res).ok().map(|r| (zoom, r)))
            .collect();
        Self {
            steps,
            max: Resolution::try_from(LOD_MAX_RESOLUTION).unwrap_or(Resolution::Ten),
        }
    }
}

fn to_resolution(value: u8) -> Result<Resolution> {
    Resolution::try_from(value)
        .map_err(|_| HeatmapError::Config(format!("{value} is not a grid resolution")))
}
