/// Value domain for colour-scale consumers.

use crate::constants::EMPTY_DOMAIN;
use crate::feature::Feature;
use serde::{Deserialize, Serialize};

/// Observed `[min, max]` of feature values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub min: f64,
    pub max: f64,
}

impl ValueDomain {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Domain of a result set, `[0, 1]` when it is empty.
    pub fn from_features(features: &[Feature]) -> Self {
        Self::from_values(features.iter().map(Feature::value)).unwrap_or_default()
    }

    /// `None` when no finite value is present.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<ValueDomain>, v| {
                Some(match acc {
                    None => ValueDomain::new(v, v),
                    Some(d) => ValueDomain::new(d.min.min(v), d.max.max(v)),
                })
            })
    }

    pub fn union(&self, other: &ValueDomain) -> ValueDomain {
        ValueDomain::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` within the domain, clamped to `[0, 1]`.
    /// A zero-width domain maps everything to 0.5.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 || !span.is_finite() {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

impl Default for ValueDomain {
    fn default() -> Self {
        ValueDomain::new(EMPTY_DOMAIN.0, EMPTY_DOMAIN.1)
    }
}

/// Colour domain that stays stable while the user pans.
///
/// Widens with every applied frame while the selection key (metric, bucket
/// and date) stays the same; a new key starts over.
#[derive(Debug, Clone, Default)]
pub struct DomainTracker {
    key: Option<String>,
    domain: Option<ValueDomain>,
}

impl DomainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a frame's domain in and return the tracked domain.
    ///
    /// `observed` is `None` for frames without data; those reset on a key
    /// change but do not widen.
    pub fn observe(&mut self, key: &str, observed: Option<ValueDomain>) -> ValueDomain {
        if self.key.as_deref() != Some(key) {
            self.key = Some(key.to_string());
            self.domain = None;
        }
        self.domain = match (self.domain, observed) {
            (Some(current), Some(next)) => Some(current.union(&next)),
            (current, next) => current.or(next),
        };
        self.current()
    }

    pub fn current(&self) -> ValueDomain {
        self.domain.unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.key = None;
        self.domain = None;
    }
}
