//! Core trait for streaming quantile estimators
//!
//! Ingestion and queries live on [`QuantileSketch`] so code can be written
//! against any estimator; construction, merging and serialization stay on
//! the concrete type.

use crate::error::Result;
use core::fmt::Debug;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Quantile estimation sketches over weighted `f64` samples
pub trait QuantileSketch: Clone + Debug {
    /// Add `value` with the given positive weight
    ///
    /// Returns an error, leaving the sketch untouched, if `weight` is not a
    /// positive finite number or `value` is not finite.
    fn add_weighted(&mut self, value: f64, weight: f64) -> Result<()>;

    /// Add `value` with weight 1
    fn add(&mut self, value: f64) -> Result<()> {
        self.add_weighted(value, 1.0)
    }

    /// Estimated value at quantile `q` (0.0 to 1.0)
    ///
    /// q=0.5 returns the median estimate
    fn quantile(&self, q: f64) -> Result<f64>;

    /// Total weight added so far
    fn count(&self) -> f64;

    /// Exact weighted average, `None` when empty
    fn average(&self) -> Option<f64>;

    /// Smallest value seen
    fn min(&self) -> Option<f64>;

    /// Largest value seen
    fn max(&self) -> Option<f64>;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0.0
    }

    /// Get median (50th percentile)
    fn median(&self) -> Result<f64> {
        self.quantile(0.5)
    }

    /// Get multiple quantiles at once, failing on the first bad rank
    fn quantiles(&self, ranks: &[f64]) -> Result<Vec<f64>> {
        ranks.iter().map(|&q| self.quantile(q)).collect()
    }
}
