//! t-digest quantile estimator
//!
//! Centroids are kept in a weight-augmented red-black tree (see
//! [`tree`](super::tree)), so every sample is clustered the moment it
//! arrives: there is no unsorted buffer and no lazy flush on query.
//!
//! # Clustering policy
//!
//! A centroid sitting at rank-quantile `q` may hold at most
//! `4 * n * accuracy * q * (1 - q)` weight, where `n` is the total weight.
//! The bound peaks at the median and vanishes at both ends, which keeps the
//! tails resolved with small clusters. Once the number of centroids exceeds
//! `compression / accuracy`, the digest re-clusters itself from scratch.
//!
//! # Thread Safety
//!
//! `TDigest` is `Send + Sync` but has no interior locking. Mutating calls
//! need `&mut self`; to ingest from several threads keep one digest per
//! writer and combine them with [`TDigest::merge_multiple`].

use super::tree::{CentroidTree, Iter, Lookup, NodeId, SortedBuilder};
use crate::error::{DigestError, Result};
use crate::math;
use crate::traits::QuantileSketch;
use core::iter::{FusedIterator, Peekable};
use tracing::{debug, trace};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Accuracy used by [`TDigest::new`]
pub const DEFAULT_ACCURACY: f64 = 0.02;

/// Compression constant used by [`TDigest::new`]
pub const DEFAULT_COMPRESSION: f64 = 25.0;

/// Smallest accepted compression constant
pub const MIN_COMPRESSION: f64 = 15.0;

/// One point of the digest's distribution: a centroid's mean (x-axis) and
/// the weight it carries (y-axis).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionPoint {
    /// Centroid mean
    pub value: f64,
    /// Total weight clustered at this mean
    pub count: f64,
}

/// t-digest quantile sketch
///
/// Ingests weighted samples one at a time and answers approximate quantile
/// queries with error that shrinks toward the extremes. Average, minimum
/// and maximum are tracked exactly alongside the centroids.
///
/// # Parameters
///
/// - `accuracy` (default 0.02): smaller values mean smaller clusters, better
///   accuracy and more memory. Must be positive.
/// - `compression` (default 25): together with `accuracy` caps the number of
///   centroids at `compression / accuracy` before recompression. Must be at
///   least 15.
///
/// # Example
///
/// ```
/// use rbdigest::prelude::*;
///
/// let mut digest = TDigest::new();
/// for i in 1..=1000 {
///     digest.add(i as f64).unwrap();
/// }
///
/// let p50 = digest.quantile(0.5).unwrap();
/// assert!((p50 - 500.0).abs() < 10.0);
/// assert_eq!(digest.min(), Some(1.0));
/// ```
#[derive(Clone, Debug)]
pub struct TDigest {
    tree: CentroidTree,
    /// Exact running weighted average
    average: f64,
    /// Exact extrema, independent of centroid blending
    min: f64,
    max: f64,
    accuracy: f64,
    compression: f64,
}

impl TDigest {
    /// Create a digest with the default accuracy (0.02) and compression (25)
    pub fn new() -> Self {
        Self::empty(DEFAULT_ACCURACY, DEFAULT_COMPRESSION)
    }

    /// Create a digest with explicit settings
    ///
    /// # Errors
    ///
    /// [`DigestError::InvalidArgument`] if `accuracy` is not a positive
    /// finite number or `compression` is not a finite number of at least 15.
    pub fn with_config(accuracy: f64, compression: f64) -> Result<Self> {
        validate_config(accuracy, compression)?;
        Ok(Self::empty(accuracy, compression))
    }

    fn empty(accuracy: f64, compression: f64) -> Self {
        Self::from_tree(CentroidTree::new(), 0.0, 0.0, 0.0, accuracy, compression)
    }

    pub(crate) fn from_tree(
        tree: CentroidTree,
        average: f64,
        min: f64,
        max: f64,
        accuracy: f64,
        compression: f64,
    ) -> Self {
        Self {
            tree,
            average,
            min,
            max,
            accuracy,
            compression,
        }
    }

    /// Accuracy setting
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Compression constant setting
    pub fn compression_constant(&self) -> f64 {
        self.compression
    }

    /// Number of centroids currently allocated
    pub fn centroid_count(&self) -> usize {
        self.tree.len()
    }

    pub(crate) fn tree(&self) -> &CentroidTree {
        &self.tree
    }

    /// Raw scalars as stored, including the placeholders of an empty digest
    pub(crate) fn scalars(&self) -> [f64; 5] {
        [
            self.average,
            self.accuracy,
            self.compression,
            self.min,
            self.max,
        ]
    }

    /// Lazy view of the centroids as `(value, count)` points, ascending by
    /// value. Each call starts a fresh traversal.
    pub fn distribution(&self) -> Distribution<'_> {
        Distribution {
            centroids: self.tree.iter(),
        }
    }

    /// Multiply every value in the digest by `factor`, in place.
    ///
    /// Means, average, min and max are scaled; weights are not. A zero or
    /// negative factor is not checked and leaves the digest unordered.
    pub fn multiply_on(&mut self, factor: f64) -> &mut Self {
        self.min *= factor;
        self.max *= factor;
        self.average *= factor;
        self.tree.map_means(|mean| mean * factor);
        self
    }

    /// Divide every value in the digest by `factor`, in place.
    ///
    /// Same caveats as [`multiply_on`](Self::multiply_on).
    pub fn divide_on(&mut self, factor: f64) -> &mut Self {
        self.min /= factor;
        self.max /= factor;
        self.average /= factor;
        self.tree.map_means(|mean| mean / factor);
        self
    }

    /// Add `offset` to every value in the digest, in place
    pub fn shift(&mut self, offset: f64) -> &mut Self {
        self.min += offset;
        self.max += offset;
        self.average += offset;
        self.tree.map_means(|mean| mean + offset);
        self
    }

    /// Re-cluster all centroids now instead of waiting for the ceiling
    pub fn compress(&mut self) {
        self.tree = self.compressed_tree();
    }

    /// Merge two digests into a new one with the given settings.
    ///
    /// Average, min and max combine exactly. Centroids are merged in mean
    /// order (equal means pool their weight) and compressed once against the
    /// combined weight.
    ///
    /// # Errors
    ///
    /// [`DigestError::InvalidArgument`] for invalid `accuracy`/`compression`.
    pub fn merge(a: &TDigest, b: &TDigest, accuracy: f64, compression: f64) -> Result<TDigest> {
        validate_config(accuracy, compression)?;
        Ok(Self::merge_pair(a, b, accuracy, compression))
    }

    fn merge_pair(a: &TDigest, b: &TDigest, accuracy: f64, compression: f64) -> TDigest {
        let mut builder = SortedBuilder::with_capacity(a.centroid_count() + b.centroid_count());
        let mut left = a.tree.iter().peekable();
        let mut right = b.tree.iter().peekable();

        loop {
            let heads = (
                left.peek().map(|c| (c.mean, c.weight)),
                right.peek().map(|c| (c.mean, c.weight)),
            );
            match heads {
                (None, None) => break,
                (Some((x, wx)), Some((y, wy))) if x == y => {
                    builder.push(x, wx + wy);
                    left.next();
                    right.next();
                }
                (Some((x, wx)), Some((y, _))) if x < y => {
                    builder.push(x, wx);
                    left.next();
                }
                (Some((x, wx)), None) => {
                    builder.push(x, wx);
                    left.next();
                }
                (_, Some((y, wy))) => {
                    builder.push(y, wy);
                    right.next();
                }
            }
        }

        let (average, min, max) = combined_scalars([a, b]);
        let mut merged = Self::from_tree(builder.build(), average, min, max, accuracy, compression);
        let before = merged.centroid_count();
        merged.tree = merged.compressed_tree();

        debug!(
            before,
            after = merged.centroid_count(),
            total = merged.tree.total_weight(),
            "merged two digests"
        );
        merged
    }

    /// Merge any number of digests into a new one with the given settings.
    ///
    /// Performs a k-way merge of all centroid sequences, pooling weight on
    /// equal means, then compresses. A second compression pass runs if the
    /// result still exceeds `compression / accuracy` centroids.
    ///
    /// # Errors
    ///
    /// [`DigestError::InvalidArgument`] for invalid `accuracy`/`compression`.
    pub fn merge_multiple<'a, I>(digests: I, accuracy: f64, compression: f64) -> Result<TDigest>
    where
        I: IntoIterator<Item = &'a TDigest>,
    {
        validate_config(accuracy, compression)?;

        let digests: Vec<&TDigest> = digests.into_iter().collect();
        let capacity = digests.iter().map(|d| d.centroid_count()).sum();
        let mut heads: Vec<Peekable<Iter<'_>>> =
            digests.iter().map(|d| d.tree.iter().peekable()).collect();
        let mut builder = SortedBuilder::with_capacity(capacity);

        loop {
            let mut lowest: Option<f64> = None;
            for head in &mut heads {
                if let Some(centroid) = head.peek() {
                    if lowest.map_or(true, |mean| centroid.mean < mean) {
                        lowest = Some(centroid.mean);
                    }
                }
            }
            let Some(mean) = lowest else {
                break;
            };

            let mut weight = 0.0;
            for head in &mut heads {
                if let Some(centroid) = head.next_if(|c| c.mean == mean) {
                    weight += centroid.weight;
                }
            }
            builder.push(mean, weight);
        }

        let (average, min, max) = combined_scalars(digests.iter().copied());
        let mut merged = Self::from_tree(builder.build(), average, min, max, accuracy, compression);
        let before = merged.centroid_count();
        merged.tree = merged.compressed_tree();
        if merged.over_ceiling() {
            merged.tree = merged.compressed_tree();
        }

        debug!(
            digests = digests.len(),
            before,
            after = merged.centroid_count(),
            total = merged.tree.total_weight(),
            "merged digests"
        );
        Ok(merged)
    }

    #[inline]
    fn over_ceiling(&self) -> bool {
        self.tree.len() as f64 > self.compression / self.accuracy
    }

    /// Largest weight a centroid at rank-quantile `q` may reach
    #[inline]
    fn threshold(&self, q: f64, total: f64) -> f64 {
        4.0 * total * self.accuracy * q * (1.0 - q)
    }

    /// Threshold of an existing centroid, from its rank midpoint
    fn threshold_of(&self, id: NodeId, total: f64) -> f64 {
        let centroid = &self.tree[id];
        let q = (self.tree.sum_of_left(id) + centroid.weight / 2.0) / total;
        self.threshold(q, total)
    }

    /// Re-cluster the current centroids greedily from left to right.
    ///
    /// Thresholds are measured against the full current weight, not a
    /// running count, so the result honours the same bound `add` uses.
    pub(crate) fn compressed_tree(&self) -> CentroidTree {
        let total = self.tree.total_weight();
        let mut builder = SortedBuilder::with_capacity(self.tree.len());
        let mut cumulative = 0.0;

        for centroid in self.tree.iter() {
            let mut weight = centroid.weight;

            if let Some(last) = builder.last_mut() {
                let threshold = self.threshold((cumulative - last.weight / 2.0) / total, total);
                if last.weight + weight < threshold {
                    let delta = (threshold - last.weight).min(weight);
                    last.absorb(delta, centroid.mean);
                    weight -= delta;
                }
            }

            cumulative += centroid.weight;
            if weight > 0.0 {
                builder.push(centroid.mean, weight);
            }
        }

        debug!(
            before = self.tree.len(),
            after = builder.len(),
            total,
            "compressed centroids"
        );
        builder.build()
    }
}

impl Default for TDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantileSketch for TDigest {
    fn add_weighted(&mut self, value: f64, weight: f64) -> Result<()> {
        if !(weight > 0.0 && weight.is_finite()) {
            return Err(DigestError::InvalidArgument(
                "weight must be positive and finite",
            ));
        }
        if !value.is_finite() {
            return Err(DigestError::InvalidArgument("value must be finite"));
        }

        if self.tree.is_empty() {
            self.average = value;
            self.min = value;
            self.max = value;
            self.tree.add(value, weight);
            return Ok(());
        }

        let total = self.tree.total_weight();
        self.average += (value - self.average) * weight / (total + weight);
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let (below, above) = match self.tree.get_or_closest(value) {
            Lookup::Exact(id) => {
                self.tree.update(id, weight, value);
                return Ok(());
            }
            Lookup::Between { below, above } => (below, above),
        };

        // the nearer neighbour wins; a tie keeps both
        let candidates = match (below, above) {
            (Some(lo), Some(hi)) => {
                let to_lo = math::abs(self.tree[lo].mean - value);
                let to_hi = math::abs(self.tree[hi].mean - value);
                if to_lo < to_hi {
                    [Some(lo), None]
                } else if to_lo > to_hi {
                    [Some(hi), None]
                } else {
                    [Some(lo), Some(hi)]
                }
            }
            (lo, hi) => [lo.or(hi), None],
        };

        // thresholds are taken before any candidate grows
        let viable = candidates.map(|candidate| {
            candidate
                .map(|id| (id, self.threshold_of(id, total)))
                .filter(|&(id, threshold)| self.tree[id].weight + weight < threshold)
        });

        let mut remaining = weight;
        for (id, threshold) in viable.into_iter().flatten() {
            if remaining <= 0.0 {
                break;
            }
            let delta = (threshold - self.tree[id].weight).min(remaining);
            self.tree.update(id, delta, value);
            remaining -= delta;
        }

        if remaining > 0.0 {
            trace!(value, weight = remaining, "opening centroid");
            self.tree.add(value, remaining);

            if self.over_ceiling() {
                self.compress();
            }
        }

        Ok(())
    }

    fn quantile(&self, q: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(DigestError::InvalidArgument("quantile must be in [0, 1]"));
        }

        let tree = &self.tree;
        let Some(root) = tree.root() else {
            return Err(DigestError::InvalidState(
                "quantile is undefined for an empty digest",
            ));
        };

        if tree.len() == 1 {
            return Ok(tree[root].mean);
        }

        let total = tree.total_weight();
        let target = q * total;
        let Some((nearest, point_a)) = tree.find_by_weight(target) else {
            return Err(DigestError::InvalidState(
                "quantile is undefined for an empty digest",
            ));
        };

        let mean_a = tree[nearest].mean;
        if target == point_a {
            return Ok(mean_a);
        }

        // neighbour on the side the target falls toward; min/max stand in
        // as virtual points at rank 0 and rank `total`
        let weight_a = tree[nearest].weight;
        let (mean_b, point_b) = if target < point_a {
            match tree.predecessor(nearest) {
                Some(id) => (tree[id].mean, point_a - (weight_a + tree[id].weight) / 2.0),
                None => (self.min, 0.0),
            }
        } else {
            match tree.successor(nearest) {
                Some(id) => (tree[id].mean, point_a + (weight_a + tree[id].weight) / 2.0),
                None => (self.max, total),
            }
        };

        let distance = math::abs(point_a - point_b);
        Ok((mean_a * (distance - math::abs(target - point_a))
            + mean_b * (distance - math::abs(target - point_b)))
            / distance)
    }

    fn count(&self) -> f64 {
        self.tree.total_weight()
    }

    fn average(&self) -> Option<f64> {
        (!self.tree.is_empty()).then_some(self.average)
    }

    fn min(&self) -> Option<f64> {
        (!self.tree.is_empty()).then_some(self.min)
    }

    fn max(&self) -> Option<f64> {
        (!self.tree.is_empty()).then_some(self.max)
    }
}

/// Iterator returned by [`TDigest::distribution`]
#[derive(Clone, Debug)]
pub struct Distribution<'a> {
    centroids: Iter<'a>,
}

impl Iterator for Distribution<'_> {
    type Item = DistributionPoint;

    fn next(&mut self) -> Option<DistributionPoint> {
        self.centroids.next().map(|c| DistributionPoint {
            value: c.mean,
            count: c.weight,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.centroids.size_hint()
    }
}

impl ExactSizeIterator for Distribution<'_> {}

impl FusedIterator for Distribution<'_> {}

fn validate_config(accuracy: f64, compression: f64) -> Result<()> {
    if !(accuracy > 0.0 && accuracy.is_finite()) {
        return Err(DigestError::InvalidArgument(
            "accuracy must be positive and finite",
        ));
    }
    if !(compression >= MIN_COMPRESSION && compression.is_finite()) {
        return Err(DigestError::InvalidArgument(
            "compression constant must be finite and at least 15",
        ));
    }
    Ok(())
}

/// Weighted average and extrema over the non-empty digests
fn combined_scalars<'a>(digests: impl IntoIterator<Item = &'a TDigest>) -> (f64, f64, f64) {
    let mut total = 0.0;
    let mut weighted = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for digest in digests.into_iter().filter(|d| !d.tree.is_empty()) {
        let count = digest.tree.total_weight();
        total += count;
        weighted += digest.average * count;
        min = min.min(digest.min);
        max = max.max(digest.max);
    }

    if total > 0.0 {
        (weighted / total, min, max)
    } else {
        (0.0, 0.0, 0.0)
    }
}

// ============================================================================
// Operators
// ============================================================================

impl core::ops::Add<&TDigest> for &TDigest {
    type Output = TDigest;

    /// Merge with default settings
    fn add(self, rhs: &TDigest) -> TDigest {
        TDigest::merge_pair(self, rhs, DEFAULT_ACCURACY, DEFAULT_COMPRESSION)
    }
}

impl core::ops::Add<f64> for TDigest {
    type Output = TDigest;

    fn add(mut self, offset: f64) -> TDigest {
        self.shift(offset);
        self
    }
}

impl core::ops::Add<f64> for &TDigest {
    type Output = TDigest;

    fn add(self, offset: f64) -> TDigest {
        self.clone() + offset
    }
}

impl core::ops::Sub<f64> for TDigest {
    type Output = TDigest;

    fn sub(mut self, offset: f64) -> TDigest {
        self.shift(-offset);
        self
    }
}

impl core::ops::Sub<f64> for &TDigest {
    type Output = TDigest;

    fn sub(self, offset: f64) -> TDigest {
        self.clone() - offset
    }
}

impl core::ops::Mul<f64> for TDigest {
    type Output = TDigest;

    fn mul(mut self, factor: f64) -> TDigest {
        self.multiply_on(factor);
        self
    }
}

impl core::ops::Mul<f64> for &TDigest {
    type Output = TDigest;

    fn mul(self, factor: f64) -> TDigest {
        self.clone() * factor
    }
}

impl core::ops::Div<f64> for TDigest {
    type Output = TDigest;

    fn div(mut self, factor: f64) -> TDigest {
        self.divide_on(factor);
        self
    }
}

impl core::ops::Div<f64> for &TDigest {
    type Output = TDigest;

    fn div(self, factor: f64) -> TDigest {
        self.clone() / factor
    }
}

// ============================================================================
// Serde
// ============================================================================

#[cfg(feature = "serde")]
impl serde::Serialize for TDigest {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let centroids: Vec<(f64, f64)> = self.tree.iter().map(|c| (c.mean, c.weight)).collect();
        let mut state = serializer.serialize_struct("TDigest", 6)?;
        state.serialize_field("average", &self.average)?;
        state.serialize_field("accuracy", &self.accuracy)?;
        state.serialize_field("compression", &self.compression)?;
        state.serialize_field("min", &self.min)?;
        state.serialize_field("max", &self.max)?;
        state.serialize_field("centroids", &centroids)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TDigest {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct DigestData {
            average: f64,
            accuracy: f64,
            compression: f64,
            min: f64,
            max: f64,
            centroids: Vec<(f64, f64)>,
        }

        let data = <DigestData as serde::Deserialize>::deserialize(deserializer)?;
        TDigest::from_records(
            [
                data.average,
                data.accuracy,
                data.compression,
                data.min,
                data.max,
            ],
            data.centroids,
        )
        .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
