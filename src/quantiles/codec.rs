//! Fixed-layout binary encoding for [`TDigest`]
//!
//! All fields are little-endian IEEE-754 doubles:
//!
//! ```text
//! offset  field
//! 0       average
//! 8       accuracy
//! 16      compression
//! 24      min
//! 32      max
//! 40      (mean, weight) per centroid, ascending by mean
//! ```
//!
//! There is no magic number and no version field; the centroid count is
//! implied by the buffer length.

use super::tdigest::TDigest;
use super::tree::{CentroidTree, SortedBuilder};
use crate::error::{DecodeError, DigestError, Result};
use tracing::{debug, warn};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Size of the scalar header
pub const HEADER_LEN: usize = 40;

/// Size of one `(mean, weight)` record
pub const RECORD_LEN: usize = 16;

impl TDigest {
    /// Bytes needed to serialize this digest uncompressed.
    ///
    /// A compressed serialization is never larger.
    pub fn expected_serialized_len(&self) -> usize {
        encoded_len(self.tree())
    }

    /// Encode the digest.
    ///
    /// With `compressed` the centroids are re-clustered first; the digest
    /// itself is not modified.
    pub fn serialize(&self, compressed: bool) -> Vec<u8> {
        let reclustered;
        let tree = if compressed {
            reclustered = self.compressed_tree();
            &reclustered
        } else {
            self.tree()
        };

        let mut buf = Vec::new();
        buf.resize(encoded_len(tree), 0u8);
        self.encode(tree, &mut buf);
        buf
    }

    /// Encode into a caller-supplied buffer, returning the bytes written.
    ///
    /// # Errors
    ///
    /// [`DigestError::InvalidArgument`] if `target` is shorter than the
    /// encoding; nothing is written in that case.
    pub fn serialize_into(&self, target: &mut [u8], compressed: bool) -> Result<usize> {
        let reclustered;
        let tree = if compressed {
            reclustered = self.compressed_tree();
            &reclustered
        } else {
            self.tree()
        };

        let len = encoded_len(tree);
        let Some(slot) = target.get_mut(..len) else {
            return Err(DigestError::InvalidArgument(
                "target buffer is too small for the encoded digest",
            ));
        };
        self.encode(tree, slot);
        Ok(len)
    }

    /// Decode a digest produced by [`serialize`](Self::serialize).
    ///
    /// The header scalars are taken verbatim. Centroid records must have
    /// strictly ascending finite means and positive finite weights.
    ///
    /// # Errors
    ///
    /// [`DigestError::Format`] describing why the buffer was rejected.
    pub fn deserialize(bytes: &[u8]) -> Result<TDigest> {
        let digest = decode(bytes).inspect_err(|err| {
            warn!(len = bytes.len(), error = %err, "rejected digest bytes");
        })?;
        debug!(
            centroids = digest.centroid_count(),
            total = digest.tree().total_weight(),
            "decoded digest"
        );
        Ok(digest)
    }

    /// Writes header plus records; `target` must be exactly `encoded_len(tree)`
    fn encode(&self, tree: &CentroidTree, target: &mut [u8]) {
        let (header, body) = target.split_at_mut(HEADER_LEN);

        for (slot, value) in header.chunks_exact_mut(8).zip(self.scalars()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }

        for (record, centroid) in body.chunks_exact_mut(RECORD_LEN).zip(tree.iter()) {
            let (mean, weight) = record.split_at_mut(8);
            mean.copy_from_slice(&centroid.mean.to_le_bytes());
            weight.copy_from_slice(&centroid.weight.to_le_bytes());
        }
    }

    /// Rebuild a digest from raw scalars and ascending `(mean, weight)`
    /// records, rejecting records a digest could not have produced.
    pub(crate) fn from_records(
        scalars: [f64; 5],
        records: impl IntoIterator<Item = (f64, f64)>,
    ) -> core::result::Result<TDigest, DecodeError> {
        let [average, accuracy, compression, min, max] = scalars;
        let records = records.into_iter();
        let mut builder = SortedBuilder::with_capacity(records.size_hint().0);
        let mut previous: Option<f64> = None;

        for (mean, weight) in records {
            if !mean.is_finite() {
                return Err(DecodeError::Corrupted("centroid mean is not finite"));
            }
            if !(weight > 0.0 && weight.is_finite()) {
                return Err(DecodeError::Corrupted(
                    "centroid weight must be positive and finite",
                ));
            }
            if previous.is_some_and(|prev| prev >= mean) {
                return Err(DecodeError::Corrupted(
                    "centroid means are not strictly ascending",
                ));
            }
            previous = Some(mean);
            builder.push(mean, weight);
        }

        Ok(TDigest::from_tree(
            builder.build(),
            average,
            min,
            max,
            accuracy,
            compression,
        ))
    }
}

fn encoded_len(tree: &CentroidTree) -> usize {
    HEADER_LEN + RECORD_LEN * tree.len()
}

fn decode(bytes: &[u8]) -> core::result::Result<TDigest, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::BufferTooShort {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }

    let (header, body) = bytes.split_at(HEADER_LEN);
    let partial = body.len() % RECORD_LEN;
    if partial != 0 {
        return Err(DecodeError::TrailingBytes(partial));
    }

    let mut scalars = [0.0; 5];
    for (scalar, raw) in scalars.iter_mut().zip(header.chunks_exact(8)) {
        *scalar = read_f64(raw);
    }

    let records = body
        .chunks_exact(RECORD_LEN)
        .map(|record| (read_f64(&record[..8]), read_f64(&record[8..])));

    TDigest::from_records(scalars, records)
}

#[inline]
fn read_f64(raw: &[u8]) -> f64 {
    let mut le = [0u8; 8];
    le.copy_from_slice(raw);
    f64::from_le_bytes(le)
}
