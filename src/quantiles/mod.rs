//! Quantile estimation
//!
//! [`TDigest`] clusters samples into centroids held in a weight-augmented
//! red-black tree. Inserts, rank lookups and quantile queries all run in
//! O(log n) in the number of centroids; compression and merging rebuild the
//! tree in linear time from sorted input.
//!
//! # Example
//!
//! ```
//! use rbdigest::quantiles::TDigest;
//! use rbdigest::traits::QuantileSketch;
//!
//! let mut digest = TDigest::new();
//!
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0] {
//!     digest.add(value).unwrap();
//! }
//!
//! let median = digest.median().unwrap();
//! assert!((1.0..=10.0).contains(&median));
//!
//! let bytes = digest.serialize(false);
//! let restored = TDigest::deserialize(&bytes).unwrap();
//! assert_eq!(restored.median().unwrap(), median);
//! ```

mod codec;
mod tdigest;
pub(crate) mod tree;

pub use codec::{HEADER_LEN, RECORD_LEN};
pub use tdigest::{
    Distribution, DistributionPoint, TDigest, DEFAULT_ACCURACY, DEFAULT_COMPRESSION,
    MIN_COMPRESSION,
};
