//! # rbdigest
//!
//! Mergeable t-digest quantile sketch for Rust.
//!
//! rbdigest summarises a stream of weighted `f64` samples in a bounded set of
//! centroids and answers percentile queries with error that shrinks toward
//! the tails. Centroids live in a red-black tree augmented with subtree
//! weights, so every insert and query costs O(log n) in the number of
//! centroids and no sample ever waits in an unsorted buffer.
//!
//! ## Features
//!
//! - **Streaming ingestion**: weighted or unit samples, clustered on arrival
//! - **Exact scalars**: average, min and max are tracked exactly
//! - **Full mergeability**: pairwise and k-way merges for distributed workers
//! - **Value transforms**: shift and scale a digest in place or by operator
//! - **Compact encoding**: fixed little-endian binary layout, optionally
//!   recompressed on the way out
//!
//! ## Quick Start
//!
//! ```rust
//! use rbdigest::prelude::*;
//!
//! let mut latencies = TDigest::new();
//! for ms in [12.0, 15.0, 11.0, 250.0, 14.0, 13.0] {
//!     latencies.add(ms).unwrap();
//! }
//! println!("p99: ~{}", latencies.quantile(0.99).unwrap());
//! ```
//!
//! ## Distributed Computing
//!
//! Digests built on separate workers combine into one:
//!
//! ```rust
//! use rbdigest::TDigest;
//! use rbdigest::traits::QuantileSketch;
//!
//! let mut worker1 = TDigest::new();
//! let mut worker2 = TDigest::new();
//!
//! worker1.add(1.0).unwrap();
//! worker2.add(2.0).unwrap();
//!
//! let merged = TDigest::merge_multiple([&worker1, &worker2], 0.02, 25.0).unwrap();
//! assert_eq!(merged.count(), 2.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support; without it the crate is
//!   `no_std` + `alloc`
//! - `serde`: Enable serialization

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod error;
pub mod quantiles;
pub mod traits;

mod math;

pub mod prelude {
    pub use crate::error::{DecodeError, DigestError};
    pub use crate::quantiles::{DistributionPoint, TDigest};
    pub use crate::traits::*;
}

pub use error::{DecodeError, DigestError, Result};
pub use quantiles::{DistributionPoint, TDigest};
