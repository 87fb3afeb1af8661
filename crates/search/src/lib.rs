//! Hybrid lexical + vector result merging.
//!
//! [`normalize`] and [`merge`] are pure and synchronous; [`gateway`] bounds
//! calls to a vector backend with a deadline. [`bm25`], [`vector`] and
//! [`hybrid`] are the concrete backends and orchestration used by the query
//! service.

pub mod bm25;
pub mod gateway;
pub mod hybrid;
pub mod merge;
pub mod normalize;
pub mod scoring;
pub mod vector;

pub use gateway::{VectorSearch, VectorUnavailable, retrieve_with_deadline, retrieve_within};
pub use hybrid::{HybridOutcome, HybridQuery, HybridSearch, HybridSettings};
pub use merge::merge_and_score;
pub use normalize::min_max_normalize;
pub use scoring::FreshnessDecay;
pub use vector::{SharedVectorIndex, VectorIndex};
