//! Matching engine for co-located Earth-observation acquisitions.
//!
//! Finds pairs (or groups) of satellite acquisitions from heterogeneous
//! mission catalogs that overlap both in time and in geographic
//! footprint, so that co-located measurements can be compared downstream.
//!
//! # Architecture
//!
//! [`engine::ColocationEngine`] is the single entry point. It derives a
//! search window around the reference acquisition, discovers comparison
//! candidates through the table-driven [`catalog::CatalogPathResolver`],
//! opens each candidate through the mission [`metadata::ProviderRegistry`]
//! and tests footprint overlap with antemeridian correction
//! ([`footprint::Footprint`]). Per-candidate failures are contained: one
//! missing or corrupt product never aborts the search.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod footprint;
pub mod metadata;
pub mod time;

// Re-exports
pub use catalog::{CatalogPathResolver, CatalogRoot, CatalogSpec, CatalogTable, DedupPolicy};
pub use engine::{
    ColocationEngine, ColocationResult, ColocationStatus, EngineConfig, IntersectionResult,
    PairOutput,
};
pub use error::{ColocError, Result};
pub use footprint::Footprint;
pub use metadata::{
    MetadataOpener, OpenOutcome, ProductMeta, ProviderRegistry, SidecarMeta, SidecarOpener,
};
pub use time::{DayScheme, TimeWindow};
