//! Colocation engine: orchestrates candidate discovery, per-candidate
//! overlap probing and result aggregation for one reference product.
//!
//! One engine run owns its window, candidate set and result; nothing is
//! shared across runs, and every candidate is probed strictly
//! sequentially. A candidate whose probe fails is dropped on its own:
//! the aggregate only ever receives fully completed positive verdicts.

use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogPathResolver, CatalogTable};
use crate::error::{ColocError, Result};
use crate::footprint::Footprint;
use crate::metadata::{OpenOutcome, ProductMeta, ProviderRegistry};
use crate::time::TimeWindow;

/// One engine run's configuration.
///
/// Exactly one of `product2` (compare against one named product) or
/// `mission` (compare against a whole catalog) must be set.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reference product path.
    pub product1: PathBuf,
    /// Second product for a one-to-one comparison.
    pub product2: Option<PathBuf>,
    /// Mission catalog for a one-to-catalog comparison.
    pub mission: Option<String>,
    /// Product level restriction (SAR catalogs versioned by level).
    pub level: Option<u8>,
    /// Restrict catalog discovery to this explicit path subset.
    pub subset: Option<Vec<PathBuf>>,
    /// Search tolerance on each side of the reference interval, minutes.
    pub delta_minutes: i64,
    pub listing: bool,
    pub product_generation: bool,
    /// Overrides the derived listing filename when set.
    pub listing_filename: Option<String>,
    /// Overrides the derived colocation product filename when set.
    pub colocation_filename: Option<String>,
}

impl EngineConfig {
    pub fn new(product1: impl Into<PathBuf>) -> Self {
        Self {
            product1: product1.into(),
            product2: None,
            mission: None,
            level: None,
            subset: None,
            delta_minutes: 30,
            listing: true,
            product_generation: true,
            listing_filename: None,
            colocation_filename: None,
        }
    }
}

/// Per-candidate verdict, computed once per run.
pub struct IntersectionResult {
    pub candidate: PathBuf,
    pub overlaps: bool,
    /// Merged footprint, present only when the pair overlaps and a
    /// colocation product is actually wanted for it.
    pub merged_footprint: Option<Footprint>,
}

/// Output artifacts derived for one surviving pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutput {
    pub candidate: PathBuf,
    pub listing_filename: String,
    /// Absent when either side is a Level-1 SAR product (listing-only by
    /// policy) or product generation is disabled.
    pub colocation_filename: Option<String>,
}

/// Terminal state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColocationStatus {
    HasColocation,
    NoColocation,
}

/// Aggregate result over all candidates of one reference product.
///
/// `coloc_files` is `None`, not an empty list, when no candidate
/// overlaps: callers branch on presence.
pub struct ColocationResult {
    pub coloc_files: Option<Vec<PathBuf>>,
    pub listing_requested: bool,
    pub product_generation_requested: bool,
    /// Derived output names, one entry per surviving pair.
    pub pairs: Vec<PairOutput>,
    /// Per-candidate verdicts as probed, in candidate order.
    pub intersections: Vec<IntersectionResult>,
}

impl ColocationResult {
    pub fn status(&self) -> ColocationStatus {
        if self.coloc_files.is_some() {
            ColocationStatus::HasColocation
        } else {
            ColocationStatus::NoColocation
        }
    }
}

/// Resolved operating mode of one run.
enum Mode<'b> {
    /// Compare the reference against one named product.
    TwoProducts(&'b Path),
    /// Compare the reference against a whole mission catalog.
    Catalog(&'b str),
}

/// Single entry point: runs one colocation search.
pub struct ColocationEngine<'a> {
    table: &'a CatalogTable,
    registry: &'a ProviderRegistry,
    config: EngineConfig,
}

impl<'a> ColocationEngine<'a> {
    pub fn new(
        table: &'a CatalogTable,
        registry: &'a ProviderRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            table,
            registry,
            config,
        }
    }

    pub fn run(&self) -> Result<ColocationResult> {
        let mode = self.validate_mode()?;

        let reference = self.open_reference()?;
        let window = TimeWindow::derive(
            reference.start_date(),
            reference.stop_date(),
            Duration::minutes(self.config.delta_minutes),
        );
        debug!(start = %window.start, stop = %window.stop, "Derived search window");

        let candidates = match mode {
            Mode::Catalog(mission) => {
                let resolver = CatalogPathResolver::new(self.table, self.registry);
                resolver.candidates(
                    mission,
                    &window,
                    self.config.level,
                    self.config.subset.as_deref(),
                    Some(self.config.product1.as_path()),
                )?
            }
            Mode::TwoProducts(other) => vec![other.to_path_buf()],
        };

        let reference_footprint = reference.footprint(None, Some(&window))?;

        let mut intersections = Vec::new();
        let mut coloc_files = Vec::new();
        let mut pairs = Vec::new();
        for candidate in candidates {
            let meta = match self.probe_open(&candidate) {
                Some(meta) => meta,
                None => continue,
            };
            let candidate_footprint =
                match meta.footprint(Some(&reference_footprint), Some(&window)) {
                    Ok(fp) => fp,
                    Err(e) => {
                        warn!(candidate = %candidate.display(), error = %e, "No usable footprint, dropping candidate");
                        continue;
                    }
                };

            let overlaps = reference_footprint.overlaps(&candidate_footprint);
            debug!(candidate = %candidate.display(), overlaps, "Probed candidate");

            let generate = overlaps && self.pair_generates_product(reference.as_ref(), meta.as_ref());
            // listing-only pairs skip the merge geometry entirely
            let merged_footprint = if generate {
                reference_footprint.intersection(&candidate_footprint)
            } else {
                None
            };

            if overlaps {
                coloc_files.push(candidate.clone());
                pairs.push(PairOutput {
                    candidate: candidate.clone(),
                    listing_filename: self.listing_filename(reference.as_ref(), meta.as_ref()),
                    colocation_filename: generate
                        .then(|| self.colocation_filename(reference.as_ref(), meta.as_ref())),
                });
            }
            intersections.push(IntersectionResult {
                candidate,
                overlaps,
                merged_footprint,
            });
        }

        // the aggregate is always set to an explicit present/absent state
        let coloc_files = if coloc_files.is_empty() {
            None
        } else {
            Some(coloc_files)
        };
        match &coloc_files {
            Some(files) => info!(count = files.len(), "Colocation found"),
            None => info!("No colocation found"),
        }

        Ok(ColocationResult {
            coloc_files,
            listing_requested: self.config.listing,
            product_generation_requested: self.config.product_generation,
            pairs,
            intersections,
        })
    }

    /// Resolve the operating mode; errors when both or neither mode
    /// input is supplied, before any discovery work.
    fn validate_mode(&self) -> Result<Mode<'_>> {
        match (&self.config.product2, &self.config.mission) {
            (Some(other), None) => Ok(Mode::TwoProducts(other)),
            (None, Some(mission)) => Ok(Mode::Catalog(mission)),
            (Some(_), Some(_)) => Err(ColocError::UnknownOption("both")),
            (None, None) => Err(ColocError::UnknownOption("neither")),
        }
    }

    fn open_reference(&self) -> Result<Box<dyn ProductMeta>> {
        match self.registry.open(None, &self.config.product1)? {
            OpenOutcome::Opened(meta) => Ok(meta),
            OpenOutcome::NotFound => Err(ColocError::ReferenceUnreadable(
                self.config.product1.display().to_string(),
            )),
        }
    }

    /// Open one candidate's metadata; any failure drops only that
    /// candidate.
    fn probe_open(&self, candidate: &Path) -> Option<Box<dyn ProductMeta>> {
        let mission = self.config.mission.as_deref();
        match self.registry.open(mission, candidate) {
            Ok(OpenOutcome::Opened(meta)) => Some(meta),
            Ok(OpenOutcome::NotFound) => {
                debug!(candidate = %candidate.display(), "Candidate not found, dropping");
                None
            }
            Err(e) => {
                warn!(candidate = %candidate.display(), error = %e, "Candidate probe failed, dropping");
                None
            }
        }
    }

    /// Merged products are only generated when neither side of the pair
    /// is a Level-1 SAR acquisition.
    fn pair_generates_product(&self, meta1: &dyn ProductMeta, meta2: &dyn ProductMeta) -> bool {
        if meta1.is_sar_level1() || meta2.is_sar_level1() {
            return false;
        }
        self.config.product_generation
    }

    fn listing_filename(&self, meta1: &dyn ProductMeta, meta2: &dyn ProductMeta) -> String {
        if let Some(name) = &self.config.listing_filename {
            return name.clone();
        }
        format!(
            "listing_coloc_{}_{}_{}.txt",
            meta1.mission().to_uppercase(),
            meta2.mission().to_uppercase(),
            self.config.delta_minutes
        )
    }

    fn colocation_filename(&self, meta1: &dyn ProductMeta, meta2: &dyn ProductMeta) -> String {
        if let Some(name) = &self.config.colocation_filename {
            return name.clone();
        }
        format!(
            "sat_coloc_{}__{}.nc",
            meta1.product_name(),
            meta2.product_name()
        )
    }
}
