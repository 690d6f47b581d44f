//! Product metadata access.
//!
//! Mission products expose their acquisition interval and footprint
//! through the [`ProductMeta`] capability. Openers are registered per
//! mission in a [`ProviderRegistry`] resolved once at startup; adding a
//! mission is a registry entry, not a new conditional branch.
//!
//! Opening returns an explicit [`OpenOutcome`] instead of raising on a
//! missing file: discovery loops consume `NotFound` by dropping the
//! candidate, so one bad path never aborts a run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::error::{ColocError, Result};
use crate::footprint::Footprint;
use crate::time::TimeWindow;

/// Metadata capability of one opened product.
pub trait ProductMeta {
    /// Mission identifier, e.g. `S1`, `SMOS`.
    fn mission(&self) -> &str;

    /// Product name used in output filenames.
    fn product_name(&self) -> &str;

    fn start_date(&self) -> DateTime<Utc>;

    fn stop_date(&self) -> DateTime<Utc>;

    /// Coverage footprint of the acquisition.
    ///
    /// Implementations may subset against the reference footprint and the
    /// search window when the product covers a wider area than relevant
    /// (swath missions ignore both).
    fn footprint(
        &self,
        reference: Option<&Footprint>,
        window: Option<&TimeWindow>,
    ) -> Result<Footprint>;

    /// Level-1 SAR acquisitions are listing-only by policy.
    fn is_sar_level1(&self) -> bool {
        false
    }
}

/// Outcome of a metadata open attempt.
///
/// `NotFound` covers missing, corrupt, and unreadable products alike: all
/// of them drop the candidate and nothing else.
pub enum OpenOutcome {
    Opened(Box<dyn ProductMeta>),
    NotFound,
}

/// Opens product metadata by path.
pub trait MetadataOpener {
    fn open(&self, path: &Path) -> Result<OpenOutcome>;
}

/// Mission id -> metadata opener, with an optional fallback opener for
/// paths whose mission is not known up front (mode A second products,
/// reference products).
#[derive(Default)]
pub struct ProviderRegistry {
    openers: HashMap<String, Box<dyn MetadataOpener>>,
    fallback: Option<Box<dyn MetadataOpener>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mission: impl Into<String>, opener: Box<dyn MetadataOpener>) {
        self.openers.insert(mission.into(), opener);
    }

    pub fn set_fallback(&mut self, opener: Box<dyn MetadataOpener>) {
        self.fallback = Some(opener);
    }

    /// Opener for a mission, falling back to the default opener.
    pub fn opener_for(&self, mission: &str) -> Result<&dyn MetadataOpener> {
        self.openers
            .get(mission)
            .or(self.fallback.as_ref())
            .map(|b| b.as_ref())
            .ok_or_else(|| ColocError::UnknownProvider(mission.to_string()))
    }

    /// Open a product, routing by mission when one is given.
    pub fn open(&self, mission: Option<&str>, path: &Path) -> Result<OpenOutcome> {
        let opener = match mission {
            Some(m) => self.opener_for(m)?,
            None => self
                .fallback
                .as_ref()
                .map(|b| b.as_ref())
                .ok_or_else(|| ColocError::UnknownProvider("<fallback>".to_string()))?,
        };
        opener.open(path)
    }
}

/// Parse the start/stop timestamps encoded in a SAR Level-2 netCDF
/// basename.
///
/// Names carry `-`-separated fields with the acquisition interval at
/// positions 4 and 5 as `t`-separated compact timestamps, e.g.
/// `s1a-iw-owi-cm-20200101t120530-20200101t121055-...nc`.
pub fn parse_l2_nc_times(basename: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let fields: Vec<&str> = basename.split('-').collect();
    if fields.len() < 6 {
        return None;
    }
    let start = parse_compact_timestamp(fields[4])?;
    let stop = parse_compact_timestamp(fields[5])?;
    Some((start, stop))
}

fn parse_compact_timestamp(field: &str) -> Option<DateTime<Utc>> {
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

// ============================================================================
// Sidecar-backed metadata
// ============================================================================

/// On-disk sidecar document describing one product.
///
/// Mission binary formats are deliberately not parsed here; a
/// `<product>.coloc.yaml` file next to the product carries the few fields
/// the matching engine needs.
#[derive(Debug, Deserialize)]
struct SidecarDoc {
    mission: String,
    #[serde(default)]
    product_name: Option<String>,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    #[serde(default)]
    footprint: Option<String>,
    #[serde(default)]
    sar_level1: bool,
}

/// [`ProductMeta`] read from a sidecar document.
pub struct SidecarMeta {
    path: PathBuf,
    mission: String,
    product_name: String,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    footprint: Option<Footprint>,
    sar_level1: bool,
}

impl ProductMeta for SidecarMeta {
    fn mission(&self) -> &str {
        &self.mission
    }

    fn product_name(&self) -> &str {
        &self.product_name
    }

    fn start_date(&self) -> DateTime<Utc> {
        self.start
    }

    fn stop_date(&self) -> DateTime<Utc> {
        self.stop
    }

    fn footprint(
        &self,
        _reference: Option<&Footprint>,
        _window: Option<&TimeWindow>,
    ) -> Result<Footprint> {
        self.footprint
            .clone()
            .ok_or_else(|| ColocError::MissingFootprint(self.path.display().to_string()))
    }

    fn is_sar_level1(&self) -> bool {
        self.sar_level1
    }
}

/// Opens products through their `<product>.coloc.yaml` sidecar.
pub struct SidecarOpener;

impl SidecarOpener {
    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".coloc.yaml");
        PathBuf::from(name)
    }
}

impl MetadataOpener for SidecarOpener {
    fn open(&self, path: &Path) -> Result<OpenOutcome> {
        let sidecar = Self::sidecar_path(path);
        if !path.exists() || !sidecar.exists() {
            return Ok(OpenOutcome::NotFound);
        }
        let raw = match fs::read_to_string(&sidecar) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %sidecar.display(), error = %e, "Unreadable sidecar, dropping candidate");
                return Ok(OpenOutcome::NotFound);
            }
        };
        let doc: SidecarDoc = match serde_yaml::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %sidecar.display(), error = %e, "Corrupt sidecar, dropping candidate");
                return Ok(OpenOutcome::NotFound);
            }
        };
        let footprint = match &doc.footprint {
            Some(s) => match Footprint::from_wkt(s) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    warn!(path = %sidecar.display(), error = %e, "Bad footprint WKT, dropping candidate");
                    return Ok(OpenOutcome::NotFound);
                }
            },
            None => None,
        };
        let product_name = doc.product_name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        Ok(OpenOutcome::Opened(Box::new(SidecarMeta {
            path: path.to_path_buf(),
            mission: doc.mission,
            product_name,
            start: doc.start,
            stop: doc.stop,
            footprint,
            sar_level1: doc.sar_level1,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_parse_l2_nc_times() {
        let (start, stop) =
            parse_l2_nc_times("s1a-iw-owi-cm-20200101t120530-20200101t121055-030888-038C20.nc")
                .unwrap();
        assert_eq!(start.to_rfc3339(), "2020-01-01T12:05:30+00:00");
        assert_eq!(stop.to_rfc3339(), "2020-01-01T12:10:55+00:00");
    }

    #[test]
    fn test_parse_l2_nc_times_too_few_fields() {
        assert!(parse_l2_nc_times("not-a-product.nc").is_none());
    }

    #[test]
    fn test_sidecar_open_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let product = dir.path().join("s1a_product.nc");
        File::create(&product).unwrap();
        let sidecar = dir.path().join("s1a_product.nc.coloc.yaml");
        let mut f = File::create(&sidecar).unwrap();
        writeln!(
            f,
            "mission: S1\nstart: 2020-01-01T12:05:30Z\nstop: 2020-01-01T12:10:55Z\n\
             footprint: \"POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))\""
        )
        .unwrap();

        let opener = SidecarOpener;
        match opener.open(&product).unwrap() {
            OpenOutcome::Opened(meta) => {
                assert_eq!(meta.mission(), "S1");
                assert_eq!(meta.product_name(), "s1a_product");
                assert!(!meta.is_sar_level1());
                assert!(meta.footprint(None, None).is_ok());
            }
            OpenOutcome::NotFound => panic!("expected product to open"),
        }

        let missing = dir.path().join("does_not_exist.nc");
        assert!(matches!(
            opener.open(&missing).unwrap(),
            OpenOutcome::NotFound
        ));
    }

    #[test]
    fn test_sidecar_corrupt_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let product = dir.path().join("p.nc");
        File::create(&product).unwrap();
        fs::write(dir.path().join("p.nc.coloc.yaml"), ": not yaml :::").unwrap();
        let opener = SidecarOpener;
        assert!(matches!(
            opener.open(&product).unwrap(),
            OpenOutcome::NotFound
        ));
    }

    #[test]
    fn test_registry_routing() {
        struct Never;
        impl MetadataOpener for Never {
            fn open(&self, _path: &Path) -> Result<OpenOutcome> {
                Ok(OpenOutcome::NotFound)
            }
        }

        let mut registry = ProviderRegistry::new();
        registry.register("SMOS", Box::new(Never));
        assert!(registry.opener_for("SMOS").is_ok());
        assert!(registry.opener_for("HY2").is_err());

        registry.set_fallback(Box::new(Never));
        assert!(registry.opener_for("HY2").is_ok());
        assert!(registry.open(None, Path::new("/nowhere")).is_ok());
    }
}
