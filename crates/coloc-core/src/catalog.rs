//! Mission catalog layouts and candidate discovery.
//!
//! Each mission publishes acquisitions under its own directory
//! conventions. Those conventions are data, not code: a [`CatalogSpec`]
//! describes the root templates, how many wildcard directory levels sit
//! between a root and the `year/day-of-year` pair, the filename glob, and
//! the mission-specific post-processing (generation dedup, hour
//! filtering). Inner netCDF resolution is a property of a root, since a
//! mission can serve Level-2 product directories from one archive and raw
//! Level-1 directories from another. Adding a mission is a table entry.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ColocError, Result};
use crate::metadata::{OpenOutcome, ProviderRegistry};
use crate::time::TimeWindow;

/// One root path template of a catalog, optionally tied to a product
/// level for missions that version by processing level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRoot {
    pub path: String,
    #[serde(default)]
    pub level: Option<u8>,

    /// Candidates under this root are product directories holding exactly
    /// one inner netCDF; resolve each candidate to it. Roots serving raw
    /// Level-1 directories leave this off and pass the directory through.
    #[serde(default)]
    pub resolve_inner_nc: bool,
}

/// Candidate post-processing applied after globbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Every discovered path is its own logical acquisition.
    #[default]
    None,
    /// Reprocessing generations coexist on disk; keep only the highest
    /// generation per logical acquisition.
    LastGeneration,
}

/// Layout conventions of one mission catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub roots: Vec<CatalogRoot>,

    /// Wildcard directory levels between a root and the year directory
    /// (satellite/beam/orbit nesting).
    #[serde(default)]
    pub wildcard_depth: usize,

    /// Filename glob with a `{date}` placeholder for the compact day key.
    pub file_pattern: String,

    #[serde(default)]
    pub dedup: DedupPolicy,

    /// Files cover a narrower interval than their day directory implies;
    /// re-check each candidate's own timestamps against the window.
    #[serde(default)]
    pub hour_filter: bool,
}

/// Mission id -> catalog layout, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogTable {
    catalogs: BTreeMap<String, CatalogSpec>,
}

impl CatalogTable {
    pub fn new() -> Self {
        Self {
            catalogs: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, mission: impl Into<String>, spec: CatalogSpec) {
        self.catalogs.insert(mission.into(), spec);
    }

    pub fn get(&self, mission: &str) -> Result<&CatalogSpec> {
        self.catalogs
            .get(mission)
            .ok_or_else(|| ColocError::UnknownMission(mission.to_string()))
    }

    pub fn missions(&self) -> impl Iterator<Item = &str> {
        self.catalogs.keys().map(|s| s.as_str())
    }

    pub fn from_yaml(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let table: Self = serde_yaml::from_str(&raw)?;
        for (mission, spec) in &table.catalogs {
            if spec.roots.is_empty() {
                return Err(ColocError::InvalidCatalog(format!(
                    "mission {mission} has no root paths"
                )));
            }
            if !spec.file_pattern.contains("{date}") {
                return Err(ColocError::InvalidCatalog(format!(
                    "mission {mission} file_pattern lacks a {{date}} placeholder"
                )));
            }
        }
        Ok(table)
    }

    /// Built-in table mirroring the operational archive layout.
    pub fn builtin() -> Self {
        fn root(path: &str, level: Option<u8>) -> CatalogRoot {
            CatalogRoot {
                path: path.to_string(),
                level,
                resolve_inner_nc: false,
            }
        }
        fn l2_root(path: &str, level: Option<u8>) -> CatalogRoot {
            CatalogRoot {
                path: path.to_string(),
                level,
                resolve_inner_nc: true,
            }
        }

        let mut table = Self::new();
        table.insert(
            "SMOS",
            CatalogSpec {
                roots: vec![
                    root("/home/ref-smoswind-public/data/v3.0/l3/data/reprocessing", None),
                    root("/home/ref-smoswind-public/data/v3.0/l3/data/nrt", None),
                ],
                wildcard_depth: 0,
                file_pattern: "*{date}*nc".to_string(),
                dedup: DedupPolicy::LastGeneration,
                hour_filter: false,
            },
        );
        table.insert(
            "HY2",
            CatalogSpec {
                roots: vec![root(
                    "/home/datawork-cersat-public/provider/knmi/satellite/l2b/hy-2b/hscat/25km/data",
                    None,
                )],
                wildcard_depth: 0,
                file_pattern: "*{date}*nc".to_string(),
                dedup: DedupPolicy::None,
                hour_filter: true,
            },
        );
        table.insert(
            "ERA5",
            CatalogSpec {
                roots: vec![root("/dataref/ecmwf/intranet/ERA5", None)],
                wildcard_depth: 0,
                file_pattern: "*{date}*nc".to_string(),
                dedup: DedupPolicy::None,
                hour_filter: false,
            },
        );
        table.insert(
            "S1",
            CatalogSpec {
                roots: vec![
                    root("/home/datawork-cersat-public/cache/project/sarwing/data/sentinel-1*", None),
                    root(
                        "/home/datawork-cersat-public/cache/project/mpc-sentinel1/data/esa/sentinel-1*",
                        Some(1),
                    ),
                    l2_root(
                        "/home/datawork-cersat-public/cache/public/ftp/project/sarwing/processings/c39e79a/default/sentinel-1*",
                        Some(2),
                    ),
                ],
                wildcard_depth: 3,
                file_pattern: "S1*{date}*SAFE".to_string(),
                dedup: DedupPolicy::None,
                hour_filter: false,
            },
        );
        table.insert(
            "RS2",
            CatalogSpec {
                roots: vec![
                    l2_root(
                        "/home/datawork-cersat-public/cache/public/ftp/project/sarwing/processings/c39e79a/default/RS2/*",
                        Some(2),
                    ),
                    root("/home/datawork-cersat-public/cache/project/sarwing/data/RS2/L1", Some(1)),
                ],
                wildcard_depth: 1,
                file_pattern: "RS2*{date}*".to_string(),
                dedup: DedupPolicy::None,
                hour_filter: false,
            },
        );
        table.insert(
            "RCM",
            CatalogSpec {
                roots: vec![root(
                    "/home/datawork-cersat-public/provider/asc-csa/satellite/l1/rcm/*/*/*",
                    None,
                )],
                wildcard_depth: 0,
                file_pattern: "RCM*{date}*".to_string(),
                dedup: DedupPolicy::None,
                hour_filter: false,
            },
        );
        table
    }
}

impl Default for CatalogTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Discovers comparison candidates for a mission and time window.
pub struct CatalogPathResolver<'a> {
    table: &'a CatalogTable,
    registry: &'a ProviderRegistry,
}

impl<'a> CatalogPathResolver<'a> {
    pub fn new(table: &'a CatalogTable, registry: &'a ProviderRegistry) -> Self {
        Self { table, registry }
    }

    /// Candidate product paths for `mission` over `window`.
    ///
    /// In discovery order, deduplicated, never containing `reference`.
    /// The optional `subset` restricts the output to paths that were both
    /// discovered on disk and listed in the subset.
    pub fn candidates(
        &self,
        mission: &str,
        window: &TimeWindow,
        level: Option<u8>,
        subset: Option<&[PathBuf]>,
        reference: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let spec = self.table.get(mission)?;
        let days = window.days();

        let mut seen = HashSet::new();
        let mut discovered: Vec<(PathBuf, bool)> = Vec::new();
        for root in spec.roots.iter().filter(|r| level_matches(r, level)) {
            for day in &days {
                let pattern = day_pattern(root, spec, &day.year, &day.day_of_year, &day.date_key);
                debug!(mission, pattern = %pattern, "Expanding catalog pattern");
                for entry in glob::glob(&pattern)? {
                    match entry {
                        Ok(path) => {
                            if seen.insert(path.clone()) {
                                discovered.push((path, root.resolve_inner_nc));
                            }
                        }
                        Err(e) => {
                            warn!(mission, error = %e, "Skipping unreadable catalog entry");
                        }
                    }
                }
            }
        }

        if let Some(subset) = subset {
            let allowed: HashSet<&Path> = subset.iter().map(|p| p.as_path()).collect();
            discovered.retain(|(p, _)| allowed.contains(p.as_path()));
        }

        // inner netCDF resolution only applies under roots that serve
        // Level-2 product directories; Level-1 directory candidates pass
        // through as-is
        let mut files: Vec<PathBuf> = discovered
            .into_iter()
            .filter_map(|(p, resolve)| if resolve { resolve_inner_nc(&p) } else { Some(p) })
            .collect();

        if spec.dedup == DedupPolicy::LastGeneration {
            files = last_generation_files(files);
        }

        if spec.hour_filter {
            files = self.filter_by_hours(mission, window, files)?;
        }

        if let Some(reference) = reference {
            files.retain(|p| p.as_path() != reference);
        }

        info!(mission, count = files.len(), "Discovered comparison candidates");
        Ok(files)
    }

    /// Drop candidates whose own acquisition interval misses the window.
    ///
    /// A candidate whose metadata cannot be opened is dropped on its own;
    /// it never aborts discovery for the rest.
    fn filter_by_hours(
        &self,
        mission: &str,
        window: &TimeWindow,
        files: Vec<PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let opener = self.registry.opener_for(mission)?;
        let mut kept = Vec::new();
        for path in files {
            match opener.open(&path) {
                Ok(OpenOutcome::Opened(meta)) => {
                    if window.intersects(meta.start_date(), meta.stop_date()) {
                        kept.push(path);
                    }
                }
                Ok(OpenOutcome::NotFound) => {
                    debug!(path = %path.display(), "Candidate vanished during hour filtering");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Dropping unreadable candidate");
                }
            }
        }
        Ok(kept)
    }
}

fn level_matches(root: &CatalogRoot, level: Option<u8>) -> bool {
    match (root.level, level) {
        (Some(root_level), Some(wanted)) => root_level == wanted,
        _ => true,
    }
}

fn day_pattern(
    root: &CatalogRoot,
    spec: &CatalogSpec,
    year: &str,
    day_of_year: &str,
    date_key: &str,
) -> String {
    let mut path = PathBuf::from(&root.path);
    for _ in 0..spec.wildcard_depth {
        path.push("*");
    }
    path.push(year);
    path.push(day_of_year);
    path.push(spec.file_pattern.replace("{date}", date_key));
    path.to_string_lossy().into_owned()
}

/// Sort key of a generation-versioned basename: `_`-separated fields at
/// positions len-5 (orbit direction), len-4 (date key) and len-2
/// (generation number).
fn generation_sort_key(path: &Path) -> Option<(String, u64, u32)> {
    let base = path.file_name()?.to_str()?;
    let parts: Vec<&str> = base.split('_').collect();
    if parts.len() < 5 {
        return None;
    }
    let orbit = parts[parts.len() - 5].to_string();
    let date_key: u64 = parts[parts.len() - 4].parse().ok()?;
    let generation: u32 = parts[parts.len() - 2].parse().ok()?;
    Some((orbit, date_key, generation))
}

/// Basename minus its trailing generation and suffix fields: candidates
/// sharing this prefix are reprocessing runs of one logical acquisition.
fn generation_prefix(path: &Path) -> Option<String> {
    let base = path.file_name()?.to_str()?;
    let parts: Vec<&str> = base.split('_').collect();
    if parts.len() < 5 {
        return None;
    }
    Some(parts[..parts.len() - 2].join("_"))
}

/// Collapse reprocessing generations to the highest one per acquisition.
///
/// Candidates are sorted by `(orbit, date key, generation)` and scanned;
/// within a prefix run the winner only changes on a strictly greater
/// generation, so equal generations keep the first in sorted order.
/// Idempotent. Paths without a parseable key pass through unchanged, at
/// the end of the output.
pub fn last_generation_files(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let (mut keyed, unkeyed): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|p| generation_sort_key(p).is_some());
    keyed.sort_by_key(|p| generation_sort_key(p).expect("partitioned on key presence"));

    let mut finals = Vec::new();
    let mut winner: Option<(String, PathBuf, u32)> = None;
    for path in keyed {
        let prefix = generation_prefix(&path).expect("keyed paths have a prefix");
        let generation = generation_sort_key(&path).expect("keyed paths have a key").2;
        match winner.take() {
            Some((current_prefix, current_path, current_gen)) if current_prefix == prefix => {
                winner = if generation > current_gen {
                    Some((current_prefix, path, generation))
                } else {
                    Some((current_prefix, current_path, current_gen))
                };
            }
            Some((_, current_path, _)) => {
                finals.push(current_path);
                winner = Some((prefix, path, generation));
            }
            None => {
                winner = Some((prefix, path, generation));
            }
        }
    }
    if let Some((_, path, _)) = winner {
        finals.push(path);
    }

    finals.extend(unkeyed);
    finals
}

/// Resolve a Level-2 product directory to its single inner netCDF.
///
/// A plain file stands for itself. A directory with zero or several
/// `.nc` matches is an ambiguous local artifact: the candidate is
/// dropped, the rest of the run is untouched.
pub fn resolve_inner_nc(path: &Path) -> Option<PathBuf> {
    if !path.is_dir() {
        return Some(path.to_path_buf());
    }
    let pattern = path.join("*.nc").to_string_lossy().into_owned();
    let matches: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(entries) => entries.flatten().collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Bad inner product pattern");
            return None;
        }
    };
    match matches.len() {
        1 => Some(matches.into_iter().next().expect("checked length")),
        0 => {
            warn!(path = %path.display(), "No inner netCDF in product directory, dropping candidate");
            None
        }
        n => {
            warn!(
                path = %path.display(),
                count = n,
                "Ambiguous product directory with several netCDF files, dropping candidate"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_last_generation_keeps_highest() {
        // prefix A_1, generations 1..3, plus a distinct acquisition B_1
        let files = paths(&[
            "A_1_x_000001_v.nc",
            "A_1_x_000003_v.nc",
            "A_1_x_000002_v.nc",
            "B_1_x_000001_v.nc",
        ]);
        let deduped = last_generation_files(files);
        assert_eq!(
            deduped,
            paths(&["A_1_x_000003_v.nc", "B_1_x_000001_v.nc"])
        );
    }

    #[test]
    fn test_last_generation_idempotent() {
        let files = paths(&[
            "A_1_x_000001_v.nc",
            "A_1_x_000003_v.nc",
            "B_1_x_000001_v.nc",
        ]);
        let once = last_generation_files(files);
        let twice = last_generation_files(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_last_generation_tie_keeps_first_sorted() {
        // same prefix and generation in two directories: first in sorted
        // order wins
        let files = paths(&[
            "/nrt/A_1_x_000002_v.nc",
            "/reprocessing/A_1_x_000002_v.nc",
        ]);
        let deduped = last_generation_files(files);
        assert_eq!(deduped, paths(&["/nrt/A_1_x_000002_v.nc"]));
    }

    #[test]
    fn test_last_generation_unparseable_pass_through() {
        let files = paths(&["odd_name.nc", "A_1_x_000001_v.nc"]);
        let deduped = last_generation_files(files);
        assert!(deduped.contains(&PathBuf::from("odd_name.nc")));
        assert!(deduped.contains(&PathBuf::from("A_1_x_000001_v.nc")));
    }

    #[test]
    fn test_level_matches() {
        let untagged = CatalogRoot {
            path: "/r".into(),
            level: None,
            resolve_inner_nc: false,
        };
        let l1 = CatalogRoot {
            path: "/r/L1".into(),
            level: Some(1),
            resolve_inner_nc: false,
        };
        assert!(level_matches(&untagged, Some(2)));
        assert!(level_matches(&l1, None));
        assert!(level_matches(&l1, Some(1)));
        assert!(!level_matches(&l1, Some(2)));
    }

    #[test]
    fn test_day_pattern_wildcard_depth() {
        let root = CatalogRoot {
            path: "/data/sentinel-1*".into(),
            level: None,
            resolve_inner_nc: false,
        };
        let spec = CatalogSpec {
            roots: vec![root.clone()],
            wildcard_depth: 3,
            file_pattern: "S1*{date}*SAFE".into(),
            dedup: DedupPolicy::None,
            hour_filter: false,
        };
        let pattern = day_pattern(&root, &spec, "2024", "015", "20240115");
        assert_eq!(
            pattern,
            "/data/sentinel-1*/*/*/*/2024/015/S1*20240115*SAFE"
        );
    }

    #[test]
    fn test_builtin_table_sanity() {
        let table = CatalogTable::builtin();
        assert!(table.get("SMOS").is_ok());
        assert_eq!(table.get("SMOS").unwrap().dedup, DedupPolicy::LastGeneration);
        assert!(table.get("HY2").unwrap().hour_filter);
        assert_eq!(table.get("S1").unwrap().wildcard_depth, 3);
        assert!(table.get("GPM").is_err());

        // only Level-2 archive roots resolve inner netCDFs
        let rs2 = table.get("RS2").unwrap();
        assert!(rs2.roots.iter().any(|r| r.level == Some(2) && r.resolve_inner_nc));
        assert!(rs2.roots.iter().any(|r| r.level == Some(1) && !r.resolve_inner_nc));
    }

    #[test]
    fn test_table_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogs.yaml");
        let yaml = "\
SMOS:
  roots:
    - path: /data/smos
  file_pattern: \"*{date}*nc\"
  dedup: last_generation
RS2:
  roots:
    - path: /data/rs2/l2
      level: 2
      resolve_inner_nc: true
    - path: /data/rs2/l1
      level: 1
  file_pattern: \"RS2*{date}*\"
";
        std::fs::write(&path, yaml).unwrap();
        let table = CatalogTable::from_yaml(&path).unwrap();
        let spec = table.get("SMOS").unwrap();
        assert_eq!(spec.dedup, DedupPolicy::LastGeneration);
        assert_eq!(spec.wildcard_depth, 0);
        assert!(!spec.roots[0].resolve_inner_nc);
        let rs2 = table.get("RS2").unwrap();
        assert!(rs2.roots[0].resolve_inner_nc);
        assert!(!rs2.roots[1].resolve_inner_nc);
    }

    #[test]
    fn test_table_yaml_rejects_missing_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogs.yaml");
        std::fs::write(
            &path,
            "SMOS:\n  roots:\n    - path: /data/smos\n  file_pattern: \"*nc\"\n",
        )
        .unwrap();
        assert!(CatalogTable::from_yaml(&path).is_err());
    }

    #[test]
    fn test_resolve_inner_nc() {
        let dir = tempfile::tempdir().unwrap();

        // plain file stands for itself
        let file = dir.path().join("product.nc");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(resolve_inner_nc(&file), Some(file.clone()));

        // directory with exactly one inner nc resolves to it
        let single = dir.path().join("single_product");
        std::fs::create_dir(&single).unwrap();
        let inner = single.join("rs2_owi.nc");
        std::fs::write(&inner, b"").unwrap();
        assert_eq!(resolve_inner_nc(&single), Some(inner));

        // ambiguous directory drops the candidate
        let multi = dir.path().join("multi_product");
        std::fs::create_dir(&multi).unwrap();
        std::fs::write(multi.join("a.nc"), b"").unwrap();
        std::fs::write(multi.join("b.nc"), b"").unwrap();
        assert_eq!(resolve_inner_nc(&multi), None);

        // empty directory drops the candidate
        let empty = dir.path().join("empty_product");
        std::fs::create_dir(&empty).unwrap();
        assert_eq!(resolve_inner_nc(&empty), None);
    }
}
