//! Incremental bundle builder.
//!
//! Turns an extracted corpus into one JSON record per unit under the dist
//! directory. A unit is rebuilt only when the hash of its unit file and
//! solution file differs from the cache, or its record is missing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use probank_extract::{figure_key, graphics_blocks};
use probank_shared::{BundleConfig, OutputConfig, ProbankError, ProblemMeta, Result};

use crate::assembler::{self, OutputLayout};

/// Cache key → combined hash of a unit's source files.
pub type BuildCache = BTreeMap<String, String>;

/// One distributable unit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitBundle {
    #[serde(flatten)]
    pub meta: ProblemMeta,
    /// Unit content with `%` comment lines stripped.
    pub content: String,
    /// Solution text, empty when the unit has none.
    pub solution: String,
    /// Asset keys for the unit's graphics blocks, content first.
    pub figures: Vec<String>,
}

/// Options for a bundle run.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Root the corpus was extracted into.
    pub output_root: PathBuf,
    /// Where bundle records go.
    pub dist_dir: PathBuf,
    /// Rebuild every unit regardless of the cache.
    pub force: bool,
    pub output: OutputConfig,
    pub bundle: BundleConfig,
}

/// Result of a bundle run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    pub built: usize,
    /// Unchanged units left as they were.
    pub skipped: usize,
    /// Units listed in the metadata whose file is gone.
    pub missing: Vec<String>,
    /// Records removed because their unit is no longer in the corpus.
    pub pruned: Vec<String>,
    pub total: usize,
}

/// Build per-unit JSON records for the corpus under `options.output_root`.
#[instrument(skip_all, fields(dist = %options.dist_dir.display(), force = options.force))]
pub fn build_bundle(options: &BundleOptions) -> Result<BundleReport> {
    let layout = OutputLayout::new(&options.output_root, &options.output);
    let metadata = assembler::load_metadata(&layout.metadata_file)?;

    let records_dir = options.dist_dir.join("problems");
    std::fs::create_dir_all(&records_dir).map_err(|e| ProbankError::io(&records_dir, e))?;

    let cache_path = options.dist_dir.join(&options.bundle.cache_file);
    let mut cache = if options.force {
        BuildCache::new()
    } else {
        load_cache(&cache_path)
    };
    debug!(entries = cache.len(), "build cache loaded");

    let mut report = BundleReport {
        total: metadata.total_problems,
        ..Default::default()
    };

    for meta in &metadata.problems {
        let unit_path = layout.unit_path(&meta.id);
        if !unit_path.exists() {
            warn!(id = %meta.id, path = %unit_path.display(), "unit file missing, skipping");
            report.missing.push(meta.id.clone());
            continue;
        }

        let solution_path = layout.solution_path(&meta.id);
        let combined = combined_hash(&unit_path, &solution_path)?;
        let key = cache_key(&meta.id);
        let record_path = records_dir.join(format!("{}.json", meta.id));

        if cache.get(&key) == Some(&combined) && record_path.exists() {
            debug!(id = %meta.id, "unchanged, skipping");
            report.skipped += 1;
            continue;
        }

        let record = build_record(meta, &unit_path, &solution_path)?;
        assembler::write_json(&record_path, &record)?;
        cache.insert(key, combined);
        report.built += 1;
        debug!(id = %meta.id, figures = record.figures.len(), "built record");
    }

    let live: BTreeSet<&str> = metadata
        .problems
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| !report.missing.iter().any(|m| m == id))
        .collect();
    cache.retain(|key, _| {
        key.strip_prefix("problem_")
            .is_some_and(|id| live.contains(id))
    });
    report.pruned = prune_records(&records_dir, &live)?;

    let dist_metadata = options.dist_dir.join("metadata.json");
    assembler::write_json(&dist_metadata, &metadata)?;
    assembler::write_json(&cache_path, &cache)?;

    info!(
        built = report.built,
        skipped = report.skipped,
        missing = report.missing.len(),
        pruned = report.pruned.len(),
        total = report.total,
        "bundle complete"
    );
    Ok(report)
}

/// Delete `<id>.json` records whose id is not in `live`. Returns the removed ids.
fn prune_records(records_dir: &Path, live: &BTreeSet<&str>) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(records_dir).map_err(|e| ProbankError::io(records_dir, e))?;

    let mut pruned = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(error = %e, "skipping unreadable bundle entry");
                continue;
            }
        };
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if live.contains(id.as_str()) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(id = %id, "pruned stale record");
                pruned.push(id);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale record"),
        }
    }
    pruned.sort();
    Ok(pruned)
}

fn build_record(meta: &ProblemMeta, unit_path: &Path, solution_path: &Path) -> Result<UnitBundle> {
    let raw = std::fs::read_to_string(unit_path).map_err(|e| ProbankError::io(unit_path, e))?;
    let content = strip_comment_lines(&raw);
    let solution = if solution_path.exists() {
        let text = std::fs::read_to_string(solution_path)
            .map_err(|e| ProbankError::io(solution_path, e))?;
        strip_comment_lines(&text)
    } else {
        String::new()
    };

    let figure_count = graphics_blocks(&content).len() + graphics_blocks(&solution).len();
    let figures = (1..=figure_count).map(|n| figure_key(&meta.id, n)).collect();

    Ok(UnitBundle {
        meta: meta.clone(),
        content,
        solution,
        figures,
    })
}

/// Drop lines whose first non-blank character is `%`, then trim.
pub fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('%'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn cache_key(id: &str) -> String {
    format!("problem_{id}")
}

/// SHA-256 over the hex hashes of both files; an absent file hashes as empty.
fn combined_hash(unit_path: &Path, solution_path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(file_hash(unit_path)?.as_bytes());
    hasher.update(file_hash(solution_path)?.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn file_hash(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    let bytes = std::fs::read(path).map_err(|e| ProbankError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Load the build cache. A missing or unreadable cache means a full rebuild.
fn load_cache(path: &Path) -> BuildCache {
    let Ok(content) = std::fs::read_to_string(path) else {
        return BuildCache::new();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "build cache unreadable, rebuilding everything");
        BuildCache::new()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusConfig, SilentProgress, extract_corpus};
    use probank_shared::{AppConfig, CorpusMetadata};

    fn load_dist_metadata(dist_dir: &Path) -> Result<CorpusMetadata> {
        assembler::load_metadata(&dist_dir.join("metadata.json"))
    }

    struct Fixture {
        root: PathBuf,
        out: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let base = std::env::temp_dir().join(format!("probank-bundle-test-{}", uuid::Uuid::now_v7()));
            let root = base.join("src");
            let out = base.join("out");
            std::fs::create_dir_all(root.join("contents")).unwrap();
            std::fs::write(
                root.join("contents/ch1.tex"),
                [
                    "\\fbox{29th KMO 2015}\\\\",
                    "\\stepcounter{prob}",
                    "In the figure, find the length of segment $AB$.",
                    "\\begin{tikzpicture}\\draw (0,0) -- (1,0);\\end{tikzpicture}",
                    "\\vfill",
                    "\\stepcounter{prob}",
                    "Find the smallest positive integer $n$ with $289 \\mid n^2+2n$.",
                    "\\endnote{답: 17 \\begin{tikzpicture}\\draw (0,0) circle (1);\\end{tikzpicture}}",
                ]
                .join("\n"),
            )
            .unwrap();
            extract_corpus(
                CorpusConfig::from_app(&root, &out, &AppConfig::default()),
                &SilentProgress,
            )
            .unwrap();
            Self { root, out }
        }

        fn options(&self, force: bool) -> BundleOptions {
            BundleOptions {
                output_root: self.out.clone(),
                dist_dir: self.out.join("dist"),
                force,
                output: OutputConfig::default(),
                bundle: BundleConfig::default(),
            }
        }

        fn record(&self, id: &str) -> UnitBundle {
            let path = self.out.join("dist/problems").join(format!("{id}.json"));
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            if let Some(base) = self.root.parent() {
                let _ = std::fs::remove_dir_all(base);
            }
        }
    }

    #[test]
    fn builds_records() {
        let fx = Fixture::new();
        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.built, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.total, 2);

        let first = fx.record("001");
        assert_eq!(first.meta.source, "29th KMO 2015");
        assert!(!first.content.contains("% Problem ID"));
        assert!(first.content.starts_with("In the figure"));
        assert!(first.solution.is_empty());
        assert_eq!(first.figures, vec!["001_fig1".to_string()]);

        let second = fx.record("002");
        assert_eq!(second.meta.answer, "17");
        assert!(second.solution.starts_with("답: 17"));
        assert_eq!(second.figures, vec!["002_fig1".to_string()]);

        let md = load_dist_metadata(&fx.out.join("dist")).unwrap();
        assert_eq!(md.total_problems, 2);
    }

    #[test]
    fn second_run_skips_unchanged() {
        let fx = Fixture::new();
        build_bundle(&fx.options(false)).unwrap();

        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.built, 0);
        assert_eq!(report.skipped, 2);

        std::fs::write(
            fx.out.join("problems/002.tex"),
            "% Problem ID: 002\n\nAn edited statement for problem two.",
        )
        .unwrap();
        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.built, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(fx.record("002").content, "An edited statement for problem two.");
    }

    #[test]
    fn force_rebuilds_everything() {
        let fx = Fixture::new();
        build_bundle(&fx.options(false)).unwrap();
        let report = build_bundle(&fx.options(true)).unwrap();
        assert_eq!(report.built, 2);
    }

    #[test]
    fn deleted_record_is_rebuilt() {
        let fx = Fixture::new();
        build_bundle(&fx.options(false)).unwrap();
        std::fs::remove_file(fx.out.join("dist/problems/001.json")).unwrap();

        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.built, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn missing_unit_file_is_reported() {
        let fx = Fixture::new();
        std::fs::remove_file(fx.out.join("problems/001.tex")).unwrap();

        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.missing, vec!["001".to_string()]);
        assert_eq!(report.built, 1);
    }

    #[test]
    fn records_for_dropped_units_are_pruned() {
        let fx = Fixture::new();
        build_bundle(&fx.options(false)).unwrap();

        // a later extraction produced only one unit
        let metadata_path = fx.out.join("problems_metadata.json");
        let mut md = assembler::load_metadata(&metadata_path).unwrap();
        md.problems.truncate(1);
        md.total_problems = 1;
        assembler::write_metadata(&metadata_path, &md).unwrap();

        let report = build_bundle(&fx.options(false)).unwrap();
        assert_eq!(report.pruned, vec!["002".to_string()]);
        assert_eq!(report.skipped, 1);
        assert!(!fx.out.join("dist/problems/002.json").exists());
        assert!(fx.out.join("dist/problems/001.json").exists());

        let cache: BuildCache = serde_json::from_str(
            &std::fs::read_to_string(fx.out.join("dist/.build_cache.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["problem_001"]);
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let base = std::env::temp_dir().join(format!("probank-bundle-empty-{}", uuid::Uuid::now_v7()));
        let options = BundleOptions {
            output_root: base.clone(),
            dist_dir: base.join("dist"),
            force: false,
            output: OutputConfig::default(),
            bundle: BundleConfig::default(),
        };
        assert!(build_bundle(&options).is_err());
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn comment_lines_are_stripped() {
        let text = "% header\n  % indented\nbody 100\\% sure\n\n% trailing";
        assert_eq!(strip_comment_lines(text), "body 100\\% sure");
    }
}
