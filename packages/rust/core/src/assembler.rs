//! Corpus output writer.
//!
//! Takes extracted units and their assigned identifiers, then writes the
//! unit files, solution files, aggregate metadata and extraction log.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use probank_extract::Endnote;
use probank_shared::{CorpusMetadata, OutputConfig, ProbankError, ProblemMeta, Result};

/// Resolved output locations for one corpus run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Root of everything written.
    pub root: PathBuf,
    /// `<root>/<problems_dir>`
    pub problems_dir: PathBuf,
    /// `<problems_dir>/<solutions_dir>`
    pub solutions_dir: PathBuf,
    /// `<root>/<metadata_file>`
    pub metadata_file: PathBuf,
    /// `<root>/<log_file>`
    pub log_file: PathBuf,
}

impl OutputLayout {
    pub fn new(root: &Path, config: &OutputConfig) -> Self {
        let problems_dir = root.join(&config.problems_dir);
        Self {
            root: root.to_path_buf(),
            solutions_dir: problems_dir.join(&config.solutions_dir),
            problems_dir,
            metadata_file: root.join(&config.metadata_file),
            log_file: root.join(&config.log_file),
        }
    }

    /// `<problems_dir>/<id>.tex`
    pub fn unit_path(&self, id: &str) -> PathBuf {
        self.problems_dir.join(unit_file_name(id))
    }

    /// `<solutions_dir>/<id>_solution.tex`
    pub fn solution_path(&self, id: &str) -> PathBuf {
        self.solutions_dir.join(format!("{id}_solution.tex"))
    }

    /// Create the output directory structure.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.problems_dir, &self.solutions_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ProbankError::io(dir, e))?;
        }
        debug!(path = %self.root.display(), "output directories ready");
        Ok(())
    }
}

/// A unit ready to be written under its identifier.
#[derive(Debug, Clone, Copy)]
pub struct UnitRecord<'a> {
    pub id: &'a str,
    /// Origin document, relative to the document root.
    pub origin: &'a str,
    pub content: &'a str,
    pub endnote: &'a Endnote,
    pub has_graphics: bool,
}

impl UnitRecord<'_> {
    /// The metadata summary for this unit.
    pub fn summary(&self) -> ProblemMeta {
        ProblemMeta {
            id: self.id.to_string(),
            filename: unit_file_name(self.id),
            source_file: self.origin.to_string(),
            source: self.endnote.citation.clone().unwrap_or_default(),
            answer: self.endnote.short_answer.clone().unwrap_or_default(),
            has_tikz: self.has_graphics,
            has_solution: self.endnote.has_solution(),
            note: self.endnote.raw_note.clone().unwrap_or_default(),
            content_hash: content_hash(self.content),
            category: String::new(),
            difficulty: None,
            tags: Vec::new(),
        }
    }
}

/// Write a unit's content file and, if it has one, its solution file.
pub fn write_unit(layout: &OutputLayout, record: &UnitRecord<'_>) -> Result<()> {
    let path = layout.unit_path(record.id);
    write_atomic(&path, &render_unit(record))?;

    if let Some(note) = record.endnote.raw_note.as_deref() {
        let solution_path = layout.solution_path(record.id);
        write_atomic(&solution_path, &render_solution(record, note))?;
    }

    debug!(id = record.id, path = %path.display(), "wrote unit");
    Ok(())
}

/// Unit file: `%` header lines, a blank line, then the content.
pub fn render_unit(record: &UnitRecord<'_>) -> String {
    let mut out = format!("% Problem ID: {}\n", record.id);
    if let Some(source) = &record.endnote.citation {
        out.push_str(&format!("% Source: {source}\n"));
    }
    if let Some(answer) = &record.endnote.short_answer {
        out.push_str(&format!("% Answer: {answer}\n"));
    }
    out.push_str(&format!("% Original file: {}\n\n", record.origin));
    out.push_str(record.content);
    out
}

fn render_solution(record: &UnitRecord<'_>, note: &str) -> String {
    let mut out = format!("% Solution for Problem {}\n", record.id);
    if let Some(source) = &record.endnote.citation {
        out.push_str(&format!("% Source: {source}\n"));
    }
    out.push_str(&format!("% Original file: {}\n\n", record.origin));
    out.push_str(note);
    out
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Read an aggregate metadata file.
pub fn load_metadata(path: &Path) -> Result<CorpusMetadata> {
    let content = std::fs::read_to_string(path).map_err(|e| ProbankError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ProbankError::parse(format!("invalid metadata {}: {e}", path.display())))
}

/// Load the metadata a previous run left behind, if any.
///
/// An unreadable prior file is copied aside (`<name>.bak`) so the hand-edited
/// fields it holds survive the overwrite, and merging is skipped.
pub fn load_prior_metadata(path: &Path) -> Option<CorpusMetadata> {
    if !path.exists() {
        return None;
    }
    match load_metadata(path) {
        Ok(prior) => Some(prior),
        Err(e) => {
            let backup = path.with_extension("json.bak");
            warn!(error = %e, backup = %backup.display(), "prior metadata unreadable, not merging");
            if let Err(e) = std::fs::copy(path, &backup) {
                warn!(error = %e, "could not back up prior metadata");
            }
            None
        }
    }
}

/// Carry hand-edited fields from `prior` into freshly extracted summaries.
///
/// A prior entry matches on `content_hash`, or failing that on the same
/// `id` and `source_file`. Returns how many summaries picked up a hand-edited field.
pub fn merge_prior(problems: &mut [ProblemMeta], prior: &CorpusMetadata) -> usize {
    let mut merged = 0;
    for problem in problems.iter_mut() {
        let matched = prior
            .problems
            .iter()
            .find(|p| !p.content_hash.is_empty() && p.content_hash == problem.content_hash)
            .or_else(|| {
                prior
                    .problems
                    .iter()
                    .find(|p| p.id == problem.id && p.source_file == problem.source_file)
            });
        if let Some(prior_entry) = matched.filter(|p| p.has_manual_fields()) {
            problem.merge_manual_fields(prior_entry);
            merged += 1;
        }
    }
    merged
}

/// Write the aggregate metadata file.
pub fn write_metadata(path: &Path, metadata: &CorpusMetadata) -> Result<()> {
    write_json(path, metadata)?;
    info!(
        path = %path.display(),
        total = metadata.total_problems,
        "metadata written"
    );
    Ok(())
}

/// Write the human-readable extraction log.
pub fn write_log(path: &Path, entries: &[String]) -> Result<()> {
    let rule = "=".repeat(60);
    let mut out = format!(
        "{rule}\nProblem extraction log - {}\n{rule}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    out.push_str(&format!("\n{rule}\n{} problems extracted\n", entries.len()));

    write_atomic(path, &out)
}

/// One extraction log line.
pub fn log_entry(meta: &ProblemMeta) -> String {
    let source = if meta.source.is_empty() {
        "No source"
    } else {
        meta.source.as_str()
    };
    format!("[{}] {} - {}", meta.id, meta.source_file, source)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `<id>.tex`
pub fn unit_file_name(id: &str) -> String {
    format!("{id}.tex")
}

/// Hex SHA-256 of a string.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Write a JSON file (pretty-printed).
pub(crate) fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ProbankError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(path, &json)?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

/// Write to a temp file beside `path`, then rename over it.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ProbankError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| ProbankError::io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
