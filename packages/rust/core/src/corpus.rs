//! End-to-end `extract` run: document root → discovery → segmentation → corpus on disk.
//!
//! The whole run is single-threaded. One [`CorpusAssembler`] owns the
//! identifier counter and the accumulated metadata; nothing is global.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use probank_extract::{ExtractedUnit, extract_units};
use probank_shared::{AppConfig, CorpusMetadata, DiscoveryConfig, OutputConfig, ProblemMeta, Result};

use crate::assembler::{self, OutputLayout, UnitRecord};
use crate::documents::{self, Document};

/// Configuration for one corpus run.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Root of the source document tree.
    pub root: PathBuf,
    /// Where unit files, metadata and the log are written.
    pub output_root: PathBuf,
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
}

impl CorpusConfig {
    /// Build a run configuration from the loaded application config.
    pub fn from_app(root: impl Into<PathBuf>, output_root: impl Into<PathBuf>, app: &AppConfig) -> Self {
        Self {
            root: root.into(),
            output_root: output_root.into(),
            discovery: app.discovery.clone(),
            output: app.output.clone(),
        }
    }
}

/// A document that contributed nothing because it could not be processed.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: String,
    pub reason: String,
}

/// Result of a corpus run.
#[derive(Debug)]
pub struct CorpusReport {
    /// Documents that were read and segmented.
    pub documents: usize,
    /// Documents skipped for read errors.
    pub documents_skipped: Vec<SkippedDocument>,
    pub units_written: usize,
    /// Located spans dropped as too short.
    pub units_discarded: usize,
    /// Units whose endnote had unbalanced braces.
    pub malformed_endnotes: usize,
    /// Units whose file could not be written.
    pub units_failed: usize,
    /// Summaries that picked up hand-edited fields from a prior run.
    pub merged: usize,
    pub metadata_path: PathBuf,
    pub elapsed: Duration,
}

/// Per-document counts, reported as each document finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCounts {
    pub located: usize,
    pub written: usize,
    pub discarded: usize,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a document is read.
    fn document_started(&self, path: &str, current: usize, total: usize);
    /// Called after a document's units have been written.
    fn document_finished(&self, path: &str, counts: DocumentCounts);
    /// Called when the run completes.
    fn done(&self, report: &CorpusReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_started(&self, _path: &str, _current: usize, _total: usize) {}
    fn document_finished(&self, _path: &str, _counts: DocumentCounts) {}
    fn done(&self, _report: &CorpusReport) {}
}

/// Drives one corpus run.
///
/// `next_seq` only advances after a unit's file is on disk, so identifiers
/// stay dense even when a write fails.
pub struct CorpusAssembler {
    config: CorpusConfig,
    layout: OutputLayout,
    next_seq: usize,
    problems: Vec<ProblemMeta>,
    log: Vec<String>,
    report: CorpusReport,
}

impl CorpusAssembler {
    pub fn new(config: CorpusConfig) -> Self {
        let layout = OutputLayout::new(&config.output_root, &config.output);
        let report = CorpusReport {
            documents: 0,
            documents_skipped: Vec::new(),
            units_written: 0,
            units_discarded: 0,
            malformed_endnotes: 0,
            units_failed: 0,
            merged: 0,
            metadata_path: layout.metadata_file.clone(),
            elapsed: Duration::ZERO,
        };
        Self {
            config,
            layout,
            next_seq: 1,
            problems: Vec::new(),
            log: Vec::new(),
            report,
        }
    }

    /// Run discovery, extraction and persistence over the whole document set.
    ///
    /// Fails only if the root is missing, the output directories cannot be
    /// created, or the final metadata cannot be written. Everything else is
    /// logged and counted.
    #[instrument(skip_all, fields(root = %self.config.root.display()))]
    pub fn run(mut self, progress: &dyn ProgressReporter) -> Result<CorpusReport> {
        let start = Instant::now();

        progress.phase("Discovering documents");
        let paths = documents::discover_documents(&self.config.root, &self.config.discovery)?;
        info!(count = paths.len(), "documents discovered");

        self.layout.create_dirs()?;

        let prior = if self.config.output.merge_prior_metadata {
            assembler::load_prior_metadata(&self.layout.metadata_file)
        } else {
            None
        };

        progress.phase("Extracting problems");
        let total = paths.len();
        for (i, path) in paths.iter().enumerate() {
            let relative = documents::relative_string(path.strip_prefix(&self.config.root).unwrap_or(path));
            progress.document_started(&relative, i + 1, total);

            match documents::read_document(&self.config.root, path) {
                Ok(doc) => {
                    let counts = self.process_document(&doc);
                    progress.document_finished(&doc.relative, counts);
                }
                Err(e) => {
                    warn!(path = %relative, error = %e, "skipping unreadable document");
                    self.report.documents_skipped.push(SkippedDocument {
                        path: relative,
                        reason: e.to_string(),
                    });
                }
            }
        }

        progress.phase("Writing metadata");
        if let Some(prior) = &prior {
            self.report.merged = assembler::merge_prior(&mut self.problems, prior);
            debug!(merged = self.report.merged, "merged prior metadata");
        }

        if let Err(e) = assembler::write_log(&self.layout.log_file, &self.log) {
            warn!(error = %e, "failed to write extraction log");
        }

        let metadata = CorpusMetadata::new(std::mem::take(&mut self.problems));
        assembler::write_metadata(&self.layout.metadata_file, &metadata)?;

        let mut report = self.report;
        report.elapsed = start.elapsed();

        info!(
            documents = report.documents,
            skipped = report.documents_skipped.len(),
            units = report.units_written,
            discarded = report.units_discarded,
            elapsed_ms = report.elapsed.as_millis(),
            "extraction complete"
        );

        progress.done(&report);
        Ok(report)
    }

    /// Segment one document and persist its units.
    fn process_document(&mut self, doc: &Document) -> DocumentCounts {
        self.report.documents += 1;

        let extraction = extract_units(&doc.text);
        if extraction.located == 0 {
            debug!(path = %doc.relative, "no markers, skipping");
        }

        let mut counts = DocumentCounts {
            located: extraction.located,
            discarded: extraction.discarded,
            ..Default::default()
        };
        self.report.units_discarded += extraction.discarded;

        for unit in &extraction.units {
            if unit.endnote.malformed {
                self.report.malformed_endnotes += 1;
                warn!(
                    path = %doc.relative,
                    offset = unit.span.start,
                    "unbalanced endnote, treating as absent"
                );
            }
            if self.persist_unit(&doc.relative, unit) {
                counts.written += 1;
            }
        }

        info!(
            path = %doc.relative,
            located = counts.located,
            written = counts.written,
            discarded = counts.discarded,
            "document processed"
        );
        counts
    }

    /// Write one unit under the next identifier. Returns whether it was written.
    fn persist_unit(&mut self, origin: &str, unit: &ExtractedUnit) -> bool {
        let id = format_id(self.next_seq, self.config.output.id_width);
        let record = UnitRecord {
            id: &id,
            origin,
            content: &unit.content,
            endnote: &unit.endnote,
            has_graphics: unit.classification.has_graphics,
        };

        if let Err(e) = assembler::write_unit(&self.layout, &record) {
            warn!(id = %id, path = %origin, error = %e, "failed to write unit");
            self.report.units_failed += 1;
            return false;
        }

        let summary = record.summary();
        self.log.push(assembler::log_entry(&summary));
        self.problems.push(summary);
        self.next_seq += 1;
        self.report.units_written += 1;
        true
    }
}

/// Zero-padded identifier, widening past `width` when the counter outgrows it.
pub fn format_id(seq: usize, width: usize) -> String {
    format!("{seq:0width$}")
}

/// Run a corpus extraction with the given config.
pub fn extract_corpus(config: CorpusConfig, progress: &dyn ProgressReporter) -> Result<CorpusReport> {
    CorpusAssembler::new(config).run(progress)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
