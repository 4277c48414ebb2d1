//! Corpus orchestration for probank.
//!
//! This crate ties document discovery, per-document segmentation
//! (`probank-extract`) and on-disk persistence into end-to-end workflows:
//! `extract` ([`corpus`]), `bundle` ([`bundle`]) and `list` ([`listing`]).

pub mod assembler;
pub mod bundle;
pub mod corpus;
pub mod documents;
pub mod listing;

pub use bundle::{BundleOptions, BundleReport, build_bundle};
pub use corpus::{
    CorpusAssembler, CorpusConfig, CorpusReport, DocumentCounts, ProgressReporter, SilentProgress,
    SkippedDocument, extract_corpus,
};
pub use listing::{ListOptions, render_problem_list};
