//! Source document discovery and decoding.
//!
//! Documents are found recursively under a root, filtered by directory and
//! file-name denylists, and ordered so that documents under the priority
//! directory come first (and therefore get the lowest identifiers).

use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use probank_shared::{DiscoveryConfig, ProbankError, Result};

/// How a document's bytes were turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Byte-preserving fallback: each byte becomes the code point of the same value.
    Latin1,
}

/// A source document, read once and never mutated.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute (or root-joined) path on disk.
    pub path: PathBuf,
    /// Path relative to the document root, `/`-separated.
    pub relative: String,
    pub text: String,
    pub encoding: TextEncoding,
}

/// Collect every document under `root` that passes the filters, in processing order.
///
/// Fails only when `root` is not a directory. Unreadable subtrees are logged and skipped.
#[instrument(skip(config), fields(root = %root.display()))]
pub fn discover_documents(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ProbankError::validation(format!(
            "document root {} does not exist or is not a directory",
            root.display()
        )));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_excluded_dir(&entry.file_name().to_string_lossy(), config)
        });

    let mut documents = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path during discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if should_process(relative, config) {
            documents.push(entry.into_path());
        } else {
            debug!(path = %relative.display(), "excluded by filters");
        }
    }

    documents.sort_by_cached_key(|path| {
        let relative = path.strip_prefix(root).unwrap_or(path);
        (
            !has_segment(relative, &config.priority_segment),
            relative_string(relative),
        )
    });

    debug!(count = documents.len(), "documents discovered");
    Ok(documents)
}

/// Whether a document at `relative` (to the root) should be processed.
pub fn should_process(relative: &Path, config: &DiscoveryConfig) -> bool {
    let has_extension = relative
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)));
    if !has_extension {
        return false;
    }

    let in_excluded_dir = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .any(|name| is_excluded_dir(&name, config));
    if in_excluded_dir {
        return false;
    }

    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !config
        .exclude_keywords
        .iter()
        .any(|keyword| stem.contains(&keyword.to_lowercase()))
}

fn is_excluded_dir(name: &str, config: &DiscoveryConfig) -> bool {
    config.exclude_dirs.iter().any(|d| d == name)
        || config
            .exclude_dir_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
}

fn has_segment(relative: &Path, segment: &str) -> bool {
    relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| matches!(c, Component::Normal(name) if name == segment))
}

/// `/`-separated rendering of a relative path, stable across platforms.
pub fn relative_string(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read a document, falling back to a byte-preserving decoding for non-UTF-8 input.
pub fn read_document(root: &Path, path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|e| ProbankError::io(path, e))?;
    let relative = relative_string(path.strip_prefix(root).unwrap_or(path));

    let (text, encoding) = match String::from_utf8(bytes) {
        Ok(text) => (text, TextEncoding::Utf8),
        Err(e) => {
            warn!(path = %relative, error = %e, "not valid UTF-8, decoding as Latin-1");
            (decode_latin1(e.as_bytes()), TextEncoding::Latin1)
        }
    };

    let text = match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    };

    Ok(Document {
        path: path.to_path_buf(),
        relative,
        text,
        encoding,
    })
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
