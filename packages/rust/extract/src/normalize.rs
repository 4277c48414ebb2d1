//! Content normalization for extracted units.
//!
//! Each pass is a function `&str -> String` applied in sequence. Endnotes go
//! first so that directive-like tokens inside a note leave with the note.
//! The pipeline is repeated until the text stops changing, which makes
//! [`normalize`] idempotent even when one removal exposes another marker.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::endnote::{ENDNOTE_RE, FBOX_RE};
use crate::scanner;

/// Line break (and surrounding whitespace) after a citation box.
static LINEBREAK_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\\\\\s*").expect("linebreak tail regex"));

static COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\stepcounter\s*\{prob\}").expect("counter regex"));

static LAYOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:vfill|newpage)\s*").expect("layout regex"));

/// Produce the canonical stored content of a unit.
pub fn normalize(span_text: &str) -> String {
    let mut current = run_pipeline(span_text);
    loop {
        let next = run_pipeline(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn run_pipeline(text: &str) -> String {
    let mut result = remove_endnotes(text);

    result = strip_citation_headers(&result);
    result = strip_counter_markers(&result);
    result = strip_layout_directives(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Remove endnotes
// ---------------------------------------------------------------------------

/// Cut every balanced `\endnote{...}` out of the text.
///
/// Unbalanced endnotes are left in place; there is no safe end to cut at.
fn remove_endnotes(text: &str) -> String {
    let spans = scanner::balanced_spans(text, &ENDNOTE_RE);
    remove_ranges(text, spans.iter().map(|s| (s.span_start, s.span_end)))
}

// ---------------------------------------------------------------------------
// Pass 2: Strip citation headers
// ---------------------------------------------------------------------------

/// Remove `\fbox{...}\\` header markers, including the trailing whitespace.
fn strip_citation_headers(text: &str) -> String {
    let ranges = scanner::balanced_spans(text, &FBOX_RE)
        .into_iter()
        .filter_map(|span| {
            LINEBREAK_TAIL_RE
                .find(&text[span.span_end..])
                .map(|tail| (span.span_start, span.span_end + tail.end()))
        })
        .collect::<Vec<_>>();

    remove_ranges(text, ranges)
}

// ---------------------------------------------------------------------------
// Pass 3: Strip counter markers
// ---------------------------------------------------------------------------

fn strip_counter_markers(text: &str) -> String {
    COUNTER_RE.replace_all(text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Strip layout directives
// ---------------------------------------------------------------------------

/// Remove `\vfill` and `\newpage` with their trailing whitespace.
///
/// A match glued to further letters (`\vfilll`, `\newpagestyle`) is a
/// different control word and stays.
fn strip_layout_directives(text: &str) -> String {
    LAYOUT_RE
        .replace_all(text, |caps: &Captures| {
            let whole = caps.get(0).expect("group 0 always present");
            let glued = whole.as_str().ends_with(|c: char| c.is_ascii_alphabetic())
                && text[whole.end()..].starts_with(|c: char| c.is_ascii_alphabetic());
            if glued {
                whole.as_str().to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Copy `text` without the given non-overlapping, ascending byte ranges.
fn remove_ranges(text: &str, ranges: impl IntoIterator<Item = (usize, usize)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in ranges {
        let start = start.max(cursor);
        out.push_str(&text[cursor..start]);
        cursor = end.max(cursor);
    }
    out.push_str(&text[cursor..]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
