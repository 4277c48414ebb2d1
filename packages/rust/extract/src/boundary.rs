//! Unit boundary location.
//!
//! A unit starts at one of two markers:
//! - **cited**: `\fbox{citation}\\` followed by `\stepcounter{prob}`
//! - **bare**: `\stepcounter{prob}` on its own
//!
//! Location runs in two phases. First every candidate is gathered with its
//! marker kind; then one merge pass drops bare candidates that sit within
//! [`DEDUP_WINDOW_CHARS`] of a cited one, or inside it (the bare match is
//! usually the very counter inside the cited marker). A unit ends right after
//! the first `\vfill` or `\newpage` before the next unit's start, or at that
//! start if no terminator occurs. Terminators inside an `\endnote{...}` body
//! belong to the note and never end a unit.

use std::sync::LazyLock;

use regex::Regex;

use crate::endnote::{ENDNOTE_RE, FBOX_RE, HEADER_TAIL_RE};
use crate::scanner;

/// Bare markers closer than this many characters to a cited marker are the same boundary.
pub const DEDUP_WINDOW_CHARS: usize = 100;

static COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\stepcounter\s*\{prob\}").expect("counter regex"));

/// `\vfill` or `\newpage`, not as a prefix of a longer control word.
static TERMINATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\(?:vfill|newpage))(?:[^A-Za-z]|$)").expect("terminator regex")
});

/// Which pattern produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Citation box, line break, counter.
    Cited,
    /// Counter alone.
    Bare,
}

/// A possible unit start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Byte offset where the marker begins.
    pub start: usize,
    /// Byte offset just past the counter marker.
    pub end: usize,
    pub kind: MarkerKind,
}

impl Candidate {
    /// Whether the marker carries its own citation box.
    pub fn has_citation(&self) -> bool {
        self.kind == MarkerKind::Cited
    }
}

/// A located unit: `text[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpan {
    pub start: usize,
    pub end: usize,
    pub has_header_citation: bool,
}

/// Locate every unit in a document, in text order.
///
/// A document without markers yields an empty list.
pub fn locate_units(text: &str) -> Vec<UnitSpan> {
    let markers = merge_candidates(text, gather_candidates(text));

    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let next_start = markers.get(i + 1).map_or(text.len(), |next| next.start);
            let window_end = next_start.max(marker.end);
            let end = first_terminator_end(text, marker.end, window_end).unwrap_or(window_end);
            UnitSpan {
                start: marker.start,
                end,
                has_header_citation: marker.has_citation(),
            }
        })
        .collect()
}

/// Phase one: every cited and bare marker, unfiltered.
pub fn gather_candidates(text: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = scanner::balanced_spans(text, &FBOX_RE)
        .into_iter()
        .filter_map(|span| {
            HEADER_TAIL_RE
                .find(&text[span.span_end..])
                .map(|tail| Candidate {
                    start: span.span_start,
                    end: span.span_end + tail.end(),
                    kind: MarkerKind::Cited,
                })
        })
        .collect();

    candidates.extend(
        COUNTER_RE
            .find_iter(text)
            .filter(|m| !scanner::is_commented(text, m.start()))
            .map(|m| Candidate {
                start: m.start(),
                end: m.end(),
                kind: MarkerKind::Bare,
            }),
    );

    candidates
}

/// Phase two: collapse near-coincident markers and sort by position.
///
/// Independent of the order candidates arrive in.
pub fn merge_candidates(text: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let cited: Vec<(usize, usize)> = candidates
        .iter()
        .filter(|c| c.has_citation())
        .map(|c| (c.start, c.end))
        .collect();

    let mut kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            c.has_citation()
                || !cited.iter().any(|&(start, end)| {
                    (start..end).contains(&c.start)
                        || char_distance(text, c.start, start) < DEDUP_WINDOW_CHARS
                })
        })
        .collect();

    kept.sort_by_key(|c| c.start);
    kept.dedup_by_key(|c| c.start);
    kept
}

/// Offset just past the earliest terminator in `text[from..to]` that is
/// neither commented out nor inside a balanced endnote.
fn first_terminator_end(text: &str, from: usize, to: usize) -> Option<usize> {
    let window = &text[from..to];
    let notes = scanner::balanced_spans(window, &ENDNOTE_RE);

    TERMINATOR_RE
        .captures_iter(window)
        .filter_map(|caps| caps.get(1))
        .filter(|m| !notes.iter().any(|note| note.contains(m.start())))
        .find(|m| !scanner::is_commented(text, from + m.start()))
        .map(|m| from + m.end())
}

/// Number of characters between two byte offsets.
fn char_distance(text: &str, a: usize, b: usize) -> usize {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    text[lo..hi].chars().count()
}
