//! Endnote and citation extraction.
//!
//! A unit carries its annotation in `\endnote{...}`: a free-form solution
//! that may hold a citation box and an `답: ...` short answer. The citation
//! normally sits in the unit header instead, as `\fbox{...}\\` right before
//! `\stepcounter{prob}`.
//!
//! Extraction here is read-only. Removing the endnote from the unit body is
//! the normalizer's job.

use std::sync::LazyLock;

use regex::Regex;

use crate::scanner::{self, BalancedSpan, ScanError};

/// `\endnote` command token; the scanner supplies the brace.
pub(crate) static ENDNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\endnote").expect("endnote regex"));

/// `\fbox` command token (citation box).
pub(crate) static FBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\fbox").expect("fbox regex"));

/// What follows a header citation box: a line break, then the counter marker.
pub(crate) static HEADER_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\\\\\s*\\stepcounter\s*\{prob\}").expect("header tail regex")
});

/// Short answer field, up to the next backslash command.
static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:답|[Aa]nswer)\s*[:：]\s*([^\\]+)").expect("answer regex")
});

/// Fields pulled out of one unit's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endnote {
    /// Citation from the header box, else from a box inside the endnote.
    pub citation: Option<String>,
    /// Short answer from the endnote body.
    pub short_answer: Option<String>,
    /// Trimmed endnote body; `None` when absent or blank.
    pub raw_note: Option<String>,
    /// Location of the whole `\endnote{...}` construct in the unit text.
    pub note_span: Option<BalancedSpan>,
    /// An `\endnote` opener was found but its braces never balance.
    pub malformed: bool,
}

impl Endnote {
    /// Whether the unit has solution text worth storing.
    pub fn has_solution(&self) -> bool {
        self.raw_note.is_some()
    }
}

/// Extract citation, short answer and note body from a unit's raw text.
pub fn extract_endnote(unit_text: &str) -> Endnote {
    let mut endnote = Endnote::default();

    match scanner::find_balanced_span(unit_text, &ENDNOTE_RE) {
        Ok(span) => {
            let body = span.inner(unit_text).trim();
            endnote.note_span = Some(span);
            if !body.is_empty() {
                endnote.raw_note = Some(body.to_string());
            }
        }
        Err(ScanError::Unbalanced { open_at }) => {
            tracing::debug!(open_at, "endnote braces never close, treating as absent");
            endnote.malformed = true;
        }
        Err(ScanError::PatternAbsent) => {}
    }

    endnote.citation = header_citation(unit_text, endnote.note_span.as_ref()).or_else(|| {
        endnote
            .raw_note
            .as_deref()
            .and_then(first_citation)
    });

    endnote.short_answer = endnote.raw_note.as_deref().and_then(short_answer);

    endnote
}

/// Citation box directly followed by `\\` and `\stepcounter{prob}`, outside the endnote.
pub fn header_citation(text: &str, note_span: Option<&BalancedSpan>) -> Option<String> {
    scanner::balanced_spans(text, &FBOX_RE)
        .into_iter()
        .filter(|span| !note_span.is_some_and(|note| note.contains(span.span_start)))
        .find(|span| HEADER_TAIL_RE.is_match(&text[span.span_end..]))
        .and_then(|span| non_empty(span.inner(text)))
}

/// First non-empty citation box anywhere in `text`.
fn first_citation(text: &str) -> Option<String> {
    scanner::balanced_spans(text, &FBOX_RE)
        .into_iter()
        .find_map(|span| non_empty(span.inner(text)))
}

/// The `답: ...` field of a note body.
pub fn short_answer(note: &str) -> Option<String> {
    ANSWER_RE
        .captures(note)
        .and_then(|caps| non_empty(&caps[1]))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
