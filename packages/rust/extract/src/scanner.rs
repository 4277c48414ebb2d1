//! Brace-depth scanner for `\command{...}` constructs.
//!
//! Brace-delimited content nests arbitrarily deep, so spans are found by
//! counting depth rather than by pattern matching. The scan is TeX-aware in
//! two small ways: a backslash escapes the following character (`\{`, `\}`,
//! `\\` never change depth) and `%` starts a comment that runs to the end of
//! the line.
//!
//! All offsets are byte offsets into the scanned text. Every delimiter the
//! scanner stops on is ASCII, so offsets always fall on char boundaries.

use std::ops::Range;

use regex::Regex;

/// A balanced `\command{inner}` span.
///
/// Invariant: `span_start < inner_start <= inner_end < span_end`, with
/// `inner_start - 1` the opening brace and `inner_end` the closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancedSpan {
    /// Start of the matched command token.
    pub span_start: usize,
    /// First byte after the opening brace.
    pub inner_start: usize,
    /// Offset of the matching closing brace.
    pub inner_end: usize,
    /// First byte after the matching closing brace.
    pub span_end: usize,
}

impl BalancedSpan {
    /// Content between the braces.
    pub fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner_start..self.inner_end]
    }

    /// The whole construct, command token through closing brace.
    pub fn outer<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span_start..self.span_end]
    }

    /// Byte range of the whole construct.
    pub fn range(&self) -> Range<usize> {
        self.span_start..self.span_end
    }

    /// Whether `offset` falls inside the construct.
    pub fn contains(&self, offset: usize) -> bool {
        self.range().contains(&offset)
    }
}

/// Why a balanced span could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// No match of the start pattern is followed by an opening brace.
    #[error("start pattern not found")]
    PatternAbsent,

    /// The opening brace at `open_at` is never closed.
    #[error("unbalanced braces: opening brace at byte {open_at} is never closed")]
    Unbalanced { open_at: usize },
}

/// Find the first `start` match that is followed by `{`, and return its balanced span.
///
/// Whitespace between the match and the brace is allowed. Matches inside a
/// `%` comment are ignored.
pub fn find_balanced_span(text: &str, start: &Regex) -> Result<BalancedSpan, ScanError> {
    find_balanced_span_from(text, start, 0)
}

/// Like [`find_balanced_span`], ignoring matches that begin before `from`.
pub fn find_balanced_span_from(
    text: &str,
    start: &Regex,
    from: usize,
) -> Result<BalancedSpan, ScanError> {
    for m in start.find_iter(text) {
        if m.start() < from || is_commented(text, m.start()) {
            continue;
        }
        let Some(open) = opening_brace_after(text, m.end()) else {
            continue;
        };
        return match matching_close(text, open) {
            Some(close) => Ok(BalancedSpan {
                span_start: m.start(),
                inner_start: open + 1,
                inner_end: close,
                span_end: close + 1,
            }),
            None => Err(ScanError::Unbalanced { open_at: open }),
        };
    }
    Err(ScanError::PatternAbsent)
}

/// All outermost balanced spans for `start`, in text order.
///
/// An unbalanced opener is skipped and scanning resumes right after its
/// brace, so one malformed construct does not hide later well-formed ones.
pub fn balanced_spans(text: &str, start: &Regex) -> Vec<BalancedSpan> {
    let mut spans = Vec::new();
    let mut from = 0;

    loop {
        match find_balanced_span_from(text, start, from) {
            Ok(span) => {
                from = span.span_end;
                spans.push(span);
            }
            Err(ScanError::Unbalanced { open_at }) => {
                tracing::debug!(open_at, "skipping unbalanced construct");
                from = open_at + 1;
            }
            Err(ScanError::PatternAbsent) => break,
        }
    }

    spans
}

/// Offset of the closing brace matching the opening brace at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = open + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'%' => match text[i..].find('\n') {
                Some(nl) => i += nl,
                None => return None,
            },
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Offset of `{` after optional whitespace starting at `pos`.
fn opening_brace_after(text: &str, pos: usize) -> Option<usize> {
    let rest = &text[pos..];
    let skipped = rest.len() - rest.trim_start().len();
    (rest[skipped..].starts_with('{')).then_some(pos + skipped)
}

/// Whether `pos` sits after an unescaped `%` on its line.
pub fn is_commented(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |nl| nl + 1);
    let bytes = text.as_bytes();
    let mut i = line_start;

    while i < pos {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return true,
            _ => i += 1,
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endnote_re() -> Regex {
        Regex::new(r"\\endnote").unwrap()
    }

    /// Net depth of `s`, counting only unescaped braces.
    fn net_depth(s: &str) -> i64 {
        let bytes = s.as_bytes();
        let mut depth = 0i64;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        depth
    }

    #[test]
    fn finds_flat_span() {
        let text = r"before \endnote{hello} after";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "hello");
        assert_eq!(span.outer(text), r"\endnote{hello}");
        assert_eq!(&text[span.span_end..], " after");
    }

    #[test]
    fn offsets_are_ordered() {
        let text = r"x \endnote{a{b}c} y";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert!(span.span_start < span.inner_start);
        assert!(span.inner_start <= span.inner_end);
        assert!(span.inner_end < span.span_end);
        assert!(span.span_end <= text.len());
    }

    #[test]
    fn empty_inner_is_allowed() {
        let text = r"\endnote{}";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner_start, span.inner_end);
        assert_eq!(span.inner(text), "");
    }

    #[test]
    fn deep_nesting_balances() {
        let depth = 40;
        let inner = format!("{}core{}", "{".repeat(depth), "}".repeat(depth));
        let text = format!(r"\endnote{{{inner}}} tail}}");
        let span = find_balanced_span(&text, &endnote_re()).unwrap();
        assert_eq!(span.inner(&text), inner);
        assert_eq!(net_depth(span.inner(&text)), 0);
        assert_eq!(&text[span.span_end..], " tail}");
    }

    #[test]
    fn whitespace_before_brace() {
        let text = "\\endnote \n {spaced}";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "spaced");
    }

    #[test]
    fn match_without_brace_is_skipped() {
        let text = r"\endnote text then \endnote{real}";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "real");
    }

    #[test]
    fn absent_pattern_is_distinct_from_unbalanced() {
        assert_eq!(
            find_balanced_span("no notes here", &endnote_re()),
            Err(ScanError::PatternAbsent)
        );

        let text = r"\endnote{open {never closed}";
        assert_eq!(
            find_balanced_span(text, &endnote_re()),
            Err(ScanError::Unbalanced { open_at: 8 })
        );
    }

    #[test]
    fn escaped_braces_do_not_count() {
        let text = r"\endnote{set $\{1, 2\}$ and \\{x}} rest";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), r"set $\{1, 2\}$ and \\{x}");
    }

    #[test]
    fn braces_in_comments_do_not_count() {
        let text = "\\endnote{line % stray }\n done} after";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "line % stray }\n done");
    }

    #[test]
    fn commented_start_is_ignored() {
        let text = "% \\endnote{old}\n\\endnote{new}";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "new");
    }

    #[test]
    fn multibyte_content_keeps_char_boundaries() {
        let text = r"문제 \endnote{답: 17 {풀이}} 끝";
        let span = find_balanced_span(text, &endnote_re()).unwrap();
        assert_eq!(span.inner(text), "답: 17 {풀이}");
        assert_eq!(&text[span.span_end..], " 끝");
    }

    #[test]
    fn balanced_spans_skips_malformed_opener() {
        let text = r"\fbox{a} \fbox{b \fbox{c}";
        let re = Regex::new(r"\\fbox").unwrap();
        let inners: Vec<_> = balanced_spans(text, &re)
            .iter()
            .map(|s| s.inner(text).to_string())
            .collect();
        assert_eq!(inners, vec!["a", "c"]);
    }

    #[test]
    fn is_commented_respects_escaped_percent() {
        let text = "50\\% off \\vfill\n% \\vfill";
        let first = text.find("\\vfill").unwrap();
        let second = text.rfind("\\vfill").unwrap();
        assert!(!is_commented(text, first));
        assert!(is_commented(text, second));
    }
}
