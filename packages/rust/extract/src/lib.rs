//! Problem segmentation engine for typeset competition-problem documents.
//!
//! Splits one document into discrete problem units:
//! 1. [`boundary`] locates unit spans from counter/citation markers
//! 2. [`normalize`] strips structural markers to get the stored content
//! 3. [`endnote`] pulls citation, short answer and solution text
//! 4. [`classify`] flags graphics and applies the minimum-length test
//!
//! Nested `{...}` constructs are always matched by [`scanner`], never by a
//! single pattern.

pub mod boundary;
pub mod classify;
pub mod endnote;
pub mod normalize;
pub mod scanner;

use tracing::{debug, instrument};

pub use boundary::{DEDUP_WINDOW_CHARS, UnitSpan, locate_units};
pub use classify::{Classification, MIN_CONTENT_CHARS, classify, figure_key, graphics_blocks};
pub use endnote::{Endnote, extract_endnote};
pub use normalize::normalize;
pub use scanner::{BalancedSpan, ScanError, find_balanced_span};

/// One unit that survived extraction.
#[derive(Debug, Clone)]
pub struct ExtractedUnit {
    /// Where the unit sits in its document.
    pub span: UnitSpan,
    /// The located span, verbatim.
    pub raw: String,
    /// Normalized content.
    pub content: String,
    /// Endnote payload pulled from the raw span.
    pub endnote: Endnote,
    pub classification: Classification,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtraction {
    /// Kept units, in document order.
    pub units: Vec<ExtractedUnit>,
    /// Number of spans the boundary locator produced.
    pub located: usize,
    /// Spans dropped for being shorter than [`MIN_CONTENT_CHARS`].
    pub discarded: usize,
}

/// Extract all units from a document's text.
#[instrument(skip_all, fields(len = text.len()))]
pub fn extract_units(text: &str) -> DocumentExtraction {
    let spans = locate_units(text);
    let mut result = DocumentExtraction {
        located: spans.len(),
        ..Default::default()
    };

    for span in spans {
        let raw = &text[span.start..span.end];
        let content = normalize(raw);

        if !classify::is_substantial(&content) {
            debug!(
                start = span.start,
                chars = content.chars().count(),
                "discarding degenerate unit"
            );
            result.discarded += 1;
            continue;
        }

        let endnote = extract_endnote(raw);
        let classification = classify(&content);

        result.units.push(ExtractedUnit {
            span,
            raw: raw.to_string(),
            content,
            endnote,
            classification,
        });
    }

    debug!(
        located = result.located,
        kept = result.units.len(),
        discarded = result.discarded,
        "document extraction complete"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_unit_document() -> String {
        [
            "\\section*{Geometry}",
            "\\fbox{29th KMO 2015}\\\\",
            "\\stepcounter{prob}",
            "삼각형 $ABC$의 내심을 $I$라 하자. 선분 $AI$의 연장선이 외접원과 만나는 점을 $D$라 할 때,",
            "$DB = DI$임을 보여라.",
            "\\vfill",
            "",
            "\\stepcounter{prob}",
            "양의 정수 $n$에 대하여 $n^2 + 2n$이 $289$의 배수가 되는 가장 작은 $n$의 값을 구하여라.",
            "\\endnote{답: 17}",
            "",
        ]
        .join("\n")
    }

    #[test]
    fn end_to_end_two_units() {
        let doc = two_unit_document();
        let result = extract_units(&doc);

        assert_eq!(result.located, 2);
        assert_eq!(result.units.len(), 2);

        let first = &result.units[0];
        assert!(first.span.has_header_citation);
        assert_eq!(first.endnote.citation.as_deref(), Some("29th KMO 2015"));
        assert!(first.content.starts_with("삼각형"));
        assert!(first.content.ends_with("보여라."));
        assert!(!first.endnote.has_solution());

        let second = &result.units[1];
        assert!(!second.span.has_header_citation);
        assert_eq!(second.endnote.short_answer.as_deref(), Some("17"));
        assert_eq!(second.endnote.raw_note.as_deref(), Some("답: 17"));
        assert!(!second.content.contains("endnote"));
        assert!(second.content.ends_with("구하여라."));
    }

    #[test]
    fn short_spans_are_discarded() {
        // 19 characters of content
        let doc = "\\stepcounter{prob}\nabcdefghijklmnopqrs\n\\vfill\n";
        let result = extract_units(doc);
        assert_eq!(result.located, 1);
        assert_eq!(result.discarded, 1);
        assert!(result.units.is_empty());

        // 20 characters of content
        let doc = "\\stepcounter{prob}\nabcdefghijklmnopqrst\n\\vfill\n";
        let result = extract_units(doc);
        assert_eq!(result.units.len(), 1);
        assert_eq!(result.units[0].content, "abcdefghijklmnopqrst");
    }

    #[test]
    fn extraction_is_deterministic() {
        let doc = two_unit_document();
        let a: Vec<_> = extract_units(&doc).units.into_iter().map(|u| u.content).collect();
        let b: Vec<_> = extract_units(&doc).units.into_iter().map(|u| u.content).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_endnote_does_not_drop_unit() {
        let doc = "\\stepcounter{prob}\nA sufficiently long problem statement here.\n\\endnote{답: 3 {broken\n";
        let result = extract_units(doc);
        assert_eq!(result.units.len(), 1);
        assert!(result.units[0].endnote.malformed);
        assert!(result.units[0].endnote.short_answer.is_none());
    }

    #[test]
    fn page_break_inside_endnote_stays_with_the_note() {
        let doc = "\\stepcounter{prob}\n양의 정수 $n$에 대하여 $n^2 + 2n$이 $289$의 배수가 되는 가장 작은 $n$을 구하여라.\n\\endnote{답: 17 풀이: \\newpage 긴 풀이 계속}\n\\vfill\n";
        let result = extract_units(doc);
        assert_eq!(result.units.len(), 1);

        let unit = &result.units[0];
        assert!(!unit.endnote.malformed);
        assert!(unit.endnote.short_answer.as_deref().is_some_and(|a| a.starts_with("17")));
        assert_eq!(
            unit.endnote.raw_note.as_deref(),
            Some("답: 17 풀이: \\newpage 긴 풀이 계속")
        );
        assert!(unit.content.ends_with("구하여라."));
        assert!(!unit.content.contains("endnote"));
    }

    #[test]
    fn long_header_citation_is_kept() {
        let doc = "\\fbox{The 29th Korean Mathematical Olympiad, Final Round, Day 2, Problem 4 (proposed by the problem committee, 2015)}\\\\\n\\stepcounter{prob}\nProve that the incenter lies on the circle through $B$ and $C$.\n\\vfill\n";
        let result = extract_units(doc);
        assert_eq!(result.located, 1);
        assert_eq!(result.units.len(), 1);
        assert!(result.units[0].span.has_header_citation);
        assert!(
            result.units[0]
                .endnote
                .citation
                .as_deref()
                .is_some_and(|c| c.starts_with("The 29th Korean"))
        );
    }

    #[test]
    fn graphics_flag_from_content() {
        let doc = "\\stepcounter{prob}\nIn the figure below, find the angle.\n\\begin{tikzpicture}\\draw (0,0) circle (1);\\end{tikzpicture}\n\\newpage";
        let result = extract_units(doc);
        assert!(result.units[0].classification.has_graphics);
    }
}
