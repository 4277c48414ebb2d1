//! Unit classification: graphics detection and inclusion tests.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::scanner;

/// Units whose normalized content is shorter than this (in characters) are discarded.
pub const MIN_CONTENT_CHARS: usize = 20;

static GRAPHICS_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(begin|end)\s*\{tikzpicture\}").expect("graphics token regex")
});

/// Classification of one normalized unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    /// At least one uncommented graphics block starts in the content.
    pub has_graphics: bool,
    /// Number of complete top-level graphics blocks.
    pub graphics_blocks: usize,
}

/// Classify normalized content. Never fails.
pub fn classify(clean_text: &str) -> Classification {
    let has_graphics = GRAPHICS_TOKEN_RE
        .captures_iter(clean_text)
        .filter(|caps| &caps[1] == "begin")
        .filter_map(|caps| caps.get(0))
        .any(|token| !scanner::is_commented(clean_text, token.start()));

    Classification {
        has_graphics,
        graphics_blocks: graphics_blocks(clean_text).len(),
    }
}

/// Whether content is long enough to keep.
pub fn is_substantial(clean_text: &str) -> bool {
    clean_text.trim().chars().count() >= MIN_CONTENT_CHARS
}

/// Byte ranges of complete top-level `tikzpicture` environments, in order.
///
/// Environments are matched by depth so a nested picture stays inside its
/// parent's range. Commented tokens are ignored; an unclosed block is dropped.
pub fn graphics_blocks(text: &str) -> Vec<Range<usize>> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut open_at = 0;

    for caps in GRAPHICS_TOKEN_RE.captures_iter(text) {
        let token = caps.get(0).expect("group 0 always present");
        if scanner::is_commented(text, token.start()) {
            continue;
        }
        match &caps[1] {
            "begin" => {
                if depth == 0 {
                    open_at = token.start();
                }
                depth += 1;
            }
            _ if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(open_at..token.end());
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Asset key the rasterizer uses for the `seq`-th (1-based) figure of a unit.
pub fn figure_key(unit_id: &str, seq: usize) -> String {
    format!("{unit_id}_fig{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PICTURE: &str = "\\begin{tikzpicture}\\draw (0,0) -- (1,1);\\end{tikzpicture}";

    #[test]
    fn plain_text_has_no_graphics() {
        assert_eq!(classify("Find all primes $p$."), Classification::default());
    }

    #[test]
    fn detects_graphics() {
        let text = format!("Given the figure\n{PICTURE}\nfind $x$.");
        let c = classify(&text);
        assert!(c.has_graphics);
        assert_eq!(c.graphics_blocks, 1);
    }

    #[test]
    fn unclosed_block_still_flags_graphics() {
        let c = classify("\\begin{tikzpicture} \\draw (0,0);");
        assert!(c.has_graphics);
        assert_eq!(c.graphics_blocks, 0);
    }

    #[test]
    fn nested_pictures_form_one_block() {
        let text = format!(
            "\\begin{{tikzpicture}} \\node {{{PICTURE}}}; \\end{{tikzpicture}} and {PICTURE}"
        );
        let blocks = graphics_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert!(text[blocks[0].clone()].ends_with("\\end{tikzpicture}"));
        assert_eq!(&text[blocks[1].clone()], PICTURE);
    }

    #[test]
    fn commented_picture_ignored() {
        let text = format!("% {PICTURE}\nplain");
        assert!(graphics_blocks(&text).is_empty());
        assert_eq!(classify(&text), Classification::default());

        let split = "Find the area.\n% \\begin{tikzpicture}\n% \\draw (0,0) circle (1);\n% \\end{tikzpicture}";
        assert!(!classify(split).has_graphics);
    }

    #[test]
    fn minimum_length_boundary() {
        let nineteen = "a".repeat(19);
        let twenty = "a".repeat(20);
        assert!(!is_substantial(&nineteen));
        assert!(is_substantial(&twenty));
        // counted in characters, not bytes
        assert!(is_substantial(&"가".repeat(20)));
        assert!(!is_substantial(&"가".repeat(19)));
    }

    #[test]
    fn figure_keys_are_one_based() {
        assert_eq!(figure_key("042", 1), "042_fig1");
    }
}
