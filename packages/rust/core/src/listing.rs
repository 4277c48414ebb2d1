//! Problem list generation.
//!
//! Renders a TeX fragment that `\input`s a contiguous range of extracted
//! units so a range of the corpus can be typeset again.

use std::path::Path;

use tracing::{debug, warn};

use probank_shared::{OutputConfig, ProbankError, Result};

use crate::corpus::format_id;

/// What a rendered list includes.
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    /// First sequence number (inclusive, 1-based).
    pub start: usize,
    /// Last sequence number (inclusive).
    pub end: usize,
    /// Precede each input with `\stepcounter{prob}`.
    pub include_counter: bool,
    /// Follow each input with its solution, when one exists.
    pub include_solutions: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            start: 1,
            end: 1,
            include_counter: true,
            include_solutions: false,
        }
    }
}

/// Render the list for units under `output_root`.
///
/// Input paths are written relative to `output_root`, `/`-separated. A unit
/// file that does not exist becomes a `% Warning:` line.
pub fn render_problem_list(output_root: &Path, output: &OutputConfig, options: &ListOptions) -> Result<String> {
    if options.start == 0 || options.start > options.end {
        return Err(ProbankError::validation(format!(
            "invalid range {}..={}: start must be at least 1 and not after end",
            options.start, options.end
        )));
    }

    let mut lines = vec![
        format!("% Problems {} to {}", options.start, options.end),
        "% Generated by probank".to_string(),
        String::new(),
    ];

    let mut first = true;
    let mut missing = 0;
    for seq in options.start..=options.end {
        let id = format_id(seq, output.id_width);
        let unit = format!("{}/{id}.tex", output.problems_dir);

        if !output_root.join(&unit).exists() {
            lines.push(format!("% Warning: {unit} not found!"));
            missing += 1;
            continue;
        }

        if !first {
            lines.push(String::new());
        }
        first = false;

        if options.include_counter {
            lines.push("\\stepcounter{prob}".to_string());
        }
        lines.push(format!("\\input{{{unit}}}"));

        if options.include_solutions {
            let solution = format!("{}/{}/{id}_solution.tex", output.problems_dir, output.solutions_dir);
            if output_root.join(&solution).exists() {
                lines.push("% Solution:".to_string());
                lines.push(format!("\\input{{{solution}}}"));
            }
        }
    }

    if missing > 0 {
        warn!(missing, "some units in range were not found");
    }
    debug!(start = options.start, end = options.end, "problem list rendered");

    Ok(lines.join("\n"))
}
