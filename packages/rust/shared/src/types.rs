//! Core domain records for an extracted problem corpus.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProblemMeta
// ---------------------------------------------------------------------------

/// Summary of one extracted unit, as stored in the aggregate metadata file.
///
/// The first block of fields is owned by extraction and rebuilt on every run.
/// `category`, `difficulty` and `tags` are edited by hand and only ever carried
/// over from a prior metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemMeta {
    /// Zero-padded sequential identifier (e.g. `007`).
    pub id: String,
    /// Unit file name (`<id>.tex`).
    #[serde(default)]
    pub filename: String,
    /// Origin document, relative to the document root.
    pub source_file: String,
    /// Citation (competition, year), empty when none was found.
    #[serde(default)]
    pub source: String,
    /// Short answer, empty when none was found.
    #[serde(default)]
    pub answer: String,
    /// Whether the content embeds a graphics block.
    #[serde(default)]
    pub has_tikz: bool,
    /// Whether a solution file was written for this unit.
    #[serde(default)]
    pub has_solution: bool,
    /// Full endnote text, trimmed.
    #[serde(default)]
    pub note: String,
    /// SHA-256 of the normalized content (hex).
    #[serde(default)]
    pub content_hash: String,

    /// Hand-maintained topic category.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Hand-maintained difficulty rating, kept verbatim (`3`, `"hard"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<serde_json::Value>,
    /// Hand-maintained free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ProblemMeta {
    /// Copy the hand-edited fields from `prior`, leaving extraction fields untouched.
    pub fn merge_manual_fields(&mut self, prior: &ProblemMeta) {
        self.category = prior.category.clone();
        self.difficulty = prior.difficulty.clone();
        self.tags = prior.tags.clone();
    }

    /// Whether any hand-edited field is set.
    pub fn has_manual_fields(&self) -> bool {
        !self.category.is_empty() || self.difficulty.is_some() || !self.tags.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CorpusMetadata
// ---------------------------------------------------------------------------

/// Root structure of the aggregate metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusMetadata {
    /// Number of units in `problems`.
    pub total_problems: usize,
    /// Per-unit summaries in identifier order.
    pub problems: Vec<ProblemMeta>,
}

impl CorpusMetadata {
    /// Build metadata from an ordered list of summaries.
    pub fn new(problems: Vec<ProblemMeta>) -> Self {
        Self {
            total_problems: problems.len(),
            problems,
        }
    }

    /// Look up a summary by identifier.
    pub fn get(&self, id: &str) -> Option<&ProblemMeta> {
        self.problems.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> ProblemMeta {
        ProblemMeta {
            id: id.into(),
            filename: format!("{id}.tex"),
            source_file: "contents/ch1.tex".into(),
            source: "29th KMO 2015".into(),
            answer: "17".into(),
            has_tikz: false,
            has_solution: true,
            note: "답: 17".into(),
            content_hash: "abc".into(),
            category: String::new(),
            difficulty: None,
            tags: vec![],
        }
    }

    #[test]
    fn manual_fields_omitted_when_empty() {
        let json = serde_json::to_string(&meta("001")).expect("serialize");
        assert!(!json.contains("category"));
        assert!(!json.contains("difficulty"));
        assert!(!json.contains("tags"));
    }

    #[test]
    fn prior_file_without_new_fields_parses() {
        let json = r#"{
            "total_problems": 1,
            "problems": [
                {"id": "001", "source_file": "a.tex", "source": "", "answer": "",
                 "has_tikz": true, "has_solution": false, "note": "",
                 "difficulty": 3, "tags": ["circle"]}
            ]
        }"#;
        let parsed: CorpusMetadata = serde_json::from_str(json).expect("deserialize");
        let p = parsed.get("001").expect("entry");
        assert!(p.has_tikz);
        assert_eq!(p.difficulty, Some(serde_json::json!(3)));
        assert!(p.content_hash.is_empty());
    }

    #[test]
    fn free_form_difficulty_survives_parse() {
        let json = r#"{
            "total_problems": 3,
            "problems": [
                {"id": "001", "source_file": "a.tex", "difficulty": "hard"},
                {"id": "002", "source_file": "a.tex", "difficulty": 300},
                {"id": "003", "source_file": "a.tex", "difficulty": null}
            ]
        }"#;
        let parsed: CorpusMetadata = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.problems[0].difficulty, Some(serde_json::json!("hard")));
        assert_eq!(parsed.problems[1].difficulty, Some(serde_json::json!(300)));
        assert!(parsed.problems[1].has_manual_fields());
        assert_eq!(parsed.problems[2].difficulty, None);
        assert!(!parsed.problems[2].has_manual_fields());
    }

    #[test]
    fn merge_copies_only_manual_fields() {
        let mut fresh = meta("002");
        let mut prior = meta("009");
        prior.answer = "stale".into();
        prior.category = "geometry".into();
        prior.difficulty = Some(serde_json::json!(4));
        prior.tags = vec!["incircle".into()];

        fresh.merge_manual_fields(&prior);
        assert_eq!(fresh.id, "002");
        assert_eq!(fresh.answer, "17");
        assert_eq!(fresh.category, "geometry");
        assert_eq!(fresh.difficulty, Some(serde_json::json!(4)));
        assert_eq!(fresh.tags, vec!["incircle".to_string()]);
    }

    #[test]
    fn corpus_metadata_counts() {
        let md = CorpusMetadata::new(vec![meta("001"), meta("002")]);
        assert_eq!(md.total_problems, 2);
        assert!(md.get("002").is_some());
        assert!(md.get("003").is_none());
    }
}
