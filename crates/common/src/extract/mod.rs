//! Tolerant extraction of candidate records from model output
//!
//! Models asked for "JSON only" still wrap arrays in prose or code fences.
//! Extraction tries an ordered list of strategies and stops at the first
//! one that yields a non-empty, fully valid list:
//! 1. `whole` - the trimmed text is itself the array
//! 2. `pattern` - greedy `[{ ... }]` match
//! 3. `brackets` - first `[` to last `]`
//!
//! When every strategy misses, the raw text is returned for manual review.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use validator::Validate;

use crate::metrics;

/// One recommended candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub current_position: String,
    pub profile_summary: String,
    /// Match score from 0 to 100
    #[validate(range(max = 100))]
    pub relevance_score: u8,
    pub matching_reason: String,
    pub skills: Vec<String>,
    pub achievements: Vec<String>,
    pub reference_links: Vec<String>,
}

/// Outcome of extraction for one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionResult {
    Structured { candidates: Vec<CandidateRecord> },
    Raw { text: String },
}

impl ExtractionResult {
    pub fn candidates(&self) -> Option<&[CandidateRecord]> {
        match self {
            ExtractionResult::Structured { candidates } => Some(candidates),
            ExtractionResult::Raw { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ExtractionResult::Structured { .. })
    }
}

/// A single extraction attempt.
pub type Strategy = fn(&str) -> Option<Vec<CandidateRecord>>;

/// Strategies in the order they are tried.
pub const STRATEGIES: [(&str, Strategy); 3] = [
    ("whole", whole_match),
    ("pattern", pattern_match),
    ("brackets", bracket_bounded),
];

/// Parse `json` as a non-empty array of valid candidates.
///
/// A single malformed element rejects the whole array.
pub fn parse_candidates(json: &str) -> Option<Vec<CandidateRecord>> {
    let candidates: Vec<CandidateRecord> = serde_json::from_str(json).ok()?;
    if candidates.is_empty() {
        return None;
    }
    if candidates.iter().any(|c| c.validate().is_err()) {
        return None;
    }
    Some(candidates)
}

/// The trimmed text is a bare JSON array.
pub fn whole_match(text: &str) -> Option<Vec<CandidateRecord>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        parse_candidates(trimmed)
    } else {
        None
    }
}

fn array_of_objects() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("array-of-objects pattern is valid")
    })
}

/// Greedy match from the first `[{` to the last `}]`, whitespace allowed
/// between the brackets.
pub fn pattern_match(text: &str) -> Option<Vec<CandidateRecord>> {
    let found = array_of_objects().find(text)?;
    parse_candidates(found.as_str())
}

/// Everything between the first `[` and the last `]`, regardless of
/// nesting.
pub fn bracket_bounded(text: &str) -> Option<Vec<CandidateRecord>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    parse_candidates(&text[start..=end])
}

/// Run the strategies in order, returning the name of the one that matched.
pub fn run_strategies(text: &str) -> Option<(&'static str, Vec<CandidateRecord>)> {
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(text).map(|candidates| (*name, candidates)))
}

/// Extract candidates from the full accumulated text.
pub fn extract_candidates(text: &str) -> ExtractionResult {
    match run_strategies(text) {
        Some((strategy, candidates)) => {
            tracing::debug!(strategy, count = candidates.len(), "Extracted candidates");
            metrics::record_extraction(strategy, candidates.len());
            ExtractionResult::Structured { candidates }
        }
        None => {
            tracing::info!(chars = text.len(), "No structured candidates found, returning raw text");
            metrics::record_extraction("raw", 0);
            ExtractionResult::Raw {
                text: text.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"[{"name":"A","currentPosition":"X","profileSummary":"Y","relevanceScore":90,"matchingReason":"Z","skills":["a"],"achievements":["b"],"referenceLinks":["http://x"]}]"#;

    fn candidate(name: &str, score: u8) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "currentPosition": "Researcher, Example Lab",
            "profileSummary": "Works on LLM pretraining",
            "relevanceScore": score,
            "matchingReason": "PyTorch and LLM experience",
            "skills": ["PyTorch", "Python"],
            "achievements": ["NeurIPS paper"],
            "referenceLinks": ["https://researchmap.jp/example"]
        })
    }

    #[test]
    fn test_whole_array_parses_identically() {
        let json = serde_json::json!([candidate("A", 80), candidate("B", 75)]).to_string();
        let expected: Vec<CandidateRecord> = serde_json::from_str(&json).unwrap();

        assert_eq!(whole_match(&json), Some(expected.clone()));
        assert_eq!(
            extract_candidates(&format!("\n  {}\n", json)),
            ExtractionResult::Structured { candidates: expected }
        );
    }

    #[test]
    fn test_single_record_fields() {
        let candidates = parse_candidates(ONE).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].relevance_score, 90);
        assert_eq!(candidates[0].current_position, "X");
        assert_eq!(candidates[0].reference_links, vec!["http://x".to_string()]);
    }

    #[test]
    fn test_prose_wrapped_array_is_recovered() {
        let text = format!("Here are the candidates:\n{}\nHope this helps.", ONE);
        assert_eq!(whole_match(&text), None);

        let (strategy, candidates) = run_strategies(&text).unwrap();
        assert_eq!(strategy, "pattern");
        assert_eq!(Some(candidates), parse_candidates(ONE));
    }

    #[test]
    fn test_code_fence_is_recovered() {
        let text = format!("```json\n{}\n```", ONE);
        assert!(extract_candidates(&text).is_structured());
    }

    #[test]
    fn test_bracket_bounded_extraction() {
        let inner = &ONE[1..ONE.len() - 1];
        let text = format!("Shortlist: [\n\n  {}  \n] (end)", inner);
        assert_eq!(bracket_bounded(&text), parse_candidates(ONE));

        assert_eq!(bracket_bounded("closing ] before opening ["), None);
        assert_eq!(bracket_bounded("no brackets at all"), None);
    }

    #[test]
    fn test_pattern_skips_leading_non_object_brackets() {
        let text = format!("Sources [1][2] were used. {}", ONE);
        assert_eq!(pattern_match(&text), parse_candidates(ONE));
        // Bracket bounds start at "[1]" and cannot parse
        assert_eq!(bracket_bounded(&text), None);
    }

    #[test]
    fn test_pattern_greedy_span_failure_falls_through() {
        // Greedy match runs to the final "}]" and swallows the trailing
        // object, which makes it invalid JSON; bracket bounds cover the same
        // span. Everything misses and the raw text comes back untouched.
        let text = format!("{} and also [{{\"note\": 1}}] trailing", ONE);
        assert_eq!(pattern_match(&text), None);
        assert_eq!(
            extract_candidates(&text),
            ExtractionResult::Raw { text: text.clone() }
        );
    }

    #[test]
    fn test_no_brackets_returns_raw_text() {
        let text = "I could not find candidates matching this description.";
        assert_eq!(
            extract_candidates(text),
            ExtractionResult::Raw { text: text.to_string() }
        );
    }

    #[test]
    fn test_empty_array_is_not_structured() {
        assert_eq!(parse_candidates("[]"), None);
        assert!(!extract_candidates("[]").is_structured());
    }

    #[test]
    fn test_element_missing_field_rejects_strategy() {
        let mut broken = candidate("B", 70);
        broken.as_object_mut().unwrap().remove("skills");
        let json = serde_json::json!([candidate("A", 80), broken]).to_string();

        assert_eq!(parse_candidates(&json), None);
        assert_eq!(
            extract_candidates(&json),
            ExtractionResult::Raw { text: json.clone() }
        );
    }

    #[test]
    fn test_score_out_of_range_is_rejected() {
        let json = serde_json::json!([candidate("A", 101)]).to_string();
        assert_eq!(parse_candidates(&json), None);
    }

    #[test]
    fn test_extra_fields_are_tolerated() {
        let mut extra = candidate("A", 60);
        extra["age"] = serde_json::json!(34);
        let json = serde_json::json!([extra]).to_string();
        assert_eq!(parse_candidates(&json).map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_structured_serializes_with_kind_tag() {
        let result = extract_candidates(ONE);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["kind"], "structured");
        assert_eq!(value["candidates"][0]["relevanceScore"], 90);

        let raw = serde_json::to_value(ExtractionResult::Raw { text: "t".into() }).unwrap();
        assert_eq!(raw, serde_json::json!({ "kind": "raw", "text": "t" }));
    }
}
