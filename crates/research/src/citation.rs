//! Citation aggregation: extracts `[Source N]`-style references out of
//! generated text and resolves them against the search results that
//! produced them.

use once_cell::sync::Lazy;
use regex::Regex;

use aggregator_contracts::model::ResearchContext;

static CITATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\[Source\s+(\d+)\]").unwrap(),
        Regex::new(r"\[(\d+)\]").unwrap(),
        Regex::new(r"(?i)\(Source\s+(\d+)\)").unwrap(),
        Regex::new(r"(?i)Source\s+(\d+)\b").unwrap(),
    ]
});

/// Extracts the 1-based source indices referenced in `text`, in the
/// order they're first seen, against every recognized citation shape.
fn referenced_indices(text: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    for pattern in CITATION_PATTERNS.iter() {
        for capture in pattern.captures_iter(text) {
            if let Some(n) = capture.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
                if n > 0 && !indices.contains(&n) {
                    indices.push(n);
                }
            }
        }
    }
    indices
}

/// Resolves every `[Source N]`-style reference found across the judge's
/// final answer and each per-model answer into a URL from
/// `context.results`, then appends every source URL that was consumed
/// by the pipeline, deduplicating in insertion order.
pub fn aggregate_citations(context: &ResearchContext, judge_answer: &str, per_model_answers: &[String]) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();

    let mut push_unique = |url: String, citations: &mut Vec<String>| {
        if !citations.contains(&url) {
            citations.push(url);
        }
    };

    for text in std::iter::once(judge_answer).chain(per_model_answers.iter().map(String::as_str)) {
        for index in referenced_indices(text) {
            if let Some(result) = context.results.get(index - 1) {
                push_unique(result.url.clone(), &mut citations);
            }
        }
    }

    for result in &context.results {
        push_unique(result.url.clone(), &mut citations);
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_contracts::model::ResearchResult;

    fn context_with_two_sources() -> ResearchContext {
        ResearchContext {
            query: "q".into(),
            results: vec![
                ResearchResult {
                    title: "A".into(),
                    url: "https://a.example".into(),
                    snippet: "".into(),
                    source_domain: "a.example".into(),
                    relevance_score: None,
                },
                ResearchResult {
                    title: "B".into(),
                    url: "https://b.example".into(),
                    snippet: "".into(),
                    source_domain: "b.example".into(),
                    relevance_score: None,
                },
            ],
            summary: "s".into(),
            citations: vec![],
        }
    }

    #[test]
    fn recognizes_all_bracket_and_parenthetical_forms() {
        let context = context_with_two_sources();
        let answer = "As shown in [Source 1], also (Source 2) and [2] and Source 1 again.";
        let citations = aggregate_citations(&context, answer, &[]);
        assert!(citations.contains(&"https://a.example".to_string()));
        assert!(citations.contains(&"https://b.example".to_string()));
    }

    #[test]
    fn includes_every_consumed_source_even_without_explicit_citation() {
        let context = context_with_two_sources();
        let citations = aggregate_citations(&context, "no citations here", &[]);
        assert_eq!(citations, vec!["https://a.example".to_string(), "https://b.example".to_string()]);
    }

    #[test]
    fn deduplicates_preserving_insertion_order() {
        let context = context_with_two_sources();
        let per_model = vec!["[Source 2]".to_string(), "[Source 1]".to_string()];
        let citations = aggregate_citations(&context, "[Source 2]", &per_model);
        assert_eq!(citations, vec!["https://b.example".to_string(), "https://a.example".to_string()]);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let context = context_with_two_sources();
        let citations = aggregate_citations(&context, "[Source 99]", &[]);
        assert!(!citations.iter().any(|c| c == "https://99.example"));
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn no_sources_yields_empty_citations() {
        let context = ResearchContext::empty("q", "s");
        assert!(aggregate_citations(&context, "no sources at all", &[]).is_empty());
    }
}
