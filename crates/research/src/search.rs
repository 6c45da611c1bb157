//! Web search stage: an external search provider call that degrades
//! to an empty, diagnostic `ResearchContext` rather than failing the
//! pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aggregator_contracts::model::{ResearchContext, ResearchResult};

const DEFAULT_MAX_RESULTS: u32 = 8;

/// Abstraction over "run a web search", so the pipeline can be
/// exercised without a network round trip. [`TavilySearchClient`] is
/// the only production implementation.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<ResearchResult>, String>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
    include_answer: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    content: Option<String>,
    snippet: Option<String>,
    raw_content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl RawSearchResult {
    fn into_research_result(self) -> Option<ResearchResult> {
        if self.url.trim().is_empty() {
            return None;
        }
        let snippet = self.content.or(self.snippet).or(self.raw_content).unwrap_or_default();
        let source_domain = extract_host(&self.url);
        Some(ResearchResult {
            title: self.title,
            url: self.url,
            snippet,
            source_domain,
            relevance_score: self.score,
        })
    }
}

/// Pulls the host out of a URL without a full URL-parsing dependency:
/// strips the scheme, then takes everything before the first `/`.
fn extract_host(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
}

/// HTTP implementation against a Tavily-style search endpoint.
pub struct TavilySearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TavilySearchClient {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl SearchProvider for TavilySearchClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<ResearchResult>, String> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            max_results,
            include_answer: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("search provider returned status {}", response.status()));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.results.into_iter().filter_map(RawSearchResult::into_research_result).collect())
    }
}

/// Runs the web-search stage. Absent credentials, provider failure, or
/// zero results all degrade to an empty context with a diagnostic
/// summary — the pipeline always continues.
pub async fn run_web_search(
    provider: Option<&dyn SearchProvider>,
    query: &str,
    max_results: Option<u32>,
) -> ResearchContext {
    let max_results = max_results.unwrap_or(DEFAULT_MAX_RESULTS);

    let provider = match provider {
        Some(p) => p,
        None => return ResearchContext::empty(query, "no search credentials configured; proceeding without external sources"),
    };

    match provider.search(query, max_results).await {
        Ok(results) if results.is_empty() => {
            ResearchContext::empty(query, "search provider returned no results; proceeding without external sources")
        }
        Ok(results) => {
            let summary = format!("found {} external source(s) for this query", results.len());
            ResearchContext { query: query.to_string(), results, summary, citations: Vec::new() }
        }
        Err(err) => {
            tracing::warn!(error = %err, "web search failed, continuing without external sources");
            ResearchContext::empty(query, format!("search provider error: {err}; proceeding without external sources"))
        }
    }
}

/// Formats the search results into a `[Source i]`-tagged block for
/// inclusion in the researched-answer prompt.
pub fn format_sources_block(context: &ResearchContext) -> String {
    if context.results.is_empty() {
        return "No external sources were found for this query.".to_string();
    }

    let mut block = String::from("Sources:\n");
    for (i, result) in context.results.iter().enumerate() {
        block.push_str(&format!(
            "\n[Source {}] {}\nURL: {}\n{}\n",
            i + 1,
            result.title,
            result.url,
            result.snippet
        ));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        results: Vec<ResearchResult>,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        async fn search(&self, _query: &str, _max_results: u32) -> Result<Vec<ResearchResult>, String> {
            Ok(self.results.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        async fn search(&self, _query: &str, _max_results: u32) -> Result<Vec<ResearchResult>, String> {
            Err("connection refused".to_string())
        }
    }

    #[tokio::test]
    async fn no_provider_returns_empty_context() {
        let context = run_web_search(None, "rust async runtimes", None).await;
        assert!(!context.has_sources());
        assert!(context.summary.contains("no search credentials"));
    }

    #[tokio::test]
    async fn provider_failure_returns_empty_context() {
        let provider = FailingProvider;
        let context = run_web_search(Some(&provider), "q", None).await;
        assert!(!context.has_sources());
        assert!(context.summary.contains("search provider error"));
    }

    #[tokio::test]
    async fn empty_results_returns_empty_context() {
        let provider = FixedProvider { results: vec![] };
        let context = run_web_search(Some(&provider), "q", None).await;
        assert!(!context.has_sources());
    }

    #[tokio::test]
    async fn successful_search_populates_context() {
        let provider = FixedProvider {
            results: vec![ResearchResult {
                title: "Title".into(),
                url: "https://example.com/a".into(),
                snippet: "snippet".into(),
                source_domain: "example.com".into(),
                relevance_score: Some(0.9),
            }],
        };
        let context = run_web_search(Some(&provider), "q", None).await;
        assert!(context.has_sources());
        assert_eq!(context.results.len(), 1);
    }

    #[test]
    fn sources_block_includes_source_tags() {
        let context = ResearchContext {
            query: "q".into(),
            results: vec![ResearchResult {
                title: "A title".into(),
                url: "https://example.com".into(),
                snippet: "a snippet".into(),
                source_domain: "example.com".into(),
                relevance_score: None,
            }],
            summary: "s".into(),
            citations: vec![],
        };
        let block = format_sources_block(&context);
        assert!(block.contains("[Source 1]"));
        assert!(block.contains("https://example.com"));
    }

    #[test]
    fn extract_host_strips_scheme_and_path() {
        assert_eq!(extract_host("https://example.com/a/b?c=1"), "example.com");
        assert_eq!(extract_host("example.com/a"), "example.com");
    }

    #[test]
    fn empty_context_yields_no_sources_message() {
        let context = ResearchContext::empty("q", "s");
        assert_eq!(format_sources_block(&context), "No external sources were found for this query.");
    }
}
