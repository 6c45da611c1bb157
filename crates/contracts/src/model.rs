//! Core value types shared across the fan-out, debate, judge, and
//! research stages. These are plain data — validation and mutation
//! live in the crates that produce and consume them.

use serde::{Deserialize, Serialize};

/// Identifies an upstream model. Opaque to the core: callers supply
/// whatever id the gateway expects (`"openai/gpt-4o"`, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub provider: String,
}

/// A single turn in a conversation sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// The outcome of one call to one upstream model.
///
/// Invariant: `success` implies `answer.is_some()`; `!success` implies
/// `answer.is_none()`. Constructed only via [`ModelCallResult::success`]
/// and [`ModelCallResult::failure`] so the invariant can't drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallResult {
    pub model_id: String,
    pub answer: Option<String>,
    pub latency_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl ModelCallResult {
    pub fn success(model_id: impl Into<String>, answer: String, latency_ms: u64) -> Self {
        Self { model_id: model_id.into(), answer: Some(answer), latency_ms, success: true, error: None }
    }

    pub fn failure(model_id: impl Into<String>, error: impl Into<String>, latency_ms: u64) -> Self {
        Self { model_id: model_id.into(), answer: None, latency_ms, success: false, error: Some(error.into()) }
    }
}

/// An answer with its originating model stripped out, labeled purely
/// by enumeration order ("Answer A", "Answer B", ...) so the judge
/// never sees a `model_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizedAnswer {
    pub label: String,
    pub content: String,
}

impl AnonymizedAnswer {
    /// Assigns labels "Answer A".."Answer Z", then "Answer AA".. for
    /// enumerations longer than 26 (mirrors spreadsheet-style column
    /// naming rather than panicking past `Z`).
    pub fn label_for_index(index: usize) -> String {
        format!("Answer {}", alphabetic_label(index))
    }
}

/// Produces "A", "B", ..., "Z", "AA", "AB", ... for `index` 0, 1, ...
fn alphabetic_label(mut index: usize) -> String {
    let mut chars = Vec::new();
    loop {
        let rem = index % 26;
        chars.push((b'A' + rem as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    chars.iter().rev().collect()
}

/// One model's answer as carried through a debate round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerModelAnswer {
    pub model_id: String,
    pub answer: String,
    pub latency_ms: u64,
}

/// One round of {judge feedback -> parallel refinement}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    pub round_index: u32,
    pub judge_feedback: String,
    pub per_model_answers: Vec<PerModelAnswer>,
}

/// One source surfaced by the web-search step.
///
/// Invariant: `url` is always non-empty — results with an empty url
/// are dropped before a `ResearchResult` is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source_domain: String,
    pub relevance_score: Option<f64>,
}

/// The output of the web-search stage, consumed read-only by every
/// later stage of the research pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub query: String,
    pub results: Vec<ResearchResult>,
    pub summary: String,
    pub citations: Vec<String>,
}

impl ResearchContext {
    pub fn empty(query: impl Into<String>, summary: impl Into<String>) -> Self {
        Self { query: query.into(), results: Vec::new(), summary: summary.into(), citations: Vec::new() }
    }

    pub fn has_sources(&self) -> bool {
        !self.results.is_empty()
    }
}

/// The orchestrator's prompt mode. `Query` is normalized to `General`
/// on ingestion (see `QueryMode::normalize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    General,
    Coding,
    SystemDesign,
    Creative,
    Query,
}

impl QueryMode {
    /// `mode = query` is normalized to `general`; everything else
    /// passes through unchanged.
    pub fn normalize(self) -> Self {
        match self {
            QueryMode::Query => QueryMode::General,
            other => other,
        }
    }

    pub fn system_prompt_hint(self) -> &'static str {
        match self.normalize() {
            QueryMode::Coding => {
                "Respond with working code, including any necessary explanation of the approach."
            }
            QueryMode::SystemDesign => {
                "Respond with a system architecture: components, data flow, and key tradeoffs."
            }
            QueryMode::Creative => "Respond with an imaginative, well-crafted piece of writing.",
            QueryMode::General | QueryMode::Query => "Respond helpfully and accurately.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_call_result_success_invariant() {
        let r = ModelCallResult::success("m1", "answer".into(), 10);
        assert!(r.success);
        assert!(r.answer.is_some());
        assert!(r.error.is_none());
    }

    #[test]
    fn model_call_result_failure_invariant() {
        let r = ModelCallResult::failure("m1", "boom", 10);
        assert!(!r.success);
        assert!(r.answer.is_none());
        assert!(r.error.is_some());
    }

    #[test]
    fn labels_enumerate_past_z() {
        assert_eq!(AnonymizedAnswer::label_for_index(0), "Answer A");
        assert_eq!(AnonymizedAnswer::label_for_index(25), "Answer Z");
        assert_eq!(AnonymizedAnswer::label_for_index(26), "Answer AA");
    }

    #[test]
    fn query_mode_normalizes() {
        assert_eq!(QueryMode::Query.normalize(), QueryMode::General);
        assert_eq!(QueryMode::Coding.normalize(), QueryMode::Coding);
    }
}
