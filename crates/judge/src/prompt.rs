//! Prompt construction for the Judge Synthesizer.

use aggregator_contracts::model::{AnonymizedAnswer, DebateRound};

/// Truncates `text` to at most `cap` characters, backing off to the
/// last preceding word boundary and appending an ellipsis, so a judge
/// prompt never gets cut mid-word.
pub fn truncate_at_word_boundary(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let truncated: String = text.chars().take(cap).collect();
    let boundary = truncated.rfind(char::is_whitespace).unwrap_or(truncated.len());
    format!("{}…", truncated[..boundary].trim_end())
}

/// Assigns "Answer A", "Answer B", ... by enumeration order, never
/// carrying the originating model id into the label or content.
pub fn anonymize(answers: &[(String, String)], truncate_cap: usize) -> Vec<AnonymizedAnswer> {
    answers
        .iter()
        .enumerate()
        .map(|(i, (_model_id, content))| AnonymizedAnswer {
            label: AnonymizedAnswer::label_for_index(i),
            content: truncate_at_word_boundary(content, truncate_cap),
        })
        .collect()
}

pub fn system_prompt(research_mode: bool) -> String {
    let base = "You are synthesizing several independent expert answers into one \
        merged response. Synthesize rather than select one answer verbatim: \
        rewrite the content in your own voice, do not copy any answer word \
        for word. Use structured formatting (headings, lists) where it aids \
        clarity. Where the answers contradict each other, resolve the \
        contradiction in favor of the most accurate claim.";

    if research_mode {
        format!(
            "{base} This synthesis draws on web research: preserve every \
            citation in the form [Source N] exactly as it appears in the \
            source answers, and do not state any claim that isn't \
            supported by the cited sources or by the answers themselves."
        )
    } else {
        base.to_string()
    }
}

/// Builds the "evolution context" block prefixed to the user message
/// when debate rounds ran, so the judge understands how the final
/// answers were arrived at.
pub fn evolution_context_block(rounds: &[DebateRound]) -> Option<String> {
    if rounds.is_empty() {
        return None;
    }
    let mut block = String::from("Evolution context — the following answers were refined over several debate rounds:\n");
    for round in rounds {
        block.push_str(&format!("Round {}: {}\n", round.round_index, round.judge_feedback));
    }
    Some(block)
}

/// Builds the full user message sent to the judge: optional evolution
/// context, then the original prompt, then each anonymized answer.
pub fn user_message(user_prompt: &str, rounds: &[DebateRound], answers: &[AnonymizedAnswer]) -> String {
    let mut message = String::new();
    if let Some(block) = evolution_context_block(rounds) {
        message.push_str(&block);
        message.push('\n');
    }
    message.push_str(&format!("Original question:\n{}\n\n", user_prompt));
    message.push_str("Candidate answers to synthesize:\n");
    for answer in answers {
        message.push_str(&format!("\n{}:\n{}\n", answer.label, answer.content));
    }
    message
}
