//! Prompt construction for the Debate Engine.

use aggregator_contracts::model::AnonymizedAnswer;

/// Anonymizes `answers` with the same labeling scheme as the judge,
/// truncated to `cap` characters each (no word-boundary backoff here —
/// the debate prompts are internal working text, not the final
/// judge-facing synthesis, so a hard cut is acceptable).
pub fn anonymize_truncated(answers: &[(String, String)], cap: usize) -> Vec<AnonymizedAnswer> {
    answers
        .iter()
        .enumerate()
        .map(|(i, (_model_id, content))| AnonymizedAnswer {
            label: AnonymizedAnswer::label_for_index(i),
            content: hard_truncate(content, cap),
        })
        .collect()
}

fn hard_truncate(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(cap).collect();
        format!("{}…", truncated)
    }
}

pub fn feedback_prompt(user_prompt: &str, answers: &[AnonymizedAnswer]) -> String {
    let mut body = format!(
        "Original question:\n{user_prompt}\n\nCurrent candidate answers:\n"
    );
    for answer in answers {
        body.push_str(&format!("\n{}:\n{}\n", answer.label, answer.content));
    }
    body.push_str(
        "\nGive at most 100 words of directive feedback telling the experts how \
        to improve their answers in the next round. Be specific and actionable.",
    );
    body
}

pub const GENERIC_FEEDBACK: &str = "Continue refining your answer for accuracy, completeness, and clarity.";

/// Builds the refinement system prompt for round `round_index`.
pub fn refinement_system_prompt(round_index: u32, judge_feedback: &str) -> String {
    format!(
        "This is debate round {round_index}. A judge reviewed the current \
        answers and gave this feedback: \"{judge_feedback}\". Revise your \
        previous answer in light of this feedback and the other experts' \
        answers below. Keep what is already correct; address the feedback \
        directly."
    )
}

/// Builds the refinement user message for one model: the original
/// question, the feedback, every *other* expert's truncated answer
/// (anonymized), and the model's own previous answer.
pub fn refinement_user_message(
    user_prompt: &str,
    judge_feedback: &str,
    own_previous_answer: &str,
    other_answers: &[AnonymizedAnswer],
) -> String {
    let mut message = format!(
        "Original question:\n{user_prompt}\n\nJudge feedback:\n{judge_feedback}\n\nOther experts' answers:\n"
    );
    for answer in other_answers {
        message.push_str(&format!("\n{}:\n{}\n", answer.label, answer.content));
    }
    message.push_str(&format!("\nYour previous answer:\n{}\n\nProvide your revised answer.", own_previous_answer));
    message
}
