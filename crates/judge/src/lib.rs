//! Judge Synthesizer: turns several independent model answers into one
//! merged answer.

pub mod prompt;
pub mod synthesizer;

pub use prompt::{anonymize, truncate_at_word_boundary};
pub use synthesizer::{JudgeConfig, JudgeRequest, JudgeSynthesizer};
