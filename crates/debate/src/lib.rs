//! Debate Engine: iterative judge-feedback / parallel-refinement
//! rounds, partial-failure tolerant.

pub mod engine;
pub mod prompt;

pub use engine::{DebateConfig, DebateEngine, DebateOutput};
