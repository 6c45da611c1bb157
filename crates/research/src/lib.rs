//! Research Pipeline: web search, researched-answer fan-out, debate,
//! judge synthesis, and citation aggregation.

pub mod citation;
pub mod pipeline;
pub mod search;

pub use citation::aggregate_citations;
pub use pipeline::{ResearchConfig, ResearchOutput, ResearchPipeline};
pub use search::{format_sources_block, run_web_search, SearchProvider, TavilySearchClient};
