//! Process-wide logging setup.
//!
//! Every orchestration is tagged with a `request_id` and every job
//! with a `job_id`; those are attached as `tracing` fields by the
//! callers, not by this crate — this crate only wires up the
//! subscriber those fields flow into.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global `tracing` subscriber. Reads `AGGREGATOR_LOG`
/// for the filter directive (e.g. `info`, `aggregator_orchestrator=debug`),
/// falling back to `info` so a default checkout is never silent. Emits
/// JSON-formatted lines so log output can be piped into a structured
/// log aggregator.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("AGGREGATOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true))
        .try_init();
}
