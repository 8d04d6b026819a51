//! planner-jobs: asynchronous remote-job orchestration for the startup
//! planner backend.
//!
//! The planner delegates its slow work (AI competitor research, asset
//! uploads, template autofill) to a remote system that executes jobs
//! out-of-band. This crate is the engine that drives those jobs:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Orchestrator                            │
//! │   research_competitors / upload_asset / autofill_template        │
//! └────────────┬─────────────────────────────────────────────────────┘
//!              ▼
//! ┌────────────────────┐   requires_action   ┌─────────────────────┐
//! │      JobPoller     │────────────────────▶│    ToolRegistry     │
//! │ submit → poll loop │◀────────────────────│ web_search, …       │
//! │ backoff, attempts  │   output batch      └─────────────────────┘
//! └────────┬───────────┘
//!          │ raw result
//!          ▼
//! ┌────────────────────┐        ┌────────────────────────────────────┐
//! │      extract       │───────▶│  Materializer → PlannerStore (PG)  │
//! │ fences, prose      │        │  validate, upsert by natural key   │
//! └────────────────────┘        └────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **One poller, every job type** - pluggable [`remote::JobSpec`]
//!   payloads instead of three copies of the state machine
//! - **Tool-call bridge** - jobs pause mid-flight and call back into
//!   registered local tools; answers go back as one batch per snapshot
//! - **Deterministic backoff** - `initial_delay * 2^attempt` with a hard
//!   attempt cap, never wall-clock dependent
//! - **Idempotent materialization** - upserts keyed by natural key, with
//!   per-item validation skips and transactional batches
//! - **Cooperative cancellation** - observed at every suspension point

pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod facade;
pub mod materialize;
pub mod poller;
pub mod remote;
pub mod store;
pub mod testing;
pub mod tools;

pub use config::Config;
pub use error::{OrchestrationError, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelToken};
    pub use crate::config::{Config, PollConfig};
    pub use crate::error::{OrchestrationError, Result};
    pub use crate::facade::{Asset, Orchestrator};
    pub use crate::materialize::{Materializer, MaterializeOutcome};
    pub use crate::poller::JobPoller;
    pub use crate::remote::{JobSpec, JobStatus, RemoteJob, RemoteJobApi};
    pub use crate::store::{Business, Competitor, PlannerStore};
    pub use crate::tools::{Tool, ToolRegistry};
}

/// Initialize tracing from `RUST_LOG`, defaulting to `info`.
///
/// For binaries and integration tests; library code only emits events.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
