//! Error types for the job orchestration engine.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error returned by the orchestration facade.
///
/// Every failure mode of the engine is an explicit value of this type;
/// nothing below the facade panics or raises past it.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Poll error: {0}")]
    Poll(#[from] PollError),

    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset read error for {path}: {reason}")]
    AssetRead { path: String, reason: String },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Network/HTTP failures talking to the remote job API.
///
/// Carries the upstream status code and response body when the remote
/// answered with a non-2xx status. The client never retries; retry policy
/// lives in the poller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Remote returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response envelope from {url}: {reason}")]
    InvalidEnvelope { url: String, reason: String },
}

/// Failures of the per-job poll loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Job {job_id} timed out after {attempts} poll attempts")]
    Timeout { job_id: String, attempts: u32 },

    #[error("Job {job_id} ended in {status}: {message}")]
    RemoteFailed {
        job_id: String,
        status: String,
        message: String,
    },

    #[error("Job {job_id} violated the job protocol: {reason}")]
    Protocol { job_id: String, reason: String },

    #[error("Job {job_id} was cancelled by the caller")]
    Cancelled { job_id: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Tool execution errors.
///
/// These never surface past the registry: `ToolRegistry::dispatch`
/// converts them into placeholder outputs so a tool-output batch is
/// never short an entry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("External service error in tool {name}: {reason}")]
    ExternalService { name: String, reason: String },
}

/// Failure to pull a structured payload out of a completed job's result.
///
/// Structural errors are not transient and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Malformed result payload ({reason}); raw excerpt: {excerpt:?}")]
    MalformedPayload { reason: String, excerpt: String },

    #[error("Completed job carried no result payload")]
    MissingResult,
}

/// Per-item validation failure during materialization.
///
/// Skips only the offending item; sibling items in the batch proceed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid {field} for item {item:?}: {reason}")]
pub struct ValidationError {
    /// Natural-key hint for the item (its name when one was present).
    pub item: Option<String>,
    pub field: String,
    pub reason: String,
}

/// Persistent-store failures. Fatal for the whole materialization batch.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: Uuid },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Pool runtime error: {0}")]
    PoolRuntime(#[from] deadpool_postgres::PoolError),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, OrchestrationError>;
