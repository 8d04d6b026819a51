//! Tool system.
//!
//! Tools are the local side functions a remote job can pause on and call
//! back into, declared per job submission via [`ToolSchema`]. The registry
//! dispatches one `RequiresAction` snapshot at a time and guarantees the
//! answered batch is never short an entry.

mod registry;
mod search;
mod tool;

pub use registry::ToolRegistry;
pub use search::{SearchHit, WebSearchTool};
pub use tool::{EchoTool, Tool, ToolSchema};
