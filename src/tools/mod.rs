//! Tool system
//!
//! Immutable registry of tool descriptors and handlers, and the dispatcher
//! that validates arguments and normalizes results into [`ToolOutcome`]s.

pub mod types;
pub mod handler;
pub mod registry;
pub mod dispatcher;
pub mod implementations;

// Re-export commonly used types
pub use dispatcher::ToolDispatcher;
pub use handler::ToolHandler;
pub use registry::{RegisteredTool, ToolRegistry, ToolRegistryBuilder};
pub use types::{ParameterSpec, ParameterType, ToolDescriptor, ToolInvocation, ToolOutcome};
