//! Type definitions module
//!
//! Conversation and execution types shared by the orchestrator, the
//! dispatcher and the execution bridge.

pub mod messages;
pub mod execution;

// Re-export commonly used types
pub use messages::{ContentBlock, ConversationTurn, Role, TurnContent};
pub use execution::{MAX_EXECUTION_TIMEOUT, ExecutionRequest, ExecutionResult, ExecutionStatus, ResultOrigin};
