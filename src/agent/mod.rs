//! Agent orchestration module
//!
//! Two-round state machine and the orchestrator that drives it.

pub mod state;
pub mod orchestrator;

// Re-export commonly used types
pub use state::{TurnEvent, TurnState};
pub use orchestrator::{AgentConfig, AgentOrchestrator, AgentOutput, AgentRequest, DEFAULT_SYSTEM_PROMPT};
