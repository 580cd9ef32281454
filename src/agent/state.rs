//! Per-request orchestration state machine
//!
//! Fixed two-round machine: at most one dispatch round and at most two
//! model calls per request. There is no edge from `AwaitFinalModel` back to
//! `Dispatching`, so a tool result can never trigger another tool call.

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Orchestration states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// First model call, tools advertised
    AwaitModel,

    /// Running the requested tool calls in order
    Dispatching,

    /// Second model call, no tools advertised
    AwaitFinalModel,

    /// Reply ready (terminal)
    Done,
}

/// Events that drive the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// First response carried no tool calls
    NoToolCalls,

    /// First response carried one or more tool calls
    ToolCallsRequested,

    /// Every requested tool produced an outcome
    OutcomesCollected,

    /// Second response received
    FinalReply,
}

impl TurnState {
    pub fn initial() -> Self {
        TurnState::AwaitModel
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done)
    }

    /// Whether the model call made in this state advertises tools
    pub fn tools_advertised(&self) -> bool {
        matches!(self, TurnState::AwaitModel)
    }

    /// Valid transitions (4 edges):
    /// 1. AwaitModel      → Done            (on: NoToolCalls)
    /// 2. AwaitModel      → Dispatching     (on: ToolCallsRequested)
    /// 3. Dispatching     → AwaitFinalModel (on: OutcomesCollected)
    /// 4. AwaitFinalModel → Done            (on: FinalReply)
    pub fn transition(&self, event: TurnEvent) -> Result<TurnState> {
        use TurnEvent::*;
        use TurnState::*;

        let next_state = match (self, event) {
            (AwaitModel, NoToolCalls) => Done,
            (AwaitModel, ToolCallsRequested) => Dispatching,
            (Dispatching, OutcomesCollected) => AwaitFinalModel,
            (AwaitFinalModel, FinalReply) => Done,

            (from, event) => {
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            TurnState::AwaitModel => "Awaiting Model",
            TurnState::Dispatching => "Dispatching Tools",
            TurnState::AwaitFinalModel => "Awaiting Final Model",
            TurnState::Done => "Done",
        }
    }
}
