//! RevBot - pyRevit automation broker
//!
//! Brokers requests between a user, a completion API with tool use and a
//! Revit automation host reached through pyRevit.
//!
//! # Architecture
//!
//! - **tools**: immutable registry and the dispatcher
//! - **bridge**: static screen, capture harness, socket and process transports
//! - **agent**: two-round orchestration state machine
//! - **llm**: completion client trait and the Anthropic Messages client
//! - **service**: generate / execute / chat surface used by the CLI

pub mod errors;
pub mod types;
pub mod tools;
pub mod bridge;
pub mod llm;
pub mod agent;
pub mod service;

// Operator surface
pub mod cli;
pub mod doctor;
pub mod logging;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use errors::{AgentError, Result};
