//! Executable side of a registered tool

use crate::errors::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A tool implementation. Arguments arrive with required parameters present
/// and defaults filled in. An `Err` becomes a failed outcome, never a
/// dispatcher failure.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value>;
}
