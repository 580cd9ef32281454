//! Static safety screen
//!
//! Two gates, in order: the lexical syntax check, then a case-insensitive
//! substring deny-list. This is a lexical screen, not a sandbox. It only
//! catches direct textual occurrences; renamed or indirect access
//! (`getattr(__builtins__, "ev" + "al")`) passes, and harmless identifiers
//! that happen to contain a listed substring (`reopen(`, `subdir(`) are
//! rejected.

use crate::bridge::syntax;
use crate::errors::{AgentError, Result};

/// Constructs rejected anywhere in the source, matched case-insensitively
pub const DENY_LIST: &[&str] = &[
    "exec(",
    "eval(",
    "__import__",
    "open(",
    "file(",
    "input(",
    "raw_input(",
    "compile(",
    "globals(",
    "locals(",
    "vars(",
    "dir(",
];

/// Screen a script before it is sent to the host
pub fn screen(code: &str) -> Result<()> {
    syntax::check(code).map_err(|issue| AgentError::Validation(format!("Syntax error: {}", issue)))?;

    if let Some(construct) = denied_construct(code) {
        return Err(AgentError::Validation(format!(
            "Potentially dangerous operation detected: {}",
            construct
        )));
    }

    Ok(())
}

/// First deny-listed construct present in `code`
pub fn denied_construct(code: &str) -> Option<&'static str> {
    let lower = code.to_lowercase();
    DENY_LIST.iter().copied().find(|construct| lower.contains(construct))
}
