//! Tool implementations module

pub mod code_generator;
pub mod script_executor;

// Re-export for convenience
pub use code_generator::CodeGenerator;
pub use script_executor::ScriptExecutor;
