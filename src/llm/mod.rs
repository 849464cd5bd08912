//! Natural language → MCP command interpretation

pub mod client;
pub mod interpreter;

pub use client::{CompletionService, LlmClient};
pub use interpreter::{interpret, parse_completion, validate_candidate};
