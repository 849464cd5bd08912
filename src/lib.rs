//! Aurora MCP - natural language commands relayed to the Aurora editor

pub mod core;
pub mod llm;
pub mod mcp;
pub mod relay;
