//! MCP Server for API documentation retrieval
//!
//! Exposes search and lookup over the knowledge base to an agent.

mod server;

pub use server::run_mcp_server;
