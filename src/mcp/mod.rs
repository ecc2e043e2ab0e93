//! MCP (Model Context Protocol) server for the code index.
//!
//! Provides a JSON-RPC 2.0 interface over stdio so that AI assistants can
//! list HTTP endpoints, summarize directories and run raw queries.

/// MCP server implementation.
pub mod server;

/// Tool definitions and dispatch.
pub mod tools;

/// JSON-RPC 2.0 transport types.
pub mod transport;

pub use server::McpServer;
pub use tools::{get_tool_definitions, handle_tool_call, tool_response, ToolDefinition};
pub use transport::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
