//! MCP tool definitions and dispatch.
//!
//! Each tool maps to a report pipeline or to a raw query. Tool definitions
//! include JSON Schema descriptions so that MCP clients can discover them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::{CieError, Result};
use crate::querier::Querier;
use crate::tools::{directory_summary, list_endpoints, ListEndpointsArgs};
use crate::types::ToolResult;

/// Maximum character length for a tool response before truncation.
const MAX_RESPONSE_CHARS: usize = 15_000;

/// A tool definition exposed by the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the list of all tool definitions exposed by this MCP server.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "cie_list_endpoints".to_string(),
            description: "List HTTP endpoints registered in the codebase (Gin, Echo, Chi, Fiber, net/http), with a summary by method, API path and file.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path_pattern": {
                        "type": "string",
                        "description": "Regex over source file paths, e.g. 'apps/gateway'"
                    },
                    "path_filter": {
                        "type": "string",
                        "description": "Substring of the endpoint path, e.g. '/health' (case-insensitive)"
                    },
                    "method": {
                        "type": "string",
                        "description": "HTTP method to keep, e.g. 'GET'. Routes registered for any method always match."
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of endpoints to show (default: 100)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "cie_directory_summary".to_string(),
            description: "Summarize the files in a directory with their main functions, exported ones first.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to summarize, e.g. 'internal/cie/ingestion'"
                    },
                    "max_funcs_per_file": {
                        "type": "number",
                        "description": "Maximum functions listed per file (default: 5)"
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: "cie_raw_query".to_string(),
            description: "Run a read-only CozoScript query against the code index and return Headers and Rows as JSON.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "script": {
                        "type": "string",
                        "description": "CozoScript query, e.g. '?[name] := *cie_function { name } :limit 10'"
                    }
                },
                "required": ["script"]
            }),
        },
    ]
}

/// Dispatches a tool call to the appropriate handler.
///
/// Unknown tools and missing required parameters are errors. Query failures
/// are reported inside the tool response with `isError` set, so the client
/// sees the backend message.
pub async fn handle_tool_call<Q: Querier>(
    client: &Q,
    cancel: &CancellationToken,
    tool_name: &str,
    args: Value,
) -> Result<Value> {
    let outcome = match tool_name {
        "cie_list_endpoints" => list_endpoints(client, cancel, &endpoint_args(&args)).await,
        "cie_directory_summary" => {
            let path = required_str(&args, "path")?;
            let max_funcs = count_arg(&args, "max_funcs_per_file");
            directory_summary(client, cancel, path, max_funcs).await
        }
        "cie_raw_query" => {
            let script = required_str(&args, "script")?;
            raw_query(client, cancel, script).await
        }
        _ => {
            return Err(CieError::InvalidArgument {
                message: format!("unknown tool: {}", tool_name),
            })
        }
    };

    let result = outcome.unwrap_or_else(|e| {
        warn!(tool = tool_name, error = %e, "tool query failed");
        ToolResult::error(format!("Error: {}", e))
    });
    Ok(tool_response(&result))
}

/// Wraps a tool result in the MCP content envelope.
pub fn tool_response(result: &ToolResult) -> Value {
    json!({
        "content": [{ "type": "text", "text": truncate_response(&result.text) }],
        "isError": result.is_error,
    })
}

/// Truncates a string to the maximum response character limit, appending
/// a truncation notice if necessary.
fn truncate_response(s: &str) -> String {
    if s.len() <= MAX_RESPONSE_CHARS {
        s.to_string()
    } else {
        let mut end = MAX_RESPONSE_CHARS;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}\n\n[... truncated at {} chars]", &s[..end], end)
    }
}

fn str_arg(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Reads a count argument. Negative values read as zero, which the
/// pipelines treat as "use the default".
fn count_arg(args: &Value, key: &str) -> usize {
    args.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .map(|v| v.max(0) as usize)
        .unwrap_or(0)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CieError::InvalidArgument {
            message: format!("missing required parameter: {}", key),
        })
}

fn endpoint_args(args: &Value) -> ListEndpointsArgs {
    ListEndpointsArgs {
        path_pattern: str_arg(args, "path_pattern"),
        path_filter: str_arg(args, "path_filter"),
        method: str_arg(args, "method"),
        limit: count_arg(args, "limit"),
    }
}

/// Runs `script` and renders the raw `{Headers, Rows}` map as JSON.
async fn raw_query<Q: Querier>(
    client: &Q,
    cancel: &CancellationToken,
    script: &str,
) -> Result<ToolResult> {
    let raw = client.query_raw(cancel, script).await?;
    Ok(ToolResult::new(serde_json::to_string_pretty(&raw)?))
}
