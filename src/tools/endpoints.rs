//! HTTP route inventory recovered from indexed function bodies.
//!
//! Candidate functions are selected with a broad call-site pattern, then every
//! body is scanned with a fixed, ordered table of route rules. Matches are
//! filtered, deduplicated by `(method, path, file)`, truncated and rendered as
//! a markdown report.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::util::{cell_text, extract_file_name};
use crate::errors::Result;
use crate::querier::Querier;
use crate::query::{Condition, ScriptBuilder};
use crate::types::{CellValue, FunctionRecord, ToolResult};

/// Number of endpoints shown when the caller passes no limit.
pub const DEFAULT_LIMIT: usize = 100;

/// Upper bound on rows requested from the store.
pub const MAX_QUERY_ROWS: usize = 500;

/// Method token assigned to registrations that do not name a verb.
pub const ANY_METHOD: &str = "ANY";

/// Presentation order for the per-method summary.
pub const METHOD_ORDER: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "ANY"];

/// Store-side prefilter: any verb call, group call or `Handle`/`HandleFunc` call.
pub const ROUTE_CALL_PATTERN: &str = r"([.](GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|Get|Post|Put|Delete|Patch|Head|Options|Group|Any)[(]|Handle(Func)?[(])";

const ENDPOINT_HEAD: &str = "?[file_path, name, start_line, code_text] := \
     *cie_function { id, file_path, name, start_line }, \
     *cie_function_code { function_id: id, code_text }";

/// One lexical route-recognition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRule {
    pub name: &'static str,
    pub pattern: &'static str,
    /// Capture group holding the verb; `None` means the route answers any method.
    pub method_group: Option<usize>,
    /// Capture group holding the path. Paths always start with `/`.
    pub path_group: usize,
}

/// Route rules, tried in this order against every function body.
pub const ROUTE_RULES: [RouteRule; 6] = [
    // r.GET("/path", h), e.POST("/path", h)
    RouteRule {
        name: "upper-verb",
        pattern: r#"\.(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|Any)\s*\(\s*["'](/[^"']*)["']"#,
        method_group: Some(1),
        path_group: 2,
    },
    // r.Get("/path", h)
    RouteRule {
        name: "mixed-verb",
        pattern: r#"\.(Get|Post|Put|Delete|Patch|Head|Options)\s*\(\s*["'](/[^"']*)["']"#,
        method_group: Some(1),
        path_group: 2,
    },
    // app.Get("/path", h)
    RouteRule {
        name: "app-verb",
        pattern: r#"app\.(Get|Post|Put|Delete|Patch|Head|Options)\s*\(\s*["'](/[^"']*)["']"#,
        method_group: Some(1),
        path_group: 2,
    },
    // http.HandleFunc("/path", h)
    RouteRule {
        name: "handle-func",
        pattern: r#"HandleFunc\s*\(\s*["'](/[^"']*)["']"#,
        method_group: None,
        path_group: 1,
    },
    // mux.Handle("/path", h)
    RouteRule {
        name: "handle",
        pattern: r#"Handle\s*\(\s*["'](/[^"']*)["']"#,
        method_group: None,
        path_group: 1,
    },
    // r.Group("/api")
    RouteRule {
        name: "group",
        pattern: r#"\.Group\s*\(\s*["'](/[^"']*)["']"#,
        method_group: None,
        path_group: 1,
    },
];

fn compiled_rules() -> &'static [(RouteRule, Regex)] {
    static RULES: OnceLock<Vec<(RouteRule, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        ROUTE_RULES
            .iter()
            .map(|rule| {
                let regex = Regex::new(rule.pattern).expect("route rule pattern is valid");
                (*rule, regex)
            })
            .collect()
    })
}

/// Arguments accepted by [`list_endpoints`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListEndpointsArgs {
    /// Regex over the source file path, e.g. `apps/gateway`.
    pub path_pattern: String,
    /// Case-insensitive substring of the route path, e.g. `/health`.
    pub path_filter: String,
    /// HTTP method; routes registered for any method always pass.
    pub method: String,
    /// Maximum endpoints shown; zero selects [`DEFAULT_LIMIT`].
    pub limit: usize,
}

impl ListEndpointsArgs {
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    /// Rows requested from the store, leaving room for client-side filtering.
    pub fn query_limit(&self) -> usize {
        self.effective_limit().saturating_mul(3).min(MAX_QUERY_ROWS)
    }
}

/// A route registration found in a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub file_path: String,
    pub line: String,
}

/// Builds the candidate-function script for the given arguments.
pub fn build_endpoint_query(args: &ListEndpointsArgs) -> String {
    let path_condition = (!args.path_pattern.is_empty())
        .then(|| Condition::matches("file_path", args.path_pattern.as_str()));

    ScriptBuilder::new(ENDPOINT_HEAD)
        .filter(Condition::matches("code_text", ROUTE_CALL_PATTERN))
        .filter_opt(path_condition)
        .filter(Condition::exclude_test_files("file_path"))
        .limit(args.query_limit())
        .build()
}

/// Reads a `(file_path, name, start_line, code_text)` row.
pub fn function_from_row(row: &[CellValue]) -> FunctionRecord {
    FunctionRecord {
        file_path: cell_text(row, 0),
        name: cell_text(row, 1),
        start_line: cell_text(row, 2),
        code_text: cell_text(row, 3),
        ..FunctionRecord::default()
    }
}

/// Applies every route rule to the function body. Rules are not
/// short-circuited, so one body may yield several endpoints.
pub fn extract_endpoints(function: &FunctionRecord) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for (rule, regex) in compiled_rules() {
        for caps in regex.captures_iter(&function.code_text) {
            let path = caps
                .get(rule.path_group)
                .map(|m| m.as_str())
                .unwrap_or_default();
            if path.is_empty() {
                continue;
            }
            let method = rule
                .method_group
                .and_then(|group| caps.get(group))
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| ANY_METHOD.to_string());

            endpoints.push(Endpoint {
                method,
                path: path.to_string(),
                handler: function.name.clone(),
                file_path: function.file_path.clone(),
                line: function.start_line.clone(),
            });
        }
    }
    endpoints
}

/// Returns `true` if the endpoint passes the method and path filters.
pub fn matches_filters(endpoint: &Endpoint, args: &ListEndpointsArgs) -> bool {
    if !args.method.is_empty()
        && endpoint.method != ANY_METHOD
        && !endpoint.method.eq_ignore_ascii_case(&args.method)
    {
        return false;
    }
    if !args.path_filter.is_empty()
        && !endpoint
            .path
            .to_lowercase()
            .contains(&args.path_filter.to_lowercase())
    {
        return false;
    }
    true
}

/// Drops repeated `(method, path, file)` entries. First occurrence wins.
pub fn dedup_endpoints(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|ep| seen.insert((ep.method.clone(), ep.path.clone(), ep.file_path.clone())))
        .collect()
}

/// Extracts, filters and deduplicates endpoints from candidate rows.
pub fn collect_endpoints(rows: &[Vec<CellValue>], args: &ListEndpointsArgs) -> Vec<Endpoint> {
    let found = rows
        .iter()
        .map(|row| function_from_row(row))
        .flat_map(|function| extract_endpoints(&function))
        .filter(|ep| matches_filters(ep, args))
        .collect();
    dedup_endpoints(found)
}

/// First two segments of a route path: `/v1/users/123` becomes `/v1/users`.
pub fn extract_path_prefix(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let mut parts = trimmed.splitn(3, '/');
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        Some(second) => format!("/{}/{}", first, second),
        None => format!("/{}", first),
    }
}

/// Message returned when nothing survives filtering.
pub const NO_ENDPOINTS_MESSAGE: &str = "No HTTP endpoints found.\n\n\
**Tips:**\n\
- Check if the codebase uses Go web frameworks (Gin, Echo, Chi, Fiber)\n\
- Try a different `path_pattern` to narrow the search\n\
- Use `cie_grep` with patterns like `.GET(` or `.POST(` for manual search\n";

/// Renders the report for the endpoints that will be shown.
///
/// `total_found` is the deduplicated count before truncation; a warning is
/// appended when it exceeds the limit.
pub fn render_endpoint_report(
    shown: &[Endpoint],
    total_found: usize,
    args: &ListEndpointsArgs,
) -> String {
    let limit = args.effective_limit();
    let mut out = String::new();

    if !args.path_filter.is_empty() {
        out.push_str(&format!(
            "## HTTP Endpoints matching `{}` ({} found)\n\n",
            args.path_filter,
            shown.len()
        ));
    } else if !args.path_pattern.is_empty() {
        out.push_str(&format!(
            "## HTTP Endpoints in `{}` ({} found)\n\n",
            args.path_pattern,
            shown.len()
        ));
    } else {
        out.push_str(&format!("## HTTP Endpoints ({} found)\n\n", shown.len()));
    }

    out.push_str("| Method | Path | Handler | File |\n");
    out.push_str("|--------|------|---------|------|\n");
    for ep in shown {
        out.push_str(&format!(
            "| {} | `{}` | {} | {}:{} |\n",
            ep.method,
            ep.path,
            ep.handler,
            extract_file_name(&ep.file_path),
            ep.line
        ));
    }

    out.push_str("\n### Summary\n\n");

    let mut method_counts: HashMap<&str, usize> = HashMap::new();
    for ep in shown {
        *method_counts.entry(ep.method.as_str()).or_default() += 1;
    }
    out.push_str("**By Method:**\n");
    for method in METHOD_ORDER {
        if let Some(count) = method_counts.get(method) {
            out.push_str(&format!("- {}: {}\n", method, count));
        }
    }
    out.push('\n');

    let mut prefix_counts: BTreeMap<String, usize> = BTreeMap::new();
    for ep in shown {
        *prefix_counts.entry(extract_path_prefix(&ep.path)).or_default() += 1;
    }
    if prefix_counts.len() > 1 {
        out.push_str("**By API Path:**\n");
        for (prefix, count) in &prefix_counts {
            out.push_str(&format!("- `{}` ({} endpoints)\n", prefix, count));
        }
        out.push('\n');
    }

    let mut file_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for ep in shown {
        *file_counts.entry(extract_file_name(&ep.file_path)).or_default() += 1;
    }
    if file_counts.len() > 1 {
        out.push_str("**By File:**\n");
        for (file, count) in &file_counts {
            out.push_str(&format!("- {}: {}\n", file, count));
        }
        out.push('\n');
    }

    if total_found > limit {
        out.push_str(&format!(
            "⚠️ **Warning:** Results truncated. Found {} endpoints but showing only {} (limit). \
             Use `limit={}` or higher to see all results.\n",
            total_found, limit, total_found
        ));
    }

    out
}

/// Lists HTTP endpoints registered in the indexed codebase.
///
/// Query failures propagate unchanged; an empty result is reported as a
/// normal message with remediation tips.
pub async fn list_endpoints<Q: Querier>(
    client: &Q,
    cancel: &CancellationToken,
    args: &ListEndpointsArgs,
) -> Result<ToolResult> {
    let script = build_endpoint_query(args);
    let result = client.query(cancel, &script).await?;
    debug!(rows = result.len(), "endpoint candidates fetched");

    let mut endpoints = collect_endpoints(&result.rows, args);
    if endpoints.is_empty() {
        return Ok(ToolResult::new(NO_ENDPOINTS_MESSAGE));
    }

    let total_found = endpoints.len();
    let limit = args.effective_limit();
    if total_found > limit {
        info!(total_found, limit, "endpoint list truncated");
        endpoints.truncate(limit);
    }

    Ok(ToolResult::new(render_endpoint_report(
        &endpoints,
        total_found,
        args,
    )))
}
