//! Per-directory overview of files and their most visible functions.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::util::{cell_text, extract_file_name};
use crate::errors::Result;
use crate::querier::Querier;
use crate::query::{escape_regex, Condition, ScriptBuilder};
use crate::types::{CellValue, TabularResult, ToolResult};

/// Functions shown per file when the caller passes zero.
pub const DEFAULT_MAX_FUNCS_PER_FILE: usize = 5;

/// Maximum number of files listed for one directory.
pub const MAX_DIR_FILES: usize = 100;

const MAX_SIGNATURE_CHARS: usize = 80;
const TRUNCATED_SIGNATURE_CHARS: usize = 77;

/// A function as listed under its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirFunction {
    pub name: String,
    pub signature: String,
    pub line: String,
    pub exported: bool,
}

impl DirFunction {
    /// Reads a `(name, signature, start_line)` row.
    pub fn from_row(row: &[CellValue]) -> Self {
        let name = cell_text(row, 0);
        Self {
            exported: is_exported(&name),
            signature: cell_text(row, 1),
            line: cell_text(row, 2),
            name,
        }
    }
}

/// Visibility heuristic: a name is exported when it starts with an ASCII
/// uppercase letter. Naming conventions without leading-case visibility
/// are misclassified.
pub fn is_exported(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
}

/// Strips a single trailing `/`.
pub fn normalize_dir_path(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

fn files_query(pattern: String) -> String {
    ScriptBuilder::new("?[path] := *cie_file { path }")
        .filter(Condition::matches("path", pattern))
        .order_by("path")
        .limit(MAX_DIR_FILES)
        .build()
}

/// Script listing files strictly below `dir`.
pub fn dir_files_query(dir: &str) -> String {
    files_query(format!("^{}/", escape_regex(dir)))
}

/// Script listing files whose path contains `dir` literally.
pub fn fallback_files_query(dir: &str) -> String {
    files_query(escape_regex(dir))
}

/// Script listing candidate functions of one file.
pub fn file_functions_query(file_path: &str, max_funcs: usize) -> String {
    ScriptBuilder::new("?[name, signature, start_line] := *cie_function { name, signature, start_line, file_path }")
        .filter(Condition::equals("file_path", file_path))
        .order_by("name")
        .limit(max_funcs.saturating_mul(2))
        .build()
}

/// Files under `dir`, falling back to a literal match only when the
/// subdirectory query returns nothing.
pub async fn query_dir_files<Q: Querier>(
    client: &Q,
    cancel: &CancellationToken,
    dir: &str,
) -> Result<TabularResult> {
    let result = client.query(cancel, &dir_files_query(dir)).await?;
    if !result.is_empty() {
        return Ok(result);
    }
    debug!(dir, "no files below directory, trying literal match");
    client.query(cancel, &fallback_files_query(dir)).await
}

fn shorten_signature(signature: &str) -> String {
    if signature.chars().count() > MAX_SIGNATURE_CHARS {
        let head: String = signature.chars().take(TRUNCATED_SIGNATURE_CHARS).collect();
        format!("{}...", head)
    } else {
        signature.to_string()
    }
}

fn format_exported(function: &DirFunction) -> String {
    let mut out = format!("- **{}** (line {})\n", function.name, function.line);
    let sig = shorten_signature(&function.signature);
    if !sig.is_empty() && sig != function.name {
        out.push_str(&format!("  `{}`\n", sig));
    }
    out
}

/// Lists exported functions first, then unexported ones, up to `max_funcs`.
pub fn format_functions(functions: &[DirFunction], max_funcs: usize) -> String {
    let exported = functions.iter().filter(|f| f.exported);
    let unexported = functions.iter().filter(|f| !f.exported);

    let mut out = String::new();
    for function in exported.chain(unexported).take(max_funcs) {
        if function.exported {
            out.push_str(&format_exported(function));
        } else {
            out.push_str(&format!("- {} (line {})\n", function.name, function.line));
        }
    }
    out
}

/// Renders one file's section from its candidate function rows.
pub fn format_file_entry(file_path: &str, rows: &[Vec<CellValue>], max_funcs: usize) -> String {
    let mut out = format!(
        "## `{}`\n_Path: {}_\n\n",
        extract_file_name(file_path),
        file_path
    );
    if rows.is_empty() {
        out.push_str("_No functions found_\n\n");
        return out;
    }

    let functions: Vec<DirFunction> = rows.iter().map(|row| DirFunction::from_row(row)).collect();
    out.push_str(&format_functions(&functions, max_funcs));
    if rows.len() > max_funcs {
        out.push_str(&format!(
            "  _... and {} more functions_\n",
            rows.len() - max_funcs
        ));
    }
    out.push('\n');
    out
}

/// Summarizes the files in `path` with their main functions.
///
/// A query failure for the file list or for any single file aborts the
/// whole summary.
pub async fn directory_summary<Q: Querier>(
    client: &Q,
    cancel: &CancellationToken,
    path: &str,
    max_funcs_per_file: usize,
) -> Result<ToolResult> {
    if path.is_empty() {
        return Ok(ToolResult::error("Error: 'path' is required"));
    }
    let max_funcs = if max_funcs_per_file == 0 {
        DEFAULT_MAX_FUNCS_PER_FILE
    } else {
        max_funcs_per_file
    };
    let dir = normalize_dir_path(path);

    let files = query_dir_files(client, cancel, dir).await?;
    if files.is_empty() {
        return Ok(ToolResult::new(format!(
            "No files found in path: `{}`\n\nUse `cie_list_files` to see available paths.",
            dir
        )));
    }
    debug!(dir, files = files.len(), "summarizing directory");

    let mut out = format!(
        "# Directory Summary: `{}`\n\nFound **{} files**\n\n",
        dir,
        files.len()
    );
    for row in &files.rows {
        let file_path = cell_text(row, 0);
        let functions = client
            .query(cancel, &file_functions_query(&file_path, max_funcs))
            .await?;
        out.push_str(&format_file_entry(&file_path, &functions.rows, max_funcs));
    }

    Ok(ToolResult::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, sig: &str, line: i64) -> Vec<CellValue> {
        vec![name.into(), sig.into(), line.into()]
    }

    #[test]
    fn test_normalize_dir_path() {
        assert_eq!(normalize_dir_path("internal/cie/"), "internal/cie");
        assert_eq!(normalize_dir_path("internal/cie"), "internal/cie");
        assert_eq!(normalize_dir_path(""), "");
        assert_eq!(normalize_dir_path("/"), "");
        assert_eq!(normalize_dir_path("apps/gateway//"), "apps/gateway/");
    }

    #[test]
    fn test_is_exported() {
        assert!(is_exported("NewClient"));
        assert!(!is_exported("newClient"));
        assert!(!is_exported("_Private"));
        assert!(!is_exported("Ärger"));
        assert!(!is_exported(""));
    }

    #[test]
    fn test_dir_files_queries() {
        assert_eq!(
            dir_files_query("pkg/tools"),
            r#"?[path] := *cie_file { path }, regex_matches(path, ___"^pkg/tools/"___) :order path :limit 100"#
        );
        assert_eq!(
            fallback_files_query("main.go"),
            r#"?[path] := *cie_file { path }, regex_matches(path, ___"main\.go"___) :order path :limit 100"#
        );
    }

    #[test]
    fn test_file_functions_query() {
        assert_eq!(
            file_functions_query("pkg/a.go", 5),
            r#"?[name, signature, start_line] := *cie_function { name, signature, start_line, file_path }, file_path == "pkg/a.go" :order name :limit 10"#
        );
    }

    #[test]
    fn test_huge_max_funcs() {
        assert!(file_functions_query("a.go", usize::MAX).ends_with(&format!(":limit {}", usize::MAX)));
        let rows = vec![func("Run", "func Run()", 1)];
        let entry = format_file_entry("a.go", &rows, usize::MAX);
        assert!(entry.contains("- **Run** (line 1)\n"));
        assert!(!entry.contains("more functions"));
    }

    #[test]
    fn test_exported_first() {
        let rows = vec![func("helper", "func helper()", 3), func("Run", "func Run() error", 9)];
        let entry = format_file_entry("pkg/run.go", &rows, 2);
        assert_eq!(
            entry,
            "## `run.go`\n_Path: pkg/run.go_\n\n\
             - **Run** (line 9)\n  `func Run() error`\n\
             - helper (line 3)\n\n"
        );

        let entry = format_file_entry("pkg/run.go", &rows, 1);
        assert!(entry.contains("**Run**"));
        assert!(!entry.contains("helper (line"));
        assert!(entry.contains("  _... and 1 more functions_\n"));
    }

    #[test]
    fn test_signature_equal_to_name_hidden() {
        let rows = vec![func("Init", "Init", 1), func("Start", "", 2)];
        let entry = format_file_entry("a.go", &rows, 5);
        assert!(entry.contains("- **Init** (line 1)\n- **Start** (line 2)\n"));
    }

    #[test]
    fn test_long_signature_truncated() {
        let sig = format!("func Long({})", "x".repeat(100));
        let rows = vec![func("Long", &sig, 4)];
        let entry = format_file_entry("a.go", &rows, 5);
        let expected: String = sig.chars().take(77).collect();
        assert!(entry.contains(&format!("  `{}...`\n", expected)));
    }

    #[test]
    fn test_signature_of_exactly_80_chars_kept() {
        let sig = "s".repeat(80);
        assert_eq!(shorten_signature(&sig), sig);
        assert_eq!(shorten_signature(&"s".repeat(81)).chars().count(), 80);
    }

    #[test]
    fn test_empty_file_entry() {
        assert_eq!(
            format_file_entry("pkg/empty.go", &[], 5),
            "## `empty.go`\n_Path: pkg/empty.go_\n\n_No functions found_\n\n"
        );
    }
}
