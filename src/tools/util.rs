use crate::types::CellValue;

/// Returns the last `/`-separated component of a path.
pub fn extract_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Renders the cell at `index` as text; missing cells render empty.
pub fn cell_text(row: &[CellValue], index: usize) -> String {
    row.get(index).map(ToString::to_string).unwrap_or_default()
}
