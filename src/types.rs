use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single cell of a query result.
///
/// The fact store only ever produces strings, numbers, booleans and nulls;
/// anything else is rejected at the backend boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl CellValue {
    /// Returns the string payload, if this is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for the null cell.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::String(s) => f.write_str(s),
            CellValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    write!(f, "{i}")
                } else if let Some(u) = n.as_u64() {
                    write!(f, "{u}")
                } else {
                    let v = n.as_f64().unwrap_or_default();
                    if v.fract() == 0.0 && v.abs() < 1e15 {
                        write!(f, "{}", v as i64)
                    } else {
                        write!(f, "{v:.2}")
                    }
                }
            }
        }
    }
}

impl TryFrom<Value> for CellValue {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(CellValue::Null),
            Value::Bool(b) => Ok(CellValue::Bool(b)),
            Value::Number(n) => Ok(CellValue::Number(n)),
            Value::String(s) => Ok(CellValue::String(s)),
            Value::Array(_) => Err("array cells are not supported".to_string()),
            Value::Object(_) => Err("object cells are not supported".to_string()),
        }
    }
}

impl From<CellValue> for Value {
    fn from(cell: CellValue) -> Self {
        match cell {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Number(n) => Value::Number(n),
            CellValue::String(s) => Value::String(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(i.into())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Tabular query result: ordered column names plus rows of equal arity.
///
/// Field names serialize as `Headers` / `Rows`, matching the query endpoint's
/// wire format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TabularResult {
    #[serde(rename = "Headers", default)]
    pub headers: Vec<String>,
    #[serde(rename = "Rows", default)]
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Verifies that every row has exactly as many cells as there are headers.
    pub fn check_arity(&self) -> std::result::Result<(), String> {
        let expected = self.headers.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != expected {
                return Err(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    expected
                ));
            }
        }
        Ok(())
    }

    /// Returns the position of the named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts into the generic `{Headers, Rows}` mapping returned by raw queries.
    pub fn into_raw(self) -> Map<String, Value> {
        let headers = Value::Array(self.headers.into_iter().map(Value::String).collect());
        let rows = Value::Array(
            self.rows
                .into_iter()
                .map(|row| Value::Array(row.into_iter().map(Value::from).collect()))
                .collect(),
        );
        let mut map = Map::new();
        map.insert("Headers".to_string(), headers);
        map.insert("Rows".to_string(), rows);
        map
    }
}

/// A function as indexed in the fact store. Read-only from this crate's view.
///
/// Line numbers keep the cell's display text, so a missing line renders empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: String,
    pub name: String,
    pub signature: String,
    pub file_path: String,
    pub code_text: String,
    pub start_line: String,
    pub end_line: String,
}

/// Text payload returned by a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// A user-facing error result. Used for bad arguments, not for backend failures.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}
