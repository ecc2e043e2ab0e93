use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Querier;
use crate::errors::{CieError, Result};
use crate::types::{CellValue, TabularResult};

/// Rows produced by a fact-store engine, cells still in JSON form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// A locally held fact-store engine able to run read-only scripts.
///
/// Implemented by the host around its engine handle. Errors carry the
/// engine's own message.
pub trait FactStore: Send + Sync {
    fn run_read_only(&self, script: &str) -> std::result::Result<StoreRows, String>;
}

/// Querier that executes scripts directly against an in-process fact store.
pub struct EmbeddedQuerier {
    store: Arc<dyn FactStore>,
    closed: AtomicBool,
}

impl EmbeddedQuerier {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// Marks the backend closed. Later queries fail; closing twice is a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn execute(&self, script: &str) -> Result<TabularResult> {
        if self.is_closed() {
            return Err(CieError::backend("backend is closed"));
        }

        let raw = self.store.run_read_only(script).map_err(CieError::backend)?;

        let mut rows = Vec::with_capacity(raw.rows.len());
        for row in raw.rows {
            let cells = row
                .into_iter()
                .map(CellValue::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(CieError::backend)?;
            rows.push(cells);
        }

        let result = TabularResult::new(raw.headers, rows);
        result.check_arity().map_err(CieError::backend)?;
        Ok(result)
    }
}

impl Querier for EmbeddedQuerier {
    async fn query(&self, cancel: &CancellationToken, script: &str) -> Result<TabularResult> {
        if cancel.is_cancelled() {
            return Err(CieError::transport("query cancelled"));
        }
        debug!(script_len = script.len(), "embedded query");
        let result = self.execute(script)?;
        debug!(rows = result.len(), "embedded query complete");
        Ok(result)
    }
}
