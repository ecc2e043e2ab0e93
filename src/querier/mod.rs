//! The query capability shared by every backend.
//!
//! Callers are backend-agnostic: a script executed through [`RemoteQuerier`]
//! or [`EmbeddedQuerier`] against the same data yields identical headers and
//! rows. Neither backend retries; any failure aborts the call.

use std::future::Future;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::types::TabularResult;

/// Embedded backend over a host-supplied fact store.
pub mod embedded;

/// HTTP backend talking to a query endpoint.
pub mod remote;

pub use embedded::{EmbeddedQuerier, FactStore, StoreRows};
pub use remote::{EmbeddingBinding, LlmBinding, LlmProvider, RemoteQuerier, DEFAULT_TIMEOUT};

/// Executes query scripts against the fact store.
///
/// `cancel` is passed straight through to the backend; once it fires, the
/// call fails with a transport error.
pub trait Querier: Send + Sync {
    /// Runs `script` and returns a typed tabular result.
    fn query(
        &self,
        cancel: &CancellationToken,
        script: &str,
    ) -> impl Future<Output = Result<TabularResult>> + Send;

    /// Runs `script` and returns the result as a `{Headers, Rows}` mapping.
    ///
    /// Shares the decoding and error semantics of [`Querier::query`].
    fn query_raw(
        &self,
        cancel: &CancellationToken,
        script: &str,
    ) -> impl Future<Output = Result<Map<String, Value>>> + Send {
        async move { self.query(cancel, script).await.map(TabularResult::into_raw) }
    }
}
