use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Querier;
use crate::config::CieConfig;
use crate::errors::{CieError, Result};
use crate::types::TabularResult;

/// Request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Token budget used when an LLM binding is set without one.
const DEFAULT_LLM_MAX_TOKENS: usize = 2000;

/// A language-model provider supplied by the host application.
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Provider identifier, e.g. `ollama`.
    fn name(&self) -> &str;
}

/// LLM provider attached to a client for narrative generation.
#[derive(Debug, Clone)]
pub struct LlmBinding {
    pub provider: Arc<dyn LlmProvider>,
    pub max_tokens: usize,
}

/// Embedding service used for semantic search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingBinding {
    pub url: String,
    pub model: String,
}

/// Client handle for a remote query endpoint.
///
/// Each call issues exactly one `POST {base_url}/v1/query` request. The call
/// is abandoned as soon as either the timeout elapses or the caller's
/// cancellation token fires.
///
/// Setters take `&mut self`, so a handle cannot be reconfigured while a query
/// borrowing it is in flight.
#[derive(Clone)]
pub struct RemoteQuerier {
    base_url: String,
    project_id: String,
    timeout: Duration,
    agent: ureq::Agent,
    llm: Option<LlmBinding>,
    embedding: Option<EmbeddingBinding>,
}

impl fmt::Debug for RemoteQuerier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteQuerier")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("timeout", &self.timeout)
            .field("llm", &self.llm)
            .field("embedding", &self.embedding)
            .finish()
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

impl RemoteQuerier {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            timeout: DEFAULT_TIMEOUT,
            agent: build_agent(DEFAULT_TIMEOUT),
            llm: None,
            embedding: None,
        }
    }

    /// Builds a client from the project configuration.
    pub fn from_config(config: &CieConfig) -> Self {
        let mut client = Self::new(&config.base_url, &config.project_id)
            .with_timeout(Duration::from_secs(config.timeout_secs));
        if let Some(embedding) = &config.embedding {
            client.set_embedding_config(&embedding.url, &embedding.model);
        }
        client
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    /// Replaces the request timeout. A zero duration falls back to the default.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self.agent = build_agent(self.timeout);
    }

    /// Attaches an LLM provider. `max_tokens == 0` selects the default budget.
    pub fn set_llm_provider(&mut self, provider: Arc<dyn LlmProvider>, max_tokens: usize) {
        let max_tokens = if max_tokens == 0 {
            DEFAULT_LLM_MAX_TOKENS
        } else {
            max_tokens
        };
        self.llm = Some(LlmBinding {
            provider,
            max_tokens,
        });
    }

    pub fn set_embedding_config(&mut self, url: impl Into<String>, model: impl Into<String>) {
        self.embedding = Some(EmbeddingBinding {
            url: url.into(),
            model: model.into(),
        });
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn llm(&self) -> Option<&LlmBinding> {
        self.llm.as_ref()
    }

    pub fn embedding(&self) -> Option<&EmbeddingBinding> {
        self.embedding.as_ref()
    }

    fn query_url(&self) -> String {
        format!("{}/v1/query", self.base_url.trim_end_matches('/'))
    }

    /// Sends the script and returns the status code and body text.
    async fn post_script(&self, cancel: &CancellationToken, script: &str) -> Result<(u16, String)> {
        if cancel.is_cancelled() {
            return Err(CieError::transport("query cancelled"));
        }

        let agent = self.agent.clone();
        let url = self.query_url();
        let payload = json!({
            "project_id": self.project_id,
            "script": script,
        });

        let call = tokio::task::spawn_blocking(move || -> Result<(u16, String)> {
            let mut response = agent
                .post(&url)
                .send_json(&payload)
                .map_err(|e| CieError::transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| CieError::transport(format!("read body: {e}")))?;
            Ok((status, body))
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CieError::transport("query cancelled")),
            _ = tokio::time::sleep(self.timeout) => Err(CieError::transport(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
            joined = call => match joined {
                Ok(result) => result,
                Err(e) => Err(CieError::transport(format!("request task failed: {e}"))),
            },
        }
    }
}

/// Decodes a query endpoint body into a tabular result.
pub(crate) fn decode_table(body: &str) -> Result<TabularResult> {
    let result: TabularResult =
        serde_json::from_str(body).map_err(|e| CieError::decode(e.to_string()))?;
    result.check_arity().map_err(CieError::decode)?;
    Ok(result)
}

impl Querier for RemoteQuerier {
    async fn query(&self, cancel: &CancellationToken, script: &str) -> Result<TabularResult> {
        debug!(url = %self.query_url(), script_len = script.len(), "remote query");

        let (status, body) = self.post_script(cancel, script).await.inspect_err(|e| {
            warn!(error = %e, "remote query transport failure");
        })?;

        if !(200..300).contains(&status) {
            return Err(CieError::HttpStatus { status, body });
        }

        let result = decode_table(&body)?;
        debug!(rows = result.len(), "remote query complete");
        Ok(result)
    }
}
