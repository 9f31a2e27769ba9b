/*!
 * Provider fetching from the remote directory endpoint
 *
 * The endpoint is an opaque `GET` returning `{ "physicians": [...] }` on
 * success or `{ "error": "..." }` when the backing sheet cannot be read.
 * Every failure is terminal for that load cycle; there is no retry.
 */

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LocatorConfig;
use crate::data_types::ProviderRecord;
use crate::reader::ProviderReader;
use crate::{LocatorError, Result};

/// Anything that can produce one fetch cycle's raw provider records
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Fetch raw (un-normalized) records
    async fn fetch(&self) -> Result<Vec<ProviderRecord>>;

    /// Human-readable origin, for log lines
    fn describe(&self) -> String;
}

/// Provider source backed by the HTTP directory endpoint
pub struct HttpProviderSource {
    endpoint: String,
    client: reqwest::Client,
    reader: ProviderReader,
}

impl HttpProviderSource {
    /// Create a source with a default client
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_config(endpoint, &LocatorConfig::default())
    }

    /// Create a source using the timeout and user agent from `config`
    pub fn with_config(endpoint: impl Into<String>, config: &LocatorConfig) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_client(config)?,
            reader: ProviderReader::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProviderSource for HttpProviderSource {
    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        tracing::info!(endpoint = %self.endpoint, "fetching providers");

        let response = self.client.get(&self.endpoint).send().await.map_err(|e| LocatorError::Fetch {
            message: format!("Failed to reach provider endpoint: {}", e),
            status: None,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocatorError::http_status(status.as_u16()));
        }

        let body = response.text().await?;
        let records = self.reader.parse_str(&body)?;
        tracing::info!(count = records.len(), "fetched providers");
        Ok(records)
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// In-memory source that hands out the same records on every fetch
#[derive(Debug, Clone, Default)]
pub struct StaticProviderSource {
    records: Vec<ProviderRecord>,
}

impl StaticProviderSource {
    pub fn new(records: Vec<ProviderRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ProviderSource for StaticProviderSource {
    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} records)", self.records.len())
    }
}

/// Build an HTTP client from the shared configuration
pub(crate) fn build_client(config: &LocatorConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| LocatorError::Custom {
            message: format!("Failed to create HTTP client: {}", e),
            suggestion: Some("Check your network configuration".to_string()),
        })
}
