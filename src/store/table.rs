use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::env_parse;
use crate::error::AppError;

pub const SEMESTERS: &str = "semesters";
pub const CLUBS: &str = "clubs";
pub const STUDENTS: &str = "students";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    /// Per-request timeout. A remote that stops answering must fail the
    /// startup probe so the local fallback can take over.
    pub timeout_secs: u64,
}

impl RemoteStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// `None` when `REMOTE_STORE_URL` is unset or empty.
    pub fn new_from_env() -> Result<Option<Self>, AppError> {
        let Some(base_url) = env::var("REMOTE_STORE_URL").ok().filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            api_token: env::var("REMOTE_STORE_TOKEN").ok().filter(|v| !v.is_empty()),
            timeout_secs: env_parse("REMOTE_STORE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            ..Self::new(base_url.trim())
        }))
    }
}

/// Whole-table access to a remote row store. There is no partial update:
/// writers replace the complete row-set.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// All rows of `name`. A table that does not exist yet reads as empty.
    async fn read_table(&self, name: &str) -> Result<Vec<Value>, AppError>;

    async fn write_table(&self, name: &str, rows: Vec<Value>) -> Result<(), AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TableBody {
    #[serde(default)]
    rows: Vec<Value>,
}

pub struct HttpTableClient {
    client: Client,
    config: RemoteStoreConfig,
}

impl HttpTableClient {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn table_url(&self, name: &str) -> String {
        format!("{}/tables/{}", self.config.base_url, name)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

#[async_trait]
impl TableClient for HttpTableClient {
    async fn read_table(&self, name: &str) -> Result<Vec<Value>, AppError> {
        let response = self
            .authorize(self.client.get(self.table_url(name)))
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("read {}: {}", name, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Remote table {} does not exist yet", name);
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "read {} failed: {} {}",
                name, status, body
            )));
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("read {}: {}", name, e)))?;

        serde_json::from_str::<TableBody>(&body_text)
            .map(|body| body.rows)
            .map_err(|e| {
                tracing::error!("Failed to parse table {}: {}", name, e);
                AppError::StoreUnavailable(format!("Failed to parse table {}: {}", name, e))
            })
    }

    async fn write_table(&self, name: &str, rows: Vec<Value>) -> Result<(), AppError> {
        let response = self
            .authorize(self.client.put(self.table_url(name)))
            .json(&TableBody { rows })
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("write {}: {}", name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "write {} failed: {} {}",
                name, status, body
            )));
        }

        Ok(())
    }
}

/// Process-local table store, used offline and in tests.
#[derive(Default)]
pub struct MemoryTableClient {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::StoreUnavailable("memory table lock poisoned".to_string()))
    }
}

#[async_trait]
impl TableClient for MemoryTableClient {
    async fn read_table(&self, name: &str) -> Result<Vec<Value>, AppError> {
        Ok(self.lock()?.get(name).cloned().unwrap_or_default())
    }

    async fn write_table(&self, name: &str, rows: Vec<Value>) -> Result<(), AppError> {
        self.lock()?.insert(name.to_string(), rows);
        Ok(())
    }
}
