use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::env_parse;
use crate::error::AppError;
use crate::source::{RawStudentRow, RosterSource, SourceConnector, parse};

const DEFAULT_BASE_URL: &str = "http://www2.jkes.tp.edu.tw";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Extra attempts after a failed request. Zero means a single attempt.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            password: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

impl PortalConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        Ok(Self {
            base_url: env::var("PORTAL_BASE_URL")
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            username: env::var("PORTAL_USERNAME").unwrap_or_default(),
            password: env::var("PORTAL_PASSWORD").unwrap_or_default(),
            user_agent: env::var("PORTAL_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_secs: env_parse("PORTAL_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: env_parse("PORTAL_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: env_parse("PORTAL_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Logs into the school portal, one cookie jar per session.
pub struct PortalConnector {
    config: PortalConfig,
}

impl PortalConnector {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceConnector for PortalConnector {
    async fn open_session(&self) -> Result<Box<dyn RosterSource>, AppError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(&self.config.user_agent)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| AppError::SourceUnavailable(format!("Failed to build http client: {}", e)))?;

        let login_url = self.config.url("index.asp");

        // Landing page sets the session cookie.
        if let Err(e) = client.get(&login_url).send().await {
            warn!("Failed to load portal landing page: {}", e);
        }

        // The portal has used both field spellings; try each until one is accepted.
        let attempts = [
            [("username", &self.config.username), ("password", &self.config.password)],
            [("userid", &self.config.username), ("pwd", &self.config.password)],
        ];
        for form in &attempts {
            match client.post(&login_url).form(form).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Portal login accepted using field {}", form[0].0);
                    break;
                }
                Ok(response) => {
                    warn!("Portal login with field {} returned {}", form[0].0, response.status());
                }
                Err(e) => {
                    warn!("Portal login with field {} failed: {}", form[0].0, e);
                }
            }
        }

        Ok(Box::new(PortalSession {
            client,
            config: self.config.clone(),
        }))
    }
}

pub struct PortalSession {
    client: Client,
    config: PortalConfig,
}

impl PortalSession {
    async fn fetch_page(&self, path: &str) -> Result<String, AppError> {
        let url = self.config.url(path);
        let attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.try_fetch(&url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    if attempt < attempts {
                        warn!(
                            "Request {} attempt {} failed: {}, retrying in {}ms",
                            url, attempt, e, self.config.retry_delay_ms
                        );
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::SourceUnavailable(format!("{}: no attempt made", url))))
    }

    async fn try_fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        Ok(parse::decode_big5(&bytes))
    }
}

#[async_trait]
impl RosterSource for PortalSession {
    async fn fetch_enrollment_window_date(&self) -> Result<Option<String>, AppError> {
        let page = self.fetch_page("main.asp").await?;
        Ok(parse::find_enrollment_date(&page))
    }

    async fn fetch_club_directory(&self) -> Result<HashMap<String, String>, AppError> {
        let page = self.fetch_page("main.asp").await?;
        Ok(parse::parse_club_directory(&page))
    }

    async fn fetch_group_roster(&self, class_group_id: u32) -> Result<Vec<RawStudentRow>, AppError> {
        let page = self
            .fetch_page(&format!("list.asp?ClassID={}", class_group_id))
            .await?;
        parse::parse_group_roster(&page)
    }
}
