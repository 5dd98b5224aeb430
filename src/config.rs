use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::source::PortalConfig;
use crate::store::{RemoteStoreConfig, StoreConfig};

const DEFAULT_DATABASE_URL: &str = "sqlite://club_data.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub first_group: u32,
    pub last_group: u32,
    pub request_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            first_group: 1,
            last_group: 50,
            request_delay_ms: 300,
        }
    }
}

impl SyncConfig {
    pub fn groups(&self) -> RangeInclusive<u32> {
        self.first_group..=self.last_group
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store: StoreConfig,
    pub portal: PortalConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            first_group: env_parse("CLASS_GROUP_FIRST", defaults.first_group)?,
            last_group: env_parse("CLASS_GROUP_LAST", defaults.last_group)?,
            request_delay_ms: env_parse("PORTAL_REQUEST_DELAY_MS", defaults.request_delay_ms)?,
        };
        if sync.first_group == 0 || sync.first_group > sync.last_group {
            return Err(AppError::Config(format!(
                "invalid class group range {}..={}",
                sync.first_group, sync.last_group
            )));
        }

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            store: StoreConfig {
                database_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                remote: RemoteStoreConfig::new_from_env()?,
            },
            portal: PortalConfig::new_from_env()?,
            sync,
        })
    }
}

/// Parse `key` from the environment, or `default` when unset.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not a valid value: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
