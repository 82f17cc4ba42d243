use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://tasker.db?mode=rwc";
pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_ATTACHMENT_BYTES_CEILING: u64 = 100 * 1024 * 1024;

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub bucket: String,
    pub local_root: String,
    pub s3: S3Config,
    pub presign_expiry_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            bucket: "uploads".to_string(),
            local_root: "./data/blobs".to_string(),
            s3: S3Config::default(),
            presign_expiry_secs: 900,
        }
    }
}

impl StorageConfig {
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct WorkerConfig {
    pub outbox_poll_interval_ms: u64,
    pub outbox_max_attempts: i32,
    pub blob_deletion_poll_interval_ms: u64,
    pub blob_deletion_max_attempts: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            outbox_poll_interval_ms: 250,
            outbox_max_attempts: 5,
            blob_deletion_poll_interval_ms: 1000,
            blob_deletion_max_attempts: 10,
        }
    }
}

impl WorkerConfig {
    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_poll_interval_ms)
    }

    pub fn blob_deletion_poll_interval(&self) -> Duration {
        Duration::from_millis(self.blob_deletion_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    pub storage: StorageConfig,
    pub workers: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attachment_bytes: default_max_attachment_bytes(),
            storage: StorageConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if matches!(value.as_deref(), Some(v) if v.trim().is_empty()) {
        *value = None;
    }
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        if self.database_url.trim().is_empty() {
            self.database_url = default_database_url();
        }
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs must be positive, resetting to default");
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if self.max_attachment_bytes == 0 {
            self.max_attachment_bytes = default_max_attachment_bytes();
        }
        self.max_attachment_bytes = self.max_attachment_bytes.min(MAX_ATTACHMENT_BYTES_CEILING);

        let storage = &mut self.storage;
        if storage.bucket.trim().is_empty() {
            storage.bucket = StorageConfig::default().bucket;
        }
        if storage.local_root.trim().is_empty() {
            storage.local_root = StorageConfig::default().local_root;
        }
        // Presigned URLs are capped at seven days by S3.
        storage.presign_expiry_secs = storage.presign_expiry_secs.clamp(1, 7 * 24 * 60 * 60);
        if storage.s3.region.trim().is_empty() {
            storage.s3.region = S3Config::default().region;
        }
        blank_to_none(&mut storage.s3.endpoint);
        blank_to_none(&mut storage.s3.access_key_id);
        blank_to_none(&mut storage.s3.secret_access_key);

        let workers = &mut self.workers;
        let defaults = WorkerConfig::default();
        if workers.outbox_poll_interval_ms == 0 {
            workers.outbox_poll_interval_ms = defaults.outbox_poll_interval_ms;
        }
        if workers.blob_deletion_poll_interval_ms == 0 {
            workers.blob_deletion_poll_interval_ms = defaults.blob_deletion_poll_interval_ms;
        }
        workers.outbox_max_attempts = workers.outbox_max_attempts.max(1);
        workers.blob_deletion_max_attempts = workers.blob_deletion_max_attempts.max(1);

        self
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(host) = non_blank("HOST") {
            self.host = host;
        }
        let port = non_blank("BACKEND_PORT").or_else(|| non_blank("PORT"));
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(err) => tracing::warn!(%port, error = %err, "ignoring invalid port override"),
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
