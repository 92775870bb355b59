//! Configuration module
//!
//! Environment-driven configuration for the server, the live-status hub and the
//! media conversion queue. Values fall back to defaults when unset; values that
//! are set but malformed are rejected at startup.

use std::env;

// Common constants
const SERVER_PORT: u16 = 4000;
const PUBLIC_HOST_URL: &str = "http://localhost:4000";
const HUB_CHANNEL_CAPACITY: usize = 256;
const MEDIA_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const MEDIA_QUEUE_TIMEOUT_SECONDS: u64 = 3600;
const MEDIA_QUEUE_RETENTION_DAYS: i64 = 7;
/// Upper bound for `MEDIA_QUEUE_RETENTION_DAYS` (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;
const MEDIA_QUEUE_REAP_INTERVAL_SECS: u64 = 3600;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
        }
    }
}

/// Live-status hub and URL settings
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Scheme and host used when building absolute media URLs, e.g. `https://gallery.example.com`.
    pub public_host_url: String,
    /// Application path prefix, e.g. `/gallery`. Empty when served from the root.
    pub app_path: String,
    /// Capacity of the push broadcast channel; slow clients lag beyond this.
    pub channel_capacity: usize,
    /// Optional JSON manifest of media objects loaded into the catalog at startup.
    pub media_catalog_path: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            public_host_url: PUBLIC_HOST_URL.to_string(),
            app_path: String::new(),
            channel_capacity: HUB_CHANNEL_CAPACITY,
            media_catalog_path: None,
        }
    }
}

/// Media conversion queue settings
#[derive(Clone, Debug)]
pub struct MediaQueueSettings {
    pub poll_interval_ms: u64,
    pub timeout_seconds: u64,
    /// Finished items older than this are purged. 0 = keep forever.
    pub retention_days: i64,
    pub reap_interval_secs: u64,
    pub ffmpeg_path: String,
    /// Directory for converted files; defaults to the original file's directory.
    pub output_dir: Option<String>,
}

impl Default for MediaQueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: MEDIA_QUEUE_POLL_INTERVAL_MS,
            timeout_seconds: MEDIA_QUEUE_TIMEOUT_SECONDS,
            retention_days: MEDIA_QUEUE_RETENTION_DAYS,
            reap_interval_secs: MEDIA_QUEUE_REAP_INTERVAL_SECS,
            ffmpeg_path: "ffmpeg".to_string(),
            output_dir: None,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub base: BaseConfig,
    pub hub: HubConfig,
    pub media_queue: MediaQueueSettings,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid value, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        // .env is optional; real environment variables win.
        let _ = dotenvy::dotenv();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env_or("PORT", SERVER_PORT)?,
            cors_origins,
            environment,
        };

        let hub = HubConfig {
            public_host_url: env::var("PUBLIC_HOST_URL")
                .unwrap_or_else(|_| PUBLIC_HOST_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            app_path: normalize_app_path(&env::var("APP_PATH").unwrap_or_default()),
            channel_capacity: env_or("HUB_CHANNEL_CAPACITY", HUB_CHANNEL_CAPACITY)?,
            media_catalog_path: env::var("MEDIA_CATALOG_PATH").ok(),
        };

        let media_queue = MediaQueueSettings {
            poll_interval_ms: env_or("MEDIA_QUEUE_POLL_INTERVAL_MS", MEDIA_QUEUE_POLL_INTERVAL_MS)?,
            timeout_seconds: env_or("MEDIA_QUEUE_TIMEOUT_SECONDS", MEDIA_QUEUE_TIMEOUT_SECONDS)?,
            retention_days: env_or("MEDIA_QUEUE_RETENTION_DAYS", MEDIA_QUEUE_RETENTION_DAYS)?,
            reap_interval_secs: env_or(
                "MEDIA_QUEUE_REAP_INTERVAL_SECS",
                MEDIA_QUEUE_REAP_INTERVAL_SECS,
            )?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            output_dir: env::var("MEDIA_OUTPUT_DIR").ok(),
        };

        Ok(Config {
            base,
            hub,
            media_queue,
        })
    }

    /// Fail fast on values that would only break at runtime.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let host = url::Url::parse(&self.hub.public_host_url)
            .map_err(|e| anyhow::anyhow!("PUBLIC_HOST_URL is not a valid URL: {}", e))?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!("PUBLIC_HOST_URL must use http or https"));
        }
        if host.path() != "/" || host.query().is_some() {
            return Err(anyhow::anyhow!(
                "PUBLIC_HOST_URL must only contain scheme and host; use APP_PATH for a path prefix"
            ));
        }

        if self.hub.channel_capacity == 0 {
            return Err(anyhow::anyhow!("HUB_CHANNEL_CAPACITY must be greater than 0"));
        }
        if self.media_queue.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "MEDIA_QUEUE_POLL_INTERVAL_MS must be greater than 0"
            ));
        }
        if self.media_queue.timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "MEDIA_QUEUE_TIMEOUT_SECONDS must be greater than 0"
            ));
        }
        if self.media_queue.retention_days < 0 {
            return Err(anyhow::anyhow!("MEDIA_QUEUE_RETENTION_DAYS cannot be negative"));
        }
        if self.media_queue.retention_days > MAX_RETENTION_DAYS {
            return Err(anyhow::anyhow!(
                "MEDIA_QUEUE_RETENTION_DAYS cannot exceed {}",
                MAX_RETENTION_DAYS
            ));
        }

        let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
        if self
            .media_queue
            .ffmpeg_path
            .chars()
            .any(|c| dangerous_chars.contains(&c))
        {
            return Err(anyhow::anyhow!("FFMPEG_PATH contains invalid characters"));
        }

        Ok(())
    }
}

/// `gallery/` and `/gallery/` both become `/gallery`; empty stays empty.
fn normalize_app_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
