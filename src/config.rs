//! Configuration for the conversion client.
//!
//! Every knob lives in [`ClientConfig`], built through
//! [`ClientConfigBuilder`]. The polling policy (3 s interval, 100 polls,
//! i.e. five minutes) is a product choice of the processing service rather
//! than a property of the protocol, so it is configurable here instead of
//! being baked into the workflow.

use crate::error::D2xError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default API root of a locally running processing service.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Default delay between two job-status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

/// Default number of polls before the client gives up (5 minutes at 3 s).
pub const DEFAULT_MAX_POLLS: u32 = 100;

/// Default upload size limit: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Content types accepted by the processing service.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Configuration for a [`crate::api::ApiClient`] and the conversion workflow.
///
/// # Example
/// ```rust
/// use d2x::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_url("https://d2x.example.com/api")
///     .poll_interval_ms(1_000)
///     .max_polls(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_polls, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL of the processing API. Default: `http://localhost:3000`.
    pub api_url: String,

    /// Delay between job-status polls, in milliseconds. Default: 3000.
    pub poll_interval_ms: u64,

    /// Maximum number of status polls before the run fails with a timeout.
    /// Also the denominator of the 45 % → 95 % progress ramp. Default: 100.
    pub max_polls: u32,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Largest file accepted for upload, in bytes. Default: 50 MiB.
    pub max_file_size: u64,

    /// MIME types accepted for upload.
    pub allowed_content_types: Vec<String>,

    /// Directory holding the persisted session and statistics.
    /// If None, uses [`default_state_dir`].
    pub state_dir: Option<PathBuf>,

    /// Number of conversions run at once when converting several files. Default: 4.
    pub concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_polls: DEFAULT_MAX_POLLS,
            request_timeout_secs: 30,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            state_dir: None,
            concurrency: 4,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured state directory, or the platform default.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    pub fn is_allowed_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_polls(mut self, n: u32) -> Self {
        self.config.max_polls = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn allowed_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_content_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, D2xError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.api_url)
            .map_err(|e| D2xError::InvalidConfig(format!("API URL '{}': {e}", c.api_url)))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(D2xError::InvalidConfig(format!(
                "API URL must be an http(s) URL, got '{}'",
                c.api_url
            )));
        }
        if c.max_polls == 0 {
            return Err(D2xError::InvalidConfig("max_polls must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(D2xError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.allowed_content_types.is_empty() {
            return Err(D2xError::InvalidConfig(
                "at least one content type must be allowed".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Returns the directory where session and statistics are persisted.
///
/// Default locations:
/// - **Linux**: `~/.config/d2x/`
/// - **macOS**: `~/Library/Application Support/d2x/`
/// - **Windows**: `%APPDATA%\d2x\`
///
/// Override by setting `D2X_STATE_DIR`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("D2X_STATE_DIR") {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("d2x")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_policy() {
        let c = ClientConfig::default();
        assert_eq!(c.api_url, "http://localhost:3000");
        assert_eq!(c.poll_interval(), Duration::from_secs(3));
        assert_eq!(c.max_polls, 100);
        assert_eq!(c.max_file_size, 50 * 1024 * 1024);
        assert!(c.is_allowed_content_type("application/pdf"));
        assert!(c.is_allowed_content_type("IMAGE/PNG"));
        assert!(!c.is_allowed_content_type("video/mp4"));
    }

    #[test]
    fn builder_rejects_bad_url() {
        assert!(ClientConfig::builder().api_url("not a url").build().is_err());
        assert!(ClientConfig::builder()
            .api_url("ftp://example.com")
            .build()
            .is_err());
        assert!(ClientConfig::builder()
            .api_url("mailto:someone@example.com")
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_zero_polls() {
        let err = ClientConfig::builder().max_polls(0).build().unwrap_err();
        assert!(err.to_string().contains("max_polls"));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ClientConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn explicit_state_dir_wins() {
        let c = ClientConfig::builder()
            .state_dir("/tmp/d2x-test-state")
            .build()
            .unwrap();
        assert_eq!(c.resolved_state_dir(), PathBuf::from("/tmp/d2x-test-state"));
    }

    #[test]
    fn default_state_dir_is_deterministic() {
        assert_eq!(default_state_dir(), default_state_dir());
    }
}
