//! Client configuration
//!
//! A [`ClientConfig`] can be built in code, read from the environment or
//! parsed from a JSON, YAML or TOML file. The upload and polling sections
//! feed [`UploadOptions`](crate::upload::pipeline::UploadOptions) and
//! [`PollOptions`](crate::poll::PollOptions).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, PublishResult};

/// Connection settings and default policies for the publishing client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the publishing service, e.g. `https://data.example.org`
    pub base_url: String,

    /// Token passed through as a bearer credential, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Total time allowed for a single request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Time allowed to establish a connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub upload: UploadDefaults,

    #[serde(default)]
    pub poll: PollDefaults,
}

/// Per-chunk retry policy for uploads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadDefaults {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,
}

/// Timing policy for waiting on asynchronous server work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollDefaults {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// `None` waits forever
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_retry_pause")]
    pub retry_pause_millis: u64,
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_seconds() -> u64 {
    2
}

fn default_interval() -> u64 {
    1
}

// 12 hours
fn default_poll_timeout() -> Option<u64> {
    Some(43_200)
}

fn default_retry_pause() -> u64 {
    500
}

fn default_max_failures() -> u32 {
    5
}

impl Default for UploadDefaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_seconds: default_backoff_seconds(),
        }
    }
}

impl Default for PollDefaults {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            timeout_secs: default_poll_timeout(),
            retry_pause_millis: default_retry_pause(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given server with default policies
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            upload: UploadDefaults::default(),
            poll: PollDefaults::default(),
        }
    }

    /// Set the API token
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the per-chunk retry limit
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.upload.max_retries = max_retries;
        self
    }

    /// Set the poll timeout in seconds, `None` to wait forever
    pub fn with_poll_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.poll.timeout_secs = timeout_secs;
        self
    }

    /// Build a config from the process environment.
    ///
    /// * `DATAPUB_URL` - base URL (required)
    /// * `DATAPUB_TOKEN` - API token
    /// * `DATAPUB_POLL_TIMEOUT` - poll timeout in seconds
    /// * `DATAPUB_UPLOAD_RETRIES` - per-chunk retry limit
    pub fn from_env() -> PublishResult<Self> {
        let base_url = std::env::var("DATAPUB_URL").map_err(|_| {
            PublishError::Config(
                "No base URL provided. Please set the DATAPUB_URL environment variable."
                    .to_string(),
            )
        })?;

        let mut config = ClientConfig::new(base_url);
        config.api_token = std::env::var("DATAPUB_TOKEN").ok();

        if let Some(timeout) = parse_env::<u64>("DATAPUB_POLL_TIMEOUT")? {
            config.poll.timeout_secs = Some(timeout);
        }

        if let Some(retries) = parse_env::<u32>("DATAPUB_UPLOAD_RETRIES")? {
            config.upload.max_retries = retries;
        }

        Ok(config)
    }

    /// Parses a JSON, YAML or TOML file into a config
    ///
    /// # Arguments
    /// * `path` - Path to the file to parse
    pub fn from_file<P: AsRef<Path>>(path: P) -> PublishResult<Self> {
        let content = fs::read_to_string(path)?;

        if let Ok(config) = serde_json::from_str(&content) {
            Ok(config)
        } else if let Ok(config) = serde_yaml::from_str(&content) {
            Ok(config)
        } else if let Ok(config) = toml::from_str(&content) {
            Ok(config)
        } else {
            Err(PublishError::Config(
                "Failed to parse the file as either JSON, YAML or TOML".to_string(),
            ))
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> PublishResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PublishError::Config(format!("{name} is invalid: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://data.example.org");

        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.connect_timeout_secs, 60);
        assert_eq!(config.upload.max_retries, 5);
        assert_eq!(config.upload.backoff_seconds, 2);
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.poll.timeout_secs, Some(43_200));
        assert_eq!(config.poll.max_consecutive_failures, 5);
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"base_url": "https://data.example.org", "upload": {{"max_retries": 2}}}}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).expect("Failed to parse config");

        assert_eq!(config.base_url, "https://data.example.org");
        assert_eq!(config.upload.max_retries, 2);
        assert_eq!(config.upload.backoff_seconds, 2);
        assert_eq!(config.poll, PollDefaults::default());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: https://data.example.org").unwrap();
        writeln!(file, "api_token: secret").unwrap();
        writeln!(file, "poll:").unwrap();
        writeln!(file, "  interval_secs: 5").unwrap();
        writeln!(file, "  timeout_secs: null").unwrap();

        let config = ClientConfig::from_file(file.path()).expect("Failed to parse config");

        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.timeout_secs, None);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"https://data.example.org\"").unwrap();
        writeln!(file, "[upload]").unwrap();
        writeln!(file, "backoff_seconds = 7").unwrap();

        let config = ClientConfig::from_file(file.path()).expect("Failed to parse config");

        assert_eq!(config.upload.backoff_seconds, 7);
        assert_eq!(config.upload.max_retries, 5);
    }

    #[test]
    fn test_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[[ not a config").unwrap();

        let result = ClientConfig::from_file(file.path());

        assert!(matches!(result, Err(PublishError::Config(_))));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("DATAPUB_URL", "https://env.example.org");
        std::env::set_var("DATAPUB_TOKEN", "abc");
        std::env::set_var("DATAPUB_POLL_TIMEOUT", "20");
        std::env::set_var("DATAPUB_UPLOAD_RETRIES", "3");

        let config = ClientConfig::from_env().expect("Failed to read env");

        assert_eq!(config.base_url, "https://env.example.org");
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(config.poll.timeout_secs, Some(20));
        assert_eq!(config.upload.max_retries, 3);
    }
}
