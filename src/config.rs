use std::time::Duration;

use crate::task::PollOptions;

/// Default backend address (the backend's development port).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8001";

/// Configuration for a [`PictureClient`](crate::PictureClient).
///
/// Use [`ClientConfig::builder()`] for ergonomic construction,
/// [`ClientConfig::from_env()`] to read `CANVAS_*` variables, or
/// [`ClientConfig::default()`] for a local backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash.
    pub endpoint: String,

    /// Timeout for plain JSON requests.
    pub request_timeout: Duration,

    /// Timeout for multipart uploads.
    pub upload_timeout: Duration,

    /// Default policy for waiting on out-painting tasks.
    pub poll: PollOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            poll: PollOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read configuration from the environment.
    ///
    /// | variable                   | field                 |
    /// |----------------------------|-----------------------|
    /// | `CANVAS_ENDPOINT`          | `endpoint`            |
    /// | `CANVAS_TIMEOUT_SECS`      | `request_timeout`     |
    /// | `CANVAS_UPLOAD_TIMEOUT_SECS` | `upload_timeout`    |
    /// | `CANVAS_POLL_INTERVAL_MS`  | `poll.interval`       |
    /// | `CANVAS_POLL_TIMEOUT_SECS` | `poll.timeout`        |
    ///
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        if let Some(endpoint) = lookup("CANVAS_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            builder = builder.with_endpoint(endpoint.trim());
        }
        if let Some(t) = secs("CANVAS_TIMEOUT_SECS") {
            builder = builder.with_request_timeout(t);
        }
        if let Some(t) = secs("CANVAS_UPLOAD_TIMEOUT_SECS") {
            builder = builder.with_upload_timeout(t);
        }
        if let Some(ms) = lookup("CANVAS_POLL_INTERVAL_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            builder = builder.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(t) = secs("CANVAS_POLL_TIMEOUT_SECS") {
            builder = builder.with_poll_timeout(t);
        }
        builder.build()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the backend base URL. Trailing slashes are dropped.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.config.upload_timeout = timeout;
        self
    }

    /// Set the first wait between task queries.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll.interval = interval;
        self
    }

    /// Set the total budget for waiting on a task.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll.timeout = timeout;
        self
    }

    /// Replace the whole poll policy.
    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.config.poll = poll;
        self
    }

    /// Build the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
