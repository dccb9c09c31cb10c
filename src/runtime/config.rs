use anyhow::{bail, Context, Result};
use std::time::Duration;

const DEFAULT_BACKOFF_STEP_MS: u64 = 250;
const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 1;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Runtime configuration for the control plane.
///
/// All instances must be constructed via [`ControlConfig::builder`] or [`ControlConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    proxy_control_url: String,
    node_control_url: String,
    proxy_status_url: String,
    connect_backoff_step: Duration,
    status_timeout: Duration,
    retry_interval: Duration,
    poll_interval: Duration,
    max_concurrency: usize,
}

pub struct ControlConfigParams {
    pub proxy_control_url: String,
    pub node_control_url: String,
    pub proxy_status_url: String,
    pub connect_backoff_step: Duration,
    pub status_timeout: Duration,
    pub retry_interval: Duration,
    pub poll_interval: Duration,
    pub max_concurrency: usize,
}

impl ControlConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ControlConfigBuilder {
        ControlConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`ControlConfig::builder`] when most values use defaults.
    pub fn new(params: ControlConfigParams) -> Result<Self> {
        let ControlConfigParams {
            proxy_control_url,
            node_control_url,
            proxy_status_url,
            connect_backoff_step,
            status_timeout,
            retry_interval,
            poll_interval,
            max_concurrency,
        } = params;

        let config = Self {
            proxy_control_url: trimmed_string(proxy_control_url),
            node_control_url: trimmed_string(node_control_url),
            proxy_status_url: trimmed_string(proxy_status_url),
            connect_backoff_step,
            status_timeout,
            retry_interval,
            poll_interval,
            max_concurrency,
        };

        config.validate()?;
        Ok(config)
    }

    /// Websocket URL of the sync proxy's control socket.
    pub fn proxy_control_url(&self) -> &str {
        &self.proxy_control_url
    }

    /// Websocket URL of the node's control socket.
    pub fn node_control_url(&self) -> &str {
        &self.node_control_url
    }

    /// Plain HTTP URL of the proxy status endpoint queried by `is_paused`.
    pub fn proxy_status_url(&self) -> &str {
        &self.proxy_status_url
    }

    /// Fixed increment added to the reconnect delay after each consecutive
    /// connect failure. Zero is permitted so tests can run in near-zero time.
    pub fn connect_backoff_step(&self) -> Duration {
        self.connect_backoff_step
    }

    /// Timeout applied to status probes.
    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    /// Default interval used by retry loops composed around network calls.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Interval between poll ticks of the indexing driver.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Upper bound on concurrently in-flight fetch/process tasks.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn validate(&self) -> Result<()> {
        ensure_not_empty(&self.proxy_control_url, "proxy_control_url")?;
        ensure_not_empty(&self.node_control_url, "node_control_url")?;
        ensure_not_empty(&self.proxy_status_url, "proxy_status_url")?;

        validate_ws_url(&self.proxy_control_url, "proxy_control_url")?;
        validate_ws_url(&self.node_control_url, "node_control_url")?;
        validate_http_url(&self.proxy_status_url, "proxy_status_url")?;

        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.status_timeout.is_zero() {
            bail!("status_timeout must be non-zero");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ControlConfigBuilder {
    proxy_control_url: Option<String>,
    node_control_url: Option<String>,
    proxy_status_url: Option<String>,
    connect_backoff_step: Option<Duration>,
    status_timeout: Option<Duration>,
    retry_interval: Option<Duration>,
    poll_interval: Option<Duration>,
    max_concurrency: Option<usize>,
}

impl ControlConfigBuilder {
    pub fn proxy_control_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_control_url = Some(url.into());
        self
    }

    pub fn node_control_url(mut self, url: impl Into<String>) -> Self {
        self.node_control_url = Some(url.into());
        self
    }

    pub fn proxy_status_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_status_url = Some(url.into());
        self
    }

    pub fn connect_backoff_step(mut self, step: Duration) -> Self {
        self.connect_backoff_step = Some(step);
        self
    }

    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = Some(timeout);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn build(self) -> Result<ControlConfig> {
        let proxy_control_url = self.proxy_control_url.context("proxy_control_url is required")?;

        // Historically the status endpoint shares the proxy's host and only
        // differs in scheme; honour that as a default, never as a hidden
        // requirement.
        let proxy_status_url = match self.proxy_status_url {
            Some(url) => url,
            None => derive_status_url(&proxy_control_url)?,
        };

        let params = ControlConfigParams {
            proxy_control_url,
            node_control_url: self.node_control_url.context("node_control_url is required")?,
            proxy_status_url,
            connect_backoff_step: self
                .connect_backoff_step
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_BACKOFF_STEP_MS)),
            status_timeout: self
                .status_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_STATUS_TIMEOUT_SECS)),
            retry_interval: self
                .retry_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS)),
            poll_interval: self
                .poll_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
        };

        ControlConfig::new(params)
    }
}

/// Maps a `ws`/`wss` control URL onto the matching `http`/`https` status URL.
fn derive_status_url(control_url: &str) -> Result<String> {
    let control_url = control_url.trim();
    if let Some(rest) = control_url.strip_prefix("wss://") {
        Ok(format!("https://{rest}"))
    } else if let Some(rest) = control_url.strip_prefix("ws://") {
        Ok(format!("http://{rest}"))
    } else {
        bail!("cannot derive a status URL from {control_url}: expected a ws:// or wss:// URL");
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_ws_url(url: &str, field: &str) -> Result<()> {
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        bail!("{field} must start with ws:// or wss://");
    }
    Ok(())
}

fn validate_http_url(url: &str, field: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
