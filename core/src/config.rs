//! Client configuration.
//!
//! [`NamelessApiBuilder`] collects settings and freezes them into an
//! [`ApiConfig`] snapshot. The snapshot is read-only after `build()` and is
//! shared by every request the handler makes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::NamelessApi;
use crate::error::{NamelessError, Result};
use crate::handler::RequestHandler;
use crate::transport::Transport;

pub const DEFAULT_USER_AGENT: &str = "Nameless-Rust-API";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RESPONSE_SIZE_LIMIT: u64 = 32 * 1024 * 1024;

pub const ENV_API_URL: &str = "NAMELESS_API_URL";
pub const ENV_API_KEY: &str = "NAMELESS_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "NAMELESS_API_TIMEOUT_SECS";
pub const ENV_DEBUG: &str = "NAMELESS_API_DEBUG";

/// Where debug text goes.
#[derive(Clone, Default)]
pub enum DebugSink {
    #[default]
    None,
    Stderr,
    /// `tracing` event at DEBUG level on the `nameless_core::debug` target.
    Tracing,
    Custom(Arc<dyn Fn(&str) + Send + Sync>),
}

impl DebugSink {
    pub fn custom(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        DebugSink::Custom(Arc::new(f))
    }
}

impl fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugSink::None => f.write_str("None"),
            DebugSink::Stderr => f.write_str("Stderr"),
            DebugSink::Tracing => f.write_str("Tracing"),
            DebugSink::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    #[default]
    Http1_1,
    Http2,
}

/// Username/password presented to an authenticating proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    /// Proxy URL with credentials embedded as userinfo, if any.
    pub fn to_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| NamelessError::InvalidUsage(format!("invalid proxy url '{}': {e}", self.url)))?;
        if let Some(creds) = &self.credentials {
            url.set_username(&creds.username)
                .and_then(|_| url.set_password(Some(&creds.password)))
                .map_err(|_| {
                    NamelessError::InvalidUsage(format!("proxy url '{}' cannot carry credentials", self.url))
                })?;
        }
        Ok(url.to_string())
    }
}

/// Immutable configuration owned by a [`RequestHandler`].
#[derive(Clone)]
pub struct ApiConfig {
    base_url: String,
    api_key: String,
    user_agent: String,
    timeout: Duration,
    response_size_limit: u64,
    debug_sink: DebugSink,
    proxy: Option<ProxyConfig>,
    http_version: HttpVersion,
    pretty_json: bool,
}

impl ApiConfig {
    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn response_size_limit(&self) -> u64 {
        self.response_size_limit
    }

    pub fn debug_sink(&self) -> &DebugSink {
        &self.debug_sink
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn http_version(&self) -> HttpVersion {
        self.http_version
    }

    pub fn pretty_json(&self) -> bool {
        self.pretty_json
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"**API_KEY_REMOVED**")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("response_size_limit", &self.response_size_limit)
            .field("debug_sink", &self.debug_sink)
            .field("proxy", &self.proxy)
            .field("http_version", &self.http_version)
            .field("pretty_json", &self.pretty_json)
            .finish()
    }
}

/// Builder for [`NamelessApi`].
#[derive(Debug, Clone)]
pub struct NamelessApiBuilder {
    api_url: String,
    api_key: String,
    user_agent: String,
    timeout: Duration,
    response_size_limit: u64,
    debug_sink: DebugSink,
    proxy: Option<ProxyConfig>,
    http_version: HttpVersion,
    pretty_json: bool,
}

impl NamelessApiBuilder {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            response_size_limit: DEFAULT_RESPONSE_SIZE_LIMIT,
            debug_sink: DebugSink::None,
            proxy: None,
            http_version: HttpVersion::default(),
            pretty_json: false,
        }
    }

    /// Read `NAMELESS_API_URL` and `NAMELESS_API_KEY`, plus the optional
    /// `NAMELESS_API_TIMEOUT_SECS` and `NAMELESS_API_DEBUG` (`stderr` or
    /// `tracing`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| NamelessError::InvalidUsage(format!("environment variable {name} is not set")))
        };
        let mut builder = Self::new(required(ENV_API_URL)?, required(ENV_API_KEY)?);

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| NamelessError::InvalidUsage(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'")))?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        match lookup(ENV_DEBUG).as_deref().map(str::trim) {
            None | Some("") | Some("none") => {}
            Some("stderr") => builder = builder.stderr_debug_logger(),
            Some("tracing") => builder = builder.tracing_debug_logger(),
            Some(other) => {
                return Err(NamelessError::InvalidUsage(format!(
                    "{ENV_DEBUG} must be one of none, stderr, tracing; got '{other}'"
                )))
            }
        }
        Ok(builder)
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn stderr_debug_logger(mut self) -> Self {
        self.debug_sink = DebugSink::Stderr;
        self
    }

    pub fn tracing_debug_logger(mut self) -> Self {
        self.debug_sink = DebugSink::Tracing;
        self
    }

    pub fn custom_debug_logger(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug_sink = DebugSink::custom(f);
        self
    }

    pub fn debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = sink;
        self
    }

    /// Connect and read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        let credentials = self.proxy.take().and_then(|p| p.credentials);
        self.proxy = Some(ProxyConfig {
            url: proxy_url.into(),
            credentials,
        });
        self
    }

    /// Credentials for the proxy set with [`with_proxy`](Self::with_proxy).
    pub fn authenticator(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        match &mut self.proxy {
            Some(proxy) => proxy.credentials = Some(credentials),
            None => {
                self.proxy = Some(ProxyConfig {
                    url: String::new(),
                    credentials: Some(credentials),
                })
            }
        }
        self
    }

    pub fn pretty_json_requests(mut self) -> Self {
        self.pretty_json = true;
        self
    }

    pub fn response_size_limit(mut self, bytes: u64) -> Self {
        self.response_size_limit = bytes;
        self
    }

    pub fn http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }

    /// Validate settings and freeze them into an [`ApiConfig`].
    pub fn build_config(self) -> Result<ApiConfig> {
        let mut base_url = self.api_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let parsed = Url::parse(&base_url)
            .map_err(|e| NamelessError::InvalidUsage(format!("invalid API url '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NamelessError::InvalidUsage(format!(
                "API url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(NamelessError::InvalidUsage("timeout must be greater than zero".into()));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.url.is_empty() {
                return Err(NamelessError::InvalidUsage(
                    "authenticator was set without a proxy".into(),
                ));
            }
            proxy.to_url()?;
        }

        Ok(ApiConfig {
            base_url,
            api_key: self.api_key,
            user_agent: self.user_agent,
            timeout: self.timeout,
            response_size_limit: self.response_size_limit,
            debug_sink: self.debug_sink,
            proxy: self.proxy,
            http_version: self.http_version,
            pretty_json: self.pretty_json,
        })
    }

    /// Build a client that talks to the site over the default ureq transport.
    pub fn build(self) -> Result<NamelessApi> {
        let handler = RequestHandler::new(self.build_config()?)?;
        Ok(NamelessApi::new(handler))
    }

    /// Build a client on top of a caller-supplied transport.
    pub fn build_with_transport(self, transport: Arc<dyn Transport>) -> Result<NamelessApi> {
        let handler = RequestHandler::with_transport(self.build_config()?, transport);
        Ok(NamelessApi::new(handler))
    }
}
