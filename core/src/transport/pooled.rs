//! Production transport over a pooled reqwest client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use url::Url;

use super::{Transport, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
use crate::serialization::encode_path_segment;

const DEFAULT_URL: &str = "http://localhost:8529";

/// Connection settings for `HttpTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Server endpoint, e.g. `http://localhost:8529`.
    pub base_url: String,
    /// Database to address; requests go to `_db/{database}/...` when set.
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Whole-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            database: None,
            username: None,
            password: None,
            timeout: None,
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `ARANGO_URL`, `ARANGO_DATABASE`, `ARANGO_USERNAME`,
    /// `ARANGO_PASSWORD` and `ARANGO_TIMEOUT_SECS`. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, with variables looked up through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, TransportError> {
        let mut config = Self::default();
        if let Some(url) = var("ARANGO_URL") {
            config.base_url = url;
        }
        config.database = var("ARANGO_DATABASE");
        config.username = var("ARANGO_USERNAME");
        config.password = var("ARANGO_PASSWORD");
        if let Some(secs) = var("ARANGO_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                TransportError::Config(format!("ARANGO_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// `Transport` backed by a connection-pooled `reqwest::Client`.
///
/// Response bodies are streamed; the pooled connection is returned once the
/// body has been read or dropped.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
    closed: AtomicBool,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let mut builder =
            reqwest::Client::builder().pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base: resolve_base(&config.base_url, config.database.as_deref())?,
            username: config.username,
            password: config.password,
            closed: AtomicBool::new(false),
        })
    }

    /// URL that relative request paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Reject all further requests. In-flight requests are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }
}

fn resolve_base(base_url: &str, database: Option<&str>) -> Result<Url, TransportError> {
    let mut base = Url::parse(base_url)?;
    if base.cannot_be_a_base() {
        return Err(TransportError::Config(format!(
            "{base_url} cannot be used as a base URL"
        )));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    if let Some(database) = database {
        base = base.join(&format!("_db/{}/", encode_path_segment(database)))?;
    }
    Ok(base)
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let url = self.url_for(&request.path)?;
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url)
            .headers(request.headers.clone());
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }
        if let Some(body) = request.body {
            if !request.headers.contains_key(CONTENT_TYPE) {
                builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| {
            tracing::warn!(method = %request.method, path = %request.path, error = %err, "request failed");
            TransportError::Request(err)
        })?;

        let status = response.status().as_u16();
        tracing::debug!(method = %request.method, path = %request.path, status, "response received");

        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(TransportError::Request);
        Ok(HttpResponse {
            status,
            headers,
            body: ResponseBody::from_stream(stream),
        })
    }
}
