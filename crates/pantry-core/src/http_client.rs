//! Transport seam between provider adapters and the network.
//!
//! Adapters build an [`HttpRequest`], hand it to an [`HttpClient`] and
//! classify the [`HttpResponse`] themselves. Only [`ReqwestHttpClient`]
//! touches the network; tests substitute scripted clients.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Where a provider credential goes. Keys never appear in the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    /// Vendor key header such as `x-goog-api-key` or `x-api-key`.
    Header { name: String, value: String },
    /// `Authorization: Client-ID <key>`.
    ClientId(String),
}

impl HttpAuth {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    fn header_pair(&self) -> Option<(String, String)> {
        match self {
            Self::None => None,
            Self::Header { name, value } => Some((name.to_ascii_lowercase(), value.clone())),
            Self::ClientId(key) => Some((String::from("authorization"), format!("Client-ID {key}"))),
        }
    }
}

/// Outgoing provider call. Header names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Post, url)
    }

    fn with_method(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name: String = name.into();
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// JSON body plus content type.
    pub fn with_json<T: Serialize>(mut self, payload: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_string(payload).map_err(|e| {
            HttpError::with_kind(HttpErrorKind::Encode, format!("request body: {e}"))
        })?;
        self.body = Some(body);
        Ok(self.with_header("content-type", "application/json"))
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        if let Some((name, value)) = auth.header_pair() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }
}

/// Status and raw body of a completed call; adapters decide what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Connect,
    Timeout,
    /// The response arrived but its body could not be read.
    Body,
    /// The request could not be built.
    Encode,
    Other,
}

impl HttpErrorKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Connect => "connection failed",
            Self::Timeout => "request timed out",
            Self::Body => "unreadable response body",
            Self::Encode => "request encoding failed",
            Self::Other => "request failed",
        }
    }
}

/// A call that produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(HttpErrorKind::Other, message)
    }

    pub fn with_kind(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for HttpError {}

pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Network transport over one shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    inner: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let builder = match request.method {
            HttpMethod::Get => self.inner.get(&request.url),
            HttpMethod::Post => self.inner.post(&request.url),
        };
        let builder = request
            .headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value))
            .timeout(request.timeout);
        match request.body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(error: reqwest::Error) -> HttpError {
    let kind = if error.is_timeout() {
        HttpErrorKind::Timeout
    } else if error.is_connect() {
        HttpErrorKind::Connect
    } else {
        HttpErrorKind::Other
    };
    HttpError::with_kind(kind, error.to_string())
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let pending = self.prepare(request);
        Box::pin(async move {
            let response = pending.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::with_kind(HttpErrorKind::Body, e.to_string()))?;
            Ok(HttpResponse::new(status, body))
        })
    }
}
