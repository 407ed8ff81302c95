//! HTTP transport used by the client

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// A fully built request, credentials included
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Header name/value pairs, names unique ignoring case
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Request without headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set a header, replacing any existing one with the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a header value by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the client needs to know about a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Reason phrase sent by the server, or the canonical one
    pub status_text: String,
    /// `content-type` header, if any
    pub content_type: Option<String>,
    /// Complete body
    pub body: Bytes,
}

impl HttpResponse {
    /// Response with the canonical reason phrase and no content type
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_type: None,
            body: body.into(),
        }
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Performs one HTTP exchange.
///
/// Implementations own pooling, TLS and timeouts; the client never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the complete response, whatever its status
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// Build a rustls ClientConfig trusting the webpki root set, offering TLS 1.2 and 1.3.
fn build_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Default transport: pooled hyper client over rustls
///
/// Speaks HTTP/1.1 and HTTP/2 (negotiated via ALPN on `https://`), and plain
/// HTTP/1.1 on `http://` endpoints.
#[derive(Clone)]
pub struct HyperTransport {
    config: TransportConfig,
    http_client: HttpClient<HttpsConnector, Full<Bytes>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl HyperTransport {
    /// Transport with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    /// Transport with custom settings
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let tls_config = build_tls_config()?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let http_client = HttpClient::builder(TokioExecutor::new()).build(https_connector);

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse> {
        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| Error::Connection(format!("Request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // only present when the server sent a non-canonical phrase
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
            .to_bytes();

        let mut response = HttpResponse::new(status, body);
        response.content_type = content_type;
        if let Some(reason) = reason {
            response.status_text = reason;
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let uri: Uri = request
            .url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL: {}", e)))?;

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let req = builder
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|e| Error::Validation(format!("Failed to build request: {}", e)))?;

        let response = if self.config.timeout_ms == 0 {
            self.exchange(req).await?
        } else {
            let timeout = Duration::from_millis(self.config.timeout_ms);
            tokio::time::timeout(timeout, self.exchange(req))
                .await
                .map_err(|_| Error::Timeout(self.config.timeout_ms))??
        };

        debug!("Received {} ({} bytes)", response.status, response.body.len());
        Ok(response)
    }
}
