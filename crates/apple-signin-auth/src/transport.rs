//! HTTP transport
//!
//! Every request this crate makes goes through an [`HttpTransport`]. The default
//! is [`ReqwestTransport`]; tests and proxies can install their own through
//! [`TransportHandle::replace`] (or [`AppleClient::set_transport`](crate::AppleClient::set_transport)),
//! which takes effect for every subsequent call made through that handle.
//!
//! ## Security Configuration
//!
//! The default transport:
//! - does NOT follow redirects
//! - uses rustls for TLS
//! - applies the configured request timeout

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Method};
use parking_lot::RwLock;
use url::Url;

use crate::config::AppleConfig;
use crate::error::{AppleAuthError, Result};

/// Request handed to a transport
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response returned by a transport
pub type HttpResponse = http::Response<Vec<u8>>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Performs HTTP requests on behalf of the client
///
/// Implementations must return non-success statuses as ordinary responses;
/// only failures to complete the exchange are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request and return the full response
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by [`reqwest`]
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport from the client configuration
    ///
    /// # Errors
    ///
    /// Returns [`AppleAuthError::Http`] if the TLS backend cannot be initialised.
    pub fn new(config: &AppleConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout());

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            inner: builder.build()?,
        })
    }

    /// Create from an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("inner", &"<reqwest::Client>")
            .finish()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (parts, body) = request.into_parts();

        let response = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let mut builder = http::Response::builder().status(response.status());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(response.headers().clone());
        }

        let body = response.bytes().await?;

        builder
            .body(body.to_vec())
            .map_err(AppleAuthError::transport)
    }
}

/// Shared, replaceable slot holding the active transport
///
/// Clones share the slot, so a replacement is seen by every component holding
/// a clone of the handle.
#[derive(Clone)]
pub struct TransportHandle {
    slot: Arc<RwLock<Arc<dyn HttpTransport>>>,
}

impl TransportHandle {
    /// Create a handle around a transport
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(transport)),
        }
    }

    /// The transport subsequent calls will use
    pub fn current(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&*self.slot.read())
    }

    /// Replace the transport for all subsequent calls
    pub fn replace(&self, transport: Arc<dyn HttpTransport>) {
        *self.slot.write() = transport;
        tracing::debug!("HTTP transport replaced");
    }

    /// Execute a request on the current transport
    ///
    /// # Errors
    ///
    /// Whatever the current transport returns, typically
    /// [`AppleAuthError::Http`] when the request could not be sent.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let transport = self.current();
        transport.execute(request).await
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("transport", &"<dyn HttpTransport>")
            .finish()
    }
}

/// Build a GET request expecting JSON
pub(crate) fn json_get(url: &Url) -> Result<HttpRequest> {
    http::Request::builder()
        .method(Method::GET)
        .uri(url.as_str())
        .header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
        .header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE))
        .body(Vec::new())
        .map_err(AppleAuthError::transport)
}

/// Build a form-encoded POST request
pub(crate) fn form_post(url: &Url, params: &[(&str, &str)]) -> Result<HttpRequest> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();

    http::Request::builder()
        .method(Method::POST)
        .uri(url.as_str())
        .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
        .header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE))
        .body(body.into_bytes())
        .map_err(AppleAuthError::transport)
}
