//! Request/response values and the network seam

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// Outbound request.
///
/// `url` may be origin-relative when handed to the authenticated client; it is
/// always absolute by the time it reaches an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// Fully buffered response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and buffers the response.
///
/// Implementations must include the browser's cookies on same-origin requests
/// (the renewal cookie travels implicitly) and must not retry on their own.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[cfg(feature = "client")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "client")]
mod reqwest_transport {
    use super::{ApiRequest, ApiResponse, HttpTransport};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use reqwest::{Client, ClientBuilder};
    use std::time::Duration;

    /// `reqwest`-backed transport; uses `fetch` with credentials in the browser
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        /// Create a transport with default settings
        ///
        /// # Errors
        ///
        /// Returns an error if the underlying client cannot be built
        pub fn new() -> Result<Self, TransportError> {
            Self::with_timeout(None)
        }

        /// Create a transport with an optional timeout (ignored on WASM)
        ///
        /// # Errors
        ///
        /// Returns an error if the underlying client cannot be built
        pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
            #[cfg(not(target_arch = "wasm32"))]
            let client = {
                let mut builder = ClientBuilder::new().user_agent("keeper-client/0.1.0");
                if let Some(timeout) = timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            };

            #[cfg(target_arch = "wasm32")]
            let client = {
                let _ = timeout; // Timeouts not supported on WASM
                ClientBuilder::new().build()?
            };

            Ok(Self { client })
        }

        /// Wrap an existing client
        pub const fn from_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait(?Send)]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            let mut builder = self
                .client
                .request(request.method, request.url.as_str())
                .headers(request.headers);

            #[cfg(target_arch = "wasm32")]
            {
                builder = builder.fetch_credentials_include();
            }

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        }
    }
}
