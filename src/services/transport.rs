//! HTTP transport to the BookHub API
//!
//! The transport only moves bytes: it never interprets status codes. A
//! response with any status is `Ok`; only failures to get a response at all
//! (connection refused, timeout, broken body) are errors.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

pub use reqwest::Method;

use crate::{
    config::ApiConfig,
    error::{ClientError, ClientResult},
};

/// Outbound call, path relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Query parameters, encoded by the transport
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    pub request_id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(Some(body))
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Raw response: status code and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ClientError::Decode(format!("Unexpected response body: {}", e)))
    }

    /// Keep successful responses, turn the rest into errors
    pub fn into_result(self) -> ClientResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::from_status(self.status, &self.body))
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse>;
}

/// Transport backed by `reqwest`
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("bookhub-client/", env!("CARGO_PKG_VERSION")));

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut base_url = config.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let span = tracing::debug_span!(
            "api_request",
            method = %request.method,
            path = %request.path,
            request_id = %request.request_id,
        );

        async move {
            let mut builder = self
                .client
                .request(request.method.clone(), self.url(&request.path))
                .header("X-Request-ID", request.request_id.to_string());

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                tracing::warn!("Request failed: {}", e);
                if e.is_timeout() {
                    ClientError::Network(format!("Request timed out: {}", e))
                } else {
                    ClientError::Network(e.to_string())
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await?;
            tracing::debug!(status, "Response received");

            Ok(ApiResponse { status, body })
        }
        .instrument(span)
        .await
    }
}
