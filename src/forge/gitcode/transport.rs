//! HTTP transport for the GitCode client.

use std::future::Future;
use std::time::Duration;

use http::HeaderValue;
use http::Method;
use http::StatusCode;
use http::header;
use url::Url;

use crate::forge::ForgeError;

const USER_AGENT: &str = concat!("gitcode-forge/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A request body with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn json(bytes: Vec<u8>) -> Self {
        Self {
            content_type: "application/json",
            bytes,
        }
    }

    pub fn form(encoded: String) -> Self {
        Self {
            content_type: "application/x-www-form-urlencoded",
            bytes: encoded.into_bytes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends HTTP requests. Abstracted for testing.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, ForgeError>> + Send;
}

/// Sends requests with `reqwest`. Proxy settings come from the environment.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport. `skip_verify` disables TLS certificate checks.
    pub fn new(skip_verify: bool) -> Result<Self, ForgeError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(skip_verify)
            .build()
            .map_err(|e| ForgeError::Transport {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError> {
        let mut builder = self.client.request(request.method, request.url);
        if let Some(body) = request.body {
            builder = builder
                .header(header::CONTENT_TYPE, body.content_type)
                .body(body.bytes);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ForgeError {
    // Strip the URL: it carries the access token as a query parameter.
    ForgeError::Transport {
        message: e.without_url().to_string(),
    }
}
