//! Transport: one synchronous POST of an encoded request to EZD.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::EzdError;

/// Header naming the requested SOAP operation.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Raw HTTP response as received: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Sends an encoded request and hands back the raw response.
///
/// Implementations do not retry and do not inspect the payload.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: String, action: &str) -> Result<RawResponse, EzdError>;
}

/// HTTP transport over reqwest.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Use a preconfigured client (timeouts, proxies, custom roots).
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: String, action: &str) -> Result<RawResponse, EzdError> {
        debug!(
            endpoint = %self.endpoint,
            bytes = payload.len(),
            "Posting EZD request"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, action)
            .body(payload)
            .send()
            .await
            .map_err(|e| EzdError::Transport(describe(&e)))?;

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            // The status alone decides a non-success outcome.
            Err(e) if !status.is_success() => {
                debug!(status = %status, "Unreadable EZD error body: {}", describe(&e));
                String::new()
            }
            Err(e) => return Err(EzdError::Transport(describe(&e))),
        };

        debug!(status = %status, bytes = body.len(), "EZD response received");
        Ok(RawResponse { status, body })
    }
}

/// Flatten a reqwest error and its sources into one line.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
