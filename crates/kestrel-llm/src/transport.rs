//! # Transport
//!
//! Seams between the orchestrator and the outside world:
//! - [`Transport`] sends one request and yields a raw chunk stream or a
//!   non-success status
//! - [`RequestBuilder`] produces the request for an attempt, given the
//!   current reduction factor
//!
//! [`ReqwestTransport`] is the HTTP implementation.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::errors::{StreamError, TransportError};

/// Raw response chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// One outbound request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutboundRequest {
    /// JSON request body.
    pub body: Value,
    /// Extra headers (auth, content negotiation).
    pub headers: Vec<(String, String)>,
}

/// What the upstream service answered.
pub enum TransportResponse {
    /// 2xx: the response body as a chunk stream.
    Stream(ChunkStream),
    /// Non-success status with its body.
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason phrase.
        status_text: String,
        /// Response body text.
        body: String,
    },
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Status { status, .. } => write!(f, "Status({status})"),
        }
    }
}

/// Sends requests for the orchestrator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response head.
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Builds the request for each attempt.
///
/// `reduction_factor` is `1.0` on the first attempt and shrinks by the
/// configured step after each size-triggered retry. Implementations scale
/// their size bounds by it (see `RequestLimits::scaled`).
pub trait RequestBuilder: Send + Sync {
    /// Build the request for the next attempt.
    fn build(&self, reduction_factor: f64) -> Result<OutboundRequest, StreamError>;
}

impl<F> RequestBuilder for F
where
    F: Fn(f64) -> Result<OutboundRequest, StreamError> + Send + Sync,
{
    fn build(&self, reduction_factor: f64) -> Result<OutboundRequest, StreamError> {
        self(reduction_factor)
    }
}

/// HTTP transport posting JSON to a fixed endpoint.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    /// Transport with a default client.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Transport with a caller-configured client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Target URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(&self.endpoint).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), endpoint = %self.endpoint, "response received");

        if status.is_success() {
            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from));
            return Ok(TransportResponse::Stream(Box::pin(chunks)));
        }

        let status_text = status.canonical_reason().unwrap_or_default().to_owned();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse::Status {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> OutboundRequest {
        OutboundRequest {
            body: serde_json::json!({"prompt": "hi"}),
            headers: vec![("x-api-key".into(), "secret".into())],
        }
    }

    #[tokio::test]
    async fn success_yields_chunk_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("x-api-key", "secret"))
            .and(body_json(serde_json::json!({"prompt": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"content":"hello"}"#))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(format!("{}/generate", server.uri()));
        let response = transport.send(&request()).await.unwrap();
        let TransportResponse::Stream(mut chunks) = response else {
            panic!("expected stream, got {response:?}");
        };
        let mut body = Vec::new();
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, br#"{"content":"hello"}"#);
    }

    #[tokio::test]
    async fn error_status_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"message":"Too many requests"}"#),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(server.uri());
        let response = transport.send(&request()).await.unwrap();
        match response {
            TransportResponse::Status {
                status,
                status_text,
                body,
            } => {
                assert_eq!(status, 429);
                assert_eq!(status_text, "Too Many Requests");
                assert!(body.contains("Too many requests"));
            }
            other @ TransportResponse::Stream(_) => panic!("expected status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let transport = ReqwestTransport::new("http://127.0.0.1:1/unreachable");
        let err = transport.send(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }

    #[test]
    fn closures_are_request_builders() {
        let builder = |factor: f64| -> Result<OutboundRequest, StreamError> {
            Ok(OutboundRequest {
                body: serde_json::json!({ "factor": factor }),
                headers: Vec::new(),
            })
        };
        let request = RequestBuilder::build(&builder, 0.7).unwrap();
        assert_eq!(request.body["factor"], 0.7);
    }
}
