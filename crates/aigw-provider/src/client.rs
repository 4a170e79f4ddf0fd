use std::time::Duration;

use bytes::Bytes;
use wreq::{Client, Method};

use crate::adapter::{AdapterFailure, TransportErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl UpstreamHttpRequest {
    pub fn post_json(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {token}"))
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into `AdapterFailure::Http`, passing the
    /// upstream body through unchanged.
    pub fn into_success(self) -> Result<Self, AdapterFailure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AdapterFailure::Http {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared upstream HTTP client. All provider calls are bounded by the request
/// timeout, so a hung upstream surfaces as a `Timeout` transport failure
/// instead of stalling the caller indefinitely.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn send(&self, req: UpstreamHttpRequest) -> Result<UpstreamHttpResponse, AdapterFailure> {
        let method = match req.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = self.client.request(method, &req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        tracing::debug!(url = %req.url, "upstream request");
        let resp = builder.send().await.map_err(map_wreq_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(map_wreq_error)?;
        Ok(UpstreamHttpResponse { status, body })
    }
}

fn map_wreq_error(err: wreq::Error) -> AdapterFailure {
    AdapterFailure::Transport {
        kind: classify_wreq_error(&err),
        message: err.to_string(),
    }
}

fn classify_wreq_error(err: &wreq::Error) -> TransportErrorKind {
    let message = err.to_string().to_ascii_lowercase();
    if err.is_timeout() {
        if message.contains("read") || message.contains("idle") {
            return TransportErrorKind::ReadTimeout;
        }
        return TransportErrorKind::Timeout;
    }
    if err.is_connect() {
        if message.contains("dns") || message.contains("resolve") {
            return TransportErrorKind::Dns;
        }
        if message.contains("tls") || message.contains("ssl") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }
    if err.is_connection_reset() {
        return TransportErrorKind::Connect;
    }
    if message.contains("tls") || message.contains("ssl") {
        return TransportErrorKind::Tls;
    }
    TransportErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_carries_body_through() {
        let resp = UpstreamHttpResponse {
            status: 429,
            body: Bytes::from_static(b"{\"error\":\"rate limited\"}"),
        };
        match resp.into_success() {
            Err(AdapterFailure::Http { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "{\"error\":\"rate limited\"}");
            }
            other => panic!("expected http failure, got {other:?}"),
        }
    }

    #[test]
    fn request_builder_accumulates_headers() {
        let req = UpstreamHttpRequest::post_json("https://example.test/v1/x", Bytes::new())
            .bearer("sk-test")
            .header("x-api-key", "sk-test");
        assert_eq!(req.headers.len(), 3);
        assert_eq!(req.headers[1].0, "authorization");
        assert_eq!(req.headers[1].1, "Bearer sk-test");
    }
}
