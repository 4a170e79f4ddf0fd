use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::chat::response::ChatCompletionResponse;
use aigw_protocol::embeddings::{EmbeddingRequestBody, EmbeddingResponse};
use aigw_protocol::models::ModelsResponse;

pub type AdapterResult<T> = Result<T, AdapterFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

impl TransportErrorKind {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportErrorKind::Timeout | TransportErrorKind::ReadTimeout)
    }
}

/// Adapter failures are tagged values, not opaque exceptions: callers branch
/// on the kind. Upstream non-2xx responses carry the status and body through
/// unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterFailure {
    #[error("unsupported capability: {0}")]
    Unsupported(&'static str),
    #[error("upstream returned status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("upstream transport failure: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    #[error("upstream response could not be decoded: {0}")]
    Codec(String),
}

impl AdapterFailure {
    pub fn codec(err: impl std::fmt::Display) -> Self {
        AdapterFailure::Codec(err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AdapterFailure::Transport { kind, .. } if kind.is_timeout())
    }
}

/// One implementation per backend provider, translating canonical requests
/// into provider-native calls and native responses back into canonical form.
///
/// Adapters are stateless per call: they hold only static configuration and a
/// shared HTTP client. The fixed capability set is chat, embedding and
/// list-models; a provider lacking a capability fails with
/// `AdapterFailure::Unsupported` without touching the network.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat_completion(
        &self,
        req: &ChatCompletionRequestBody,
    ) -> AdapterResult<ChatCompletionResponse>;

    async fn embedding(&self, req: &EmbeddingRequestBody) -> AdapterResult<EmbeddingResponse>;

    async fn list_models(&self) -> AdapterResult<ModelsResponse>;
}

/// Strips `<namespace>/` from a provider-prefixed model id.
///
/// Used by adapters whose upstream does not expect the gateway's namespace
/// segment (e.g. `openai/gpt-4` is sent upstream as `gpt-4`).
pub fn strip_model_namespace<'a>(model: &'a str, namespace: &str) -> &'a str {
    match model.split_once('/') {
        Some((prefix, rest)) if prefix == namespace => rest,
        _ => model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_own_namespace_only() {
        assert_eq!(strip_model_namespace("openai/gpt-4", "openai"), "gpt-4");
        assert_eq!(
            strip_model_namespace("anthropic/claude-3-sonnet", "openai"),
            "anthropic/claude-3-sonnet"
        );
        assert_eq!(strip_model_namespace("gpt-4", "openai"), "gpt-4");
    }
}
