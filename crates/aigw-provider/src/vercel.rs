use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Instant;

use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::chat::response::ChatCompletionResponse;
use aigw_protocol::chat::types::ProviderMetadata;
use aigw_protocol::embeddings::{EmbeddingRequestBody, EmbeddingResponse};
use aigw_protocol::models::ModelsResponse;

use crate::adapter::{AdapterFailure, AdapterResult, ProviderAdapter};
use crate::client::{UpstreamClient, UpstreamHttpRequest};
use crate::config::ProviderConfig;

pub const VERCEL_PROVIDER_NAME: &str = "vercel";

/// Pass-through adapter for an upstream that already speaks the OpenAI wire
/// shape and understands provider-prefixed model ids, so the id is forwarded
/// unchanged.
pub struct VercelAdapter {
    config: ProviderConfig,
    client: UpstreamClient,
}

#[derive(Debug, Serialize)]
pub(crate) struct PassThroughChatPayload<'a> {
    model: &'a str,
    messages: Vec<JsonValue>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PassThroughEmbeddingPayload<'a> {
    pub(crate) model: &'a str,
    pub(crate) input: &'a str,
}

/// Builds the `{role, content}` message list shared by the pass-through
/// adapters. Structured content blocks are flattened to their text form.
pub(crate) fn passthrough_messages(req: &ChatCompletionRequestBody) -> Vec<JsonValue> {
    req.messages
        .iter()
        .map(|message| {
            serde_json::json!({
                "role": message.role.as_str(),
                "content": message
                    .content
                    .as_ref()
                    .map(|content| content.flatten_text())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

pub(crate) fn chat_payload<'a>(
    model: &'a str,
    req: &ChatCompletionRequestBody,
) -> PassThroughChatPayload<'a> {
    PassThroughChatPayload {
        model,
        messages: passthrough_messages(req),
        // Upstream calls are always non-streaming; the gateway emulates
        // streaming locally from the complete answer.
        stream: false,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
    }
}

pub(crate) fn encode_json<T: Serialize>(payload: &T) -> AdapterResult<Bytes> {
    let body = serde_json::to_vec(payload).map_err(AdapterFailure::codec)?;
    Ok(Bytes::from(body))
}

impl VercelAdapter {
    pub fn new(config: ProviderConfig, client: UpstreamClient) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ProviderAdapter for VercelAdapter {
    fn name(&self) -> &'static str {
        VERCEL_PROVIDER_NAME
    }

    async fn chat_completion(
        &self,
        req: &ChatCompletionRequestBody,
    ) -> AdapterResult<ChatCompletionResponse> {
        let payload = chat_payload(&req.model, req);
        let request = UpstreamHttpRequest::post_json(
            self.config.endpoint("/chat/completions"),
            encode_json(&payload)?,
        )
        .bearer(&self.config.api_key);

        let started = Instant::now();
        let response = self.client.send(request).await?.into_success()?;
        let latency = started.elapsed().as_millis() as i64;

        let mut body: ChatCompletionResponse =
            serde_json::from_slice(&response.body).map_err(AdapterFailure::codec)?;
        body.provider_metadata = Some(ProviderMetadata::routed(self.name(), latency));
        Ok(body)
    }

    async fn embedding(&self, req: &EmbeddingRequestBody) -> AdapterResult<EmbeddingResponse> {
        let payload = PassThroughEmbeddingPayload {
            model: &req.model,
            input: &req.input,
        };
        let request = UpstreamHttpRequest::post_json(
            self.config.endpoint("/embeddings"),
            encode_json(&payload)?,
        )
        .bearer(&self.config.api_key);

        let started = Instant::now();
        let response = self.client.send(request).await?.into_success()?;
        let latency = started.elapsed().as_millis() as i64;

        let mut body: EmbeddingResponse =
            serde_json::from_slice(&response.body).map_err(AdapterFailure::codec)?;
        body.provider_metadata = Some(ProviderMetadata::unrouted(self.name(), latency));
        Ok(body)
    }

    async fn list_models(&self) -> AdapterResult<ModelsResponse> {
        let request =
            UpstreamHttpRequest::get(self.config.endpoint("/models")).bearer(&self.config.api_key);
        let response = self.client.send(request).await?.into_success()?;
        serde_json::from_slice(&response.body).map_err(AdapterFailure::codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigw_protocol::chat::types::{ChatMessage, ChatMessageRole};

    fn request() -> ChatCompletionRequestBody {
        ChatCompletionRequestBody {
            model: "anthropic/claude-3-sonnet".to_string(),
            messages: vec![ChatMessage::text(ChatMessageRole::User, "hi")],
            stream: Some(true),
            temperature: Some(0.7),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_tokens: None,
            n: None,
            stop: None,
            user: None,
        }
    }

    #[test]
    fn payload_forwards_model_unchanged_and_forces_non_streaming() {
        let req = request();
        let payload = chat_payload(&req.model, &req);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "anthropic/claude-3-sonnet");
        assert_eq!(json["stream"], false);
        assert_eq!(json["temperature"], 0.7);
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn payload_includes_max_tokens_when_present() {
        let mut req = request();
        req.max_tokens = Some(50);
        let payload = chat_payload(&req.model, &req);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["max_tokens"], 50);
    }
}
