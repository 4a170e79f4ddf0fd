use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use time::OffsetDateTime;

use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::chat::response::{
    ChatCompletionChoice, ChatCompletionObjectType, ChatCompletionResponse,
    ChatCompletionResponseMessage,
};
use aigw_protocol::chat::types::{CompletionUsage, ProviderMetadata};
use aigw_protocol::embeddings::{EmbeddingRequestBody, EmbeddingResponse};
use aigw_protocol::models::{ModelInfo, ModelsResponse};

use crate::adapter::{strip_model_namespace, AdapterFailure, AdapterResult, ProviderAdapter};
use crate::client::{UpstreamClient, UpstreamHttpRequest};
use crate::config::ProviderConfig;
use crate::vercel::encode_json;

pub const ANTHROPIC_PROVIDER_NAME: &str = "anthropic";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: i64 = 1000;

/// Dialect-translating adapter. The upstream speaks the Messages API, so the
/// canonical request is reshaped on the way in and the native reply is
/// wrapped in a synthesized `chat.completion` envelope on the way out.
///
/// The upstream has no embedding endpoint; that capability fails without a
/// network call.
pub struct AnthropicAdapter {
    config: ProviderConfig,
    client: UpstreamClient,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessagesPayload<'a> {
    model: &'a str,
    messages: Vec<MessagesPayloadEntry>,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct MessagesPayloadEntry {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<MessagesReplyBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct MessagesReplyBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: i64,
    output_tokens: i64,
}

pub(crate) fn messages_payload<'a>(
    model: &'a str,
    req: &ChatCompletionRequestBody,
) -> MessagesPayload<'a> {
    let messages = req
        .messages
        .iter()
        .map(|message| MessagesPayloadEntry {
            role: message.role.as_str(),
            content: message
                .content
                .as_ref()
                .map(|content| content.flatten_text())
                .unwrap_or_default(),
        })
        .collect();
    MessagesPayload {
        model,
        messages,
        max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: req.temperature,
    }
}

impl AnthropicAdapter {
    pub fn new(config: ProviderConfig, client: UpstreamClient) -> Self {
        Self { config, client }
    }

    fn synthesize_envelope(
        &self,
        requested_model: &str,
        reply: MessagesReply,
        latency: i64,
    ) -> ChatCompletionResponse {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let content = reply
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();
        ChatCompletionResponse {
            id: format!("chatcmpl-{now}"),
            object: ChatCompletionObjectType::ChatCompletion,
            created: now,
            // The envelope echoes the id the caller asked for, prefix
            // included, not the stripped upstream id.
            model: requested_model.to_string(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionResponseMessage::assistant(content),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(CompletionUsage::new(
                reply.usage.input_tokens,
                reply.usage.output_tokens,
            )),
            provider_metadata: Some(ProviderMetadata::routed(self.name(), latency)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        ANTHROPIC_PROVIDER_NAME
    }

    async fn chat_completion(
        &self,
        req: &ChatCompletionRequestBody,
    ) -> AdapterResult<ChatCompletionResponse> {
        let model = strip_model_namespace(&req.model, ANTHROPIC_PROVIDER_NAME);
        let payload = messages_payload(model, req);
        let request = UpstreamHttpRequest::post_json(
            self.config.endpoint("/messages"),
            encode_json(&payload)?,
        )
        .header("x-api-key", &self.config.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION);

        let started = Instant::now();
        let response = self.client.send(request).await?.into_success()?;
        let latency = started.elapsed().as_millis() as i64;

        let reply: MessagesReply =
            serde_json::from_slice(&response.body).map_err(AdapterFailure::codec)?;
        Ok(self.synthesize_envelope(&req.model, reply, latency))
    }

    async fn embedding(&self, _req: &EmbeddingRequestBody) -> AdapterResult<EmbeddingResponse> {
        Err(AdapterFailure::Unsupported(
            "anthropic does not support embeddings",
        ))
    }

    async fn list_models(&self) -> AdapterResult<ModelsResponse> {
        // No discovery endpoint upstream; the catalog is a static table.
        Ok(static_model_catalog())
    }
}

fn static_model_catalog() -> ModelsResponse {
    let entry = |id: &str| ModelInfo {
        id: id.to_string(),
        object: "model".to_string(),
        created: 1677610602,
        owned_by: ANTHROPIC_PROVIDER_NAME.to_string(),
    };
    ModelsResponse {
        object: aigw_protocol::embeddings::ListObjectType::List,
        data: vec![
            entry("anthropic/claude-3-sonnet-20240229"),
            entry("anthropic/claude-3-haiku-20240307"),
        ],
    }
}
