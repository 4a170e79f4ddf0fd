use async_trait::async_trait;
use std::time::Instant;

use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::chat::response::ChatCompletionResponse;
use aigw_protocol::chat::types::ProviderMetadata;
use aigw_protocol::embeddings::{EmbeddingRequestBody, EmbeddingResponse};
use aigw_protocol::models::ModelsResponse;

use crate::adapter::{strip_model_namespace, AdapterFailure, AdapterResult, ProviderAdapter};
use crate::client::{UpstreamClient, UpstreamHttpRequest};
use crate::config::ProviderConfig;
use crate::vercel::{chat_payload, encode_json, PassThroughEmbeddingPayload};

pub const OPENAI_PROVIDER_NAME: &str = "openai";

/// Pass-through adapter for the OpenAI API itself. Identical wire shape to
/// the gateway's canonical form, except the upstream does not understand the
/// `openai/` namespace segment, so it is stripped from the model id.
pub struct OpenAiAdapter {
    config: ProviderConfig,
    client: UpstreamClient,
}

impl OpenAiAdapter {
    pub fn new(config: ProviderConfig, client: UpstreamClient) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        OPENAI_PROVIDER_NAME
    }

    async fn chat_completion(
        &self,
        req: &ChatCompletionRequestBody,
    ) -> AdapterResult<ChatCompletionResponse> {
        let model = strip_model_namespace(&req.model, OPENAI_PROVIDER_NAME);
        let payload = chat_payload(model, req);
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
            model: strip_model_namespace(&req.model, OPENAI_PROVIDER_NAME),
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

    #[test]
    fn chat_payload_strips_openai_namespace() {
        let req = ChatCompletionRequestBody {
            model: "openai/gpt-4".to_string(),
            messages: vec![ChatMessage::text(ChatMessageRole::User, "hi")],
            stream: None,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_tokens: None,
            n: None,
            stop: None,
            user: None,
        };
        let model = strip_model_namespace(&req.model, OPENAI_PROVIDER_NAME);
        let json = serde_json::to_value(chat_payload(model, &req)).unwrap();
        assert_eq!(json["model"], "gpt-4");
    }
}
