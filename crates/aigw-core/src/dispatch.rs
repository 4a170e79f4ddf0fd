use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::chat::response::ChatCompletionResponse;
use aigw_protocol::embeddings::{EmbeddingRequestBody, EmbeddingResponse};
use aigw_protocol::models::{ModelInfo, ModelsResponse};
use aigw_provider::{ProviderRegistry, RouteTable};
use aigw_storage::{RequestKind, UsageAttempt, UsageStatus};

use crate::accounting::CostAccountant;
use crate::auth::AuthContext;
use crate::error::GatewayError;

/// Orchestrates one dispatch: validate, select a provider, call it, settle
/// the ledger. Every post-validation attempt leaves exactly one ledger
/// record, success or not; validation failures leave none.
pub struct Gateway {
    registry: ProviderRegistry,
    routes: RouteTable,
    accountant: CostAccountant,
}

impl Gateway {
    pub fn new(registry: ProviderRegistry, routes: RouteTable, accountant: CostAccountant) -> Self {
        Self {
            registry,
            routes,
            accountant,
        }
    }

    pub fn accountant(&self) -> &CostAccountant {
        &self.accountant
    }

    /// Dispatches a chat call. The upstream is always called in full
    /// non-streaming mode; `kind` records whether the caller asked for
    /// stream emulation on top. On success the response id is rewritten to
    /// the generation id of the ledger record.
    pub async fn chat_completion(
        &self,
        ctx: AuthContext,
        req: &ChatCompletionRequestBody,
        kind: RequestKind,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        req.validate()?;

        match self.call_chat(req).await {
            Ok(mut response) => {
                let usage = response.usage_or_default();
                let (provider, latency) = metadata_of(&response);
                let cost = self
                    .accountant
                    .cost(&provider, &req.model, usage.prompt_tokens, usage.completion_tokens)
                    .await?;
                let generation_id = self
                    .accountant
                    .log(UsageAttempt {
                        user_id: ctx.user_id,
                        organization_id: ctx.organization_id,
                        provider,
                        model: req.model.clone(),
                        kind,
                        input_tokens: Some(usage.prompt_tokens),
                        output_tokens: Some(usage.completion_tokens),
                        total_tokens: Some(usage.total_tokens),
                        cost_usd: cost,
                        latency_ms: latency,
                        status: UsageStatus::Success,
                        error_message: None,
                    })
                    .await?;
                response.id = generation_id.to_string();
                Ok(response)
            }
            Err(err) => {
                self.log_failure(ctx, &req.model, kind, &err).await;
                Err(err)
            }
        }
    }

    pub async fn embedding(
        &self,
        ctx: AuthContext,
        req: &EmbeddingRequestBody,
    ) -> Result<EmbeddingResponse, GatewayError> {
        req.validate()?;

        match self.call_embedding(req).await {
            Ok(response) => {
                let usage = response.usage.unwrap_or_default();
                let provider = response
                    .provider_metadata
                    .as_ref()
                    .map(|metadata| metadata.gateway.provider.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let latency = response
                    .provider_metadata
                    .as_ref()
                    .map(|metadata| metadata.gateway.latency);
                let cost = self
                    .accountant
                    .cost(&provider, &req.model, usage.prompt_tokens, 0)
                    .await?;
                self.accountant
                    .log(UsageAttempt {
                        user_id: ctx.user_id,
                        organization_id: ctx.organization_id,
                        provider,
                        model: req.model.clone(),
                        kind: RequestKind::Embedding,
                        input_tokens: Some(usage.prompt_tokens),
                        output_tokens: Some(0),
                        total_tokens: Some(usage.total_tokens),
                        cost_usd: cost,
                        latency_ms: latency,
                        status: UsageStatus::Success,
                        error_message: None,
                    })
                    .await?;
                Ok(response)
            }
            Err(err) => {
                self.log_failure(ctx, &req.model, RequestKind::Embedding, &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Catalog of the default provider. Not metered.
    pub async fn list_models(&self) -> Result<ModelsResponse, GatewayError> {
        let adapter = self.adapter(self.routes.default_provider())?;
        Ok(adapter.list_models().await?)
    }

    pub async fn model(&self, model_id: &str) -> Result<ModelInfo, GatewayError> {
        let models = self.list_models().await?;
        models
            .find(model_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("model {model_id}")))
    }

    async fn call_chat(
        &self,
        req: &ChatCompletionRequestBody,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        let adapter = self.adapter(self.routes.select(&req.model))?;
        Ok(adapter.chat_completion(req).await?)
    }

    async fn call_embedding(
        &self,
        req: &EmbeddingRequestBody,
    ) -> Result<EmbeddingResponse, GatewayError> {
        let adapter = self.adapter(self.routes.select(&req.model))?;
        Ok(adapter.embedding(req).await?)
    }

    fn adapter(
        &self,
        name: &str,
    ) -> Result<std::sync::Arc<dyn aigw_provider::ProviderAdapter>, GatewayError> {
        self.registry
            .get(name)
            .ok_or_else(|| GatewayError::Unsupported(format!("provider {name} is not configured")))
    }

    /// The failure trace must never mask the original error: a ledger write
    /// failure here is logged and swallowed.
    async fn log_failure(
        &self,
        ctx: AuthContext,
        model: &str,
        kind: RequestKind,
        err: &GatewayError,
    ) {
        let attempt = UsageAttempt::failed(
            ctx.user_id,
            ctx.organization_id,
            model,
            kind,
            err.usage_status(),
            err.to_string(),
        );
        if let Err(log_err) = self.accountant.log(attempt).await {
            tracing::error!(error = %log_err, "ledger write for failed dispatch did not land");
        }
    }
}

fn metadata_of(response: &ChatCompletionResponse) -> (String, Option<i64>) {
    match response.provider_metadata.as_ref() {
        Some(metadata) => (
            metadata.gateway.provider.clone(),
            Some(metadata.gateway.latency),
        ),
        None => ("unknown".to_string(), None),
    }
}
