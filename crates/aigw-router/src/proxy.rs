use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use aigw_common::GenerationId;
use aigw_core::auth::{AuthContext, AuthProvider};
use aigw_core::{hash_api_key, Gateway, GatewayError, MemoryAuth, StreamEmulator};
use aigw_protocol::chat::request::ChatCompletionRequestBody;
use aigw_protocol::embeddings::EmbeddingRequestBody;
use aigw_storage::{GatewayStorage, RequestKind, StorageError};

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
    pub auth: Arc<MemoryAuth>,
    pub storage: Arc<GatewayStorage>,
    pub emulator: StreamEmulator,
}

/// Protected routes sit behind the auth middleware; the liveness probe, the
/// model catalog and user creation are open, matching the upstream-facing
/// contract.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/credits", get(credits))
        .route("/v1/generation", get(generation))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/", get(root))
        .route("/v1/models", get(models_list))
        .route("/v1/models/{*model}", get(model_get))
        .route("/v1/users", post(create_user))
        .with_state(state)
}

async fn require_auth(
    State(state): State<GatewayState>,
    mut req: axum::http::Request<Body>,
    next: Next,
) -> Response {
    match state.auth.authenticate(req.headers()) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => error_body(err.status, &String::from_utf8_lossy(&err.body)),
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "AI Gateway is running!"}))
}

async fn chat_completions(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<ChatCompletionRequestBody>,
) -> Result<Response, ApiError> {
    if body.wants_stream() {
        let response = state
            .gateway
            .chat_completion(ctx, &body, RequestKind::ChatStream)
            .await?;
        let text = response.first_choice_text();
        let generation_id = response.id.clone();
        let model = response.model.clone();

        let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(32);
        let emulator = state.emulator.clone();
        tokio::spawn(async move {
            if let Err(err) = emulator.emit(&generation_id, &model, &text, tx).await {
                tracing::error!(error = %err, "stream emission failed to serialize a chunk");
            }
        });

        let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
        let mut response = Response::new(Body::from_stream(stream));
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        return Ok(response);
    }

    let response = state
        .gateway
        .chat_completion(ctx, &body, RequestKind::Chat)
        .await?;
    Ok(Json(response).into_response())
}

async fn embeddings(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<EmbeddingRequestBody>,
) -> Result<Response, ApiError> {
    let response = state.gateway.embedding(ctx, &body).await?;
    Ok(Json(response).into_response())
}

async fn models_list(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    let models = state.gateway.list_models().await?;
    Ok(Json(models).into_response())
}

async fn model_get(
    State(state): State<GatewayState>,
    Path(model): Path<String>,
) -> Result<Response, ApiError> {
    let model = state.gateway.model(&model).await?;
    Ok(Json(model).into_response())
}

async fn credits(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    let view = state.gateway.accountant().balance(ctx.user_id).await
        .map_err(GatewayError::Storage)?;
    Ok(Json(view).into_response())
}

#[derive(Debug, Deserialize)]
struct GenerationQuery {
    id: String,
}

async fn generation(
    State(state): State<GatewayState>,
    Query(query): Query<GenerationQuery>,
) -> Result<Response, ApiError> {
    let id: GenerationId = query.id.parse().map_err(GatewayError::MalformedId)?;
    let details = state
        .gateway
        .accountant()
        .generation_details(id)
        .await
        .map_err(GatewayError::Storage)?
        .ok_or_else(|| GatewayError::NotFound(format!("generation {}", query.id)))?;
    Ok(Json(serde_json::json!({ "data": details })).into_response())
}

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    email: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: i64,
    email: String,
    organization_id: Option<i64>,
}

async fn create_user(
    State(state): State<GatewayState>,
    Json(body): Json<CreateUserBody>,
) -> Result<Response, ApiError> {
    let key_hash = hash_api_key(&body.api_key, state.auth.salt());
    let user = state
        .storage
        .insert_user(&body.email, &key_hash)
        .await
        .map_err(|err| match err {
            StorageError::Conflict(message) => ApiError::conflict(message),
            other => ApiError::from(GatewayError::Storage(other)),
        })?;
    state
        .auth
        .add_user(user.api_key_hash.clone(), user.id, user.organization_id);
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        organization_id: user.organization_id,
    })
    .into_response())
}

/// Uniform error body. `detail` carries the human-readable cause, matching
/// the downstream contract.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn conflict(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self {
            status: err.status_code(),
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_body(self.status, &self.detail)
    }
}

fn error_body(status: StatusCode, detail: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": detail }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_to_contract_statuses() {
        let not_found = ApiError::from(GatewayError::NotFound("model x".to_string()));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let malformed =
            ApiError::from(GatewayError::MalformedId(
                "nope".parse::<GenerationId>().unwrap_err(),
            ));
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

        let upstream = ApiError::from(GatewayError::Upstream {
            status: 429,
            body: "slow down".to_string(),
        });
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
        assert!(upstream.detail.contains("429"));
    }
}
