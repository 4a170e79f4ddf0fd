use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatMessageRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
}

impl ChatMessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMessageRole::System => "system",
            ChatMessageRole::User => "user",
            ChatMessageRole::Assistant => "assistant",
            ChatMessageRole::Tool => "tool",
        }
    }
}

/// Message content: plain text or an array of structured content blocks.
///
/// Blocks are forwarded opaquely; the gateway only needs their text form when
/// translating into a provider dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<JsonValue>),
}

impl MessageContent {
    /// Flattens content into plain text. Structured blocks contribute their
    /// `text` field when present and are skipped otherwise.
    pub fn flatten_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(JsonValue::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatMessage {
    pub role: ChatMessageRole,
    /// May be absent only when `tool_calls` is present (enforced by request
    /// validation, not here).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn text(role: ChatMessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Token usage. Fields default to zero on deserialization because some
/// upstream payloads omit counts that do not apply (embedding usage carries
/// no completion tokens).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

impl CompletionUsage {
    pub fn new(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Gateway annotations attached to every normalized response.
///
/// The `providerMetadata` field name is part of the downstream contract and is
/// deliberately camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub gateway: GatewayMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatewayMetadata {
    pub provider: String,
    /// Wall-clock latency of the upstream call only, in milliseconds.
    pub latency: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoutingMetadata {
    pub selected_provider: String,
}

impl ProviderMetadata {
    pub fn routed(provider: impl Into<String>, latency: i64) -> Self {
        let provider = provider.into();
        Self {
            gateway: GatewayMetadata {
                provider: provider.clone(),
                latency,
                routing: Some(RoutingMetadata {
                    selected_provider: provider,
                }),
            },
        }
    }

    pub fn unrouted(provider: impl Into<String>, latency: i64) -> Self {
        Self {
            gateway: GatewayMetadata {
                provider: provider.into(),
                latency,
                routing: None,
            },
        }
    }
}
