pub mod chat;
pub mod embeddings;
pub mod models;
pub mod sse;

pub use chat::types::{
    ChatMessage, ChatMessageRole, CompletionUsage, GatewayMetadata, MessageContent,
    ProviderMetadata, RoutingMetadata,
};
