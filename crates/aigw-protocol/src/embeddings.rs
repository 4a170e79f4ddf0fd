use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chat::request::InvalidParameter;
use crate::chat::types::{CompletionUsage, ProviderMetadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingRequestBody {
    /// Provider-prefixed model id, e.g. `openai/text-embedding-3-small`.
    pub model: String,
    pub input: String,
}

impl EmbeddingRequestBody {
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if self.model.trim().is_empty() {
            return Err(InvalidParameter {
                field: "model",
                message: "must be non-empty".to_string(),
            });
        }
        if self.input.is_empty() {
            return Err(InvalidParameter {
                field: "input",
                message: "must be non-empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListObjectType {
    #[serde(rename = "list")]
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub object: ListObjectType,
    /// Embedding vectors as returned by the provider, forwarded opaquely.
    pub data: Vec<JsonValue>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
    #[serde(
        rename = "providerMetadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_metadata: Option<ProviderMetadata>,
}
