use serde::{Deserialize, Serialize};

use crate::chat::types::ChatMessageRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatCompletionChunkObjectType {
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionStreamDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatMessageRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionStreamChoice {
    pub index: i64,
    pub delta: ChatCompletionStreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: ChatCompletionChunkObjectType,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionStreamChoice>,
}

impl ChatCompletionChunk {
    fn new(id: &str, created: i64, model: &str, choice: ChatCompletionStreamChoice) -> Self {
        Self {
            id: id.to_string(),
            object: ChatCompletionChunkObjectType::ChatCompletionChunk,
            created,
            model: model.to_string(),
            choices: vec![choice],
        }
    }

    /// Opening chunk: announces the assistant role, no content yet.
    pub fn open(id: &str, created: i64, model: &str) -> Self {
        Self::new(
            id,
            created,
            model,
            ChatCompletionStreamChoice {
                index: 0,
                delta: ChatCompletionStreamDelta {
                    role: Some(ChatMessageRole::Assistant),
                    content: None,
                },
                finish_reason: None,
            },
        )
    }

    pub fn content(id: &str, created: i64, model: &str, fragment: String) -> Self {
        Self::new(
            id,
            created,
            model,
            ChatCompletionStreamChoice {
                index: 0,
                delta: ChatCompletionStreamDelta {
                    role: None,
                    content: Some(fragment),
                },
                finish_reason: None,
            },
        )
    }

    /// Closing chunk: empty delta, `finish_reason: "stop"`.
    pub fn close(id: &str, created: i64, model: &str) -> Self {
        Self::new(
            id,
            created,
            model,
            ChatCompletionStreamChoice {
                index: 0,
                delta: ChatCompletionStreamDelta::default(),
                finish_reason: Some("stop".to_string()),
            },
        )
    }
}
