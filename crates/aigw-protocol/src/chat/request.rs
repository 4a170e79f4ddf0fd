use serde::{Deserialize, Serialize};

use crate::chat::types::ChatMessage;

/// A parameter failed range or shape validation before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameter {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for InvalidParameter {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionRequestBody {
    /// Provider-prefixed model id, e.g. `anthropic/claude-3-sonnet`.
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is 0.0..=2.0.
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is 0.0..=1.0.
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is -2.0..=2.0.
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Range is -2.0..=2.0.
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Must be at least 1.
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Must be at least 1.
    pub n: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopConfiguration {
    Single(String),
    Many(Vec<String>),
}

impl ChatCompletionRequestBody {
    /// Validates shape and numeric ranges. Runs before any network or ledger
    /// activity; a failure here must never produce a ledger record.
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if self.model.trim().is_empty() {
            return Err(InvalidParameter {
                field: "model",
                message: "must be non-empty".to_string(),
            });
        }
        if self.messages.is_empty() {
            return Err(InvalidParameter {
                field: "messages",
                message: "must contain at least one message".to_string(),
            });
        }
        for (index, message) in self.messages.iter().enumerate() {
            if message.content.is_none() && message.tool_calls.is_none() {
                return Err(InvalidParameter {
                    field: "messages",
                    message: format!(
                        "message {index} has neither content nor tool_calls"
                    ),
                });
            }
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(InvalidParameter {
                field: "temperature",
                message: format!("{temperature} is outside 0..=2"),
            });
        }
        if let Some(top_p) = self.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            return Err(InvalidParameter {
                field: "top_p",
                message: format!("{top_p} is outside 0..=1"),
            });
        }
        if let Some(frequency_penalty) = self.frequency_penalty
            && !(-2.0..=2.0).contains(&frequency_penalty)
        {
            return Err(InvalidParameter {
                field: "frequency_penalty",
                message: format!("{frequency_penalty} is outside -2..=2"),
            });
        }
        if let Some(presence_penalty) = self.presence_penalty
            && !(-2.0..=2.0).contains(&presence_penalty)
        {
            return Err(InvalidParameter {
                field: "presence_penalty",
                message: format!("{presence_penalty} is outside -2..=2"),
            });
        }
        if let Some(max_tokens) = self.max_tokens
            && max_tokens < 1
        {
            return Err(InvalidParameter {
                field: "max_tokens",
                message: format!("{max_tokens} must be at least 1"),
            });
        }
        if let Some(n) = self.n
            && n < 1
        {
            return Err(InvalidParameter {
                field: "n",
                message: format!("{n} must be at least 1"),
            });
        }
        Ok(())
    }

    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::{ChatMessage, ChatMessageRole};

    fn request() -> ChatCompletionRequestBody {
        ChatCompletionRequestBody {
            model: "anthropic/claude-3-sonnet".to_string(),
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
        }
    }

    #[test]
    fn accepts_minimal_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_empty_model() {
        let mut req = request();
        req.model = "  ".to_string();
        assert_eq!(req.validate().unwrap_err().field, "model");
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut req = request();
        req.temperature = Some(2.5);
        assert_eq!(req.validate().unwrap_err().field, "temperature");
    }

    #[test]
    fn rejects_negative_top_p() {
        let mut req = request();
        req.top_p = Some(-0.1);
        assert_eq!(req.validate().unwrap_err().field, "top_p");
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let mut req = request();
        req.max_tokens = Some(0);
        assert_eq!(req.validate().unwrap_err().field, "max_tokens");
    }

    #[test]
    fn rejects_message_with_no_content_and_no_tool_calls() {
        let mut req = request();
        req.messages[0].content = None;
        assert_eq!(req.validate().unwrap_err().field, "messages");
    }

    #[test]
    fn allows_tool_call_message_without_content() {
        let mut req = request();
        req.messages[0].content = None;
        req.messages[0].tool_calls = Some(vec![serde_json::json!({"id": "call_1"})]);
        assert!(req.validate().is_ok());
    }
}
