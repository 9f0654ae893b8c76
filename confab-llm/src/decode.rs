//! Unified response decoding for every provider this crate talks to.
//!
//! The chat-completions shape is tried first, then the Anthropic messages
//! shape, then the provider error envelope. Anything else surfaces as the
//! raw body.

use crate::error::{LlmError, Result};
use crate::types::{Choice, Message, Response, Role, ToolCall, Usage};
use serde::Deserialize;

pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let trimmed = trim_leading_control(bytes);
    if let Ok(response) = serde_json::from_slice::<Response>(trimmed) {
        return Ok(response);
    }
    if let Ok(response) = serde_json::from_slice::<AnthropicResponse>(trimmed) {
        return response.into_unified();
    }
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(trimmed) {
        return Err(LlmError::Api {
            code: envelope.error.code,
            message: envelope.error.message,
        });
    }
    Err(LlmError::BadJson(
        String::from_utf8_lossy(trimmed).into_owned(),
    ))
}

/// Returns choice 0's message.
pub fn decode_top_message(bytes: &[u8]) -> Result<Message> {
    let response = decode_response(bytes)?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(LlmError::NoChoices)
}

fn trim_leading_control(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b > 0x20).unwrap_or(bytes.len());
    &bytes[start..]
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(rename = "type", default)]
    response_type: String,
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicResponse {
    /// One choice per content block; a tool_use block's input object rides
    /// through as the call's serialized arguments string.
    fn into_unified(self) -> Result<Response> {
        let finish_reason = self.stop_reason.unwrap_or_default();
        let mut choices = Vec::with_capacity(self.content.len());
        for (index, block) in self.content.into_iter().enumerate() {
            let message = match block {
                AnthropicContentBlock::Text { text } => Message::text(Role::Assistant, text, false),
                AnthropicContentBlock::ToolUse { id, name, input } => Message {
                    role: Role::Assistant,
                    content: String::new(),
                    tool_calls: vec![ToolCall::new(id, name, serde_json::to_string(&input)?)],
                    name: None,
                    tool_call_id: None,
                    cached: false,
                },
            };
            choices.push(Choice {
                index: index as u32,
                message,
                finish_reason: finish_reason.clone(),
            });
        }
        Ok(Response {
            id: self.id,
            model: self.model,
            object: self.response_type,
            created: 0,
            choices,
            usage: Usage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
                total_tokens: self.usage.input_tokens + self.usage.output_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    message: String,
}
