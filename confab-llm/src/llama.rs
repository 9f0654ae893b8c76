//! Llama-style instruct prompt tags and the raw completion request path.
//!
//! For local OpenAI-compatible servers that serve base or instruct models
//! without a chat template. No tool or cache handling here.

use crate::client::{Client, Provider};
use crate::error::{LlmError, Result};
use crate::request::{Header, HttpRequest, CONTENT_TYPE_JSON};
use crate::types::{Message, Role};
use serde::Serialize;

pub const BOS: &str = "<s>";
pub const EOS: &str = "</s>";
pub const INST_OPEN: &str = "[INST]";
pub const INST_CLOSE: &str = "[/INST]";
pub const SYS_OPEN: &str = "<<SYS>>";
pub const SYS_CLOSE: &str = "<</SYS>>";

/// Formats a chat history into a Llama instruct prompt. Leading system
/// messages form the `<<SYS>>` block of the first instruction; tool
/// messages have no place in this format and are skipped.
pub fn format_chat_prompt(messages: &[Message]) -> String {
    let mut system = String::new();
    let mut prompt = String::new();
    let mut open_instruction = false;

    for message in messages {
        match message.role {
            Role::System => {
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(&message.content);
            }
            Role::User => {
                if !open_instruction {
                    prompt.push_str(BOS);
                    prompt.push_str(INST_OPEN);
                    prompt.push(' ');
                    if !system.is_empty() {
                        prompt.push_str(SYS_OPEN);
                        prompt.push('\n');
                        prompt.push_str(&system);
                        prompt.push('\n');
                        prompt.push_str(SYS_CLOSE);
                        prompt.push_str("\n\n");
                        system.clear();
                    }
                    open_instruction = true;
                } else {
                    prompt.push('\n');
                }
                prompt.push_str(&message.content);
            }
            Role::Assistant => {
                if open_instruction {
                    prompt.push(' ');
                    prompt.push_str(INST_CLOSE);
                    open_instruction = false;
                }
                prompt.push(' ');
                prompt.push_str(&message.content);
                prompt.push(' ');
                prompt.push_str(EOS);
            }
            Role::Tool => {}
        }
    }

    if open_instruction {
        prompt.push(' ');
        prompt.push_str(INST_CLOSE);
    }
    prompt
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Assembles a raw text-completion request against an OpenAI-compatible
/// endpoint. The caller's URL should point at the server's completions
/// route.
pub fn build_completion_request(client: &Client, prompt: &str) -> Result<HttpRequest> {
    let Provider::OpenAiCompatible { url } = &client.provider else {
        return Err(LlmError::InvalidInput(
            "raw completions require an OpenAI-compatible endpoint".to_string(),
        ));
    };

    let body = serde_json::to_vec(&CompletionBody {
        model: &client.model,
        prompt,
        temperature: client.temperature,
        top_p: client.top_p,
        seed: client.seed,
        max_tokens: client.max_tokens,
        stream: client.stream.then_some(true),
    })?;

    let headers = vec![
        Header::new(CONTENT_TYPE_JSON.0, CONTENT_TYPE_JSON.1),
        Header::new("authorization", format!("Bearer {}", client.api_key)),
    ];
    let mut request = HttpRequest::post(url.clone(), headers, body);
    request.timeout = client.timeout;
    Ok(request)
}
