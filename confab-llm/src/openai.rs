use crate::client::Client;
use serde::Serialize;
use serde_json::Value;

/// Restricted base-body field set for OpenAI and OpenAI-compatible
/// endpoints. The messages slot is filled by the injector.
#[derive(Debug, Serialize)]
pub(crate) struct OpenAiBody<'a> {
    pub model: &'a str,
    pub messages: Vec<Value>,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

pub(crate) fn base_body(client: &Client) -> OpenAiBody<'_> {
    OpenAiBody {
        model: &client.model,
        messages: Vec::new(),
        temperature: client.temperature,
        top_p: client.top_p,
        frequency_penalty: client.frequency_penalty,
        presence_penalty: client.presence_penalty,
        seed: client.seed,
        max_completion_tokens: client.max_tokens,
        stream: client.stream.then_some(true),
    }
}
