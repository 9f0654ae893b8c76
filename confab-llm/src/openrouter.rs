use crate::client::Client;
use serde::Serialize;
use serde_json::Value;

/// OpenRouter takes the OpenAI field set plus its own sampling knobs and
/// routing controls.
#[derive(Debug, Serialize)]
pub(crate) struct OpenRouterBody<'a> {
    pub model: &'a str,
    pub messages: Vec<Value>,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub repetition_penalty: f64,
    pub min_p: f64,
    pub top_a: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPrefs<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProviderPrefs<'a> {
    pub order: &'a [String],
}

pub(crate) fn base_body(client: &Client) -> OpenRouterBody<'_> {
    OpenRouterBody {
        model: &client.model,
        messages: Vec::new(),
        temperature: client.temperature,
        top_p: client.top_p,
        top_k: client.top_k,
        frequency_penalty: client.frequency_penalty,
        presence_penalty: client.presence_penalty,
        repetition_penalty: client.repetition_penalty,
        min_p: client.min_p,
        top_a: client.top_a,
        seed: client.seed,
        max_completion_tokens: client.max_tokens,
        provider: (!client.provider_order.is_empty()).then(|| ProviderPrefs {
            order: &client.provider_order,
        }),
        models: (!client.models.is_empty()).then_some(client.models.as_slice()),
        route: client.route.map(|r| r.as_str()),
        stream: client.stream.then_some(true),
    }
}
