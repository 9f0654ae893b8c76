use crate::client::{append_system_text, Client};
use crate::types::Role;
use serde::Serialize;
use serde_json::Value;

pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Restricted base-body field set for the Anthropic messages API. The
/// system prompt lives outside the messages array.
#[derive(Debug, Serialize)]
pub(crate) struct AnthropicBody<'a> {
    pub model: &'a str,
    pub messages: Vec<Value>,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

pub(crate) fn base_body(client: &Client) -> AnthropicBody<'_> {
    AnthropicBody {
        model: &client.model,
        messages: Vec::new(),
        temperature: client.temperature,
        top_p: client.top_p,
        top_k: client.top_k,
        seed: client.seed,
        max_tokens: client.max_tokens,
        system: (!client.system.is_empty()).then_some(client.system.as_str()),
        stream: client.stream.then_some(true),
    }
}

/// Folds any system-role messages in the history into the client's system
/// field before a request. Content already present as a substring is not
/// appended twice; the messages themselves stay in the history and are
/// excluded from the request's message array by the adapter.
pub(crate) fn fold_system_messages(client: &mut Client) {
    let mut system = std::mem::take(&mut client.system);
    for message in &client.messages {
        if message.role == Role::System && !system.contains(&message.content) {
            append_system_text(&mut system, &message.content);
        }
    }
    client.system = system;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Provider;
    use crate::types::Message;

    fn anthropic_client() -> Client {
        Client::new(Provider::Anthropic, "k", "claude-3-5-sonnet-20241022").unwrap()
    }

    #[test]
    fn fold_concatenates_new_system_content() {
        let mut client = anthropic_client().with_system("S0");
        client
            .messages
            .push(Message::text(Role::System, "S1", false));
        fold_system_messages(&mut client);
        assert_eq!(client.system, "S0\nS1");
    }

    #[test]
    fn fold_skips_content_already_present() {
        let mut client = anthropic_client().with_system("S0\nS1");
        client
            .messages
            .push(Message::text(Role::System, "S1", false));
        fold_system_messages(&mut client);
        assert_eq!(client.system, "S0\nS1");
    }

    #[test]
    fn empty_system_is_omitted_from_the_body() {
        let client = anthropic_client();
        let v = serde_json::to_value(base_body(&client)).unwrap();
        assert!(!v.as_object().unwrap().contains_key("system"));
    }
}
