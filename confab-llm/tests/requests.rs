//! Request assembly and tool-loop behavior, end to end, over a scripted
//! transport.

use async_trait::async_trait;
use confab_llm::{
    build_tool, handle_tool_calls, Client, HandlerMap, HttpRequest, HttpResponse, HttpTransport,
    LlmError, Message, Provider, Role, Route, ToolChoice, ToolHandler, ToolParam,
    MISSING_TOOL_MESSAGE,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request_body(&self, index: usize) -> Value {
        serde_json::from_slice(&self.requests.lock().unwrap()[index].body).unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> confab_llm::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("script exhausted".to_string()))
    }
}

fn ok_response(body: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![],
        body: body.to_string().into_bytes(),
    }
}

fn chat_body(content: &str, tool_calls: &[(&str, &str, &str)]) -> Value {
    let calls: Vec<Value> = tool_calls
        .iter()
        .map(|(id, name, arguments)| {
            json!({
                "id": id,
                "type": "function",
                "function": { "name": name, "arguments": arguments },
            })
        })
        .collect();
    let mut message = json!({ "role": "assistant", "content": content });
    if !calls.is_empty() {
        message["tool_calls"] = Value::Array(calls);
    }
    json!({
        "id": "chatcmpl-test",
        "model": "test-model",
        "object": "chat.completion",
        "created": 1727000000,
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }],
        "usage": { "prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2 },
    })
}

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, arguments: &str) -> Result<String, confab_llm::BoxError> {
        Ok(format!("echo: {arguments}"))
    }
}

struct FailingHandler;

#[async_trait]
impl ToolHandler for FailingHandler {
    async fn call(&self, _arguments: &str) -> Result<String, confab_llm::BoxError> {
        Err("disk on fire".into())
    }
}

fn handlers(entries: &[(&str, Arc<dyn ToolHandler>)]) -> HandlerMap {
    entries
        .iter()
        .map(|(name, handler)| (name.to_string(), Arc::clone(handler)))
        .collect()
}

fn assistant_with_call(id: &str, name: &str) -> Message {
    let mut message = Message::text(Role::Assistant, "", false);
    message.tool_calls = vec![confab_llm::ToolCall::new(id, name, "{}")];
    message
}

fn sample_tool() -> confab_llm::Tool {
    build_tool(
        "echo",
        "Echoes its arguments.",
        &[ToolParam::new("text", "string", "Text to echo.", true)],
    )
}

#[test]
fn openai_hello() {
    let mut client = Client::new(Provider::OpenAi, "sk-X", "gpt-4o-mini").unwrap();
    client.add_user("Hello, computer!", false);
    let request = client.build_http_request(ToolChoice::Auto).unwrap();

    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer sk-X"));
    assert_eq!(request.header("content-type"), Some("application/json"));

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(
        body["messages"],
        json!([{ "role": "user", "content": "Hello, computer!" }])
    );
    let obj = body.as_object().unwrap();
    assert!(!obj.contains_key("tools"));
    assert!(!obj.contains_key("tool_choice"));
    assert!(!obj.contains_key("seed"));
    assert!(!obj.contains_key("max_completion_tokens"));
}

#[test]
fn anthropic_system_stripping() {
    let mut client = Client::new(Provider::Anthropic, "k", "claude-3-5-sonnet-20241022")
        .unwrap()
        .with_max_tokens(4096)
        .with_system("S0");
    client.add_system("S1", false);
    client.add_user("hi", false);
    let request = client.build_http_request(ToolChoice::Auto).unwrap();

    assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(request.header("x-api-key"), Some("k"));
    assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["system"], "S0\nS1");
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "hi" }]));
}

#[test]
fn anthropic_history_system_messages_are_folded_and_stripped() {
    let mut client = Client::new(Provider::Anthropic, "k", "claude-3-5-sonnet-20241022")
        .unwrap()
        .with_system("S0");
    // A system turn that arrived in the history rather than through
    // add_system, e.g. built by a caller switching providers mid-flight.
    client
        .messages
        .push(Message::text(Role::System, "S1", false));
    client.add_user("hi", false);
    let request = client.build_http_request(ToolChoice::Auto).unwrap();

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["system"], "S0\nS1");
    for message in body["messages"].as_array().unwrap() {
        assert_ne!(message["role"], "system");
    }
    // The history itself keeps the system turn.
    assert_eq!(client.messages.len(), 2);
    assert_eq!(client.system, "S0\nS1");
}

#[tokio::test]
async fn unknown_tool_reports_and_continues() {
    let mut client = Client::new(Provider::OpenAi, "k", "gpt-4o-mini")
        .unwrap()
        .with_tool(sample_tool());
    client.add_user("frob it", false);
    client.messages.push(assistant_with_call("call_1", "frob"));

    let transport = ScriptedTransport::new(vec![ok_response(chat_body("all done", &[]))]);
    handle_tool_calls(&mut client, &HandlerMap::new(), &transport, 5)
        .await
        .unwrap();

    let tool_message = &client.messages[2];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.content, MISSING_TOOL_MESSAGE);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.name.as_deref(), Some("frob"));

    assert_eq!(transport.request_body(0)["tool_choice"], "auto");
    assert_eq!(client.last_message().unwrap().content, "all done");
}

#[tokio::test]
async fn budget_exhaustion_stops_after_two_requests() {
    let mut client = Client::new(Provider::OpenAi, "k", "gpt-4o-mini")
        .unwrap()
        .with_tool(sample_tool());
    client.add_user("loop forever", false);
    client.messages.push(assistant_with_call("call_0", "echo"));

    let transport = ScriptedTransport::new(vec![
        ok_response(chat_body("more", &[("call_1", "echo", "{}")])),
        ok_response(chat_body("again", &[("call_2", "echo", "{}")])),
    ]);
    let map = handlers(&[("echo", Arc::new(EchoHandler) as Arc<dyn ToolHandler>)]);
    handle_tool_calls(&mut client, &map, &transport, 2)
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.request_body(0)["tool_choice"], "auto");
    assert_eq!(transport.request_body(1)["tool_choice"], "none");

    // The second assistant message lands even though it still wants tools.
    let last = client.last_message().unwrap();
    assert_eq!(last.content, "again");
    assert_eq!(last.tool_calls.len(), 1);
}

#[tokio::test]
async fn http_failure_mid_loop_keeps_partial_progress() {
    let mut client = Client::new(Provider::OpenAi, "k", "gpt-4o-mini").unwrap();
    client.add_user("go", false);
    client.messages.push(assistant_with_call("call_0", "echo"));

    let transport = ScriptedTransport::new(vec![
        ok_response(chat_body("working on it", &[("call_1", "echo", "{}")])),
        HttpResponse {
            status: 500,
            headers: vec![],
            body: b"down".to_vec(),
        },
    ]);
    let map = handlers(&[("echo", Arc::new(EchoHandler) as Arc<dyn ToolHandler>)]);
    let err = handle_tool_calls(&mut client, &map, &transport, 5)
        .await
        .unwrap_err();

    match err {
        LlmError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "down");
        }
        other => panic!("unexpected error: {other}"),
    }

    // user, seeded assistant, its tool result, the first real assistant
    // turn, and the tool result dispatched before the failing call.
    let roles: Vec<Role> = client.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
    );
    assert_eq!(client.messages[3].content, "working on it");
}

#[test]
fn openrouter_extras_present_and_absent() {
    let mut with_extras = Client::new(Provider::OpenRouter, "k", "m")
        .unwrap()
        .with_provider_order(vec!["A".into(), "B".into()])
        .with_route(Route::Fallback)
        .with_models(vec!["m1".into(), "m2".into()]);
    with_extras.add_user("hi", false);
    let body: Value =
        serde_json::from_slice(&with_extras.build_http_request(ToolChoice::Auto).unwrap().body)
            .unwrap();
    assert_eq!(body["provider"], json!({ "order": ["A", "B"] }));
    assert_eq!(body["route"], "fallback");
    assert_eq!(body["models"], json!(["m1", "m2"]));

    let mut bare = Client::new(Provider::OpenRouter, "k", "m").unwrap();
    bare.add_user("hi", false);
    let body: Value =
        serde_json::from_slice(&bare.build_http_request(ToolChoice::Auto).unwrap().body).unwrap();
    let obj = body.as_object().unwrap();
    assert!(!obj.contains_key("provider"));
    assert!(!obj.contains_key("route"));
    assert!(!obj.contains_key("models"));
}

#[test]
fn openrouter_cached_message_uses_cache_control_block() {
    let mut client = Client::new(Provider::OpenRouter, "k", "m").unwrap();
    client.add_user("big stable prefix", true);
    let body: Value =
        serde_json::from_slice(&client.build_http_request(ToolChoice::Auto).unwrap().body).unwrap();
    assert_eq!(
        body["messages"][0]["content"],
        json!([{
            "type": "text",
            "text": "big stable prefix",
            "cache_control": { "type": "ephemeral" },
        }])
    );

    // The same annotation is dropped where the provider ignores it.
    let mut openai = Client::new(Provider::OpenAi, "k", "m").unwrap();
    openai.add_user("big stable prefix", true);
    let body: Value =
        serde_json::from_slice(&openai.build_http_request(ToolChoice::Auto).unwrap().body).unwrap();
    assert_eq!(body["messages"][0]["content"], "big stable prefix");
}

#[test]
fn every_provider_emits_well_formed_json() {
    let providers = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::OpenRouter,
        Provider::OpenAiCompatible {
            url: "http://localhost:8080/v1/chat/completions".to_string(),
        },
    ];
    let choices = [
        ToolChoice::None,
        ToolChoice::Auto,
        ToolChoice::Tool("echo".to_string()),
    ];
    for provider in providers {
        for tools in [vec![], vec![sample_tool()]] {
            for choice in &choices {
                let mut client = Client::new(provider.clone(), "k", "m")
                    .unwrap()
                    .with_tools(tools.clone());
                client.add_system("sys", false);
                client.add_user("cached", true);
                client.add_assistant("prior answer", false);
                client.add_user("next", false);
                let request = client.build_http_request(choice.clone()).unwrap();
                let body: Value = serde_json::from_slice(&request.body)
                    .unwrap_or_else(|e| panic!("invalid json for {provider:?}: {e}"));
                if tools.is_empty() {
                    assert!(!body.as_object().unwrap().contains_key("tool_choice"));
                }
            }
        }
    }
}

#[test]
fn message_order_is_preserved() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    client.add_system("a", false);
    client.add_user("b", false);
    client.add_assistant("c", false);
    client.add_user("d", false);
    let body: Value =
        serde_json::from_slice(&client.build_http_request(ToolChoice::Auto).unwrap().body).unwrap();
    let contents: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["a", "b", "c", "d"]);
}

#[tokio::test]
async fn budget_is_a_hard_request_ceiling() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    client.messages.push(assistant_with_call("call_0", "echo"));
    let responses: Vec<HttpResponse> = (0..3)
        .map(|i| {
            let id = format!("call_{}", i + 1);
            ok_response(chat_body("still going", &[(id.as_str(), "echo", "{}")]))
        })
        .collect();
    let transport = ScriptedTransport::new(responses);
    let map = handlers(&[("echo", Arc::new(EchoHandler) as Arc<dyn ToolHandler>)]);
    handle_tool_calls(&mut client, &map, &transport, 3)
        .await
        .unwrap();
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn single_call_budget_makes_exactly_one_request() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    client.messages.push(assistant_with_call("call_0", "echo"));
    let transport = ScriptedTransport::new(vec![ok_response(chat_body(
        "still wants tools",
        &[("call_1", "echo", "{}")],
    ))]);
    let map = handlers(&[("echo", Arc::new(EchoHandler) as Arc<dyn ToolHandler>)]);
    handle_tool_calls(&mut client, &map, &transport, 1)
        .await
        .unwrap();
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn loop_is_a_no_op_without_pending_tool_calls() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    client.add_user("hi", false);
    client.add_assistant("plain answer", false);
    let transport = ScriptedTransport::new(vec![]);
    handle_tool_calls(&mut client, &HandlerMap::new(), &transport, 5)
        .await
        .unwrap();
    assert_eq!(transport.request_count(), 0);
    assert_eq!(client.messages.len(), 2);
}

#[tokio::test]
async fn handler_failure_aborts_and_keeps_prior_results() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    let mut assistant = Message::text(Role::Assistant, "", false);
    assistant.tool_calls = vec![
        confab_llm::ToolCall::new("call_a", "echo", "{}"),
        confab_llm::ToolCall::new("call_b", "burn", "{}"),
    ];
    client.messages.push(assistant);

    let transport = ScriptedTransport::new(vec![]);
    let map = handlers(&[
        ("echo", Arc::new(EchoHandler) as Arc<dyn ToolHandler>),
        ("burn", Arc::new(FailingHandler) as Arc<dyn ToolHandler>),
    ]);
    let err = handle_tool_calls(&mut client, &map, &transport, 5)
        .await
        .unwrap_err();
    match err {
        LlmError::Handler { name, message } => {
            assert_eq!(name, "burn");
            assert!(message.contains("disk on fire"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // The first call's result was already appended and stays.
    assert_eq!(client.messages.len(), 2);
    assert_eq!(client.messages[1].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn timeout_is_carried_into_the_request() {
    let mut client = Client::new(Provider::OpenAi, "k", "m")
        .unwrap()
        .with_timeout(std::time::Duration::from_millis(2500));
    client.add_user("hi", false);
    let request = client.build_http_request(ToolChoice::Auto).unwrap();
    assert_eq!(request.timeout, Some(std::time::Duration::from_millis(2500)));
}

#[test]
fn compatible_endpoint_uses_caller_url_and_openai_shape() {
    let mut client = Client::new(
        Provider::OpenAiCompatible {
            url: "http://localhost:8080/v1/chat/completions".to_string(),
        },
        "",
        "local-model",
    )
    .unwrap();
    client.add_user("hi", false);
    let request = client.build_http_request(ToolChoice::Auto).unwrap();
    assert_eq!(request.url, "http://localhost:8080/v1/chat/completions");
    // Empty keys are allowed for local servers; the header is still sent.
    assert_eq!(request.header("authorization"), Some("Bearer "));
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["model"], "local-model");
    assert!(body.as_object().unwrap().contains_key("frequency_penalty"));
    assert!(!body.as_object().unwrap().contains_key("top_k"));
}

#[tokio::test]
async fn update_messages_appends_the_decoded_top_choice() {
    let mut client = Client::new(Provider::OpenAi, "k", "m").unwrap();
    client.add_user("hi", false);
    let body = chat_body("hello", &[("call_1", "echo", r#"{"text":"x"}"#)]);
    let response = ok_response(body.clone());
    client.update_messages(&response).unwrap();

    let appended = client.last_message().unwrap().clone();
    let decoded = confab_llm::decode_top_message(&response.body).unwrap();
    assert_eq!(appended, decoded);
    assert_eq!(appended.tool_calls[0].function.arguments, r#"{"text":"x"}"#);
}
