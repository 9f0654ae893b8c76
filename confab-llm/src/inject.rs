//! Splices the message array and tool schemas into an encoded base body.
//!
//! A message's content is heterogeneous on the wire (plain string or an
//! array of content blocks, depending on the cache annotation), so the
//! wire forms are assembled here rather than modelled as one serializable
//! union on the message type itself.

use crate::types::{Message, Tool, ToolCall, ToolChoice};
use serde_json::{json, Map, Value};

/// Wire dialect of the target endpoint. OpenRouter and OpenAI-compatible
/// endpoints speak the OpenAI dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    OpenAi,
    Anthropic,
}

/// Fills the base body's messages slot. A body without such a slot passes
/// through unchanged.
pub(crate) fn splice_messages(body: &mut Value, messages: &[&Message], cache_capable: bool) {
    let Some(slot) = body.get_mut("messages") else {
        return;
    };
    *slot = Value::Array(
        messages
            .iter()
            .map(|m| message_value(m, cache_capable))
            .collect(),
    );
}

fn message_value(message: &Message, cache_capable: bool) -> Value {
    let mut obj = Map::new();
    obj.insert("role".to_string(), json!(message.role.as_str()));

    // Tool results always carry plain string content, even when marked
    // cached; cache blocks only exist where the provider honours them.
    if cache_capable && message.cached && message.tool_call_id.is_none() {
        obj.insert(
            "content".to_string(),
            json!([{
                "type": "text",
                "text": message.content,
                "cache_control": { "type": "ephemeral" },
            }]),
        );
    } else {
        obj.insert("content".to_string(), json!(message.content));
    }

    if !message.tool_calls.is_empty() {
        obj.insert(
            "tool_calls".to_string(),
            Value::Array(message.tool_calls.iter().map(tool_call_value).collect()),
        );
    }
    if let Some(name) = &message.name {
        obj.insert("name".to_string(), json!(name));
    }
    if let Some(id) = &message.tool_call_id {
        obj.insert("tool_call_id".to_string(), json!(id));
    }
    Value::Object(obj)
}

fn tool_call_value(call: &ToolCall) -> Value {
    json!({
        "id": call.id,
        "type": call.call_type,
        "function": {
            "name": call.function.name,
            "arguments": call.function.arguments,
        },
    })
}

/// Appends tool schemas and the tool-choice policy. With no tools the body
/// is left alone entirely, tool_choice included.
pub(crate) fn splice_tools(
    body: &mut Value,
    dialect: Dialect,
    tools: &[Tool],
    tool_choice: &ToolChoice,
) {
    if tools.is_empty() {
        return;
    }
    let Some(obj) = body.as_object_mut() else {
        return;
    };
    obj.insert(
        "tools".to_string(),
        Value::Array(tools.iter().map(|t| tool_value(dialect, t)).collect()),
    );
    if let Some(choice) = tool_choice_value(dialect, tool_choice) {
        obj.insert("tool_choice".to_string(), choice);
    }
}

fn tool_value(dialect: Dialect, tool: &Tool) -> Value {
    let function = &tool.function;
    let properties = Value::Object(function.parameters.properties.clone());
    match dialect {
        Dialect::OpenAi => json!({
            "type": tool.tool_type,
            "function": {
                "name": function.name,
                "description": function.description,
                "parameters": {
                    "type": function.parameters.schema_type,
                    "properties": properties,
                },
                "required": function.required,
            },
        }),
        Dialect::Anthropic => json!({
            "name": function.name,
            "description": function.description,
            "input_schema": {
                "type": function.parameters.schema_type,
                "properties": properties,
                "required": function.required,
            },
        }),
    }
}

fn tool_choice_value(dialect: Dialect, tool_choice: &ToolChoice) -> Option<Value> {
    match (dialect, tool_choice) {
        (Dialect::Anthropic, ToolChoice::None) => None,
        (Dialect::Anthropic, ToolChoice::Auto) => Some(json!({ "type": "auto" })),
        (Dialect::OpenAi, ToolChoice::None) => Some(json!("none")),
        (Dialect::OpenAi, ToolChoice::Auto) => Some(json!("auto")),
        (_, ToolChoice::Tool(name)) => {
            Some(json!({ "type": "function", "function": { "name": name } }))
        }
    }
}
