use crate::error::{Result, ToolError};
use confab_llm::{HandlerMap, Tool, ToolHandler};
use serde_json::Value;
use std::sync::Arc;

/// A prebuilt tool: a schema the model sees plus the handler the loop
/// dispatches to.
pub trait LocalTool: ToolHandler {
    fn schema(&self) -> Tool;
}

/// Collects schemas and handlers for registration on a client.
#[derive(Default)]
pub struct Toolbox {
    schemas: Vec<Tool>,
    handlers: HandlerMap,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install<T: LocalTool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        tracing::debug!(tool_name = %schema.function.name, "tool installed");
        self.handlers
            .insert(schema.function.name.clone(), Arc::new(tool));
        self.schemas.push(schema);
    }

    pub fn schemas(&self) -> &[Tool] {
        &self.schemas
    }

    pub fn into_parts(self) -> (Vec<Tool>, HandlerMap) {
        (self.schemas, self.handlers)
    }
}

/// Parses the raw arguments text the model produced. A blank payload is
/// treated as an empty object; several models send one for no-argument
/// tools.
pub(crate) fn parse_arguments(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))
}

pub(crate) fn require_string(args: &Value, key: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "key {key} must be a string, got {other}"
        ))),
        None => Err(ToolError::InvalidArguments(format!("missing key: {key}"))),
    }
}

pub(crate) fn optional_string(args: &Value, key: &str) -> Result<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "key {key} must be a string, got {other}"
        ))),
    }
}

pub(crate) fn require_f64(args: &Value, key: &str) -> Result<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            ToolError::InvalidArguments(format!("key {key} is out of range"))
        }),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "key {key} must be a number, got {other}"
        ))),
        None => Err(ToolError::InvalidArguments(format!("missing key: {key}"))),
    }
}
