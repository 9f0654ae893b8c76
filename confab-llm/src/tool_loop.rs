//! Iterates model requests and local tool dispatch until the model stops
//! asking for tools or the call budget runs out.

use crate::client::Client;
use crate::error::{LlmError, Result};
use crate::request::HttpTransport;
use crate::types::{Message, Role, ToolChoice};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Appended as the tool result when the model names a tool the host has no
/// handler for. The model sees it and can route around the missing tool.
pub const MISSING_TOOL_MESSAGE: &str =
    "Error: the requested tool could not be found on the host machine.";

/// Uniform handler contract: the raw JSON arguments text produced by the
/// model goes in, a human-readable result string comes out. Handlers parse
/// their own arguments and should reserve `Err` for catastrophic failures.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError>;
}

pub type HandlerMap = HashMap<String, Arc<dyn ToolHandler>>;

/// One full model round: assemble the request, send it, append the top
/// assistant message.
pub async fn run_turn(
    client: &mut Client,
    transport: &dyn HttpTransport,
    tool_choice: ToolChoice,
) -> Result<()> {
    let request = client.build_http_request(tool_choice)?;
    let response = transport.send(request).await?;
    client.update_messages(&response)
}

/// Dispatches pending tool calls and keeps the exchange going.
///
/// `max_model_calls` caps the number of model requests this invocation may
/// issue; the last permitted request is forced to `ToolChoice::None` so the
/// model cannot ask for more work than the budget allows. Tool calls are
/// dispatched strictly in message order, one at a time. A handler error
/// aborts the loop; tool results appended before the failure stay in the
/// history, as do those appended before a mid-loop HTTP error.
#[tracing::instrument(level = "info", skip_all, fields(model = %client.model))]
pub async fn handle_tool_calls(
    client: &mut Client,
    handlers: &HandlerMap,
    transport: &dyn HttpTransport,
    mut max_model_calls: u32,
) -> Result<()> {
    loop {
        let Some(last) = client.last_message() else {
            return Ok(());
        };
        if last.role != Role::Assistant || last.tool_calls.is_empty() {
            return Ok(());
        }
        if max_model_calls == 0 {
            tracing::info!("tool-call budget exhausted");
            return Ok(());
        }

        let tool_choice = if max_model_calls > 1 {
            ToolChoice::Auto
        } else {
            ToolChoice::None
        };
        let calls = last.tool_calls.clone();
        tracing::info!(
            pending_calls = calls.len(),
            remaining_model_calls = max_model_calls,
            "dispatching tool calls"
        );

        for call in &calls {
            let output = match handlers.get(&call.function.name) {
                Some(handler) => {
                    handler
                        .call(&call.function.arguments)
                        .await
                        .map_err(|e| LlmError::Handler {
                            name: call.function.name.clone(),
                            message: e.to_string(),
                        })?
                }
                None => {
                    tracing::warn!(
                        tool_name = %call.function.name,
                        tool_call_id = %call.id,
                        "no handler registered for requested tool"
                    );
                    MISSING_TOOL_MESSAGE.to_string()
                }
            };
            tracing::debug!(
                tool_name = %call.function.name,
                tool_call_id = %call.id,
                output_len = output.len(),
                "tool call dispatched"
            );
            client.messages.push(Message::tool_result(call, output));
        }

        run_turn(client, transport, tool_choice).await?;
        max_model_calls -= 1;
    }
}
