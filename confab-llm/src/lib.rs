//! Multi-provider LLM chat client with local tool dispatch.
//!
//! One [`Client`] holds one conversation: sampling parameters, tool
//! schemas, and the ordered message history. [`Client::build_http_request`]
//! assembles the provider-specific wire request, a [`HttpTransport`]
//! performs it, and [`handle_tool_calls`] drives the model/tool exchange
//! under a bounded call budget.

mod anthropic;
mod client;
mod decode;
mod error;
mod inject;
pub mod llama;
mod openai;
mod openrouter;
mod request;
mod tool_loop;
mod types;

pub use client::{
    Client, Provider, Route, ANTHROPIC_MESSAGES_URL, OPENAI_CHAT_URL, OPENROUTER_CHAT_URL,
};
pub use decode::{decode_response, decode_top_message};
pub use error::{LlmError, Result};
pub use request::{Header, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use tool_loop::{
    handle_tool_calls, run_turn, BoxError, HandlerMap, ToolHandler, MISSING_TOOL_MESSAGE,
};
pub use types::{
    build_tool, Choice, FunctionCall, Message, Response, Role, Tool, ToolCall, ToolChoice,
    ToolFunction, ToolParam, ToolParameters, Usage,
};
