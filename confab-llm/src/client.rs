use crate::decode;
use crate::error::{LlmError, Result};
use crate::inject;
use crate::request::{Header, HttpRequest, HttpResponse, CONTENT_TYPE_JSON};
use crate::types::{Message, Role, Tool, ToolChoice};
use crate::{anthropic, openai, openrouter};
use std::time::Duration;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// An HTTP endpoint family the client knows how to talk to. The wire
/// differences are local enough that a direct match is the right shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    OpenRouter,
    /// Any endpoint accepting the OpenAI body shape, e.g. a local server.
    OpenAiCompatible { url: String },
}

impl Provider {
    pub fn chat_url(&self) -> &str {
        match self {
            Provider::OpenAi => OPENAI_CHAT_URL,
            Provider::Anthropic => ANTHROPIC_MESSAGES_URL,
            Provider::OpenRouter => OPENROUTER_CHAT_URL,
            Provider::OpenAiCompatible { url } => url,
        }
    }

    fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::OpenAiCompatible { .. })
    }

    pub(crate) fn dialect(&self) -> inject::Dialect {
        match self {
            Provider::Anthropic => inject::Dialect::Anthropic,
            _ => inject::Dialect::OpenAi,
        }
    }

    /// Ephemeral prompt caching is honoured on OpenRouter (which forwards
    /// Anthropic cache_control blocks); everywhere else the annotation is
    /// dropped and content serializes as a plain string.
    pub(crate) fn supports_prompt_cache(&self) -> bool {
        matches!(self, Provider::OpenRouter)
    }
}

/// OpenRouter routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Fallback,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Fallback => "fallback",
        }
    }
}

/// One conversation: provider, sampling parameters, tool schemas, and the
/// ordered message history. Not shared across threads; every mutation goes
/// through the builder operations or [`Client::update_messages`].
#[derive(Debug, Clone)]
pub struct Client {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub timeout: Option<Duration>,

    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub repetition_penalty: f64,
    pub min_p: f64,
    pub top_a: f64,

    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
    pub provider_order: Vec<String>,
    pub models: Vec<String>,
    pub route: Option<Route>,
    pub tools: Vec<Tool>,
    pub system: String,
    pub stream: bool,

    pub messages: Vec<Message>,
}

impl Client {
    pub fn new(
        provider: Provider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() && provider.requires_api_key() {
            return Err(LlmError::InvalidInput(format!(
                "an api key is required for {provider:?}"
            )));
        }
        Ok(Self {
            provider,
            api_key,
            model: model.into(),
            timeout: None,
            temperature: 1.0,
            top_p: 1.0,
            top_k: 0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            repetition_penalty: 1.0,
            min_p: 0.0,
            top_a: 0.0,
            seed: None,
            max_tokens: None,
            provider_order: Vec::new(),
            models: Vec::new(),
            route: None,
            tools: Vec::new(),
            system: String::new(),
            stream: false,
            messages: Vec::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = penalty;
        self
    }

    pub fn with_repetition_penalty(mut self, penalty: f64) -> Self {
        self.repetition_penalty = penalty;
        self
    }

    pub fn with_min_p(mut self, min_p: f64) -> Self {
        self.min_p = min_p;
        self
    }

    pub fn with_top_a(mut self, top_a: f64) -> Self {
        self.top_a = top_a;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// OpenRouter upstream preference order.
    pub fn with_provider_order(mut self, order: Vec<String>) -> Self {
        self.provider_order = order;
        self
    }

    /// OpenRouter alternate model list.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Appends system guidance. On Anthropic the content goes straight into
    /// the top-level system field; elsewhere it becomes a system message.
    pub fn add_system(&mut self, text: &str, cached: bool) {
        if self.provider == Provider::Anthropic {
            append_system_text(&mut self.system, text);
            return;
        }
        self.messages.push(Message::text(Role::System, text, cached));
    }

    pub fn add_user(&mut self, text: &str, cached: bool) {
        self.messages.push(Message::text(Role::User, text, cached));
    }

    pub fn add_assistant(&mut self, text: &str, cached: bool) {
        self.messages
            .push(Message::text(Role::Assistant, text, cached));
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Assembles the provider-specific request for the current state.
    ///
    /// Body construction is staged: the restricted base body first, then the
    /// message splice, then the tool splice. For Anthropic, system-role
    /// messages are folded into the system field beforehand and excluded
    /// from the request's message array (the history keeps them).
    pub fn build_http_request(&mut self, tool_choice: ToolChoice) -> Result<HttpRequest> {
        if self.provider == Provider::Anthropic {
            anthropic::fold_system_messages(self);
        }
        let mut body = match &self.provider {
            Provider::OpenAi | Provider::OpenAiCompatible { .. } => {
                serde_json::to_value(openai::base_body(self))?
            }
            Provider::OpenRouter => serde_json::to_value(openrouter::base_body(self))?,
            Provider::Anthropic => serde_json::to_value(anthropic::base_body(self))?,
        };

        let request_messages: Vec<&Message> = match self.provider {
            Provider::Anthropic => self
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .collect(),
            _ => self.messages.iter().collect(),
        };
        inject::splice_messages(
            &mut body,
            &request_messages,
            self.provider.supports_prompt_cache(),
        );
        inject::splice_tools(&mut body, self.provider.dialect(), &self.tools, &tool_choice);

        let bytes = serde_json::to_vec(&body)?;
        tracing::debug!(
            provider = ?self.provider,
            model = %self.model,
            message_count = request_messages.len(),
            tool_count = self.tools.len(),
            body_len = bytes.len(),
            "request assembled"
        );

        let mut request = HttpRequest::post(self.provider.chat_url(), self.request_headers(), bytes);
        request.timeout = self.timeout;
        Ok(request)
    }

    fn request_headers(&self) -> Vec<Header> {
        let mut headers = vec![Header::new(CONTENT_TYPE_JSON.0, CONTENT_TYPE_JSON.1)];
        match &self.provider {
            Provider::Anthropic => {
                headers.push(Header::new("x-api-key", &self.api_key));
                headers.push(Header::new("anthropic-version", anthropic::ANTHROPIC_VERSION));
            }
            _ => {
                headers.push(Header::new(
                    "authorization",
                    format!("Bearer {}", self.api_key),
                ));
            }
        }
        headers
    }

    /// Appends the response's top assistant message to the history. A
    /// non-2xx status surfaces as [`LlmError::Http`] and leaves the client
    /// untouched.
    pub fn update_messages(&mut self, response: &HttpResponse) -> Result<()> {
        if !response.is_success() {
            return Err(LlmError::Http {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        let message = decode::decode_top_message(&response.body)?;
        tracing::debug!(
            tool_calls = message.tool_calls.len(),
            content_len = message.content.len(),
            "assistant message appended"
        );
        self.messages.push(message);
        Ok(())
    }
}

pub(crate) fn append_system_text(system: &mut String, text: &str) {
    if !system.is_empty() {
        system.push('\n');
    }
    system.push_str(text);
}
