use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("response is not valid json: {0}")]
    BadJson(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("response contained no choices")]
    NoChoices,

    #[error("tool handler '{name}' failed: {message}")]
    Handler { name: String, message: String },
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
