use crate::traits::LocalTool;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use confab_llm::{build_tool, BoxError, Tool, ToolHandler};

/// Reports the current UTC time. Takes no arguments.
pub struct ClockTool;

#[async_trait]
impl ToolHandler for ClockTool {
    async fn call(&self, _arguments: &str) -> std::result::Result<String, BoxError> {
        Ok(format!(
            "The current UTC time is {}.",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ))
    }
}

impl LocalTool for ClockTool {
    fn schema(&self) -> Tool {
        build_tool("clock", "Current date and time in UTC.", &[])
    }
}
