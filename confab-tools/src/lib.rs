//! Prebuilt tools for the confab tool-calling loop.
//!
//! Every tool is a `(schema, handler)` pair: the schema goes on the client
//! for the model to see, the handler is dispatched through the uniform
//! raw-arguments contract.

mod clock;
mod compiler;
mod env;
mod error;
mod filesystem;
mod traits;
mod web;

pub use clock::ClockTool;
pub use compiler::CompilerTool;
pub use env::get_env_var;
pub use error::{Result, ToolError};
pub use filesystem::FilesystemTool;
pub use traits::{LocalTool, Toolbox};
pub use web::{WeatherTool, WebSearchTool, WikipediaTool, WolframTool, WOLFRAM_APP_ID_VAR};

use std::path::Path;
use std::time::Duration;

/// The full prebuilt tool set, with the filesystem tool rooted at the
/// given directory.
pub fn standard_toolbox(root_dir: impl AsRef<Path>) -> Result<Toolbox> {
    let mut toolbox = Toolbox::new();
    toolbox.install(FilesystemTool::new(root_dir)?);
    toolbox.install(WebSearchTool::new());
    toolbox.install(WikipediaTool::new());
    toolbox.install(WeatherTool::new());
    toolbox.install(WolframTool::new());
    toolbox.install(ClockTool);
    toolbox.install(CompilerTool::new(Duration::from_secs(10)));
    Ok(toolbox)
}
