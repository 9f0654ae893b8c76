use crate::error::{Result, ToolError};
use crate::traits::{parse_arguments, require_string, LocalTool};
use async_trait::async_trait;
use confab_llm::{build_tool, BoxError, Tool, ToolHandler, ToolParam};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const OUTPUT_BYTES_MAX: usize = 32_000;

/// Compiles a Rust source snippet with `rustc` in a throwaway directory
/// and runs the produced binary. Everything stays inside the temp dir.
pub struct CompilerTool {
    run_timeout: Duration,
}

impl CompilerTool {
    pub fn new(run_timeout: Duration) -> Self {
        Self { run_timeout }
    }

    async fn compile_and_run(&self, code: &str) -> Result<String> {
        let workdir = tempfile::tempdir()?;
        let source = workdir.path().join("main.rs");
        let binary = workdir.path().join("main");
        tokio::fs::write(&source, code).await?;

        let compile = Command::new("rustc")
            .arg("--edition")
            .arg("2021")
            .arg("-o")
            .arg(&binary)
            .arg(&source)
            .current_dir(workdir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !compile.status.success() {
            return Ok(format!(
                "Compilation failed:\n{}",
                truncate(&String::from_utf8_lossy(&compile.stderr))
            ));
        }

        let run = Command::new(&binary)
            .current_dir(workdir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        let output = match tokio::time::timeout(self.run_timeout, run).await {
            Ok(output) => output?,
            Err(_) => {
                return Ok(format!(
                    "Error: program did not finish within {} seconds.",
                    self.run_timeout.as_secs()
                ));
            }
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr));
        let mut report = String::new();
        if !output.status.success() {
            report.push_str(&format!("Program exited with {}.\n", output.status));
        }
        if !stdout.is_empty() {
            report.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str("stderr:\n");
            report.push_str(&stderr);
        }
        if report.is_empty() {
            report.push_str("(no output)");
        }
        Ok(report)
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= OUTPUT_BYTES_MAX {
        return text.to_string();
    }
    let mut end = OUTPUT_BYTES_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (truncated)", &text[..end])
}

#[async_trait]
impl ToolHandler for CompilerTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        let args = parse_arguments(arguments)?;
        let code = require_string(&args, "code")?;
        match self.compile_and_run(&code).await {
            Ok(out) => Ok(out),
            Err(e @ ToolError::Io(_)) => Err(e.into()),
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for CompilerTool {
    fn schema(&self) -> Tool {
        build_tool(
            "compiler",
            "Compile a complete Rust program and run it, returning its output.",
            &[ToolParam::new(
                "code",
                "string",
                "Full source of a Rust program with a main function.",
                true,
            )],
        )
    }
}
