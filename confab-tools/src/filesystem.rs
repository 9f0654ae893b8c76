use crate::error::{Result, ToolError};
use crate::traits::{optional_string, parse_arguments, require_string, LocalTool};
use async_trait::async_trait;
use confab_llm::{build_tool, BoxError, Tool, ToolHandler, ToolParam};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

// Results a chat model can realistically make use of; anything bigger
// drowns the context window.
const FILE_BYTES_MAX: usize = 512 * 1024;
const RESULTS_MAX: usize = 250;
const SEARCH_DIRS_MAX: usize = 2_000;

/// Reads, writes, lists, and searches files under a configured root.
/// Paths are normalized lexically before use; anything that would land
/// outside the root is refused.
pub struct FilesystemTool {
    root_dir: PathBuf,
}

impl FilesystemTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(ToolError::InvalidArguments(
                "root_dir is required".to_string(),
            ));
        }
        Ok(Self { root_dir })
    }

    /// Collapses `.` and `..` segments without touching the filesystem.
    /// `notes/../a.txt` stays inside the root and is fine; `../a.txt`
    /// would climb out and is refused.
    fn resolve_path(&self, user_path: &str) -> Result<PathBuf> {
        let mut normalized = PathBuf::new();
        for component in Path::new(user_path).components() {
            match component {
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::InvalidArguments(
                        "paths must be relative to the working directory".to_string(),
                    ));
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(ToolError::InvalidArguments(
                            "path escapes the working directory".to_string(),
                        ));
                    }
                }
                Component::Normal(part) => normalized.push(part),
            }
        }
        Ok(self.root_dir.join(normalized))
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > FILE_BYTES_MAX as u64 {
            return Err(ToolError::ExecutionFailed(format!(
                "file is {} bytes, over the {} byte reading limit",
                meta.len(),
                FILE_BYTES_MAX
            )));
        }
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_file(&self, path: &Path, rel: &str, content: &str) -> Result<String> {
        if content.len() > FILE_BYTES_MAX {
            return Err(ToolError::ExecutionFailed(format!(
                "content is {} bytes, over the {} byte writing limit",
                content.len(),
                FILE_BYTES_MAX
            )));
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(parent).await?;
            }
            _ => {}
        }
        tokio::fs::write(path, content).await?;
        Ok(format!("wrote {} bytes to {rel}", content.len()))
    }

    /// Directory entries, directories marked with a trailing slash.
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(path).await?;
        while let Some(entry) = rd.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        entries.truncate(RESULTS_MAX);
        Ok(entries)
    }

    /// Breadth-first walk matching the regex against each file's
    /// root-relative path, so patterns can anchor on directory names too.
    /// Unreadable directories are skipped rather than failing the search.
    async fn search_files(&self, start: &Path, pattern: &str) -> Result<Vec<String>> {
        let regex = Regex::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid regex: {e}")))?;

        let mut queue = VecDeque::from([start.to_path_buf()]);
        let mut matches = Vec::new();
        let mut dirs_visited = 0usize;

        while let Some(dir) = queue.pop_front() {
            dirs_visited += 1;
            if dirs_visited > SEARCH_DIRS_MAX {
                break;
            }
            let Ok(mut rd) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = rd.next_entry().await {
                let path = entry.path();
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    queue.push_back(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.root_dir) else {
                    continue;
                };
                let rel = rel.to_string_lossy();
                if regex.is_match(&rel) {
                    matches.push(rel.into_owned());
                    if matches.len() >= RESULTS_MAX {
                        matches.sort();
                        return Ok(matches);
                    }
                }
            }
        }
        matches.sort();
        Ok(matches)
    }

    async fn dispatch(&self, arguments: &str) -> Result<String> {
        let args = parse_arguments(arguments)?;
        let action = require_string(&args, "action")?;
        let path = require_string(&args, "path")?;
        let resolved = self.resolve_path(&path)?;

        match action.as_str() {
            "read_file" => self.read_file(&resolved).await,
            "write_file" => {
                let content = require_string(&args, "content")?;
                self.write_file(&resolved, &path, &content).await
            }
            "list_dir" => {
                let entries = self.list_dir(&resolved).await?;
                Ok(if entries.is_empty() {
                    "(empty directory)".to_string()
                } else {
                    entries.join("\n")
                })
            }
            "search_files" => {
                let pattern = optional_string(&args, "pattern")?.unwrap_or_else(|| ".*".to_string());
                let matches = self.search_files(&resolved, &pattern).await?;
                Ok(if matches.is_empty() {
                    "no matching files".to_string()
                } else {
                    matches.join("\n")
                })
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

#[async_trait]
impl ToolHandler for FilesystemTool {
    #[tracing::instrument(level = "info", skip_all)]
    async fn call(&self, arguments: &str) -> std::result::Result<String, BoxError> {
        match self.dispatch(arguments).await {
            Ok(output) => Ok(output),
            // The model can read a refusal and adjust; only surface the
            // failure upward when the arguments were unparseable.
            Err(ToolError::InvalidArguments(m)) if m.contains("not valid JSON") => {
                Err(ToolError::InvalidArguments(m).into())
            }
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

impl LocalTool for FilesystemTool {
    fn schema(&self) -> Tool {
        build_tool(
            "filesystem",
            "Read, write, list, and search files within the working directory.",
            &[
                ToolParam::new(
                    "action",
                    "string",
                    "One of read_file, write_file, list_dir, search_files.",
                    true,
                ),
                ToolParam::new("path", "string", "Path relative to the working directory.", true),
                ToolParam::new("content", "string", "Content for write_file.", false),
                ToolParam::new(
                    "pattern",
                    "string",
                    "Regex matched against relative paths for search_files.",
                    false,
                ),
            ],
        )
    }
}
