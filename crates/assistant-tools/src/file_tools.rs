//! File Tools
//!
//! Writing text/JSON files and listing directories. Both tools are rooted
//! at a base directory supplied at construction: relative paths resolve
//! under it, so the agent cannot be steered outside the workspace by a
//! crafted relative path. Absolute paths are honored as given.

use std::path::{Path, PathBuf};

use assistant_core::{
    error::Result,
    tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};
use async_trait::async_trait;
use serde_json::{json, Value};

fn resolve(base: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Writes content to text or JSON files
pub struct FileWriterTool {
    base_dir: PathBuf,
}

impl FileWriterTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for FileWriterTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "file_writer".into(),
            description: "Write content to files in various formats".into(),
            parameters: vec![
                ParameterSchema::required_string("file_path", "Destination file path"),
                ParameterSchema::required_string("content", "Content to write"),
                ParameterSchema {
                    name: "format".into(),
                    param_type: ParamType::String,
                    description: "Output format".into(),
                    required: false,
                    default: Some(json!("txt")),
                    enum_values: Some(vec![json!("txt"), json!("json")]),
                },
            ],
            category: Some("files".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let raw_path = call
            .arguments
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let content = call
            .arguments
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let format = call
            .arguments
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("txt")
            .to_lowercase();

        let path = resolve(&self.base_dir, raw_path);
        tracing::debug!(path = %path.display(), format, "writing file");

        let rendered = if format == "json" {
            // Normalize before writing so malformed payloads are rejected
            match serde_json::from_str::<Value>(content) {
                Ok(data) => serde_json::to_string_pretty(&data).unwrap_or_default(),
                Err(_) => return Ok(ToolResult::failure("Invalid JSON content")),
            }
        } else {
            content.to_string()
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolResult::failure(format!("File writing failed: {e}")));
            }
        }
        if let Err(e) = tokio::fs::write(&path, &rendered).await {
            return Ok(ToolResult::failure(format!("File writing failed: {e}")));
        }

        Ok(ToolResult::success(json!({
            "file_path": path.display().to_string(),
            "bytes_written": rendered.len(),
            "format": format,
        })))
    }
}

/// Lists files and directories under a path
pub struct DirectoryListTool {
    base_dir: PathBuf,
}

impl DirectoryListTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for DirectoryListTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "directory_list".into(),
            description: "List files and directories in a given path".into(),
            parameters: vec![
                ParameterSchema::optional(
                    "directory_path",
                    ParamType::String,
                    "Directory to list",
                    json!("."),
                ),
                ParameterSchema::optional(
                    "include_hidden",
                    ParamType::Boolean,
                    "Include dot-prefixed entries",
                    json!(false),
                ),
            ],
            category: Some("files".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let raw_path = call
            .arguments
            .get("directory_path")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let include_hidden = call
            .arguments
            .get("include_hidden")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let path = resolve(&self.base_dir, raw_path);
        if !path.exists() {
            return Ok(ToolResult::failure(format!(
                "Directory not found: {raw_path}"
            )));
        }
        if !path.is_dir() {
            return Ok(ToolResult::failure(format!(
                "Path is not a directory: {raw_path}"
            )));
        }

        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Directory listing failed: {e}"
                )))
            }
        };

        // (is_file, lowercase name) sort key: directories first, then files
        let mut items: Vec<(bool, String, Value)> = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Ok(ToolResult::failure(format!(
                        "Directory listing failed: {e}"
                    )))
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            if !include_hidden && name.starts_with('.') {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    return Ok(ToolResult::failure(format!(
                        "Directory listing failed: {e}"
                    )))
                }
            };

            let is_file = metadata.is_file();
            let info = json!({
                "name": name,
                "path": entry.path().display().to_string(),
                "type": if is_file { "file" } else { "directory" },
                "size": if is_file { Some(metadata.len()) } else { None },
            });
            items.push((is_file, name.to_lowercase(), info));
        }

        items.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        let listed: Vec<Value> = items.into_iter().map(|(_, _, info)| info).collect();
        let total = listed.len();

        Ok(ToolResult::success(json!({
            "directory": path.display().to_string(),
            "items": listed,
            "total_items": total,
        })))
    }
}
