//! File commands: read, write, append, delete and list files inside the
//! workspace.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, optional_str, required_str};
use issola_core::error::CommandError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::workspace::Workspace;

pub struct ReadFileCommand {
    workspace: Workspace,
}

impl ReadFileCommand {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Command for ReadFileCommand {
    fn name(&self) -> &str {
        CommandName::ReadFile.as_str()
    }

    fn description(&self) -> &str {
        "Read file"
    }

    fn required_args(&self) -> &[&'static str] {
        &["file"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let path = self.workspace.resolve(&required_str(&args, "file")?)?;
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

pub struct WriteToFileCommand {
    workspace: Workspace,
}

impl WriteToFileCommand {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

/// Create the parent directories of `path`.
async fn ensure_parent(path: &Path) -> Result<(), CommandError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl Command for WriteToFileCommand {
    fn name(&self) -> &str {
        CommandName::WriteToFile.as_str()
    }

    fn description(&self) -> &str {
        "Write to file"
    }

    fn required_args(&self) -> &[&'static str] {
        &["file", "text"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let path = self.workspace.resolve(&required_str(&args, "file")?)?;
        let text = optional_str(&args, "text").unwrap_or_default();
        ensure_parent(&path).await?;
        tokio::fs::write(&path, &text).await?;
        debug!(path = %path.display(), bytes = text.len(), "File written");
        Ok("File written to successfully.".into())
    }
}

pub struct AppendToFileCommand {
    workspace: Workspace,
}

impl AppendToFileCommand {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Command for AppendToFileCommand {
    fn name(&self) -> &str {
        CommandName::AppendToFile.as_str()
    }

    fn description(&self) -> &str {
        "Append to file"
    }

    fn required_args(&self) -> &[&'static str] {
        &["file", "text"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let path = self.workspace.resolve(&required_str(&args, "file")?)?;
        let text = optional_str(&args, "text").unwrap_or_default();
        ensure_parent(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok("Text appended successfully.".into())
    }
}

pub struct DeleteFileCommand {
    workspace: Workspace,
}

impl DeleteFileCommand {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Command for DeleteFileCommand {
    fn name(&self) -> &str {
        CommandName::DeleteFile.as_str()
    }

    fn description(&self) -> &str {
        "Delete file"
    }

    fn required_args(&self) -> &[&'static str] {
        &["file"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let path = self.workspace.resolve(&required_str(&args, "file")?)?;
        tokio::fs::remove_file(&path).await?;
        Ok("File deleted successfully.".into())
    }
}

pub struct SearchFilesCommand {
    workspace: Workspace,
}

impl SearchFilesCommand {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

/// Every non-hidden file below `dir`, depth first, sorted per directory.
async fn walk(dir: PathBuf) -> Result<Vec<PathBuf>, CommandError> {
    let mut files = Vec::new();
    let mut stack = vec![dir];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            children.push((entry.path(), entry.file_type().await?.is_dir()));
        }
        children.sort();
        for (path, is_dir) in children.into_iter().rev() {
            if is_dir {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl Command for SearchFilesCommand {
    fn name(&self) -> &str {
        CommandName::SearchFiles.as_str()
    }

    fn description(&self) -> &str {
        "Search Files"
    }

    fn required_args(&self) -> &[&'static str] {
        &["directory"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let directory = required_str(&args, "directory").unwrap_or_else(|_| ".".into());
        let dir = self.workspace.resolve(&directory)?;
        let found: Vec<String> = walk(dir)
            .await?
            .iter()
            .map(|p| self.workspace.relative(p).display().to_string())
            .collect();
        serde_json::to_string(&found).map_err(|e| CommandError::ExecutionFailed {
            command: "search_files".into(),
            reason: e.to_string(),
        })
    }
}
