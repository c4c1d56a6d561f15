//! Browse commands: `browse_website`, `get_text_summary`, `get_hyperlinks`.
//!
//! The first two are revisit-guarded. A URL is accepted (recorded as
//! visited) before it is fetched, so a page that keeps failing is not
//! fetched again on the next turn. Both also claim the URL in the research
//! log, so a page is summarized at most once whichever command asks first.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, optional_str, required_str};
use issola_core::error::{CommandError, StoreError};
use issola_memory::VisitGuard;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::web::{Summarizer, WebClient};

pub const ALREADY_VISITED: &str =
    "This URL has already been visited. Proceed to another URL on the list.";
pub const ALREADY_RESEARCHED: &str =
    "This URL has already been visited and researched. Proceed to another URL on the list.";

const DEFAULT_FOCUS: &str = "Summarize the key information on this page.";

/// Append-only research log of `Source:` / `Summary:` blocks.
///
/// Sources already in the log at startup count as researched.
pub struct ResearchLog {
    path: Option<PathBuf>,
    sources: VisitGuard,
    write_lock: Mutex<()>,
}

impl ResearchLog {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let sources = VisitGuard::ephemeral();
        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            for url in extract_sources(&text) {
                sources.mark(&url).await?;
            }
        }
        debug!(path = %path.display(), sources = sources.len().await, "Research log loaded");
        Ok(Self {
            path: Some(path),
            sources,
            write_lock: Mutex::new(()),
        })
    }

    pub fn ephemeral() -> Self {
        Self {
            path: None,
            sources: VisitGuard::ephemeral(),
            write_lock: Mutex::new(()),
        }
    }

    /// Claim `url` for research. `false` when it was already researched.
    pub async fn accept(&self, url: &str) -> Result<bool, StoreError> {
        self.sources.accept(url).await
    }

    /// Append a finished summary. Summaries that mention 404 are skipped.
    pub async fn record(&self, url: &str, summary: &str) -> Result<(), CommandError> {
        if summary.contains("404") {
            debug!(url, "Summary mentions 404, not logged");
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("Source: {url}\nSummary:\n{summary}\n\n").as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}

/// URLs of every `Source:` line in a research log.
pub fn extract_sources(log: &str) -> Vec<String> {
    log.lines()
        .filter_map(|line| line.strip_prefix("Source:"))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Shared fetch-and-summarize pipeline behind both browse commands.
pub struct PageReader {
    web: Arc<dyn WebClient>,
    summarizer: Summarizer,
    log: Arc<ResearchLog>,
}

impl PageReader {
    pub fn new(web: Arc<dyn WebClient>, summarizer: Summarizer, log: Arc<ResearchLog>) -> Self {
        Self {
            web,
            summarizer,
            log,
        }
    }

    /// Like [`PageReader::read`], but only for URLs not yet in the research
    /// log. `None` when the page was already researched.
    pub async fn read_new(&self, url: &str, focus: &str) -> Result<Option<String>, CommandError> {
        if !self.log.accept(url).await? {
            debug!(url, "Skipping researched URL");
            return Ok(None);
        }
        self.read(url, focus).await.map(Some)
    }

    /// Fetch `url`, summarize it for `focus`, and log the summary.
    pub async fn read(&self, url: &str, focus: &str) -> Result<String, CommandError> {
        let text = self.web.fetch_text(url).await?;
        let summary = self.summarizer.summarize(&text, focus).await?;
        self.log.record(url, &summary).await?;
        info!(url, chars = summary.len(), "Page summarized");
        Ok(summary)
    }
}

pub struct BrowseWebsiteCommand {
    reader: Arc<PageReader>,
    visited: Arc<VisitGuard>,
}

impl BrowseWebsiteCommand {
    pub fn new(reader: Arc<PageReader>, visited: Arc<VisitGuard>) -> Self {
        Self { reader, visited }
    }
}

#[async_trait]
impl Command for BrowseWebsiteCommand {
    fn name(&self) -> &str {
        CommandName::BrowseWebsite.as_str()
    }

    fn description(&self) -> &str {
        "Browse Website"
    }

    fn required_args(&self) -> &[&'static str] {
        &["url"]
    }

    fn optional_args(&self) -> &[&'static str] {
        &["desired_information"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let url = required_str(&args, "url")?;
        if !self.visited.accept(&url).await? {
            debug!(url = %url, "Skipping visited URL");
            return Ok(ALREADY_VISITED.into());
        }
        let focus = optional_str(&args, "desired_information").unwrap_or_else(|| DEFAULT_FOCUS.into());
        match self.reader.read_new(&url, &focus).await? {
            Some(summary) => Ok(format!("Website Content Summary: {summary}")),
            None => Ok(ALREADY_RESEARCHED.into()),
        }
    }
}

pub struct GetTextSummaryCommand {
    reader: Arc<PageReader>,
}

impl GetTextSummaryCommand {
    pub fn new(reader: Arc<PageReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Command for GetTextSummaryCommand {
    fn name(&self) -> &str {
        CommandName::GetTextSummary.as_str()
    }

    fn description(&self) -> &str {
        "Get text summary"
    }

    fn required_args(&self) -> &[&'static str] {
        &["url"]
    }

    fn optional_args(&self) -> &[&'static str] {
        &["question"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let url = required_str(&args, "url")?;
        let focus = optional_str(&args, "question").unwrap_or_else(|| DEFAULT_FOCUS.into());
        match self.reader.read_new(&url, &focus).await? {
            Some(summary) => Ok(format!(" \"Result\" : {summary}")),
            None => Ok(ALREADY_RESEARCHED.into()),
        }
    }
}

pub struct GetHyperlinksCommand {
    web: Arc<dyn WebClient>,
}

impl GetHyperlinksCommand {
    pub fn new(web: Arc<dyn WebClient>) -> Self {
        Self { web }
    }
}

#[async_trait]
impl Command for GetHyperlinksCommand {
    fn name(&self) -> &str {
        CommandName::GetHyperlinks.as_str()
    }

    fn description(&self) -> &str {
        "Get hyperlinks"
    }

    fn required_args(&self) -> &[&'static str] {
        &["url"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let url = required_str(&args, "url")?;
        let links = self.web.fetch_links(&url).await?;
        serde_json::to_string(&links).map_err(|e| CommandError::ExecutionFailed {
            command: "get_hyperlinks".into(),
            reason: e.to_string(),
        })
    }
}
