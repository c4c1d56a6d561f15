//! Fetching pages and condensing them for the model.
//!
//! [`HttpWebClient`] turns HTML into plain text with `scraper`, dropping
//! scripts and styles. [`Summarizer`] splits long text on line boundaries
//! and asks the fast model for the salient facts of each chunk, then
//! consolidates the per-chunk lists.

use async_trait::async_trait;
use issola_core::error::CommandError;
use issola_core::message::Message;
use issola_core::provider::{Provider, ProviderRequest};
use scraper::{Html, Node, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_2) AppleWebKit/537.36";

/// Largest chunk sent to the model in one summarization call.
pub const CHUNK_SIZE: usize = 4097;

/// Page access used by the browse commands and the research workers.
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Visible text of the page. HTTP errors map to [`CommandError::HttpStatus`].
    async fn fetch_text(&self, url: &str) -> Result<String, CommandError>;

    /// Hyperlinks on the page, formatted as `text (href)`.
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, CommandError>;
}

pub struct HttpWebClient {
    client: reqwest::Client,
}

impl HttpWebClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn get_html(&self, url: &str) -> Result<String, CommandError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CommandError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CommandError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(CommandError::HttpStatus(status));
        }

        response
            .text()
            .await
            .map_err(|e| CommandError::Http(e.to_string()))
    }
}

impl Default for HttpWebClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl WebClient for HttpWebClient {
    async fn fetch_text(&self, url: &str) -> Result<String, CommandError> {
        let html = self.get_html(url).await?;
        let text = html_to_text(&html);
        debug!(url, chars = text.len(), "Fetched page text");
        Ok(text)
    }

    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, CommandError> {
        let html = self.get_html(url).await?;
        Ok(extract_links(&html))
    }
}

fn is_hidden(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

/// Visible text of an HTML document, one trimmed phrase per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| is_hidden(e.name()));
        if !hidden {
            raw.push_str(text);
            raw.push('\n');
        }
    }

    raw.lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every `<a href>` as `text (href)`, outside scripts and styles.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let text: String = link.text().collect();
            Some(format!("{} ({})", text.trim(), href))
        })
        .collect()
}

/// Split `text` into chunks of at most `max_len` bytes, breaking on
/// newlines. Lines longer than `max_len` are cut at character boundaries.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut push_line = |line: &str, current: &mut String| {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            chunks.push(std::mem::take(current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    };

    for line in text.split('\n') {
        if line.len() <= max_len {
            push_line(line, &mut current);
            continue;
        }
        let mut piece = String::new();
        for ch in line.chars() {
            if piece.len() + ch.len_utf8() > max_len {
                push_line(&std::mem::take(&mut piece), &mut current);
            }
            piece.push(ch);
        }
        if !piece.is_empty() {
            push_line(&piece, &mut current);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// Condenses page text with the fast model.
pub struct Summarizer {
    provider: Arc<dyn Provider>,
    model: String,
    chunk_size: usize,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Salient facts in `text` about `desired_information`.
    pub async fn summarize(
        &self,
        text: &str,
        desired_information: &str,
    ) -> Result<String, CommandError> {
        let chunks = split_text(text, self.chunk_size);
        if chunks.is_empty() {
            return Err(CommandError::ExecutionFailed {
                command: "summarize".into(),
                reason: "No text to summarize".into(),
            });
        }

        info!(chars = text.len(), chunks = chunks.len(), "Summarizing text");
        let mut summaries = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(chunk = i + 1, total = chunks.len(), "Summarizing chunk");
            let prompt = format!(
                "\"\"\"{chunk}\"\"\" Using the above text, create a bulleted list of salient facts related to the desired inquiry:\n{desired_information}\nYour list of related salient facts:\n"
            );
            summaries.push(self.ask(prompt, 1000).await?);
        }

        if summaries.len() == 1 {
            return Ok(summaries.remove(0));
        }

        let combined = summaries.join("\n");
        let prompt = format!(
            "\"\"\"{combined}\"\"\" Using the list of salient facts above, clean the list of any duplicates and consolidate factual data where necessary:\n"
        );
        self.ask(prompt, 2000).await
    }

    async fn ask(&self, prompt: String, max_tokens: u32) -> Result<String, CommandError> {
        let request = ProviderRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_max_tokens(max_tokens);
        Ok(self.provider.complete_text(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issola_core::error::ProviderError;
    use issola_core::provider::ProviderResponse;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers every prompt with a numbered summary and records the prompts.
    struct CountingProvider {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.messages[0].content.clone());
            Ok(ProviderResponse {
                message: Message::assistant(format!("- fact {}", prompts.len())),
                usage: None,
                model: request.model,
            })
        }
    }

    const PAGE: &str = r#"
        <html>
          <head><title>Tokio</title><style>body { color: red; }</style></head>
          <body>
            <script>var tracking = 1;</script>
            <h1>Tokio  runtime</h1>
            <p>An asynchronous runtime for Rust.</p>
            <a href="https://tokio.rs/docs">Docs</a>
            <a href="/blog"> Blog </a>
          </body>
        </html>"#;

    #[test]
    fn text_drops_scripts_and_styles() {
        let text = html_to_text(PAGE);
        assert!(text.contains("An asynchronous runtime for Rust."));
        assert!(text.contains("Tokio\nruntime"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn links_are_formatted() {
        let links = extract_links(PAGE);
        assert_eq!(links, vec!["Docs (https://tokio.rs/docs)", "Blog (/blog)"]);
    }

    #[test]
    fn split_respects_limit_and_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_text(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_text(text, 100), vec![text]);
        for chunk in split_text(&"x".repeat(25), 10) {
            assert!(chunk.len() <= 10);
        }
        assert!(split_text("", 10).is_empty());
    }

    #[tokio::test]
    async fn long_text_is_summarized_per_chunk_then_consolidated() {
        let provider = Arc::new(CountingProvider { prompts: Mutex::new(Vec::new()) });
        let summarizer = Summarizer::new(provider.clone(), "gpt-3.5-turbo").with_chunk_size(12);

        let summary = summarizer
            .summarize("first line\nsecond line", "what is it?")
            .await
            .unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("first line"));
        assert!(prompts[0].contains("what is it?"));
        assert!(prompts[2].contains("- fact 1\n- fact 2"));
        assert_eq!(summary, "- fact 3");
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let provider = Arc::new(CountingProvider { prompts: Mutex::new(Vec::new()) });
        let err = Summarizer::new(provider, "m").summarize("  \n ", "x").await.unwrap_err();
        assert!(err.to_string().contains("No text to summarize"));
    }

    #[tokio::test]
    async fn http_errors_map_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let client = HttpWebClient::default();
        let err = client
            .fetch_text(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 error");

        let text = client.fetch_text(&format!("{}/page", server.uri())).await.unwrap();
        assert!(text.contains("asynchronous runtime"));
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected() {
        let err = HttpWebClient::default().fetch_text("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidArguments(_)));
    }
}
