//! Web Scrape Tool
//!
//! Fetches a page and reduces it to readable text: script/style blocks
//! removed, remaining markup stripped, whitespace collapsed. Optionally
//! extracts anchors. Content is truncated so a single page cannot flood
//! the model's context.

use std::sync::OnceLock;

use assistant_core::{
    error::Result,
    tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

const MAX_CONTENT_LENGTH: usize = 5_000;
const MAX_LINKS: usize = 20;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// Patterns are static; compilation cannot fail at runtime.
fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("static pattern")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static pattern"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static pattern"))
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
            .expect("static pattern")
    })
}

/// Strip markup and collapse whitespace into single spaces
fn extract_text(html: &str) -> String {
    let without_blocks = script_style_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_blocks, " ");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(html: &str) -> String {
    title_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn extract_links(html: &str) -> Vec<Value> {
    anchor_re()
        .captures_iter(html)
        .take(MAX_LINKS)
        .map(|c| {
            let url = c.get(1).map(|m| m.as_str()).unwrap_or_default();
            let text = c.get(2).map(|m| extract_text(m.as_str())).unwrap_or_default();
            json!({ "text": text, "url": url })
        })
        .collect()
}

/// Scrapes and extracts text content from a web page
pub struct WebScrapeTool {
    client: reqwest::Client,
}

impl Default for WebScrapeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebScrapeTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Tool for WebScrapeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_scrape".into(),
            description: "Scrape and extract text content from a web page".into(),
            parameters: vec![
                ParameterSchema::required_string("url", "URL of the page to scrape"),
                ParameterSchema::optional(
                    "extract_links",
                    ParamType::Boolean,
                    "Also extract anchor links from the page",
                    json!(false),
                ),
            ],
            category: Some("search".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let url = call
            .arguments
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let want_links = call
            .arguments
            .get("extract_links")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        tracing::debug!(url, want_links, "scraping page");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(ToolResult::failure(format!("Web scraping failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failure(format!(
                "HTTP {status}: Could not fetch the page"
            )));
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => return Ok(ToolResult::failure(format!("Web scraping failed: {e}"))),
        };

        let text = extract_text(&html);
        let mut data = json!({
            "url": url,
            "title": extract_title(&html),
            "content": text.chars().take(MAX_CONTENT_LENGTH).collect::<String>(),
            "content_length": text.len(),
        });

        if want_links {
            data["links"] = json!(extract_links(&html));
        }

        Ok(ToolResult::success(data).with_metadata("status_code", json!(status.as_u16())))
    }
}
