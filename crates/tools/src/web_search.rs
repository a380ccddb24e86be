//! Web search capability — query a search endpoint and reduce the result
//! page to bounded plain text.
//!
//! Uses the DuckDuckGo HTML endpoint so no API key is required; the
//! response is an ordinary HTML page, reduced with the same scanner
//! `web_fetch` uses.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use tracing::debug;

use crate::web_fetch::{html_to_text, truncate_text};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Result text beyond this many bytes is truncated before folding back.
const MAX_TEXT_BYTES: usize = 16 * 1024;

pub struct WebSearchTool {
    client: reqwest::Client,
    max_bytes: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("codequill/0.1")
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            max_bytes: MAX_TEXT_BYTES,
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-encode a query for use in a URL query string.
fn encode_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for b in query.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[async_trait]
impl Capability for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the result page as plain text (titles, URLs, snippets). Use for documentation and error-message lookups."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" }
            },
            "required": ["query"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        if query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'query' must not be empty".into()));
        }

        let url = format!("{SEARCH_ENDPOINT}?q={}", encode_query(query));
        debug!(query, "Searching the web");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::failed(format!("Search failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failed(format!(
                "Search for '{query}' returned HTTP {status}"
            )));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to read results: {e}"))),
        };

        let text = truncate_text(html_to_text(&body), self.max_bytes);
        if text.is_empty() {
            return Ok(ToolResult::ok(format!("No results for '{query}'")));
        }
        Ok(ToolResult::ok(text))
    }
}
