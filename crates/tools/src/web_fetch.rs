//! Web fetch capability — retrieve a URL and reduce HTML to bounded-length
//! plain text.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use tracing::debug;

/// Plain text beyond this many bytes is truncated before folding back.
const MAX_TEXT_BYTES: usize = 16 * 1024;

pub struct WebFetchTool {
    client: reqwest::Client,
    max_bytes: usize,
}

impl WebFetchTool {
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

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip tags, scripts, and styles from HTML, collapsing whitespace.
/// A plain scanner — good enough for feeding pages to a model, not a
/// general HTML parser. Shared with `web_search` for result pages.
pub(crate) fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 4);
    let mut chars = html.char_indices().peekable();
    // ASCII-only lowering keeps byte offsets aligned with the original
    let lower = html.to_ascii_lowercase();
    let mut skip_until: Option<usize> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(end) = skip_until {
            if i < end {
                continue;
            }
            skip_until = None;
        }

        if c == '<' {
            let rest = &lower[i..];
            // Elide script/style bodies entirely
            for (open, close) in [("<script", "</script>"), ("<style", "</style>")] {
                if rest.starts_with(open) {
                    if let Some(end) = rest.find(close) {
                        skip_until = Some(i + end + close.len());
                    } else {
                        skip_until = Some(html.len());
                    }
                    break;
                }
            }
            if skip_until.is_some() {
                continue;
            }
            // Ordinary tag: skip to '>'
            if let Some(end) = html[i..].find('>') {
                skip_until = Some(i + end + 1);
                // Block-level boundaries become newlines
                if rest.starts_with("<p") || rest.starts_with("<br") || rest.starts_with("<div")
                    || rest.starts_with("<li") || rest.starts_with("<h")
                {
                    out.push('\n');
                }
            }
            continue;
        }

        out.push(c);
    }

    // Decode the handful of entities that matter for readability
    let decoded = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    // Collapse whitespace runs per line, drop blank lines
    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn truncate_text(text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[content truncated at {max} bytes]", &text[..cut])
}

#[async_trait]
impl Capability for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its content reduced to plain text. Use for documentation lookups and web search result pages."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch (http or https)" }
            },
            "required": ["url"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(format!(
                "'{url}' is not an http(s) URL"
            )));
        }

        debug!(url, "Fetching web page");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::failed(format!("Fetch failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failed(format!(
                "Fetch of '{url}' returned HTTP {status}"
            )));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to read body: {e}"))),
        };

        let text = truncate_text(html_to_text(&body), self.max_bytes);
        Ok(ToolResult::ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        let html = "<html><body><h1>Title</h1><p>First para.</p><p>Second.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("First para."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn elides_scripts_and_styles() {
        let html = "<p>visible</p><script>var hidden = 1;</script><style>.x{color:red}</style><p>also visible</p>";
        let text = html_to_text(html);
        assert!(text.contains("visible"));
        assert!(text.contains("also visible"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(html_to_text("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn collapses_whitespace() {
        let text = html_to_text("<div>  lots    of\t spaces  </div>\n\n\n<div>next</div>");
        assert_eq!(text, "lots of spaces\nnext");
    }

    #[test]
    fn truncation_appends_marker() {
        let long = "x".repeat(200);
        let out = truncate_text(long, 50);
        assert!(out.contains("[content truncated at 50 bytes]"));
    }

    #[tokio::test]
    async fn rejects_non_http_url() {
        let tool = WebFetchTool::new();
        let result = tool
            .execute(serde_json::json!({"url": "file:///etc/passwd"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn missing_url_argument() {
        let tool = WebFetchTool::new();
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }
}
