use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use atelier_core::RuntimeError;

use crate::net::guarded_fetch;
use crate::node::{error_output, Node, NodeContext, NodeOutputs};

const DEFAULT_MAX_LENGTH: usize = 8000;

/// Fetches a URL through the SSRF guard and extracts content per the
/// configured `Mode`: `text` (readable text), `html` (raw body), or
/// `title`. The URL comes from the first input socket, falling back to the
/// `URL` parameter.
pub struct WebScraperNode;

#[derive(Serialize)]
struct ScrapedPage {
    url: String,
    status: u16,
    title: Option<String>,
    content: String,
    content_type: String,
    truncated: bool,
}

/// Extract title from HTML using simple string matching.
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let start = lower.find("<title")?;
    let open_end = html[start..].find('>').map(|i| start + i + 1)?;
    let close = lower[open_end..].find("</title>").map(|i| open_end + i)?;
    let title = html[open_end..close].trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[async_trait]
impl Node for WebScraperNode {
    fn node_type(&self) -> &'static str {
        "web_scraper"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let url = match ctx.input_str(0).filter(|s| !s.is_empty()).or_else(|| ctx.param_str("URL")) {
            Some(url) => url,
            None => return Ok(error_output(ctx, "no URL provided")),
        };
        let mode = ctx.param_str("Mode").unwrap_or_else(|| "text".to_string());
        let max_length = ctx
            .param_str("Max Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_LENGTH);

        info!("NODE '{}': scraping {} ({})", ctx.spec.title, url, mode);

        let fetched = match guarded_fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => return Ok(error_output(ctx, e)),
        };

        let is_html = fetched.content_type.contains("text/html");
        let title = is_html.then(|| extract_title(&fetched.body)).flatten();

        let extracted = match mode.as_str() {
            "title" => title.clone().unwrap_or_default(),
            "html" => fetched.body.clone(),
            _ if is_html => html2text::from_read(fetched.body.as_bytes(), 80),
            _ => fetched.body.clone(),
        };

        let truncated = extracted.len() > max_length;
        let content = if truncated {
            let mut cut = max_length;
            while !extracted.is_char_boundary(cut) {
                cut -= 1;
            }
            extracted[..cut].to_string()
        } else {
            extracted
        };

        let page = ScrapedPage {
            url: fetched.final_url,
            status: fetched.status,
            title,
            content,
            content_type: fetched.content_type,
            truncated,
        };

        match serde_json::to_value(&page) {
            Ok(value) => Ok(ctx.single_output(value)),
            Err(e) => Ok(error_output(ctx, e)),
        }
    }
}
