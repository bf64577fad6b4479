//! `web_search`: HTTP search against a DuckDuckGo-style HTML endpoint.

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{Html, Selector};
use serde_json::{Value, json};
use tracing::debug;

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Default search endpoint.
const DEFAULT_SEARCH_BASE: &str = "https://html.duckduckgo.com";

/// Default and maximum result counts.
const DEFAULT_RESULTS: usize = 5;
const MAX_RESULTS: usize = 10;

/// One extracted result.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Extract ranked hits from a DuckDuckGo HTML page.
pub(crate) fn extract_hits(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result").expect("static selector");
    let title_sel = Selector::parse(".result__a").expect("static selector");
    let snippet_sel = Selector::parse(".result__snippet").expect("static selector");

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_owned();
        let url = anchor.value().attr("href").unwrap_or_default().to_owned();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_owned())
            .unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            continue;
        }
        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
        if hits.len() >= limit {
            break;
        }
    }
    hits
}

/// External web search.
pub struct WebSearchTool;

#[async_trait]
impl PlanterTool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new("web_search", "Search the web and return ranked results.")
            .required("query", json!({"type": "string", "description": "Search query"}))
            .optional("num_results", json!({"type": "integer", "description": "How many results (max 10)"}))
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::invalid("missing required parameter: query"))?;
        let limit = args
            .get("num_results")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_RESULTS, |n| (n as usize).clamp(1, MAX_RESULTS));

        let base = ctx
            .web_search_base_url
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_BASE);
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        let url = format!("{base}/html/?q={encoded}");
        debug!(query, limit, "web search");

        let client = reqwest::Client::new();
        let response = client
            .get(&url)
            .header("User-Agent", &ctx.user_agent)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| ToolError::internal(format!("search request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::internal(format!(
                "search endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| ToolError::internal(format!("search response unreadable: {e}")))?;

        let hits = extract_hits(&html, limit);
        if hits.is_empty() {
            return Ok(ToolOutcome::observation(format!(
                "no results for: {query}"
            )));
        }
        let mut out = String::new();
        for (rank, hit) in hits.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} - {}\n   {}\n",
                rank + 1,
                hit.title,
                hit.url,
                hit.snippet
            ));
        }
        Ok(ToolOutcome::observation(clip_observation(
            &out,
            ctx.max_observation_chars,
        )))
    }
}
