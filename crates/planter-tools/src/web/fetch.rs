//! `fetch_url`: fetch a page and return readable text.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Response size cap.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Render width for HTML-to-text conversion.
const RENDER_WIDTH: usize = 100;

/// Fetch page content.
pub struct FetchUrlTool;

#[async_trait]
impl PlanterTool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "fetch_url",
            "Fetch a URL and return its content. HTML pages are converted to readable text.",
        )
        .required("url", json!({"type": "string", "description": "The http(s) URL to fetch"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: url"))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::invalid("url must be http:// or https://"));
        }
        debug!(url, "fetching");

        let client = reqwest::Client::new();
        let response = client
            .get(url)
            .header("User-Agent", &ctx.user_agent)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| ToolError::internal(format!("fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::internal(format!(
                "fetch returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::internal(format!("fetch body unreadable: {e}")))?;
        let bytes = &bytes[..bytes.len().min(MAX_BODY_BYTES)];

        let text = if is_html {
            html2text::from_read(bytes, RENDER_WIDTH)
                .map_err(|e| ToolError::internal(format!("HTML conversion failed: {e}")))?
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };

        Ok(ToolOutcome::observation(clip_observation(
            &text,
            ctx.max_observation_chars,
        )))
    }
}
