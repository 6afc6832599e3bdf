//! C4 LlmExtractor: submit an expanded prompt to the text-completion
//! service and parse a `RawRow[]` out of the response.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] so it can change without touching retry or
//! error-handling logic here.
//!
//! ## Retry strategy
//!
//! Transient transport errors (rate limits, timeouts) are common under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids a thundering herd: with a 500 ms base and 2 retries the wait
//! sequence is 500 ms → 1 s, under 2 s of total back-off per page.

use crate::config::IngestConfig;
use crate::error::PageError;
use crate::model::{RawRow, RowValue};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// The outcome of extracting one page. Always produced — never propagates
/// an error upward, so one bad page cannot abort the document (§4.8 step 4:
/// "per-page failures are recorded and skipped").
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub page_num: usize,
    pub raw_rows: Vec<RawRow>,
    pub error: Option<PageError>,
}

/// Run the extraction call for one page's fully expanded prompt.
pub async fn extract_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    prompt: &str,
    config: &IngestConfig,
) -> PageExtraction {
    let messages = vec![
        ChatMessage::system(
            "You extract bank statement transactions as JSON. Respond with JSON only.",
        ),
        ChatMessage::user(prompt),
    ];

    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!("Page {page_num}: retry {attempt}/{} after {backoff}ms", config.max_retries);
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(&messages, Some(&options));
        match tokio::time::timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Ok(Ok(response)) => {
                return match parse_response(page_num, &response.content) {
                    Ok(raw_rows) => {
                        debug!("Page {page_num}: {} raw rows extracted", raw_rows.len());
                        PageExtraction {
                            page_num,
                            raw_rows,
                            error: None,
                        }
                    }
                    Err(err) => {
                        debug!("Page {page_num}: unparseable response: {}", response.content);
                        PageExtraction {
                            page_num,
                            raw_rows: Vec::new(),
                            error: Some(err),
                        }
                    }
                };
            }
            Ok(Err(e)) => {
                let err_msg = e.to_string();
                warn!("Page {page_num}: attempt {} failed — {err_msg}", attempt + 1);
                last_err = Some(err_msg);
            }
            Err(_) => {
                return PageExtraction {
                    page_num,
                    raw_rows: Vec::new(),
                    error: Some(PageError::Timeout {
                        page: page_num,
                        secs: config.api_timeout_secs,
                    }),
                };
            }
        }
    }

    PageExtraction {
        page_num,
        raw_rows: Vec::new(),
        error: Some(PageError::LlmTransportError {
            page: page_num,
            retries: config.max_retries as u8,
            detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

/// Parse an LLM response body into `RawRow[]` (§4.4):
/// 1. Strip a leading ` ```json ` / trailing ` ``` ` fence if present.
/// 2. Parse as JSON.
/// 3. Accept a bare array, or `{"transactions": [...]}`.
/// 4. Reject any array element that is not an object.
fn parse_response(page_num: usize, body: &str) -> Result<Vec<RawRow>, PageError> {
    let stripped = strip_fence(body);

    let value: serde_json::Value = serde_json::from_str(stripped).map_err(|e| PageError::LlmResponseUnparseable {
        page: page_num,
        detail: e.to_string(),
    })?;

    let array = match value {
        serde_json::Value::Array(a) => a,
        serde_json::Value::Object(ref obj) => match obj.get("transactions") {
            Some(serde_json::Value::Array(a)) => a.clone(),
            _ => return Err(PageError::LlmResponseShapeInvalid { page: page_num }),
        },
        _ => return Err(PageError::LlmResponseShapeInvalid { page: page_num }),
    };

    let mut rows = Vec::with_capacity(array.len());
    for element in array {
        let serde_json::Value::Object(obj) = element else {
            continue;
        };
        let mut row: RawRow = RawRow::new();
        for (key, val) in obj {
            row.insert(key, json_to_row_value(&val));
        }
        rows.push(row);
    }

    Ok(rows)
}

fn json_to_row_value(value: &serde_json::Value) -> RowValue {
    match value {
        serde_json::Value::Null => RowValue::Null,
        serde_json::Value::String(s) => RowValue::Text(s.clone()),
        serde_json::Value::Number(n) => n
            .to_string()
            .parse::<rust_decimal::Decimal>()
            .map(RowValue::Number)
            .unwrap_or(RowValue::Null),
        serde_json::Value::Bool(b) => RowValue::Text(b.to_string()),
        // Arrays/objects never appear in a well-formed raw row; render their
        // JSON text rather than silently dropping the field.
        other => RowValue::Text(other.to_string()),
    }
}

fn strip_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open
        .strip_prefix("json")
        .unwrap_or(after_open)
        .trim_start_matches(['\n', '\r']);
    after_open.strip_suffix("```").map(str::trim).unwrap_or(after_open)
}
