//! C2 BankClassifier: from page-1 text, produce a canonical issuer tag or
//! `None`.
//!
//! Classification is advisory, never blocking (§4.2, §8 design notes) — any
//! I/O failure, malformed response, or disqualified answer yields `None`
//! rather than aborting the run, the same philosophy the teacher pipeline
//! applies to auxiliary signals that should never take down the whole
//! document over one bad call.

use crate::config::IngestConfig;
use crate::prompts::{expand, CLASSIFICATION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::warn;

/// First-page text is truncated to this many characters before being sent
/// to the classifier (§4.2).
const MAX_INPUT_CHARS: usize = 2_000;

/// Responses longer than this are rejected as disqualified (§4.2).
const MAX_RESPONSE_CHARS: usize = 50;

/// Substring canonicalization table, checked case-insensitively in order;
/// first match wins. Mirrors §4.2's example ("contains \"ICICI\" ⇒ \"ICICI\"").
const CANONICALIZATIONS: &[(&str, &str)] = &[
    ("ICICI", "ICICI"),
    ("HDFC", "HDFC"),
    ("STATE BANK", "SBI"),
    ("SBI", "SBI"),
    ("AXIS", "AXIS"),
    ("KOTAK", "KOTAK"),
    ("YES BANK", "YES"),
    ("PUNJAB NATIONAL", "PNB"),
    ("CITI", "CITI"),
    ("CHASE", "CHASE"),
    ("WELLS FARGO", "WELLS FARGO"),
];

/// Classify the issuer from the first page's text. Returns `None` on any
/// disqualifying response or provider failure; never returns `Err`.
pub async fn classify_bank(provider: &Arc<dyn LLMProvider>, first_page_text: &str, config: &IngestConfig) -> Option<String> {
    let truncated: String = first_page_text.chars().take(MAX_INPUT_CHARS).collect();
    let prompt = expand(CLASSIFICATION_PROMPT, &truncated);

    let messages = vec![ChatMessage::system(
        "You classify bank statements by issuer. Respond with a single line only.",
    ), ChatMessage::user(&prompt)];

    let options = CompletionOptions {
        temperature: Some(0.0),
        max_tokens: Some(32),
        ..Default::default()
    };

    let call = provider.chat(&messages, Some(&options));
    let response = match tokio::time::timeout(
        std::time::Duration::from_secs(config.api_timeout_secs),
        call,
    )
    .await
    {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => {
            warn!("bank classification call failed: {e}");
            return None;
        }
        Err(_) => {
            warn!("bank classification call timed out after {}s", config.api_timeout_secs);
            return None;
        }
    };

    canonicalize_response(&response.content)
}

/// Apply the disqualification rules and canonicalization table to a raw
/// classifier response.
fn canonicalize_response(raw: &str) -> Option<String> {
    let line = raw.lines().next().unwrap_or("").trim();

    if line.is_empty() || line.len() > MAX_RESPONSE_CHARS || line.eq_ignore_ascii_case("unknown") {
        return None;
    }

    let upper = line.to_uppercase();
    for (needle, tag) in CANONICALIZATIONS {
        if upper.contains(needle) {
            return Some((*tag).to_string());
        }
    }

    Some(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_response() {
        assert_eq!(canonicalize_response(""), None);
        assert_eq!(canonicalize_response("   "), None);
    }

    #[test]
    fn rejects_unknown_case_insensitive() {
        assert_eq!(canonicalize_response("unknown"), None);
        assert_eq!(canonicalize_response("Unknown"), None);
        assert_eq!(canonicalize_response("UNKNOWN"), None);
    }

    #[test]
    fn rejects_overlong_response() {
        let long = "x".repeat(51);
        assert_eq!(canonicalize_response(&long), None);
    }

    #[test]
    fn canonicalizes_known_substring() {
        assert_eq!(
            canonicalize_response("This looks like an ICICI Bank statement"),
            Some("ICICI".to_string())
        );
        assert_eq!(
            canonicalize_response("State Bank of India"),
            Some("SBI".to_string())
        );
    }

    #[test]
    fn falls_back_to_uppercased_raw_line() {
        assert_eq!(canonicalize_response("Some Other Bank"), Some("SOME OTHER BANK".to_string()));
    }

    #[test]
    fn only_first_line_is_considered() {
        assert_eq!(
            canonicalize_response("HDFC\nextra commentary that should be ignored"),
            Some("HDFC".to_string())
        );
    }
}
