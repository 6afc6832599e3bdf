//! C3 PromptStore: resolve an active extraction prompt and template-expand
//! page text into it.
//!
//! Centralising the default prompts here serves two purposes: changing the
//! default extraction or classification behaviour requires editing exactly
//! one place, and unit tests can import and inspect prompts directly
//! without a real LLM call.

use crate::error::IngestError;
use crate::model::Prompt;
use std::collections::HashMap;

/// Default extraction prompt used for the `None` (default) issuer slot.
///
/// Instructs the model to return bare JSON — no markdown fences, no
/// commentary — but [`crate::pipeline::extract`] tolerates fences anyway
/// (§4.4 step 1), since models frequently wrap JSON in them regardless of
/// instruction.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are a bank statement transaction extractor. You will be given the raw text of one page of a bank statement.

Extract every transaction row visible on this page as a JSON array of objects. Each object should have keys matching what the statement shows (for example: date, description, debit, credit, balance) — use the column headers from the statement itself, do not invent a schema.

Rules:
- Preserve numbers and dates exactly as printed, including commas and punctuation.
- Include a row for "OPENING BALANCE" or "B/F" lines if present, with no debit or credit value.
- Do not summarize, merge, or skip rows.
- Do not include rows that are headers, footers, or page totals unless they represent an actual transaction.
- Output ONLY the JSON array. No markdown fences, no commentary.

Page text:
${textContent}"#;

/// Prompt used for the C2 classification call (§4.2).
pub const CLASSIFICATION_PROMPT: &str = r#"You will be given the first page of a bank statement. Identify which bank or card issuer produced this statement.

Respond with a single short line containing only the issuer's name (for example: ICICI, HDFC, State Bank of India). If you cannot determine the issuer, respond with exactly: unknown

Page text:
${textContent}"#;

/// `resolvePrompt(issuer_tag) → {id, text}` (§4.3).
///
/// Returns the active prompt for `issuer_tag`; if none exists, falls back
/// to the active default (`issuer_tag = None`); if neither exists, fails
/// with [`IngestError::NoPromptConfigured`] — fatal for the run, since §6
/// requires the engine to "fail closed" when the default slot is missing.
pub fn resolve_prompt<'a>(
    prompts: &'a PromptCache,
    issuer_tag: Option<&str>,
) -> Result<&'a Prompt, IngestError> {
    if let Some(tag) = issuer_tag {
        if let Some(p) = prompts.get(&Some(tag.to_string())) {
            return Ok(p);
        }
    }
    prompts
        .get(&None)
        .ok_or_else(|| IngestError::NoPromptConfigured {
            issuer_tag: issuer_tag.map(str::to_string),
        })
}

/// `expand(text, page_text) → prompt` (§4.3): substitutes every
/// `${textContent}` marker with the page text. No other interpolation.
pub fn expand(template: &str, page_text: &str) -> String {
    template.replace("${textContent}", page_text)
}

/// A per-run cache of resolved prompts, keyed by issuer tag (`None` is the
/// default slot).
///
/// Owned explicitly by the orchestrator and threaded through as `&PromptCache`
/// — per `SPEC_FULL.md` §4.3, this replaces the "process-wide singleton"
/// anti-pattern the source exhibited (§9's re-architecture note) with plain
/// dependency injection; it is never a global.
pub type PromptCache = HashMap<Option<String>, Prompt>;

/// Build the built-in prompt cache: one default extraction prompt, no
/// issuer-specific overrides. Callers wanting issuer-specific prompts
/// populate additional entries before passing the cache to the
/// orchestrator (the prompt-gallery CRUD surface itself is out of scope,
/// §1).
pub fn default_prompt_cache() -> PromptCache {
    let mut cache = PromptCache::new();
    cache.insert(
        None,
        Prompt {
            id: "default".to_string(),
            issuer_tag: None,
            text: DEFAULT_EXTRACTION_PROMPT.to_string(),
            version: 1,
            is_active: true,
            is_default: true,
        },
    );
    cache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_substitutes_marker() {
        let out = expand("before ${textContent} after", "PAGE TEXT");
        assert_eq!(out, "before PAGE TEXT after");
    }

    #[test]
    fn expand_has_no_other_interpolation() {
        let out = expand("${textContent} ${other}", "X");
        assert_eq!(out, "X ${other}");
    }

    #[test]
    fn resolve_prompt_falls_back_to_default() {
        let cache = default_prompt_cache();
        let p = resolve_prompt(&cache, Some("ICICI")).unwrap();
        assert_eq!(p.id, "default");
    }

    #[test]
    fn resolve_prompt_prefers_issuer_specific() {
        let mut cache = default_prompt_cache();
        cache.insert(
            Some("ICICI".to_string()),
            Prompt {
                id: "icici-v2".to_string(),
                issuer_tag: Some("ICICI".to_string()),
                text: "icici template ${textContent}".to_string(),
                version: 2,
                is_active: true,
                is_default: false,
            },
        );
        let p = resolve_prompt(&cache, Some("ICICI")).unwrap();
        assert_eq!(p.id, "icici-v2");
    }

    #[test]
    fn resolve_prompt_fails_closed_without_default() {
        let cache = PromptCache::new();
        let err = resolve_prompt(&cache, None).unwrap_err();
        assert!(matches!(err, IngestError::NoPromptConfigured { .. }));
    }
}
