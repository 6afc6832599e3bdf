//! Configuration types for the ingestion pipeline.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across requests, serialise them for logging,
//! and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one ingestion run.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use ledgerlens::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Number of concurrent LLM extraction calls. Default: 4 (§5 suggested
    /// default `min(pages, 4)`).
    ///
    /// Per-page LLM calls are network-bound, not CPU-bound. Raising this
    /// cuts wall-clock time roughly linearly up to the provider's rate
    /// limit; lower it if you see 429s.
    pub concurrency: usize,

    /// LLM model identifier. If `None`, uses the provider's default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic"). If `None` along with
    /// `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for both classification and extraction calls.
    /// Default: 0.0 — deterministic, faithful transcription of numbers is
    /// far more valuable here than any creativity.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 2048.
    ///
    /// Dense statement pages rarely exceed a few dozen rows of JSON; 2048
    /// covers that comfortably while keeping per-page cost predictable.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 2 (§7's
    /// "up to 2 attempts" recommendation).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s. Exponential backoff avoids
    /// the thundering-herd problem where many concurrent page workers retry
    /// simultaneously against a recovering API.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted statements.
    pub password: Option<String>,

    /// Per-LLM-call timeout in seconds (§5 suggested: 60). Covers both the
    /// classification call and each page's extraction call.
    pub api_timeout_secs: u64,

    /// PromptStore / RunStore I/O timeout in seconds. Default: 10.
    pub store_timeout_secs: u64,

    /// Whole-pipeline timeout in seconds (§5 suggested: 300).
    pub pipeline_timeout_secs: u64,

    /// Maximum accepted upload size in bytes (§6: 25 MiB).
    pub max_upload_bytes: usize,

    /// Optional progress callback invoked as pages are classified/extracted.
    pub progress_callback: Option<ProgressCallback>,
}

/// Balance-equality tolerance used by the reconciler (§3 invariant 1, §4.6).
/// Not currently exposed on [`IngestConfig`] — see `SPEC_FULL.md` §10.4:
/// multi-currency/precision support would need a per-run tolerance, but
/// that is explicitly out of scope today.
pub const BALANCE_TOLERANCE: rust_decimal::Decimal = rust_decimal::Decimal::from_parts(10, 0, 0, false, 2);

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            password: None,
            api_timeout_secs: 60,
            store_timeout_secs: 10,
            pipeline_timeout_secs: 300,
            max_upload_bytes: 25 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("pipeline_timeout_secs", &self.pipeline_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn store_timeout_secs(mut self, secs: u64) -> Self {
        self.config.store_timeout_secs = secs;
        self
    }

    pub fn pipeline_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pipeline_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(IngestError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(IngestConfig::builder().build().is_ok());
    }

    #[test]
    fn zero_concurrency_is_clamped_to_one() {
        let cfg = IngestConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(cfg.concurrency, 1);
    }

    #[test]
    fn balance_tolerance_is_one_tenth() {
        assert_eq!(BALANCE_TOLERANCE.to_string(), "0.10");
    }
}
