//! Error types for ledgerlens.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the run cannot proceed at all (unparseable
//!   PDF, wrong password, no prompt configured). Returned as
//!   `Err(IngestError)` from [`crate::orchestrator::ingest`].
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (LLM transport
//!   error, unparseable response) but other pages are fine. Stored inside
//!   the per-page result so the orchestrator can skip and continue.
//!
//! The separation lets the orchestrator decide tolerance per stage: a page
//! failure is recorded and skipped, a run failure aborts and is surfaced.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by ledgerlens.
///
/// Page-level failures use [`PageError`] and never reach this type.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Upload exceeded the configured maximum size.
    #[error("Upload of {size} bytes exceeds the {max} byte limit")]
    UploadTooLarge { size: usize, max: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Text extraction failed for a specific page (fatal only when it
    /// happens while computing the document's page count/metadata; a
    /// per-page extraction failure during the fan-out is a [`PageError`]).
    #[error("Text extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// No text could be extracted from any page of the document.
    #[error("No extractable text found across {pages} page(s)")]
    NoTextExtracted { pages: usize },

    // ── Prompt errors ─────────────────────────────────────────────────────
    /// Neither an issuer-specific prompt nor the default prompt is active.
    #[error("No active prompt configured for issuer {issuer_tag:?} and no default prompt exists")]
    NoPromptConfigured { issuer_tag: Option<String> },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured text-completion provider is not initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed extraction; there is nothing to reconcile.
    #[error("All {total} page(s) failed extraction after retries.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Reconciliation produced zero admitted rows.
    #[error("No transactions could be extracted from this document")]
    NoTransactionsExtracted,

    // ── Persistence / artifact errors ────────────────────────────────────
    /// A requested artifact (CSV download) does not exist or is unreadable.
    #[error("Artifact '{id}' not found")]
    ArtifactNotFound { id: String },

    /// A requested run does not exist.
    #[error("Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    /// Could not write the CSV artifact to disk.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}")]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page's extraction.
///
/// Stored inside the per-page result when a page fails. The run continues
/// unless every page fails (see [`IngestError::AllPagesFailed`]).
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The LLM response was not valid JSON after fence-stripping.
    #[error("Page {page}: response was not valid JSON: {detail}")]
    LlmResponseUnparseable { page: usize, detail: String },

    /// The LLM response parsed as JSON but was not an array or
    /// `{"transactions": [...]}` object.
    #[error("Page {page}: response shape was not an array or {{transactions: [...]}}")]
    LlmResponseShapeInvalid { page: usize },

    /// The LLM call itself failed (network, rate limit, non-2xx) after all
    /// retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmTransportError {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// The LLM call exceeded `api_timeout_secs`.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

/// Render the user-visible message for a fatal error. Never the `Debug`
/// form — upstream payloads and stack traces stay out of client responses
/// unless `debug` is explicitly requested.
pub fn user_message(err: &IngestError, debug: bool) -> String {
    if debug {
        format!("{err}\n\n(debug) {err:?}")
    } else {
        err.to_string()
    }
}
