//! # ledgerlens
//!
//! Normalize issuer-specific bank-statement PDFs into a reconciled
//! transaction ledger, using an LLM as the opaque text-extraction step.
//!
//! ## Why this crate?
//!
//! Bank statements share no common layout: column names, date formats, and
//! the debit/credit sign convention all vary by issuer. Rather than
//! hand-writing a parser per bank, each page's text is handed to an LLM with
//! an issuer-aware prompt, and the resulting rows are normalized into a
//! common shape and reconciled against the running balance the statement
//! itself reports — catching and repairing the extraction's most common
//! failure mode, a mis-assigned debit/credit, without ever trusting the
//! model's arithmetic.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Ingest     stage the upload to a scratch file
//!  ├─ 2. Split      per-page text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Classify   best-effort issuer tag from page 1 (never blocking)
//!  ├─ 4. Extract    concurrent LLM calls, one per page, JSON rows out
//!  ├─ 5. Normalize  issuer-specific columns → canonical fields
//!  ├─ 6. Reconcile  running-balance validation + single type-flip repair
//!  ├─ 7. Persist    durable run record via RunStore
//!  └─ 8. Emit       preview + full rows + CSV download id
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerlens::{orchestrator, IngestConfig, prompts};
//! use ledgerlens::store::run_store::InMemoryRunStore;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("statement.pdf")?;
//!     let config = IngestConfig::builder().build()?;
//!     let prompts = prompts::default_prompt_cache();
//!     let run_store = InMemoryRunStore::new();
//!
//!     let response = orchestrator::ingest(
//!         &bytes,
//!         "statement.pdf",
//!         &config,
//!         &prompts,
//!         &run_store,
//!         Path::new("./artifacts"),
//!     )
//!     .await?;
//!
//!     println!("{} transaction(s) extracted", response.total_transactions);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ledgerlens` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ledgerlens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{user_message, IngestError, PageError};
pub use model::{
    AccuracyConfirmation, CanonicalRow, CellChange, DiffAnalysis, FeedbackRequest, FeedbackResponse,
    FeedbackSubmission, IngestionResponse, ProcessingRun, Prompt, RawRow, RowFlag, RowValue, TransactionType,
};
pub use orchestrator::ingest;
pub use progress::{IngestionProgressCallback, NoopProgressCallback, ProgressCallback};
