//! Pipeline stages for bank-statement ingestion.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different text-extraction backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ classify ──▶ extract ──▶ normalize ──▶ reconcile
//! (upload)  (pdfium)   (issuer)    (LLM JSON)   (RawRow)      (flags)
//! ```
//!
//! 1. [`input`]     — stage an in-memory upload to a scratch file pdfium can open
//! 2. [`split`]     — extract reading-order text per page; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`classify`]  — best-effort issuer classification from page 1
//! 4. [`extract`]   — drive the LLM extraction call with retry/backoff; the
//!    only stage with network I/O besides classification
//! 5. [`normalize`] — resolve issuer-specific column names to canonical fields
//! 6. [`reconcile`] — validate running balances and repair type mis-assignment

pub mod classify;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod reconcile;
pub mod split;
