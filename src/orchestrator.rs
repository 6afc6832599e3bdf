//! C8 PipelineOrchestrator: the per-upload algorithm (§4.8).
//!
//! Wires every other component together: ingest → split → classify →
//! fan-out extraction → merge → normalize → reconcile → persist → emit.
//! Modeled on the teacher's `convert()` entry point — same resolve-provider
//! fallback chain, same bounded-concurrency `buffer_unordered` fan-out —
//! generalized from page rendering to page text extraction.

use crate::artifact::{new_artifact_id, write_csv};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::model::{CanonicalRow, IngestionResponse, RawRow};
use crate::pipeline::{classify, extract, input, normalize, reconcile, split};
use crate::prompts::{expand, resolve_prompt, PromptCache};
use crate::store::run_store::RunStore;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Preview size for `IngestionResponse.transactions` (§6).
const PREVIEW_ROWS: usize = 5;

/// Run the full ingestion pipeline for one uploaded PDF.
///
/// `artifact_dir` is where the CSV download artifact is written; it is the
/// caller's responsibility to serve it back from `GET /download/:id`.
pub async fn ingest(
    bytes: &[u8],
    source_name: &str,
    config: &IngestConfig,
    prompts: &PromptCache,
    run_store: &dyn RunStore,
    artifact_dir: &Path,
) -> Result<IngestionResponse, IngestError> {
    let token = CancellationToken::new();
    let pipeline = run_pipeline(bytes, source_name, config, prompts, run_store, artifact_dir, &token);

    match tokio::time::timeout(Duration::from_secs(config.pipeline_timeout_secs), pipeline).await
    {
        Ok(result) => result,
        Err(_) => {
            // Signal any in-flight page task to stop dispatching further
            // LLM calls and skip persistence, even though the dropped
            // future already released its own resources.
            token.cancel();
            Err(IngestError::Internal(format!(
                "pipeline exceeded {}s timeout",
                config.pipeline_timeout_secs
            )))
        }
    }
}

async fn run_pipeline(
    bytes: &[u8],
    source_name: &str,
    config: &IngestConfig,
    prompts: &PromptCache,
    run_store: &dyn RunStore,
    artifact_dir: &Path,
    token: &CancellationToken,
) -> Result<IngestionResponse, IngestError> {
    // ── Step 1: Ingest ───────────────────────────────────────────────────
    let scratch = input::stage_upload(bytes, config.max_upload_bytes)?;
    let pdf_path = scratch.path().to_path_buf();

    // ── Step 2: Split ────────────────────────────────────────────────────
    let pages = split::split_pages(&pdf_path, config.password.as_deref()).await?;
    if pages.is_empty() {
        return Err(IngestError::NoTextExtracted { pages: 0 });
    }
    info!("Split {} pages from {}", pages.len(), source_name);

    let provider = resolve_provider(config)?;

    // ── Step 3: Classify (best-effort) ───────────────────────────────────
    let issuer = classify::classify_bank(&provider, &pages[0], config).await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_ingestion_start(pages.len(), issuer.as_deref());
    }
    info!("Classified issuer: {:?}", issuer);

    let prompt = resolve_prompt(prompts, issuer.as_deref())?.text.clone();

    // ── Step 4: Fan-out (bounded concurrency) ────────────────────────────
    let concurrency = config.concurrency.min(pages.len()).max(1);
    let total_pages = pages.len();
    let progress = config.progress_callback.clone();

    let extractions: Vec<(usize, Vec<RawRow>)> = futures::stream::iter(pages.into_iter().enumerate())
        .map(|(idx, text)| {
            let provider = Arc::clone(&provider);
            let prompt = prompt.clone();
            let config = config.clone();
            let progress = progress.clone();
            let token = token.clone();
            async move {
                let page_num = idx + 1;
                if token.is_cancelled() {
                    return (idx, Vec::new());
                }
                if let Some(ref cb) = progress {
                    cb.on_page_start(page_num, total_pages);
                }
                if text.trim().is_empty() {
                    if let Some(ref cb) = progress {
                        cb.on_page_complete(page_num, total_pages, 0);
                    }
                    return (idx, Vec::new());
                }
                let expanded = expand(&prompt, &text);
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        if let Some(ref cb) = progress {
                            cb.on_page_error(page_num, total_pages, "cancelled".to_string());
                        }
                        return (idx, Vec::new());
                    }
                    r = extract::extract_page(&provider, page_num, &expanded, &config) => r,
                };
                if let Some(ref cb) = progress {
                    match &result.error {
                        None => cb.on_page_complete(page_num, total_pages, result.raw_rows.len()),
                        Some(e) => cb.on_page_error(page_num, total_pages, e.to_string()),
                    }
                }
                if let Some(err) = result.error {
                    warn!("page {page_num} extraction failed: {err}");
                }
                (idx, result.raw_rows)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    // ── Step 5: Merge (ascending page_index) ─────────────────────────────
    let mut ordered = extractions;
    ordered.sort_by_key(|(idx, _)| *idx);
    let raw_rows: Vec<RawRow> = ordered.into_iter().flat_map(|(_, rows)| rows).collect();

    if raw_rows.is_empty() && total_pages > 0 {
        // Every page failed or produced no rows; report uniformly through
        // NoTransactionsExtracted below rather than a separate error kind —
        // the two are indistinguishable to the caller.
        warn!("no raw rows extracted across {total_pages} page(s)");
    }

    // ── Step 6: Normalize ─────────────────────────────────────────────────
    let canonical_rows: Vec<CanonicalRow> = raw_rows.into_iter().filter_map(normalize::normalize_row).collect();

    // ── Step 7: Reconcile ─────────────────────────────────────────────────
    let reconciled = reconcile::reconcile(canonical_rows);

    if reconciled.is_empty() {
        return Err(IngestError::NoTransactionsExtracted);
    }

    let flagged_count = reconciled
        .iter()
        .filter(|r| r.balance_mismatch || r.type_corrected || r.invalid_structure)
        .count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_reconciliation_complete(reconciled.len(), flagged_count);
    }

    // ── Step 8: Persist ───────────────────────────────────────────────────
    let model_tag = config.model.clone().unwrap_or_else(|| "default".to_string());
    let prompt_id = issuer.clone().unwrap_or_else(|| "default".to_string());

    let run_id = if token.is_cancelled() {
        warn!("skipping run persistence: pipeline was cancelled");
        None
    } else {
        let create = run_store.create_run(source_name, reconciled.clone(), &model_tag, &prompt_id);
        match tokio::time::timeout(Duration::from_secs(config.store_timeout_secs), create).await {
            Ok(Ok(id)) => Some(id),
            Ok(Err(e)) => {
                // RunPersistenceFailed: log, do not surface; runId := null.
                warn!("run persistence failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "run persistence timed out after {}s",
                    config.store_timeout_secs
                );
                None
            }
        }
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_persisted(run_id.as_deref());
    }

    // ── Step 9: Emit ──────────────────────────────────────────────────────
    let artifact_id = new_artifact_id();
    write_csv(artifact_dir, &artifact_id, &reconciled).map_err(|e| IngestError::ArtifactWriteFailed {
        path: artifact_dir.join(&artifact_id),
        source: e,
    })?;

    let total_transactions = reconciled.len();
    let preview = reconciled.iter().take(PREVIEW_ROWS).cloned().collect();

    Ok(IngestionResponse {
        message: format!("Extracted {total_transactions} transaction(s)"),
        transactions: preview,
        full_transactions: reconciled,
        total_transactions,
        download_id: artifact_id,
        run_id,
    })
}

/// Resolve the text-completion provider, most-specific to least-specific —
/// the same fallback chain the teacher applies to its vision provider, with
/// the vision-model defaulting dropped since this engine never sends images.
fn resolve_provider(config: &IngestConfig) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| IngestError::ProviderNotConfigured {
            provider: name.clone(),
            hint: e.to_string(),
        });
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return ProviderFactory::create_llm_provider(&prov, &model).map_err(|e| IngestError::ProviderNotConfigured {
                provider: prov,
                hint: e.to_string(),
            });
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
             Error: {e}"
        ),
    })?;

    Ok(llm_provider)
}
