//! CLI binary for ledgerlens.
//!
//! A thin shim over the library crate: maps subcommands to the engine's
//! four operations (ingest, confirm-accuracy, feedback, download) backed by
//! a local SQLite [`SqliteRunStore`] and an on-disk artifact directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ledgerlens::prompts::default_prompt_cache;
use ledgerlens::store::run_store::{RunStore, SqliteRunStore};
use ledgerlens::{artifact, orchestrator, IngestConfig, IngestionProgressCallback, ProgressCallback};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────

/// Terminal progress callback: a live bar plus per-page log lines, correct
/// when pages complete out-of-order under concurrent extraction.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Classifying");
        bar.set_message("Splitting pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl IngestionProgressCallback for CliProgressCallback {
    fn on_ingestion_start(&self, total_pages: usize, issuer_tag: Option<&str>) {
        self.activate_bar(total_pages);
        let issuer = issuer_tag.unwrap_or("unknown issuer");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} page(s) — {issuer}"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times.lock().unwrap().insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, row_count: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{row_count} row(s)")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 { format!("{}\u{2026}", &error[..79]) } else { error };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_reconciliation_complete(&self, row_count: usize, flagged_count: usize) {
        self.bar.finish_and_clear();
        if flagged_count == 0 {
            eprintln!("{} {} transaction(s) reconciled, no flags", green("✔"), bold(&row_count.to_string()));
        } else {
            eprintln!(
                "{} {} transaction(s), {} flagged for review",
                cyan("⚠"),
                bold(&row_count.to_string()),
                bold(&flagged_count.to_string())
            );
        }
    }

    fn on_run_persisted(&self, run_id: Option<&str>) {
        match run_id {
            Some(id) => eprintln!("   {} {}", dim("run:"), id),
            None => eprintln!("   {}", red("run persistence failed — no run id")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest a statement, print the JSON response
  ledgerlens ingest statement.pdf

  # Ingest with a specific model/provider
  ledgerlens ingest --model gpt-4.1-nano --provider openai statement.pdf

  # Confirm a run's accuracy
  ledgerlens confirm-accuracy <run-id> --accurate

  # Submit corrected rows (JSON array of CanonicalRow)
  ledgerlens feedback <run-id> corrected.json

  # Retrieve a CSV artifact by id
  ledgerlens download <download-id> -o out.csv

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
"#;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerlens",
    version,
    about = "Extract and reconcile transactions from bank-statement PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the SQLite run store.
    #[arg(long, env = "LEDGERLENS_DB", default_value = "ledgerlens.db", global = true)]
    db: PathBuf,

    /// Directory where CSV download artifacts are written.
    #[arg(long, env = "LEDGERLENS_ARTIFACTS", default_value = "./artifacts", global = true)]
    artifacts: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Print the JSON response instead of a human summary.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a PDF and reconcile its transactions.
    Ingest {
        /// Local PDF file path.
        input: PathBuf,

        /// LLM model ID.
        #[arg(long, env = "EDGEQUAKE_MODEL")]
        model: Option<String>,

        /// LLM provider: openai, anthropic, gemini, ollama, azure.
        #[arg(long, env = "EDGEQUAKE_PROVIDER")]
        provider: Option<String>,

        /// Number of concurrent extraction calls.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// PDF user password for encrypted statements.
        #[arg(long)]
        password: Option<String>,

        /// Max LLM output tokens per page.
        #[arg(long, default_value_t = 2048)]
        max_tokens: usize,

        /// LLM temperature (0.0–2.0).
        #[arg(long, default_value_t = 0.0)]
        temperature: f32,

        /// Retries per page on LLM failure.
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Per-LLM-call timeout in seconds.
        #[arg(long, default_value_t = 60)]
        api_timeout: u64,

        /// Whole-pipeline timeout in seconds.
        #[arg(long, default_value_t = 300)]
        pipeline_timeout: u64,
    },
    /// Confirm (or retract) the accuracy of a previously ingested run.
    ConfirmAccuracy {
        run_id: String,
        #[arg(long)]
        accurate: bool,
    },
    /// Submit corrected rows for a run and print the diff analysis.
    Feedback {
        run_id: String,
        /// Path to a JSON file containing the corrected `CanonicalRow[]`.
        corrected: PathBuf,
    },
    /// Retrieve a CSV artifact by its download id.
    Download {
        id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.quiet || show_progress {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    if !pdfium_auto::is_pdfium_cached() {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
    }

    match cli.command {
        Command::Ingest {
            input,
            model,
            provider,
            concurrency,
            password,
            max_tokens,
            temperature,
            max_retries,
            api_timeout,
            pipeline_timeout,
        } => {
            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new_dynamic() as ProgressCallback)
            } else {
                None
            };

            let mut builder = IngestConfig::builder()
                .concurrency(concurrency)
                .max_tokens(max_tokens)
                .temperature(temperature)
                .max_retries(max_retries)
                .api_timeout_secs(api_timeout)
                .pipeline_timeout_secs(pipeline_timeout);

            if let Some(m) = model {
                builder = builder.model(m);
            }
            if let Some(p) = provider {
                builder = builder.provider_name(p);
            }
            if let Some(pw) = password {
                builder = builder.password(pw);
            }
            if let Some(cb) = progress_cb {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;

            let prompts = default_prompt_cache();
            let run_store = SqliteRunStore::open(&cli.db.to_string_lossy()).context("Failed to open run store")?;
            let source_name = input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| input.display().to_string());

            let response = orchestrator::ingest(&bytes, &source_name, &config, &prompts, &run_store, &cli.artifacts)
                .await
                .context("Ingestion failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if !cli.quiet {
                eprintln!(
                    "{}  downloadId={}  runId={}",
                    bold(&response.message),
                    dim(&response.download_id),
                    dim(&response.run_id.clone().unwrap_or_else(|| "null".to_string())),
                );
            }
        }

        Command::ConfirmAccuracy { run_id, accurate } => {
            let run_store = SqliteRunStore::open(&cli.db.to_string_lossy()).context("Failed to open run store")?;
            run_store.confirm_accuracy(&run_id, accurate).await.context("Confirmation failed")?;
            if !cli.quiet {
                eprintln!("{} run {} marked accurate={}", green("✔"), run_id, accurate);
            }
        }

        Command::Feedback { run_id, corrected } => {
            let corrected_json = tokio::fs::read_to_string(&corrected)
                .await
                .with_context(|| format!("Failed to read {}", corrected.display()))?;
            let corrected_rows = serde_json::from_str(&corrected_json).context("Corrected rows must be a CanonicalRow[] JSON array")?;

            let run_store = SqliteRunStore::open(&cli.db.to_string_lossy()).context("Failed to open run store")?;
            let submission = run_store.submit_feedback(&run_id, corrected_rows).await.context("Feedback submission failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            } else if !cli.quiet {
                eprintln!(
                    "{} feedback {} recorded — {} row(s) modified, {} added, {} deleted",
                    green("✔"),
                    submission.id,
                    submission.analysis.rows_modified,
                    submission.analysis.rows_added,
                    submission.analysis.rows_deleted,
                );
            }
        }

        Command::Download { id, output } => {
            let path = artifact::resolve_artifact_path(&cli.artifacts, &id).ok_or_else(|| anyhow::anyhow!("Artifact '{id}' not found"))?;
            tokio::fs::copy(&path, &output).await.context("Failed to copy artifact")?;
            if !cli.quiet {
                eprintln!("{} wrote {}", green("✔"), output.display());
            }
        }
    }

    Ok(())
}
