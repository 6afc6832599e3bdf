//! C7 RunStore: persistence boundary for processing runs and feedback
//! submissions (§4.7).
//!
//! The trait is the narrow interface the orchestrator depends on; any
//! persistent store suffices. [`SqliteRunStore`] is the production
//! implementation. An in-memory implementation is provided for tests —
//! the same split the teacher pack's ledger trait uses between a
//! database-backed store and an in-process one.

use crate::error::IngestError;
use crate::model::{CanonicalRow, FeedbackSubmission, ProcessingRun, RowFlag};
use crate::store::diff::diff;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(
        &self,
        source_name: &str,
        rows: Vec<CanonicalRow>,
        model_tag: &str,
        prompt_id: &str,
    ) -> Result<String, IngestError>;

    /// Idempotent: setting the same value twice succeeds silently.
    async fn confirm_accuracy(&self, run_id: &str, is_accurate: bool) -> Result<(), IngestError>;

    async fn get_run(&self, run_id: &str) -> Result<ProcessingRun, IngestError>;

    /// Atomic with the diff analysis: the submission and its analysis are
    /// persisted together or not at all.
    async fn submit_feedback(
        &self,
        run_id: &str,
        corrected_rows: Vec<CanonicalRow>,
    ) -> Result<FeedbackSubmission, IngestError>;
}

fn row_flags(rows: &[CanonicalRow]) -> Vec<RowFlag> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, r)| RowFlag::from_row(i, r))
        .collect()
}

/// SQLite-backed [`RunStore`]. Rows and flags are stored as JSON text
/// columns rather than a normalized schema — the row list is read and
/// written as a unit, never queried by field, so JSON keeps the schema
/// trivial without sacrificing durability.
#[derive(Clone)]
pub struct SqliteRunStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    pub fn open(db_path: &str) -> Result<Self, IngestError> {
        let conn = Connection::open(db_path)
            .map_err(|e| IngestError::Internal(format!("open run store: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                source_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                model_tag TEXT NOT NULL,
                prompt_id TEXT NOT NULL,
                rows_json TEXT NOT NULL,
                flags_json TEXT NOT NULL,
                user_accuracy_confirmed INTEGER
            )",
            [],
        )
        .map_err(|e| IngestError::Internal(format!("create runs table: {e}")))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                corrected_rows_json TEXT NOT NULL,
                analysis_json TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| IngestError::Internal(format!("create feedback table: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<ProcessingRun> {
        let rows_json: String = row.get("rows_json")?;
        let flags_json: String = row.get("flags_json")?;
        let confirmed: Option<i64> = row.get("user_accuracy_confirmed")?;

        Ok(ProcessingRun {
            id: row.get("id")?,
            source_name: row.get("source_name")?,
            created_at: row.get("created_at")?,
            model_tag: row.get("model_tag")?,
            prompt_id: row.get("prompt_id")?,
            raw_rows: serde_json::from_str(&rows_json).unwrap_or_default(),
            flags: serde_json::from_str(&flags_json).unwrap_or_default(),
            user_accuracy_confirmed: confirmed.map(|v| v != 0),
        })
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn create_run(
        &self,
        source_name: &str,
        rows: Vec<CanonicalRow>,
        model_tag: &str,
        prompt_id: &str,
    ) -> Result<String, IngestError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let flags = row_flags(&rows);
        let rows_json = serde_json::to_string(&rows)
            .map_err(|e| IngestError::Internal(format!("serialize rows: {e}")))?;
        let flags_json = serde_json::to_string(&flags)
            .map_err(|e| IngestError::Internal(format!("serialize flags: {e}")))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO runs (id, source_name, created_at, model_tag, prompt_id, rows_json, flags_json, user_accuracy_confirmed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![run_id, source_name, Utc::now(), model_tag, prompt_id, rows_json, flags_json],
        )
        .map_err(|e| IngestError::Internal(format!("insert run: {e}")))?;

        Ok(run_id)
    }

    async fn confirm_accuracy(&self, run_id: &str, is_accurate: bool) -> Result<(), IngestError> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE runs SET user_accuracy_confirmed = ?1 WHERE id = ?2",
                params![is_accurate as i64, run_id],
            )
            .map_err(|e| IngestError::Internal(format!("update run: {e}")))?;

        if changed == 0 {
            return Err(IngestError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<ProcessingRun, IngestError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, source_name, created_at, model_tag, prompt_id, rows_json, flags_json, user_accuracy_confirmed
             FROM runs WHERE id = ?1",
            params![run_id],
            Self::row_to_run,
        )
        .map_err(|_| IngestError::RunNotFound {
            run_id: run_id.to_string(),
        })
    }

    async fn submit_feedback(
        &self,
        run_id: &str,
        corrected_rows: Vec<CanonicalRow>,
    ) -> Result<FeedbackSubmission, IngestError> {
        let run = self.get_run(run_id).await?;
        let analysis = diff(&run.raw_rows, &corrected_rows);
        let feedback_id = uuid::Uuid::new_v4().to_string();
        let submitted_at = Utc::now();

        let corrected_json = serde_json::to_string(&corrected_rows)
            .map_err(|e| IngestError::Internal(format!("serialize corrected rows: {e}")))?;
        let analysis_json = serde_json::to_string(&analysis)
            .map_err(|e| IngestError::Internal(format!("serialize analysis: {e}")))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO feedback (id, run_id, submitted_at, corrected_rows_json, analysis_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![feedback_id, run_id, submitted_at, corrected_json, analysis_json],
        )
        .map_err(|e| IngestError::Internal(format!("insert feedback: {e}")))?;

        Ok(FeedbackSubmission {
            id: feedback_id,
            run_id: run_id.to_string(),
            submitted_at,
            corrected_rows,
            analysis,
        })
    }
}

/// In-process [`RunStore`] for tests and the e2e harness; never durable
/// across restarts.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<String, ProcessingRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(
        &self,
        source_name: &str,
        rows: Vec<CanonicalRow>,
        model_tag: &str,
        prompt_id: &str,
    ) -> Result<String, IngestError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let flags = row_flags(&rows);
        let run = ProcessingRun {
            id: run_id.clone(),
            source_name: source_name.to_string(),
            created_at: Utc::now(),
            model_tag: model_tag.to_string(),
            prompt_id: prompt_id.to_string(),
            raw_rows: rows,
            flags,
            user_accuracy_confirmed: None,
        };
        self.runs.lock().await.insert(run_id.clone(), run);
        Ok(run_id)
    }

    async fn confirm_accuracy(&self, run_id: &str, is_accurate: bool) -> Result<(), IngestError> {
        let mut runs = self.runs.lock().await;
        let run = runs.get_mut(run_id).ok_or_else(|| IngestError::RunNotFound {
            run_id: run_id.to_string(),
        })?;
        run.user_accuracy_confirmed = Some(is_accurate);
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<ProcessingRun, IngestError> {
        self.runs
            .lock()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| IngestError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    async fn submit_feedback(
        &self,
        run_id: &str,
        corrected_rows: Vec<CanonicalRow>,
    ) -> Result<FeedbackSubmission, IngestError> {
        let run = self.get_run(run_id).await?;
        let analysis = diff(&run.raw_rows, &corrected_rows);
        Ok(FeedbackSubmission {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            submitted_at: Utc::now(),
            corrected_rows,
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample_row() -> CanonicalRow {
        CanonicalRow::opening_balance("01/04/2024", Decimal::new(100000, 2))
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let store = InMemoryRunStore::new();
        let run_id = store
            .create_run("statement.pdf", vec![sample_row()], "gpt-4.1-nano", "default")
            .await
            .unwrap();
        let run = store.get_run(&run_id).await.unwrap();
        assert_eq!(run.raw_rows.len(), 1);
        assert_eq!(run.user_accuracy_confirmed, None);
    }

    #[tokio::test]
    async fn confirm_accuracy_is_idempotent() {
        let store = InMemoryRunStore::new();
        let run_id = store
            .create_run("statement.pdf", vec![sample_row()], "gpt-4.1-nano", "default")
            .await
            .unwrap();
        store.confirm_accuracy(&run_id, true).await.unwrap();
        store.confirm_accuracy(&run_id, true).await.unwrap();
        let run = store.get_run(&run_id).await.unwrap();
        assert_eq!(run.user_accuracy_confirmed, Some(true));
    }

    #[tokio::test]
    async fn confirm_accuracy_on_unknown_run_errors() {
        let store = InMemoryRunStore::new();
        let err = store.confirm_accuracy("does-not-exist", true).await.unwrap_err();
        assert!(matches!(err, IngestError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn get_unknown_run_errors() {
        let store = InMemoryRunStore::new();
        let err = store.get_run("does-not-exist").await.unwrap_err();
        assert!(matches!(err, IngestError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn submit_feedback_carries_diff_analysis() {
        let store = InMemoryRunStore::new();
        let run_id = store
            .create_run("statement.pdf", vec![sample_row()], "gpt-4.1-nano", "default")
            .await
            .unwrap();
        let mut corrected = sample_row();
        corrected.description = "Adjusted".to_string();
        let submission = store.submit_feedback(&run_id, vec![corrected]).await.unwrap();
        assert_eq!(submission.analysis.rows_modified, 1);
    }
}
