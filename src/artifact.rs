//! CSV artifact materialization and retrieval-id validation (§6).
//!
//! The orchestrator produces an opaque `downloadId`; the caller (HTTP layer
//! or CLI) is responsible for serving it back via `GET /download/:id`. This
//! module owns both halves of that contract: writing the CSV file and
//! validating that a requested id cannot escape the artifact directory.

use crate::model::{CanonicalRow, CANONICAL_FIELDS};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// `^[A-Za-z0-9_.\-]+\.csv$` — path-traversal safe: no `/`, no `..` segment
/// can match this pattern since dots are only permitted as ordinary
/// characters within a single path component.
static ARTIFACT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+\.csv$").expect("valid regex"));

/// Is `id` a syntactically valid artifact id per §6?
pub fn is_valid_artifact_id(id: &str) -> bool {
    ARTIFACT_ID_PATTERN.is_match(id)
}

/// Write `rows` as a CSV artifact named `id` under `artifact_dir`, returning
/// the file's path. Columns follow [`CANONICAL_FIELDS`] order; values are
/// each row's natural text form with `null` rendered as the empty string.
pub fn write_csv(artifact_dir: &Path, id: &str, rows: &[CanonicalRow]) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(artifact_dir)?;
    let path = artifact_dir.join(id);

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(CANONICAL_FIELDS)?;
    for row in rows {
        let record: Vec<String> = CANONICAL_FIELDS.iter().map(|f| row.field_text(f)).collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(path)
}

/// Resolve a requested artifact id to a path inside `artifact_dir`, or
/// `None` if the id is malformed or the file does not exist.
pub fn resolve_artifact_path(artifact_dir: &Path, id: &str) -> Option<PathBuf> {
    if !is_valid_artifact_id(id) {
        return None;
    }
    let path = artifact_dir.join(id);
    path.is_file().then_some(path)
}

/// Generate a fresh artifact id for one ingestion run.
pub fn new_artifact_id() -> String {
    format!("{}.csv", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn accepts_well_formed_id() {
        assert!(is_valid_artifact_id("a1b2c3.csv"));
        assert!(is_valid_artifact_id("run_2024-04-01.csv"));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(!is_valid_artifact_id("../../etc/passwd.csv"));
        assert!(!is_valid_artifact_id("a/b.csv"));
        assert!(!is_valid_artifact_id("no-extension"));
        assert!(!is_valid_artifact_id("trailing.csv.txt"));
    }

    #[test]
    fn generated_ids_are_valid() {
        for _ in 0..10 {
            assert!(is_valid_artifact_id(&new_artifact_id()));
        }
    }

    #[test]
    fn write_then_resolve_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let row = CanonicalRow::opening_balance("01/04/2024", Decimal::new(100000, 2));
        let id = new_artifact_id();
        write_csv(dir.path(), &id, &[row]).unwrap();

        let resolved = resolve_artifact_path(dir.path(), &id);
        assert_eq!(resolved, Some(dir.path().join(&id)));

        let contents = std::fs::read_to_string(dir.path().join(&id)).unwrap();
        assert!(contents.starts_with("date,description,amount,type,running_balance"));
        assert!(contents.contains("OPENING BALANCE"));
    }

    #[test]
    fn resolve_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_artifact_path(dir.path(), "missing.csv"), None);
    }
}
