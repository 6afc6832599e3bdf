//! Core data model: the shapes that cross every component boundary.
//!
//! [`RawRow`] is what C4 hands to C5 — an opaque, issuer-shaped mapping.
//! [`CanonicalRow`] is what everything downstream of C5 operates on. The
//! boundary between the two is deliberately a hard type change (tagged
//! [`RowValue`] vs. typed fields), not a shared dynamic map, so C5 is the
//! only place issuer variance can leak in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value as produced by the LLM for one cell of a raw transaction row.
///
/// Tagged rather than `serde_json::Value` so downstream code cannot
/// accidentally branch on shapes the extractor never actually produces
/// (arrays, nested objects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    Text(String),
    Number(Decimal),
    Null,
}

impl RowValue {
    /// Render as the row's natural text form; `Null` is the empty string.
    pub fn as_text(&self) -> String {
        match self {
            RowValue::Text(s) => s.clone(),
            RowValue::Number(n) => n.to_string(),
            RowValue::Null => String::new(),
        }
    }

    /// Strip thousands separators and parse as a decimal, if possible.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            RowValue::Number(n) => Some(*n),
            RowValue::Text(s) => {
                let cleaned: String = s.chars().filter(|c| *c != ',').collect();
                let cleaned = cleaned.trim();
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<Decimal>().ok()
                }
            }
            RowValue::Null => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RowValue::Null) || matches!(self, RowValue::Text(s) if s.trim().is_empty())
    }
}

/// An opaque, whitespace-key-cleaned row exactly as produced by C4/C5's key
/// cleaning pass. Issuer-shaped: keys vary per bank, values are untyped.
pub type RawRow = HashMap<String, RowValue>;

/// Which side of a balance equation a row contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    /// +1 for credit, -1 for debit — the sign applied to `amount` when
    /// computing the expected running balance.
    pub fn sign(self) -> i64 {
        match self {
            TransactionType::Credit => 1,
            TransactionType::Debit => -1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            TransactionType::Credit => TransactionType::Debit,
            TransactionType::Debit => TransactionType::Credit,
        }
    }
}

/// The reconciliation unit: a normalized transaction row, post-C5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    /// Preserved verbatim as received; no date arithmetic is performed.
    pub date: String,
    /// Newlines already collapsed to single spaces; may be empty.
    pub description: String,
    /// `None` iff `type` is `None` (opening-balance row).
    pub amount: Option<Decimal>,
    /// `None` iff this is an opening-balance row.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Signed; never null for any row that was admitted.
    pub running_balance: Decimal,

    #[serde(default)]
    pub balance_mismatch: bool,
    #[serde(default)]
    pub type_corrected: bool,
    #[serde(default)]
    pub invalid_structure: bool,
}

impl CanonicalRow {
    /// Construct an opening-balance row: `amount = 0, type = None`.
    pub fn opening_balance(date: impl Into<String>, running_balance: Decimal) -> Self {
        Self {
            date: date.into(),
            description: "OPENING BALANCE".to_string(),
            amount: Some(Decimal::ZERO),
            transaction_type: None,
            running_balance,
            balance_mismatch: false,
            type_corrected: false,
            invalid_structure: false,
        }
    }

    /// An opening-balance row is `amount = 0 ∧ type = null`; it carries no
    /// arithmetic and is exempt from the reconciler's balance check.
    pub fn is_opening_balance(&self) -> bool {
        self.transaction_type.is_none() && self.amount == Some(Decimal::ZERO)
    }

    /// The strict validity predicate from §4.6 step 2/3a: non-empty date,
    /// finite running balance, and either a typed amount or opening-balance
    /// shape.
    pub fn is_structurally_valid(&self) -> bool {
        if self.date.trim().is_empty() {
            return false;
        }
        if self.is_opening_balance() {
            return true;
        }
        self.transaction_type.is_some() && self.amount.is_some()
    }

    /// Render one field as its textual representation, for diffing and CSV
    /// export — `null` renders as the empty string.
    pub fn field_text(&self, field: &str) -> String {
        match field {
            "date" => self.date.clone(),
            "description" => self.description.clone(),
            "amount" => self
                .amount
                .map(|a| a.to_string())
                .unwrap_or_default(),
            "type" => match self.transaction_type {
                Some(TransactionType::Credit) => "credit".to_string(),
                Some(TransactionType::Debit) => "debit".to_string(),
                None => String::new(),
            },
            "running_balance" => self.running_balance.to_string(),
            "balance_mismatch" => self.balance_mismatch.to_string(),
            "type_corrected" => self.type_corrected.to_string(),
            "invalid_structure" => self.invalid_structure.to_string(),
            _ => String::new(),
        }
    }
}

/// The list of fields compared by the diff engine (§4.7) and written as CSV
/// columns (§6), in order.
pub const CANONICAL_FIELDS: &[&str] = &[
    "date",
    "description",
    "amount",
    "type",
    "running_balance",
    "balance_mismatch",
    "type_corrected",
    "invalid_structure",
];

/// A compact per-row flag summary, stored alongside a run rather than
/// recomputed from `raw_rows` on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFlag {
    pub row_index: usize,
    pub balance_mismatch: bool,
    pub type_corrected: bool,
    pub invalid_structure: bool,
}

impl RowFlag {
    pub fn from_row(row_index: usize, row: &CanonicalRow) -> Option<Self> {
        if row.balance_mismatch || row.type_corrected || row.invalid_structure {
            Some(Self {
                row_index,
                balance_mismatch: row.balance_mismatch,
                type_corrected: row.type_corrected,
                invalid_structure: row.invalid_structure,
            })
        } else {
            None
        }
    }
}

/// A persisted ingestion run (§3). Mutated only in `user_accuracy_confirmed`
/// after creation; never deleted implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRun {
    pub id: String,
    pub source_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub model_tag: String,
    pub prompt_id: String,
    pub raw_rows: Vec<CanonicalRow>,
    pub flags: Vec<RowFlag>,
    pub user_accuracy_confirmed: Option<bool>,
}

/// One user correction of a run (§3); immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub id: String,
    pub run_id: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub corrected_rows: Vec<CanonicalRow>,
    pub analysis: DiffAnalysis,
}

/// A single field-level change recorded by the diff engine (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellChange {
    pub row_index: usize,
    pub field: String,
    pub old: String,
    pub new: String,
}

/// The `analysis` payload returned by `RunStore::diff` and embedded in a
/// [`FeedbackSubmission`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffAnalysis {
    pub rows_added: usize,
    pub rows_deleted: usize,
    pub rows_modified: usize,
    pub cell_changes: Vec<CellChange>,
    pub field_change_counts: HashMap<String, usize>,
}

/// `{id, issuer_tag | null, text, version, is_active, is_default}` (§3).
/// Exactly one active prompt per `issuer_tag` slot; the `None` slot is the
/// default and must always contain an active row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub issuer_tag: Option<String>,
    pub text: String,
    pub version: u32,
    pub is_active: bool,
    pub is_default: bool,
}

// ── External interface contracts (§6) ───────────────────────────────────

/// The JSON shape returned by the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResponse {
    pub message: String,
    /// Preview: first 5 rows.
    pub transactions: Vec<CanonicalRow>,
    #[serde(rename = "fullTransactions")]
    pub full_transactions: Vec<CanonicalRow>,
    #[serde(rename = "totalTransactions")]
    pub total_transactions: usize,
    #[serde(rename = "downloadId")]
    pub download_id: String,
    #[serde(rename = "runId")]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyConfirmation {
    pub run_id: String,
    pub is_accurate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub run_id: String,
    pub corrected_data: Vec<CanonicalRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub feedback_id: String,
    pub analysis: DiffAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_value_strips_commas() {
        let v = RowValue::Text("1,500.50".to_string());
        assert_eq!(v.as_decimal(), Some(Decimal::new(150050, 2)));
    }

    #[test]
    fn row_value_null_has_no_decimal() {
        assert_eq!(RowValue::Null.as_decimal(), None);
        assert_eq!(RowValue::Text("".to_string()).as_decimal(), None);
    }

    #[test]
    fn opening_balance_is_structurally_valid_without_type() {
        let row = CanonicalRow::opening_balance("01/04/2024", Decimal::new(100000, 2));
        assert!(row.is_opening_balance());
        assert!(row.is_structurally_valid());
    }

    #[test]
    fn row_missing_running_balance_is_not_checked_here() {
        // running_balance has no Option wrapper; structural validity only
        // concerns date + amount/type shape.
        let row = CanonicalRow {
            date: String::new(),
            description: "X".to_string(),
            amount: Some(Decimal::ONE),
            transaction_type: Some(TransactionType::Credit),
            running_balance: Decimal::ZERO,
            balance_mismatch: false,
            type_corrected: false,
            invalid_structure: false,
        };
        assert!(!row.is_structurally_valid());
    }
}
