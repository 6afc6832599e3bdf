//! C5 KeyNormalizer: turn heterogeneous [`RawRow`]s into [`CanonicalRow`]s.
//!
//! Modeled as a pipeline of small pure passes, the same staged-pure-function
//! shape the teacher uses for its deterministic markdown cleanup rules:
//! clean keys → resolve date/description/balance → resolve amount/type →
//! admit or reject. Each pass is independently testable and the whole
//! function is a pure `RawRow -> Option<CanonicalRow>` with no I/O.

use crate::model::{CanonicalRow, RawRow, RowValue, TransactionType};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Candidate source keys for each canonical field, in priority order
/// (first non-empty wins) — §4.5 step 2.
const DATE_KEYS: &[&str] = &["date", "Transaction Date", "Value Date", "Date"];
const DESCRIPTION_KEYS: &[&str] = &[
    "description",
    "Transaction Remarks",
    "Narration",
    "Transaction details",
];
const BALANCE_KEYS: &[&str] = &["running_balance", "Balance"];
const DEBIT_KEYS: &[&str] = &["Debit", "Withdrawal (Dr)"];
const CREDIT_KEYS: &[&str] = &["Credit", "Deposit(Cr)"];

/// Turn one raw row into a canonical row, or `None` if it cannot be
/// admitted (§4.5 step 4). Rejected rows are logged, never silently kept.
pub fn normalize_row(raw: RawRow) -> Option<CanonicalRow> {
    let cleaned = clean_keys(raw);

    let date = first_non_empty(&cleaned, DATE_KEYS);
    let description = first_non_empty(&cleaned, DESCRIPTION_KEYS)
        .unwrap_or_default()
        .replace(['\n', '\r'], " ");
    let description = collapse_whitespace(&description);
    let running_balance = first_non_empty(&cleaned, BALANCE_KEYS).and_then(|s| parse_amount(&s));

    let (amount, transaction_type) = resolve_amount_and_type(&cleaned, &description);

    let Some(date) = date else {
        debug!("dropping row: no date candidate present");
        return None;
    };
    let Some(running_balance) = running_balance else {
        debug!("dropping row: no running_balance candidate present");
        return None;
    };

    let is_opening_balance = amount == Some(Decimal::ZERO) && transaction_type.is_none();
    if amount.is_none() && !is_opening_balance {
        debug!("dropping row: no admissible amount/type and not opening-balance shaped");
        return None;
    }

    Some(CanonicalRow {
        date,
        description,
        amount,
        transaction_type,
        running_balance,
        balance_mismatch: false,
        type_corrected: false,
        invalid_structure: false,
    })
}

/// Step 1 — key cleaning: collapse any whitespace run (including embedded
/// newlines/tabs) in each key to a single space; trim.
fn clean_keys(raw: RawRow) -> HashMap<String, RowValue> {
    raw.into_iter()
        .map(|(k, v)| (collapse_whitespace(&k), v))
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_non_empty(row: &HashMap<String, RowValue>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = row.get(*key) {
            if !v.is_empty() {
                return Some(v.as_text());
            }
        }
    }
    None
}

fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        cleaned.parse::<Decimal>().ok()
    }
}

fn is_opening_balance_description(description: &str) -> bool {
    description.trim().eq_ignore_ascii_case("OPENING BALANCE")
}

/// Step 3 — amount/type resolution (§4.5).
fn resolve_amount_and_type(
    row: &HashMap<String, RowValue>,
    description: &str,
) -> (Option<Decimal>, Option<TransactionType>) {
    // Already-typed row: take it, forcing amount to its absolute value.
    if let Some(existing) = existing_typed_amount(row) {
        return existing;
    }

    let debit_candidate = first_non_empty(row, DEBIT_KEYS).and_then(|s| parse_amount(&s));
    let credit_candidate = first_non_empty(row, CREDIT_KEYS).and_then(|s| parse_amount(&s));

    if let Some(debit) = debit_candidate {
        if debit > Decimal::ZERO {
            return (Some(debit), Some(TransactionType::Debit));
        }
    }
    if let Some(credit) = credit_candidate {
        if credit > Decimal::ZERO {
            return (Some(credit), Some(TransactionType::Credit));
        }
    }
    if is_opening_balance_description(description) {
        return (Some(Decimal::ZERO), None);
    }

    (None, None)
}

/// If the row already carries a valid `(amount: number, type ∈
/// {credit,debit})` pair under the canonical keys, return it with the
/// amount forced to its absolute value.
fn existing_typed_amount(
    row: &HashMap<String, RowValue>,
) -> Option<(Option<Decimal>, Option<TransactionType>)> {
    let amount = row.get("amount").and_then(RowValue::as_decimal)?;
    let type_text = row.get("type")?.as_text();
    let transaction_type = match type_text.to_lowercase().as_str() {
        "credit" => TransactionType::Credit,
        "debit" => TransactionType::Debit,
        _ => return None,
    };
    Some((Some(amount.abs()), Some(transaction_type)))
}
