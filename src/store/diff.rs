//! Diff analysis (§4.7): compare an original row list against a
//! user-corrected one, positionally.
//!
//! Row matching is positional — matching-by-content is an explicit
//! non-goal; a user who reorders rows is understood to have edited each
//! position in place.

use crate::model::{CanonicalRow, CellChange, DiffAnalysis, CANONICAL_FIELDS};

/// Compare `original` against `corrected` element-wise up to
/// `min(|original|, |corrected|)`; extra rows on either side count toward
/// `rows_added`/`rows_deleted`.
pub fn diff(original: &[CanonicalRow], corrected: &[CanonicalRow]) -> DiffAnalysis {
    let mut analysis = DiffAnalysis::default();
    let shared = original.len().min(corrected.len());

    for i in 0..shared {
        let mut row_modified = false;
        for field in CANONICAL_FIELDS {
            let old = original[i].field_text(field);
            let new = corrected[i].field_text(field);
            if old != new {
                analysis.cell_changes.push(CellChange {
                    row_index: i,
                    field: (*field).to_string(),
                    old,
                    new,
                });
                *analysis.field_change_counts.entry((*field).to_string()).or_insert(0) += 1;
                row_modified = true;
            }
        }
        if row_modified {
            analysis.rows_modified += 1;
        }
    }

    if corrected.len() > original.len() {
        analysis.rows_added = corrected.len() - original.len();
    }
    if original.len() > corrected.len() {
        analysis.rows_deleted = original.len() - corrected.len();
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::model::TransactionType;

    fn row(description: &str) -> CanonicalRow {
        CanonicalRow {
            date: "01/04/2024".to_string(),
            description: description.to_string(),
            amount: Some(Decimal::new(1000, 2)),
            transaction_type: Some(TransactionType::Debit),
            running_balance: Decimal::new(9000, 2),
            balance_mismatch: false,
            type_corrected: false,
            invalid_structure: false,
        }
    }

    /// S6 — diff analysis.
    #[test]
    fn s6_single_description_change() {
        let original = vec![row("A")];
        let corrected = vec![row("A2")];
        let analysis = diff(&original, &corrected);

        assert_eq!(analysis.rows_modified, 1);
        assert_eq!(analysis.rows_added, 0);
        assert_eq!(analysis.rows_deleted, 0);
        assert_eq!(analysis.cell_changes.len(), 1);
        assert_eq!(analysis.cell_changes[0].row_index, 0);
        assert_eq!(analysis.cell_changes[0].field, "description");
        assert_eq!(analysis.cell_changes[0].old, "A");
        assert_eq!(analysis.cell_changes[0].new, "A2");
        assert_eq!(analysis.field_change_counts.get("description"), Some(&1));
    }

    #[test]
    fn identical_rows_produce_empty_analysis() {
        let rows = vec![row("A"), row("B")];
        let analysis = diff(&rows, &rows);
        assert_eq!(analysis.rows_modified, 0);
        assert!(analysis.cell_changes.is_empty());
    }

    #[test]
    fn extra_corrected_rows_count_as_added() {
        let original = vec![row("A")];
        let corrected = vec![row("A"), row("B")];
        let analysis = diff(&original, &corrected);
        assert_eq!(analysis.rows_added, 1);
        assert_eq!(analysis.rows_modified, 0);
    }

    #[test]
    fn missing_corrected_rows_count_as_deleted() {
        let original = vec![row("A"), row("B")];
        let corrected = vec![row("A")];
        let analysis = diff(&original, &corrected);
        assert_eq!(analysis.rows_deleted, 1);
    }

    #[test]
    fn null_fields_render_as_empty_string() {
        let mut opening = CanonicalRow::opening_balance("01/04/2024", Decimal::new(100000, 2));
        let mut changed = opening.clone();
        changed.description = "Opening".to_string();
        opening.description = "OPENING BALANCE".to_string();
        let analysis = diff(&[opening], &[changed]);
        assert_eq!(analysis.rows_modified, 1);
        let type_change = analysis.cell_changes.iter().find(|c| c.field == "type");
        assert!(type_change.is_none());
    }
}
