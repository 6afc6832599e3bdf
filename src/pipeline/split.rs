//! C1 PageSplitter: turn a PDF byte blob into an ordered sequence of
//! page-text strings preserving reading order.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread-pool thread designed for blocking operations, preventing the
//! Tokio worker threads from stalling while pdfium walks the document's
//! character stream.
//!
//! ## Reading-order reconstruction
//!
//! pdfium exposes one character at a time with its unicode scalar and
//! bounding box; it does not group them into lines for us. Characters are
//! clustered into lines by the top of their bounding box (within a small
//! epsilon, to absorb sub-pixel baseline jitter), lines are emitted
//! top-to-bottom, and characters within a line are ordered left-to-right —
//! exactly the "items on the same vertical position are joined with single
//! spaces; a vertical-coordinate change emits a newline" rule.

use crate::error::IngestError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Vertical clustering tolerance, in PDF points, below which two characters
/// are considered to be on the same line.
const LINE_EPSILON: f32 = 2.0;

/// Split a PDF file into one text string per page, preserving reading
/// order. Empty pages produce `""` at their ordinal position — never a
/// missing element.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound and
/// not async-safe.
pub async fn split_pages(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, IngestError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || split_pages_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| IngestError::Internal(format!("split task panicked: {e}")))?
}

fn split_pages_blocking(pdf_path: &Path, password: Option<&str>) -> Result<Vec<String>, IngestError> {
    let pdfium = Pdfium::default();

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                IngestError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                IngestError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            IngestError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut out = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page_text(&page).map_err(|detail| IngestError::ExtractionFailed {
            page: idx + 1,
            detail,
        })?;
        debug!("Page {}: {} chars extracted", idx + 1, text.len());
        out.push(text);
    }

    Ok(out)
}

/// Reconstruct one page's reading-order text from its character stream.
fn page_text(page: &PdfPage) -> Result<String, String> {
    let text = page.text().map_err(|e| format!("{e:?}"))?;

    let mut items: Vec<(f32, f32, char)> = Vec::new();
    for ch in text.chars().iter() {
        let Some(unicode) = ch.unicode_char() else {
            continue;
        };
        let Ok(bounds) = ch.loose_bounds() else {
            continue;
        };
        items.push((bounds.top().value, bounds.left().value, unicode));
    }

    if items.is_empty() {
        return Ok(String::new());
    }

    // Sort top-to-bottom (descending y in PDF space), then left-to-right.
    items.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<Vec<(f32, char)>> = Vec::new();
    let mut current_y = items[0].0;
    let mut current_line: Vec<(f32, char)> = Vec::new();

    for (y, x, ch) in items {
        if (current_y - y).abs() > LINE_EPSILON {
            lines.push(std::mem::take(&mut current_line));
            current_y = y;
        }
        current_line.push((x, ch));
    }
    lines.push(current_line);

    let mut out = String::new();
    for (i, line) in lines.iter_mut().enumerate() {
        line.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        if i > 0 {
            out.push('\n');
        }
        for (_, ch) in line.iter() {
            out.push(*ch);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_at(top: f32, left: f32, ch: char) -> (f32, f32, char) {
        (top, left, ch)
    }

    /// Exercises the line-clustering logic in isolation (no real pdfium
    /// document needed) by reimplementing the grouping step over synthetic
    /// character positions.
    fn group_and_render(mut items: Vec<(f32, f32, char)>) -> String {
        items.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        let mut lines: Vec<Vec<(f32, char)>> = Vec::new();
        let mut current_y = items[0].0;
        let mut current_line = Vec::new();
        for (y, x, ch) in items {
            if (current_y - y).abs() > LINE_EPSILON {
                lines.push(std::mem::take(&mut current_line));
                current_y = y;
            }
            current_line.push((x, ch));
        }
        lines.push(current_line);

        let mut out = String::new();
        for (i, line) in lines.iter_mut().enumerate() {
            line.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            if i > 0 {
                out.push('\n');
            }
            for (_, ch) in line.iter() {
                out.push(*ch);
            }
        }
        out
    }

    #[test]
    fn two_lines_become_newline_separated() {
        let items = vec![
            char_at(100.0, 0.0, 'H'),
            char_at(100.0, 5.0, 'i'),
            char_at(80.0, 0.0, 'Y'),
            char_at(80.0, 5.0, 'o'),
        ];
        assert_eq!(group_and_render(items), "Hi\nYo");
    }

    #[test]
    fn jitter_within_epsilon_stays_one_line() {
        let items = vec![
            char_at(100.0, 0.0, 'A'),
            char_at(101.2, 5.0, 'B'),
            char_at(99.3, 10.0, 'C'),
        ];
        assert_eq!(group_and_render(items), "ABC");
    }
}
