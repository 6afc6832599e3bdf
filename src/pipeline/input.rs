//! C8 step 1 (Ingest): stage an in-memory upload to a scratch file pdfium
//! can open.
//!
//! ## Why a scratch file?
//!
//! pdfium requires a file-system path — it cannot stream from a byte
//! buffer. Writing to a [`tempfile::NamedTempFile`] gives us a path pdfium
//! can open while guaranteeing cleanup on every exit path (including a
//! panic), because the file is unlinked when the guard is dropped. We
//! validate the PDF magic bytes (`%PDF`) and the configured size limit
//! before ever touching pdfium, so callers get a meaningful error instead
//! of a pdfium crash.

use crate::error::IngestError;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

/// Validate and stage raw upload bytes as a scratch PDF file.
///
/// The returned [`NamedTempFile`] deletes itself when dropped — callers
/// should hold it alive for the duration of the pipeline run and let it
/// fall out of scope once reconciliation/persistence has completed.
pub fn stage_upload(bytes: &[u8], max_upload_bytes: usize) -> Result<NamedTempFile, IngestError> {
    if bytes.len() > max_upload_bytes {
        return Err(IngestError::UploadTooLarge {
            size: bytes.len(),
            max: max_upload_bytes,
        });
    }

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(IngestError::NotAPdf {
            path: "<upload>".into(),
            magic,
        });
    }

    let mut tmp = NamedTempFile::new().map_err(|e| IngestError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| IngestError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| IngestError::Internal(format!("tempfile flush: {e}")))?;

    debug!("Staged {} byte upload to {:?}", bytes.len(), tmp.path());
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf_bytes() -> Vec<u8> {
        b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec()
    }

    #[test]
    fn stages_valid_pdf() {
        let bytes = sample_pdf_bytes();
        let tmp = stage_upload(&bytes, 1024).unwrap();
        assert!(tmp.path().exists());
        let written = std::fs::read(tmp.path()).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn rejects_non_pdf_magic() {
        let bytes = b"not a pdf".to_vec();
        let err = stage_upload(&bytes, 1024).unwrap_err();
        assert!(matches!(err, IngestError::NotAPdf { .. }));
    }

    #[test]
    fn rejects_oversized_upload() {
        let bytes = sample_pdf_bytes();
        let err = stage_upload(&bytes, 2).unwrap_err();
        assert!(matches!(err, IngestError::UploadTooLarge { .. }));
    }

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let bytes = sample_pdf_bytes();
        let tmp = stage_upload(&bytes, 1024).unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        assert!(!path.exists());
    }
}
