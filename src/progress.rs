//! Progress-callback trait for per-page and per-run ingestion events.
//!
//! Inject an [`Arc<dyn IngestionProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline classifies and extracts each page.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a broadcast channel, a websocket, or a terminal
//! progress bar without the library knowing anything about how the host
//! communicates. The trait is `Send + Sync` so it works correctly when
//! pages are processed concurrently via `tokio::spawn`.

use std::sync::Arc;

/// Called by the pipeline as it classifies and extracts each page.
///
/// Implementations must be `Send + Sync` (pages are processed concurrently).
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_page_start`, `on_page_complete`, and `on_page_error` may be called
/// concurrently from different tasks. Implementations must protect shared
/// mutable state with appropriate synchronisation primitives.
pub trait IngestionProgressCallback: Send + Sync {
    /// Called once the document has been split and classified, before any
    /// page extraction is dispatched.
    fn on_ingestion_start(&self, total_pages: usize, issuer_tag: Option<&str>) {
        let _ = (total_pages, issuer_tag);
    }

    /// Called just before a page's extraction call is dispatched.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's extraction succeeds.
    ///
    /// `row_count` is the number of raw rows the LLM returned for this page
    /// (before C5 normalization may drop some).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, row_count: usize) {
        let _ = (page_num, total_pages, row_count);
    }

    /// Called when a page fails after all retries are exhausted.
    ///
    /// The error is passed by owned `String` (not `&str`) so this method
    /// can be called from within a `tokio::spawn`ed task without
    /// introducing a higher-ranked `Send` bound on the borrow.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once reconciliation has produced the final row list.
    fn on_reconciliation_complete(&self, row_count: usize, flagged_count: usize) {
        let _ = (row_count, flagged_count);
    }

    /// Called once the run has been persisted (or persistence failed).
    fn on_run_persisted(&self, run_id: Option<&str>) {
        let _ = run_id;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: Arc<AtomicUsize>,
        completes: Arc<AtomicUsize>,
        errors: Arc<AtomicUsize>,
    }

    impl IngestionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _row_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_ingestion_start(5, Some("ICICI"));
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 12);
        cb.on_page_error(2, 5, "boom".to_string());
        cb.on_reconciliation_complete(12, 1);
        cb.on_run_persisted(Some("abc"));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: Arc::new(AtomicUsize::new(0)),
            completes: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
        };

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 4);
        tracker.on_page_start(2, 3);
        tracker.on_page_error(2, 3, "timeout".to_string());

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    /// Regression-style test proving the callback can cross a `tokio::spawn`
    /// boundary — the same reason the teacher's equivalent callback takes
    /// `error: String` rather than `&str`.
    #[tokio::test]
    async fn on_page_error_is_send_when_used_in_spawn() {
        use std::sync::Mutex;

        struct StringCollector {
            errors: Arc<Mutex<Vec<String>>>,
        }

        impl IngestionProgressCallback for StringCollector {
            fn on_page_error(&self, _page_num: usize, _total_pages: usize, error: String) {
                self.errors.lock().unwrap().push(error);
            }
        }

        let collector = Arc::new(StringCollector {
            errors: Arc::new(Mutex::new(Vec::new())),
        });

        let cb: Arc<dyn IngestionProgressCallback> =
            Arc::clone(&collector) as Arc<dyn IngestionProgressCallback>;

        tokio::spawn(async move {
            cb.on_page_error(1, 5, "error from spawn".to_string());
        })
        .await
        .unwrap();

        let errors = collector.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], "error from spawn");
    }
}
