//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, or a terminal progress bar —
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so one callback can be shared
//! across the async pipeline.

use std::sync::Arc;

/// Called by the extraction pipeline as it processes the document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed strictly in sequence, so the
/// per-page methods are never called concurrently.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any model call, with the number of calls planned
    /// (page count in per-page mode, 1 in whole-document mode).
    fn on_extraction_start(&self, total_calls: usize) {
        let _ = total_calls;
    }

    /// Called just before a page is submitted to the model.
    fn on_page_start(&self, page_num: usize, total: usize) {
        let _ = (page_num, total);
    }

    /// Called when a page's reply has been parsed; `records` is the number of
    /// usable records the page contributed (0 for skipped pages).
    fn on_page_complete(&self, page_num: usize, total: usize, records: usize) {
        let _ = (page_num, total, records);
    }

    /// Called when a page fails at the model-call level.
    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let _ = (page_num, total, error);
    }

    /// Called once after the last page, with the count of pages that
    /// contributed records.
    fn on_extraction_complete(&self, total_calls: usize, contributed: usize) {
        let _ = (total_calls, contributed);
    }
}

/// Shared handle to a progress callback.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        completed: AtomicUsize,
    }

    impl ExtractionProgressCallback for Counting {
        fn on_page_complete(&self, _page: usize, _total: usize, _records: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_methods_are_noops() {
        let cb = Counting {
            completed: AtomicUsize::new(0),
        };
        cb.on_extraction_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_error(2, 3, "boom");
        cb.on_extraction_complete(3, 1);
        assert_eq!(cb.completed.load(Ordering::SeqCst), 0);

        cb.on_page_complete(1, 3, 5);
        assert_eq!(cb.completed.load(Ordering::SeqCst), 1);
    }
}
