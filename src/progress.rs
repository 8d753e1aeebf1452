//! Progress-callback trait for extraction and analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalyzerConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a file.
//!
//! Events arrive strictly in order: `on_extraction_start`, one
//! `on_page_extracted` per PDF page with a non-decreasing percentage ending at
//! 100, then `on_analysis_start` and `on_analysis_complete`. Image and text
//! files skip the page events.
//!
//! # Example
//!
//! ```rust
//! use ledgerlens::{AnalysisProgressCallback, AnalyzerConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder(Mutex<Vec<u8>>);
//!
//! impl AnalysisProgressCallback for Recorder {
//!     fn on_page_extracted(&self, _page: usize, _total: usize, percent: u8) {
//!         self.0.lock().unwrap().push(percent);
//!     }
//! }
//!
//! let config = AnalyzerConfig::builder()
//!     .progress_callback(Arc::new(Recorder(Mutex::new(Vec::new()))))
//!     .build()
//!     .unwrap();
//! ```

use crate::language::Language;
use std::sync::Arc;

/// Called by the pipeline as it extracts and analyses a file.
///
/// PDF page events are emitted from a blocking worker thread, hence
/// `Send + Sync`. All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the file has been classified.
    ///
    /// `total_pages` is the PDF page count, or 0 for images and text.
    fn on_extraction_start(&self, file_name: &str, total_pages: usize) {
        let _ = (file_name, total_pages);
    }

    /// Called after each PDF page's text has been collected.
    ///
    /// * `page_num`:    1-indexed page number
    /// * `total_pages`: pages in the document
    /// * `percent`:     `round(100 * page_num / total_pages)`
    fn on_page_extracted(&self, page_num: usize, total_pages: usize, percent: u8) {
        let _ = (page_num, total_pages, percent);
    }

    /// Called just before the provider request is sent.
    fn on_analysis_start(&self, language: Language) {
        let _ = language;
    }

    /// Called when the provider round trip has finished, successfully or not.
    fn on_analysis_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalyzerConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

/// Percentage reported after `done` of `total` pages, rounded half-up.
pub fn page_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    ((200 * done + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percent_rounds_like_the_progress_bar_expects() {
        assert_eq!(page_percent(1, 3), 33);
        assert_eq!(page_percent(2, 3), 67);
        assert_eq!(page_percent(3, 3), 100);
        assert_eq!(page_percent(1, 8), 13); // 12.5 rounds up
        assert_eq!(page_percent(0, 5), 0);
    }

    #[test]
    fn percent_is_monotonic_and_ends_at_100() {
        for total in 1..=250 {
            let seq: Vec<u8> = (1..=total).map(|i| page_percent(i, total)).collect();
            assert!(seq.windows(2).all(|w| w[0] <= w[1]), "total={total}");
            assert_eq!(*seq.last().unwrap(), 100);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start("a.pdf", 2);
        cb.on_page_extracted(1, 2, 50);
        cb.on_analysis_start(Language::En);
        cb.on_analysis_complete(false);
    }

    #[test]
    fn arc_dyn_callback_records_events() {
        struct Recorder(Mutex<Vec<String>>);
        impl AnalysisProgressCallback for Recorder {
            fn on_page_extracted(&self, page: usize, total: usize, percent: u8) {
                self.0.lock().unwrap().push(format!("{page}/{total}:{percent}"));
            }
            fn on_analysis_complete(&self, success: bool) {
                self.0.lock().unwrap().push(format!("done:{success}"));
            }
        }

        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let cb: ProgressCallback = rec.clone();
        cb.on_page_extracted(1, 2, 50);
        cb.on_analysis_complete(true);
        assert_eq!(*rec.0.lock().unwrap(), vec!["1/2:50", "done:true"]);
    }
}
