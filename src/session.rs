//! The caller-visible lifecycle of one upload.
//!
//! ```text
//!         begin            start_analysis         complete
//!  Idle ─────────▶ Extracting ─────────▶ Analyzing ─────────▶ Completed
//!   ▲                  │                     │
//!   │                  │ fail                │ fail
//!   │                  ▼                     ▼
//!   └──── reset ─────────────── Error ◀──────┘
//! ```
//!
//! Every accepted transition is published on a `tokio::sync::watch` channel,
//! so a UI can follow along with [`Session::subscribe`]. Illegal transitions
//! return [`TransitionError`] and leave the state untouched.

use crate::config::ExtractionOptions;
use crate::language::Language;
use crate::error::ExtractionError;
use crate::output::{AnalysisResult, AnalysisStats};
use crate::pipeline::extract::{extract_detailed, Extracted, UploadedFile};
use crate::pipeline::llm::Analyzer;
use crate::progress::{AnalysisProgressCallback, ProgressCallback};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Extracting { file_name: String, progress: u8 },
    Analyzing { file_name: String },
    Completed {
        file_name: String,
        result: Arc<AnalysisResult>,
        stats: AnalysisStats,
    },
    Error { message: String },
}

impl SessionState {
    /// Lower-case tag, for logs and errors.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Extracting { .. } => "extracting",
            SessionState::Analyzing { .. } => "analyzing",
            SessionState::Completed { .. } => "completed",
            SessionState::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed { .. } | SessionState::Error { .. })
    }
}

/// An operation was attempted from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} while {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: &'static str,
}

/// State holder for one upload at a time.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    tx: watch::Sender<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self {
            state: SessionState::Idle,
            tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receiver that sees every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    fn set(&mut self, next: SessionState) {
        debug!("session: {} → {}", self.state.label(), next.label());
        self.state = next.clone();
        self.tx.send_replace(next);
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            state: self.state.label(),
        }
    }

    /// Idle → Extracting at 0 %.
    pub fn begin(&mut self, file_name: impl Into<String>) -> Result<(), TransitionError> {
        if self.state != SessionState::Idle {
            return Err(self.reject("begin"));
        }
        self.set(SessionState::Extracting {
            file_name: file_name.into(),
            progress: 0,
        });
        Ok(())
    }

    /// Update extraction progress. Lower values than the current one are
    /// ignored; values above 100 are capped.
    pub fn report_progress(&mut self, percent: u8) -> Result<(), TransitionError> {
        match &self.state {
            SessionState::Extracting { file_name, progress } => {
                let next = percent.min(100);
                if next > *progress {
                    let file_name = file_name.clone();
                    self.set(SessionState::Extracting {
                        file_name,
                        progress: next,
                    });
                }
                Ok(())
            }
            _ => Err(self.reject("report progress")),
        }
    }

    /// Extracting → Analyzing.
    pub fn start_analysis(&mut self) -> Result<(), TransitionError> {
        match &self.state {
            SessionState::Extracting { file_name, .. } => {
                let file_name = file_name.clone();
                self.set(SessionState::Analyzing { file_name });
                Ok(())
            }
            _ => Err(self.reject("start analysis")),
        }
    }

    /// Analyzing → Completed, with empty stats.
    pub fn complete(&mut self, result: AnalysisResult) -> Result<(), TransitionError> {
        self.complete_with_stats(result, AnalysisStats::default())
    }

    /// Analyzing → Completed.
    pub fn complete_with_stats(&mut self, result: AnalysisResult, stats: AnalysisStats) -> Result<(), TransitionError> {
        match &self.state {
            SessionState::Analyzing { file_name } => {
                let file_name = file_name.clone();
                self.set(SessionState::Completed {
                    file_name,
                    result: Arc::new(result),
                    stats,
                });
                Ok(())
            }
            _ => Err(self.reject("complete")),
        }
    }

    /// Extracting | Analyzing → Error.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        match &self.state {
            SessionState::Extracting { .. } | SessionState::Analyzing { .. } => {
                self.set(SessionState::Error {
                    message: message.into(),
                });
                Ok(())
            }
            _ => Err(self.reject("fail")),
        }
    }

    /// Any state → Idle.
    pub fn reset(&mut self) {
        self.set(SessionState::Idle);
    }

    /// Drive one upload from `Idle` to a terminal state.
    ///
    /// `progress`, when given, still receives every extraction event. The
    /// completed state carries page count, token usage and timings.
    pub async fn run(
        &mut self,
        analyzer: &Analyzer,
        file: &UploadedFile,
        language: Language,
        options: &ExtractionOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<&SessionState, TransitionError> {
        self.run_with(analyzer, &file.name, language, progress, |cb| async move {
            extract_detailed(file, options, Some(&cb)).await
        })
        .await
    }

    /// [`Session::run`] with a caller-supplied extraction step.
    ///
    /// `extract` gets the callback that feeds the session. Page events are
    /// funnelled through a channel and applied while the extraction future
    /// runs, then any stragglers are drained before the session moves on.
    pub async fn run_with<F, Fut>(
        &mut self,
        analyzer: &Analyzer,
        file_name: &str,
        language: Language,
        progress: Option<ProgressCallback>,
        extract: F,
    ) -> Result<&SessionState, TransitionError>
    where
        F: FnOnce(ProgressCallback) -> Fut,
        Fut: Future<Output = Result<Extracted, ExtractionError>>,
    {
        self.begin(file_name)?;
        info!("Session started for '{}'", file_name);
        let total_start = Instant::now();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let forward: ProgressCallback = Arc::new(ChannelProgress { tx, inner: progress });

        let extraction = extract(forward);
        tokio::pin!(extraction);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(p) = rx.recv() => self.report_progress(p)?,
                res = &mut extraction => break res,
            }
        };
        while let Ok(p) = rx.try_recv() {
            self.report_progress(p)?;
        }
        let extraction_duration_ms = total_start.elapsed().as_millis() as u64;

        let extracted = match outcome {
            Ok(extracted) => extracted,
            Err(e) => {
                self.fail(e.to_string())?;
                return Ok(&self.state);
            }
        };

        self.start_analysis()?;
        match analyzer.analyze_with_usage(&extracted.payload, language).await {
            Ok(analysis) => {
                let stats = AnalysisStats {
                    payload_kind: Some(extracted.payload.kind()),
                    pages: extracted.pages,
                    payload_bytes: extracted.payload.len(),
                    input_tokens: analysis.input_tokens,
                    output_tokens: analysis.output_tokens,
                    extraction_duration_ms,
                    analysis_duration_ms: analysis.duration_ms,
                    total_duration_ms: total_start.elapsed().as_millis() as u64,
                };
                self.complete_with_stats(analysis.result, stats)?
            }
            Err(failure) => self.fail(failure.message())?,
        }

        info!("Session for '{}' ended: {}", file_name, self.state.label());
        Ok(&self.state)
    }
}

/// Forwards page percentages into the session's channel.
struct ChannelProgress {
    tx: mpsc::UnboundedSender<u8>,
    inner: Option<ProgressCallback>,
}

impl AnalysisProgressCallback for ChannelProgress {
    fn on_extraction_start(&self, file_name: &str, total_pages: usize) {
        if let Some(cb) = &self.inner {
            cb.on_extraction_start(file_name, total_pages);
        }
    }

    fn on_page_extracted(&self, page_num: usize, total_pages: usize, percent: u8) {
        let _ = self.tx.send(percent);
        if let Some(cb) = &self.inner {
            cb.on_page_extracted(page_num, total_pages, percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_result;

    #[test]
    fn happy_path_transitions() {
        let mut s = Session::new();
        s.begin("q3.pdf").unwrap();
        s.report_progress(33).unwrap();
        s.report_progress(67).unwrap();
        assert_eq!(
            s.state(),
            &SessionState::Extracting {
                file_name: "q3.pdf".into(),
                progress: 67
            }
        );
        s.start_analysis().unwrap();
        s.complete(sample_result()).unwrap();
        assert!(matches!(s.state(), SessionState::Completed { file_name, .. } if file_name == "q3.pdf"));
        assert!(s.state().is_terminal());
    }

    #[test]
    fn progress_never_regresses_and_caps_at_100() {
        let mut s = Session::new();
        s.begin("a").unwrap();
        s.report_progress(50).unwrap();
        s.report_progress(20).unwrap();
        assert!(matches!(s.state(), SessionState::Extracting { progress: 50, .. }));
        s.report_progress(250).unwrap();
        assert!(matches!(s.state(), SessionState::Extracting { progress: 100, .. }));
    }

    #[test]
    fn illegal_transitions_leave_state_unchanged() {
        let mut s = Session::new();
        assert_eq!(
            s.start_analysis(),
            Err(TransitionError {
                action: "start analysis",
                state: "idle"
            })
        );
        assert!(s.complete(sample_result()).is_err());
        assert!(s.fail("x").is_err());
        assert!(s.report_progress(10).is_err());
        assert_eq!(s.state(), &SessionState::Idle);

        s.begin("a").unwrap();
        assert!(s.begin("b").is_err());
        assert!(s.complete(sample_result()).is_err());
        assert!(matches!(s.state(), SessionState::Extracting { file_name, .. } if file_name == "a"));
    }

    #[test]
    fn error_requires_reset_before_next_upload() {
        let mut s = Session::new();
        s.begin("a").unwrap();
        s.fail("boom").unwrap();
        assert_eq!(
            s.state(),
            &SessionState::Error {
                message: "boom".into()
            }
        );
        assert!(s.begin("b").is_err());
        s.reset();
        s.begin("b").unwrap();
    }

    #[test]
    fn subscribers_see_transitions() {
        let mut s = Session::new();
        let rx = s.subscribe();
        s.begin("a").unwrap();
        s.start_analysis().unwrap();
        assert!(matches!(*rx.borrow(), SessionState::Analyzing { .. }));
    }
}
