//! Pipeline integration tests with an in-process provider.
//!
//! Nothing here touches the network or the pdfium library: the provider is a
//! canned [`AnalysisProvider`] and the PDF page loop is driven through a fake
//! [`PageTextSource`].

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ledgerlens::pipeline::extract::Extracted;
use ledgerlens::pipeline::pdf::{collect_pages, PageTextSource};
use ledgerlens::progress::page_percent;
use ledgerlens::{
    analyze_file, AnalysisFailure, AnalysisProgressCallback, AnalysisProvider, Analyzer, AnalyzerConfig,
    ExtractionError, ExtractionPayload, Language, LedgerLensError, PayloadKind, ProgressCallback, ProviderRequest, ProviderResponse,
    Session, SessionState, UploadedFile,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn valid_response() -> Value {
    json!({
        "summary": "Revenue grew 20% with stable margins.",
        "currency": "€",
        "riskReason": "Healthy liquidity, moderate leverage.",
        "riskRating": 4,
        "metrics": [
            { "label": "EBITDA", "value": "€4.1M", "trend": "up", "change": "+12%", "color": "#00f2ff" }
        ],
        "chartData": [
            { "period": "Q1", "revenue": 100, "expenses": 70, "profit": 30 },
            { "period": "Q2", "revenue": 120, "expenses": 80, "profit": 40 }
        ],
        "expenseBreakdown": [
            { "name": "Payroll", "value": 50, "color": "#111" }
        ],
        "comparisonData": [
            { "label": "Revenue", "current": 220, "previous": 180 }
        ],
        "insights": [
            { "category": "Growth", "title": "Expand DACH", "description": "Strong demand.", "recommendation": "Hire sales.", "severity": "low" }
        ]
    })
}

/// Answers every request with the same text, optionally after a delay.
struct CannedProvider {
    answer: Result<String, AnalysisFailure>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl CannedProvider {
    fn ok(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(text.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(failure: AnalysisFailure) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(failure),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(valid_response().to_string()),
            delay: Some(delay),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, AnalysisFailure> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.answer.clone().map(ProviderResponse::text)
    }
}

fn analyzer_for(provider: Arc<CannedProvider>, language: Language) -> (Analyzer, AnalyzerConfig) {
    let config = AnalyzerConfig::builder()
        .provider(provider)
        .language(language)
        .api_timeout_secs(5)
        .build()
        .unwrap();
    (Analyzer::from_config(&config).unwrap(), config)
}

struct FakePdf(Vec<Vec<&'static str>>);

impl PageTextSource for FakePdf {
    fn page_count(&self) -> usize {
        self.0.len()
    }

    fn page_items(&self, index: usize) -> Result<Vec<String>, ExtractionError> {
        Ok(self.0[index].iter().map(|s| s.to_string()).collect())
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[test]
fn three_page_pdf_text_and_progress() {
    let pdf = FakePdf(vec![
        vec!["Revenue:", "100"],
        vec!["Revenue:", "200"],
        vec!["Revenue:", "300"],
    ]);
    let mut progress = Vec::new();
    let text = collect_pages(&pdf, |_, _, pct| progress.push(pct)).unwrap();

    assert_eq!(text, "Revenue: 100\nRevenue: 200\nRevenue: 300\n");
    assert_eq!(progress, vec![33, 67, 100]);
}

#[test]
fn extraction_runs_outside_an_async_test() {
    let file = UploadedFile::new("q.csv", "text/csv", b"Q1,100".to_vec());
    let payload = tokio_test::block_on(ledgerlens::extract(&file, &Default::default(), None));
    let payload = tokio_test::assert_ok!(payload);
    assert_eq!(payload.kind(), PayloadKind::Text);
}

// ── Analysis ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn csv_upload_completes_and_sends_text_after_separator() {
    init_tracing();
    let provider = CannedProvider::ok(valid_response().to_string());
    let (analyzer, config) = analyzer_for(provider.clone(), Language::En);
    let file = UploadedFile::new("q.csv", "text/csv", b"Q1,100\nQ2,200".to_vec());

    let mut session = Session::new();
    let state = session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await
        .unwrap();

    match state {
        SessionState::Completed {
            file_name,
            result,
            stats,
        } => {
            assert_eq!(file_name, "q.csv");
            assert_eq!(result.currency, "€");
            assert_eq!(result.chart_data.len(), 2);
            assert_eq!(stats.payload_kind, Some(PayloadKind::Text));
            assert_eq!(stats.payload_bytes, "Q1,100\nQ2,200".len());
            assert_eq!(stats.pages, 0);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].image.is_none());
    assert!(requests[0].instruction.contains("MUST be in English."));
    assert!(requests[0]
        .instruction
        .ends_with("\n\nSource Content:\nQ1,100\nQ2,200"));
}

#[tokio::test]
async fn jpeg_upload_is_sent_as_bare_base64() {
    let bytes: Vec<u8> = (0..12_345u32).map(|i| (i % 251) as u8).collect();
    let provider = CannedProvider::ok(valid_response().to_string());
    let (analyzer, config) = analyzer_for(provider.clone(), Language::Ja);
    let file = UploadedFile::new("scan.jpg", "image/jpeg", bytes.clone());

    let output = analyze_file(&file, &analyzer, &config).await.unwrap();
    assert_eq!(output.stats.payload_kind, Some(PayloadKind::Image));
    assert_eq!(output.stats.pages, 0);

    let requests = provider.requests.lock().unwrap();
    let image = requests[0].image.as_ref().expect("image attached");
    assert_eq!(image.mime_type, "image/jpeg");
    assert!(!image.data.starts_with("data:"));
    assert_eq!(STANDARD.decode(&image.data).unwrap(), bytes);
    assert!(!requests[0].instruction.contains("Source Content"));
    assert!(requests[0].instruction.contains("Japanese"));
}

#[tokio::test]
async fn missing_insights_fails_with_invalid_structure() {
    let mut answer = valid_response();
    answer.as_object_mut().unwrap().remove("insights");
    let provider = CannedProvider::ok(answer.to_string());
    let (analyzer, config) = analyzer_for(provider, Language::Zh);
    let file = UploadedFile::new("q.txt", "text/plain", b"Revenue 100".to_vec());

    let mut session = Session::new();
    let state = session
        .run(&analyzer, &file, Language::Zh, &config.extraction, None)
        .await
        .unwrap();

    assert_eq!(
        state,
        &SessionState::Error {
            message: "Invalid response structure.".into()
        }
    );
}

#[tokio::test]
async fn non_json_answer_has_exact_message() {
    let provider = CannedProvider::ok("Here is your analysis: revenue is up.");
    let (analyzer, _config) = analyzer_for(provider, Language::En);
    let payload = ledgerlens::ExtractionPayload::Text {
        content: "Revenue 100".into(),
    };

    let err = analyzer.analyze(&payload, Language::En).await.unwrap_err();
    assert!(err.is_invalid_response());
    assert_eq!(err.message(), "Invalid response structure.");
}

#[tokio::test]
async fn provider_message_reaches_the_session() {
    let provider = CannedProvider::failing(AnalysisFailure::from_provider_message(Some(500), "backend overloaded"));
    let (analyzer, config) = analyzer_for(provider, Language::En);
    let file = UploadedFile::new("q.txt", "text/plain", b"Revenue 100".to_vec());

    let mut session = Session::new();
    let state = session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await
        .unwrap();

    assert_eq!(
        state,
        &SessionState::Error {
            message: "backend overloaded".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out() {
    init_tracing();
    let provider = CannedProvider::slow(Duration::from_secs(600));
    let (analyzer, config) = analyzer_for(provider.clone(), Language::En);
    let file = UploadedFile::new("q.txt", "text/plain", b"Revenue 100".to_vec());

    let err = analyze_file(&file, &analyzer, &config).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerLensError::Analysis(AnalysisFailure::Timeout { secs: 5 })
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_provider_leaves_the_session_in_error() {
    let provider = CannedProvider::slow(Duration::from_secs(600));
    let (analyzer, config) = analyzer_for(provider.clone(), Language::En);
    let file = UploadedFile::new("q.txt", "text/plain", b"Revenue 100".to_vec());

    let mut session = Session::new();
    let rx = session.subscribe();
    let state = session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await
        .unwrap();

    match state {
        SessionState::Error { message } => assert!(message.contains("timed out after 5s"), "{message}"),
        other => panic!("expected Error, got {other:?}"),
    }
    assert!(matches!(*rx.borrow(), SessionState::Error { .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn session_reports_each_page_while_extracting() {
    let provider = CannedProvider::ok(valid_response().to_string());
    let (analyzer, _config) = analyzer_for(provider, Language::En);

    let mut session = Session::new();
    let mut rx = session.subscribe();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    // Emits one event per page and waits until the session has published it.
    let extract = |cb: ProgressCallback| async move {
        cb.on_extraction_start("statement.pdf", 3);
        for page in 1..=3 {
            let pct = page_percent(page, 3);
            cb.on_page_extracted(page, 3, pct);
            let progress = {
                let state = rx
                    .wait_for(|s| matches!(s, SessionState::Extracting { progress, .. } if *progress >= pct))
                    .await
                    .unwrap();
                match &*state {
                    SessionState::Extracting { progress, .. } => *progress,
                    _ => unreachable!(),
                }
            };
            recorded.lock().unwrap().push(progress);
        }
        Ok::<_, ExtractionError>(Extracted {
            payload: ExtractionPayload::Text {
                content: "Revenue: 100\nRevenue: 200\nRevenue: 300\n".into(),
            },
            pages: 3,
        })
    };

    let state = session
        .run_with(&analyzer, "statement.pdf", Language::En, None, extract)
        .await
        .unwrap();

    match state {
        SessionState::Completed { file_name, stats, .. } => {
            assert_eq!(file_name, "statement.pdf");
            assert_eq!(stats.pages, 3);
            assert_eq!(stats.payload_kind, Some(PayloadKind::Text));
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(*seen.lock().unwrap(), vec![33, 67, 100]);
}

#[tokio::test]
async fn extraction_failure_never_reaches_the_provider() {
    let provider = CannedProvider::ok(valid_response().to_string());
    let (analyzer, config) = analyzer_for(provider.clone(), Language::En);
    let file = UploadedFile::new("legacy.txt", "text/plain", b"Umsatz \xe4 100".to_vec());

    let mut session = Session::new();
    let state = session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await
        .unwrap()
        .clone();

    assert!(matches!(state, SessionState::Error { ref message } if message.contains("not valid UTF-8")));
    assert_eq!(provider.calls(), 0);

    // A failed session must be reset before the next upload.
    let retry = session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await;
    assert!(retry.is_err());
    session.reset();
    assert_eq!(session.state(), &SessionState::Idle);
}

#[tokio::test]
async fn analysis_callbacks_fire_once_each() {
    struct Counter {
        starts: AtomicUsize,
        completes: AtomicUsize,
        extraction_starts: AtomicUsize,
    }
    impl AnalysisProgressCallback for Counter {
        fn on_extraction_start(&self, _name: &str, _pages: usize) {
            self.extraction_starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_analysis_start(&self, _language: Language) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_analysis_complete(&self, _success: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter {
        starts: AtomicUsize::new(0),
        completes: AtomicUsize::new(0),
        extraction_starts: AtomicUsize::new(0),
    });
    let cb: ProgressCallback = counter.clone();
    let config = AnalyzerConfig::builder()
        .provider(CannedProvider::ok(valid_response().to_string()))
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let analyzer = Analyzer::from_config(&config).unwrap();
    let file = UploadedFile::new("q.csv", "text/csv", b"Q1,100".to_vec());

    let mut session = Session::new();
    session
        .run(&analyzer, &file, Language::De, &config.extraction, Some(cb))
        .await
        .unwrap();

    assert_eq!(counter.extraction_starts.load(Ordering::SeqCst), 1);
    assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counter.completes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_subscribers_observe_the_terminal_state() {
    let provider = CannedProvider::ok(valid_response().to_string());
    let (analyzer, config) = analyzer_for(provider, Language::En);
    let file = UploadedFile::new("q.csv", "text/csv", b"Q1,100".to_vec());

    let mut session = Session::new();
    let rx = session.subscribe();
    session
        .run(&analyzer, &file, Language::En, &config.extraction, None)
        .await
        .unwrap();

    assert!(matches!(*rx.borrow(), SessionState::Completed { .. }));
}
