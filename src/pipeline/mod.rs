//! Pipeline stages for document analysis.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──────────────────────▶ llm ──▶ AnalysisResult
//! (path/URL/  (pdf: pdfium text layer,       (provider round trip,
//!  data URI)   image: encode, text: UTF-8)    schema validation)
//! ```
//!
//! 1. [`input`]   turns a path, URL or `data:` URI into an [`extract::UploadedFile`]
//! 2. [`extract`] classifies by MIME type and produces an
//!    [`extract::ExtractionPayload`]; the PDF branch lives in [`pdf`] and runs
//!    in `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]  base64 and `data:` URI helpers for the image branch
//! 4. [`llm`]     builds the provider request, bounds it with a timeout and
//!    validates the answer; the only stage with network I/O

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod pdf;
