//! Content extraction: turn an uploaded file into an analyzable payload.
//!
//! Classification is by declared MIME type only, in this order:
//!
//! ```text
//! application/pdf  ──▶ pdfium text layer, one line per page   ──▶ Text
//! image/*          ──▶ bare base64 of the raw bytes           ──▶ Image
//! anything else    ──▶ UTF-8 decode (strict or lossy)         ──▶ Text
//! ```
//!
//! Every successful path yields a non-empty string; an empty result is
//! reported as [`ExtractionError::EmptyContent`] instead.

use crate::config::{ExtractionOptions, TextDecoding};
use crate::error::ExtractionError;
use crate::output::PayloadKind;
use crate::pipeline::encode::{encode_image, parse_data_uri};
use crate::pipeline::pdf::extract_pdf_text_blocking;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// A file handed to the pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    /// Declared MIME type; drives classification.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .finish()
    }
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build a file from a base64 `data:` URI; the MIME type comes from its header.
    pub fn from_data_uri(name: impl Into<String>, uri: &str) -> Result<Self, ExtractionError> {
        let (mime_type, bytes) = parse_data_uri(uri)?;
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.mime_type)
    }
}

/// Extraction path chosen for a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Text,
}

impl FileKind {
    pub fn classify(mime_type: &str) -> Self {
        if mime_type == "application/pdf" {
            FileKind::Pdf
        } else if mime_type.starts_with("image/") {
            FileKind::Image
        } else {
            FileKind::Text
        }
    }
}

/// What the analysis step receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractionPayload {
    /// Flattened document text.
    Text { content: String },
    /// Bare base64 (no `data:` header) plus the MIME type it was declared with.
    Image { base64: String, mime_type: String },
}

impl ExtractionPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ExtractionPayload::Text { .. } => PayloadKind::Text,
            ExtractionPayload::Image { .. } => PayloadKind::Image,
        }
    }

    /// Length of the carried string in bytes.
    pub fn len(&self) -> usize {
        match self {
            ExtractionPayload::Text { content } => content.len(),
            ExtractionPayload::Image { base64, .. } => base64.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extraction outcome with the page count, for stats.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub payload: ExtractionPayload,
    /// PDF pages read; 0 for images and text.
    pub pages: usize,
}

/// Convert `file` into an [`ExtractionPayload`].
///
/// PDF page events go to `progress`; image and text files only get
/// `on_extraction_start` with a page count of 0.
pub async fn extract(
    file: &UploadedFile,
    options: &ExtractionOptions,
    progress: Option<&ProgressCallback>,
) -> Result<ExtractionPayload, ExtractionError> {
    extract_detailed(file, options, progress)
        .await
        .map(|e| e.payload)
}

/// Like [`extract`], also reporting how many PDF pages were read.
pub async fn extract_detailed(
    file: &UploadedFile,
    options: &ExtractionOptions,
    progress: Option<&ProgressCallback>,
) -> Result<Extracted, ExtractionError> {
    check_size(file, options)?;

    let kind = file.kind();
    info!(
        "Extracting '{}' ({}, {} bytes) as {:?}",
        file.name,
        file.mime_type,
        file.bytes.len(),
        kind
    );

    let extracted = match kind {
        FileKind::Pdf => {
            let name = file.name.clone();
            let bytes = file.bytes.clone();
            let opts = options.clone();
            let cb = progress.cloned();

            let (content, pages) = tokio::task::spawn_blocking(move || {
                extract_pdf_text_blocking(&name, &bytes, &opts, cb.as_ref())
            })
            .await
            .map_err(|e| ExtractionError::TaskFailed(e.to_string()))??;

            Extracted {
                payload: ExtractionPayload::Text { content },
                pages,
            }
        }
        FileKind::Image => {
            notify_start(progress, &file.name);
            if file.bytes.is_empty() {
                return Err(empty(file));
            }
            Extracted {
                payload: ExtractionPayload::Image {
                    base64: encode_image(&file.bytes),
                    mime_type: file.mime_type.clone(),
                },
                pages: 0,
            }
        }
        FileKind::Text => {
            notify_start(progress, &file.name);
            Extracted {
                payload: ExtractionPayload::Text {
                    content: decode_text(file, options.text_decoding)?,
                },
                pages: 0,
            }
        }
    };

    let blank = match &extracted.payload {
        ExtractionPayload::Text { content } => content.trim().is_empty(),
        ExtractionPayload::Image { base64, .. } => base64.is_empty(),
    };
    if blank {
        return Err(empty(file));
    }

    debug!(
        "Extracted '{}': {:?}, {} bytes, {} pages",
        file.name,
        extracted.payload.kind(),
        extracted.payload.len(),
        extracted.pages
    );
    Ok(extracted)
}

fn check_size(file: &UploadedFile, options: &ExtractionOptions) -> Result<(), ExtractionError> {
    if let Some(limit) = options.max_file_bytes {
        let size = file.bytes.len() as u64;
        if size > limit {
            return Err(ExtractionError::FileTooLarge {
                name: file.name.clone(),
                size,
                limit,
            });
        }
    }
    Ok(())
}

fn decode_text(file: &UploadedFile, decoding: TextDecoding) -> Result<String, ExtractionError> {
    match decoding {
        TextDecoding::Strict => String::from_utf8(file.bytes.clone()).map_err(|e| {
            ExtractionError::InvalidUtf8 {
                name: file.name.clone(),
                valid_up_to: e.utf8_error().valid_up_to(),
            }
        }),
        TextDecoding::Lossy => Ok(String::from_utf8_lossy(&file.bytes).into_owned()),
    }
}

fn notify_start(progress: Option<&ProgressCallback>, name: &str) {
    if let Some(cb) = progress {
        cb.on_extraction_start(name, 0);
    }
}

fn empty(file: &UploadedFile) -> ExtractionError {
    ExtractionError::EmptyContent {
        name: file.name.clone(),
    }
}
