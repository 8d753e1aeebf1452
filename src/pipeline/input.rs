//! Input resolution: normalise a user-supplied path, URL or `data:` URI into
//! an [`UploadedFile`].
//!
//! Classification downstream is by MIME type, so every input gets one here:
//!
//! * `data:` URIs carry their own.
//! * HTTP downloads use `Content-Type` (parameters dropped), falling back to
//!   content sniffing when the server sends nothing useful.
//! * Local files are sniffed from their magic bytes (`%PDF` and the image
//!   formats with long signatures), then guessed from the extension, and
//!   otherwise treated as `text/plain`.

use crate::error::LedgerLensError;
use crate::pipeline::extract::UploadedFile;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

pub fn is_data_uri(input: &str) -> bool {
    input.starts_with("data:")
}

/// Resolve the input string to an in-memory file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedFile, LedgerLensError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LedgerLensError::InvalidInput {
            input: input.to_string(),
        });
    }

    if is_data_uri(input) {
        let file = UploadedFile::from_data_uri("inline", input)?;
        debug!("Resolved data URI: {} ({} bytes)", file.mime_type, file.bytes.len());
        Ok(file)
    } else if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        UploadedFile::from_path(input).await
    }
}

impl UploadedFile {
    /// Read a local file and infer its MIME type.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, LedgerLensError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LedgerLensError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => LedgerLensError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => LedgerLensError::Internal(format!("reading '{}': {e}", path.display())),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = infer_mime(path, &bytes);

        debug!("Resolved local file: {} as {}", path.display(), mime_type);
        Ok(UploadedFile::new(name, mime_type, bytes))
    }
}

/// MIME type for a local file: magic bytes, then extension, then `text/plain`.
pub fn infer_mime(path: &Path, bytes: &[u8]) -> String {
    sniff_mime(bytes)
        .or_else(|| mime_from_extension(path))
        .unwrap_or("text/plain")
        .to_string()
}

/// Recognise PDFs and raster images from their leading bytes.
///
/// Only formats with long, unambiguous signatures count. BMP (`BM`) and the
/// PNM family (`P1`..`P7`) are two ASCII bytes that plenty of CSV and text
/// files start with, so those are left to the extension.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    match image::guess_format(bytes).ok()? {
        f @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP | ImageFormat::Tiff) => {
            Some(f.to_mime_type())
        }
        _ => None,
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "csv" => "text/csv",
        "json" => "application/json",
        "md" => "text/markdown",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, LedgerLensError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| LedgerLensError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            LedgerLensError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(content_type_essence);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            LedgerLensError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let name = filename_from_url(url);
    let mime_type = match declared {
        Some(m) if m != "application/octet-stream" => m,
        _ => infer_mime(&PathBuf::from(&name), &bytes),
    };

    info!("Downloaded '{}': {} bytes, {}", name, bytes.len(), mime_type);
    Ok(UploadedFile::new(name, mime_type, bytes.to_vec()))
}

/// `"Application/PDF; charset=binary"` → `"application/pdf"`.
pub fn content_type_essence(header: &str) -> Option<String> {
    let essence = header.split(';').next()?.trim().to_ascii_lowercase();
    (!essence.is_empty()).then_some(essence)
}

/// Last path segment of the URL, or `"download"`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}
