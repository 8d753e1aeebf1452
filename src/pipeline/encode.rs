//! Image payload encoding: raw bytes → bare base64, and `data:` URI parsing.
//!
//! Providers take inline images as a bare base64 string plus a separate MIME
//! type, so any `data:<mime>;base64,` header is stripped here and never
//! reaches the request body.

use crate::error::ExtractionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[^;,]*)(?P<params>(?:;[^;,]*)*),")
        .expect("data URI regex is valid")
});

/// Encode raw image bytes as standard, padded base64 with no prefix.
pub fn encode_image(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image: {} bytes → {} bytes base64", bytes.len(), b64.len());
    strip_data_uri_prefix(&b64).to_string()
}

/// Drop a leading `data:…,` header if present.
pub fn strip_data_uri_prefix(s: &str) -> &str {
    match DATA_URI_PREFIX.find(s) {
        Some(m) => &s[m.end()..],
        None => s,
    }
}

/// Split a base64 `data:` URI into its MIME type and decoded bytes.
///
/// A missing MIME type defaults to `application/octet-stream`. Only the
/// base64 form is accepted.
pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), ExtractionError> {
    let caps = DATA_URI_PREFIX
        .captures(uri)
        .ok_or_else(|| ExtractionError::InvalidDataUri("missing 'data:…,' header".into()))?;

    let is_base64 = caps["params"]
        .split(';')
        .any(|p| p.eq_ignore_ascii_case("base64"));
    if !is_base64 {
        return Err(ExtractionError::InvalidDataUri(
            "only base64-encoded data URIs are supported".into(),
        ));
    }

    let mime = match caps["mime"].trim() {
        "" => "application/octet-stream".to_string(),
        m => m.to_ascii_lowercase(),
    };
    let body = strip_data_uri_prefix(uri).trim();
    let bytes = STANDARD
        .decode(body)
        .map_err(|e| ExtractionError::InvalidDataUri(e.to_string()))?;

    Ok((mime, bytes))
}
