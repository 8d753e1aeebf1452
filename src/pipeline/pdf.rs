//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async tasks. The whole page loop runs
//! on a blocking-pool thread; progress events are emitted from there.
//!
//! ## Page order
//!
//! Pages are read one at a time, in order, because each page borrows
//! document-level resources held by the loaded `PdfDocument`. The loop itself
//! lives in [`collect_pages`], generic over [`PageTextSource`], so its ordering
//! and progress guarantees are testable without the native library.

use crate::config::ExtractionOptions;
use crate::error::ExtractionError;
use crate::progress::{page_percent, ProgressCallback};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// A paginated document whose pages yield text items.
pub trait PageTextSource {
    fn page_count(&self) -> usize;

    /// Text items of the page at 0-based `index`, in content order.
    fn page_items(&self, index: usize) -> Result<Vec<String>, ExtractionError>;
}

/// Flatten every page of `source` into one text blob.
///
/// Items within a page are joined by a single space; each page is followed
/// by `\n`. `on_page(page_num, total, percent)` fires after every page with
/// `percent = round(100 * page_num / total)`.
pub fn collect_pages<S, F>(source: &S, mut on_page: F) -> Result<String, ExtractionError>
where
    S: PageTextSource + ?Sized,
    F: FnMut(usize, usize, u8),
{
    let total = source.page_count();
    let mut text = String::new();

    for index in 0..total {
        let items = source.page_items(index)?;
        let page_text = items.join(" ");
        debug!("Page {}: {} items, {} chars", index + 1, items.len(), page_text.len());

        text.push_str(&page_text);
        text.push('\n');

        let page_num = index + 1;
        on_page(page_num, total, page_percent(page_num, total));
    }

    Ok(text)
}

/// Bind pdfium: an explicit directory first, then `./`, then the system path.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")),
    }
    .or_else(|_| Pdfium::bind_to_system_library())
    .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// A loaded pdfium document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    /// Parse `bytes`, mapping pdfium's load errors onto [`ExtractionError`].
    pub fn load(
        pdfium: &'a Pdfium,
        name: &str,
        bytes: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Self, ExtractionError> {
        let document = pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
            let err_str = format!("{e:?}");
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    ExtractionError::WrongPassword {
                        name: name.to_string(),
                    }
                } else {
                    ExtractionError::PasswordRequired {
                        name: name.to_string(),
                    }
                }
            } else {
                ExtractionError::CorruptPdf {
                    name: name.to_string(),
                    detail: err_str,
                }
            }
        })?;

        Ok(Self { document })
    }
}

impl PageTextSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_items(&self, index: usize) -> Result<Vec<String>, ExtractionError> {
        let page_failed = |detail: String| ExtractionError::PageTextFailed {
            page: index + 1,
            detail,
        };

        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| page_failed(format!("{e:?}")))?;
        let text = page.text().map_err(|e| page_failed(format!("{e:?}")))?;

        let items = text
            .segments()
            .iter()
            .map(|segment| segment.text())
            .collect();
        Ok(items)
    }
}

/// Blocking implementation of the PDF path.
///
/// Returns the joined text and the page count.
pub fn extract_pdf_text_blocking(
    name: &str,
    bytes: &[u8],
    options: &ExtractionOptions,
    progress: Option<&ProgressCallback>,
) -> Result<(String, usize), ExtractionError> {
    let pdfium = bind_pdfium(options.pdfium_lib_path.as_deref())?;
    let document = PdfiumDocument::load(&pdfium, name, bytes, options.pdf_password.as_deref())?;

    let total_pages = document.page_count();
    info!("PDF '{}' loaded: {} pages", name, total_pages);

    if let Some(limit) = options.max_pdf_pages {
        if total_pages > limit {
            return Err(ExtractionError::TooManyPages {
                name: name.to_string(),
                pages: total_pages,
                limit,
            });
        }
    }

    if let Some(cb) = progress {
        cb.on_extraction_start(name, total_pages);
    }

    let text = collect_pages(&document, |page_num, total, percent| {
        if let Some(cb) = progress {
            cb.on_page_extracted(page_num, total, percent);
        }
    })?;

    Ok((text, total_pages))
}
