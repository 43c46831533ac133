//! Document loaders.
//!
//! A loader turns a file on disk into per-page text. PDFs are parsed with
//! `lopdf`; plain text and markdown files are read as a single page.

use std::fs;
use std::path::Path;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use super::error::RagError;

/// Extracted text of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
}

/// All extracted text of a source file, in page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// File name used as the chunk source.
    pub source: String,
    pub pages: Vec<PageText>,
}

impl SourceDocument {
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<SourceDocument, RagError>;
}

/// Loads a PDF page by page.
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<SourceDocument, RagError> {
        let document =
            lopdf::Document::load(path).map_err(|e| RagError::document_load(path, e))?;

        let pages = extract_pages(path, document.get_pages().keys().copied(), |page| {
            document.extract_text(&[page])
        })?;

        Ok(SourceDocument {
            source: source_name(path),
            pages,
        })
    }
}

/// Run `extract` for every page. A page that fails fails the whole document.
fn extract_pages<E>(
    path: &Path,
    page_numbers: impl IntoIterator<Item = u32>,
    mut extract: impl FnMut(u32) -> Result<String, E>,
) -> Result<Vec<PageText>, RagError>
where
    E: Into<anyhow::Error>,
{
    page_numbers
        .into_iter()
        .map(|page| {
            extract(page)
                .map(|text| PageText { page, text })
                .map_err(|err| {
                    RagError::document_load(
                        path,
                        err.into()
                            .context(format!("failed to extract text from page {}", page)),
                    )
                })
        })
        .collect()
}

/// Loads a UTF-8 text or markdown file as a single page.
pub struct TextFileLoader;

impl DocumentLoader for TextFileLoader {
    fn load(&self, path: &Path) -> Result<SourceDocument, RagError> {
        let text = fs::read_to_string(path).map_err(|e| RagError::document_load(path, e))?;
        Ok(SourceDocument {
            source: source_name(path),
            pages: vec![PageText { page: 1, text }],
        })
    }
}

/// Load `path` with the loader matching its extension.
///
/// Fails with `DocumentLoad` when the file is missing, cannot be parsed, or
/// contains no extractable text.
pub fn load_document(path: &Path) -> Result<SourceDocument, RagError> {
    if !path.is_file() {
        return Err(RagError::document_load(path, anyhow!("file not found")));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let loader: &dyn DocumentLoader = match extension.as_str() {
        "pdf" => &PdfLoader,
        "txt" | "md" => &TextFileLoader,
        other => {
            return Err(RagError::document_load(
                path,
                anyhow!("unsupported document type '{}'", other),
            ))
        }
    };

    let document = loader.load(path)?;
    if !document.has_text() {
        return Err(RagError::document_load(
            path,
            anyhow!("no extractable text"),
        ));
    }

    tracing::info!(
        "Loaded {} ({} pages, {} chars)",
        document.source,
        document.pages.len(),
        document.total_chars()
    );
    Ok(document)
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
