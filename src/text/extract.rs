// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 文档文本提取
//!
//! Dispatches on the file name extension. Returned text is raw: normalization
//! happens in the chunker.

use crate::error::AppError;
use async_trait::async_trait;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;
use tokio::process::Command;

const DOCX_BODY: &str = "word/document.xml";

static DOCX_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>").expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some("docx") => Ok(DocumentKind::Docx),
            Some("txt") => Ok(DocumentKind::Text),
            _ => Err(AppError::UnsupportedFileType(format!(
                "'{}' (expected .pdf, .docx or .txt)",
                filename
            ))),
        }
    }
}

/// Document-to-text capability used by the pipeline.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, filename: &str, content: &[u8]) -> Result<String, AppError>;
}

/// Default extractor for uploaded reports.
///
/// PDF goes through poppler's `pdftotext`, DOCX is read straight from the
/// OOXML package.
#[derive(Debug, Clone)]
pub struct ReportReader {
    pdftotext_bin: String,
}

impl Default for ReportReader {
    fn default() -> Self {
        Self {
            pdftotext_bin: "pdftotext".to_string(),
        }
    }
}

impl ReportReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdftotext<S: Into<String>>(mut self, bin: S) -> Self {
        self.pdftotext_bin = bin.into();
        self
    }

    pub fn extract_text_from_plain(content: &[u8]) -> Result<String, AppError> {
        String::from_utf8(content.to_vec())
            .map_err(|e| AppError::ExtractionError(format!("text file is not valid UTF-8: {}", e)))
    }

    /// Paragraph texts joined with single spaces.
    pub fn extract_text_from_docx(content: &[u8]) -> Result<String, AppError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(content))
            .map_err(|e| AppError::ExtractionError(format!("not a DOCX package: {}", e)))?;

        let mut xml = String::new();
        archive
            .by_name(DOCX_BODY)
            .map_err(|e| AppError::ExtractionError(format!("missing {}: {}", DOCX_BODY, e)))?
            .read_to_string(&mut xml)?;

        let mut paragraphs = Vec::new();
        let mut current = String::new();
        for caps in DOCX_TOKEN.captures_iter(&xml) {
            match caps.get(1) {
                Some(run) => current.push_str(&unescape_xml(run.as_str())),
                None => paragraphs.push(std::mem::take(&mut current)),
            }
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }

        Ok(paragraphs.join(" "))
    }

    pub async fn extract_text_from_pdf(&self, content: &[u8]) -> Result<String, AppError> {
        let mut temp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        std::io::Write::write_all(&mut temp, content)?;

        tracing::debug!("Running {} on {:?}", self.pdftotext_bin, temp.path());
        let output = Command::new(&self.pdftotext_bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg(temp.path())
            .arg("-")
            .output()
            .await
            .map_err(|e| {
                AppError::ExtractionError(format!(
                    "failed to run {} (is poppler installed?): {}",
                    self.pdftotext_bin, e
                ))
            })?;

        if !output.status.success() {
            return Err(AppError::ExtractionError(format!(
                "{} failed: {}",
                self.pdftotext_bin,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftotext separates pages with form feeds
        Ok(String::from_utf8_lossy(&output.stdout)
            .split('\u{c}')
            .collect::<Vec<_>>()
            .join(" "))
    }
}

#[async_trait]
impl TextExtractor for ReportReader {
    async fn extract(&self, filename: &str, content: &[u8]) -> Result<String, AppError> {
        match DocumentKind::from_filename(filename)? {
            DocumentKind::Text => Self::extract_text_from_plain(content),
            DocumentKind::Docx => Self::extract_text_from_docx(content),
            DocumentKind::Pdf => self.extract_text_from_pdf(content).await,
        }
    }
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
