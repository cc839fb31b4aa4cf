//! Data model shared by every component: selections, the upload session,
//! the pipeline result, and the rasterised preview.

use crate::error::{GlrError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Declared type of a word-processing template.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Declared type of a paginated report.
pub const PDF_MIME: &str = "application/pdf";

/// Hard cap on rasterised preview pages.
pub const MAX_PREVIEW_PAGES: usize = 3;

// ── Selections ───────────────────────────────────────────────────────────

/// A file the user picked, held in memory.
///
/// `declared_type` is a hint only; nothing here inspects the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    /// Wrap in-memory bytes. The declared type is guessed from `name`.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let declared_type = mime_guess::from_path(&name).first_raw().map(str::to_string);
        Self {
            name,
            declared_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, GlrError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GlrError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// One validated submission: exactly one template, at least one report.
///
/// The only constructor is [`UploadSession::new`], so holding a value proves
/// the invariants.
#[derive(Debug, Clone)]
pub struct UploadSession {
    template: SelectedFile,
    reports: Vec<SelectedFile>,
}

impl UploadSession {
    /// Validate a selection. The template is checked first.
    pub fn new(
        template: Option<SelectedFile>,
        reports: Vec<SelectedFile>,
    ) -> Result<Self, ValidationError> {
        let template = template.ok_or(ValidationError::MissingTemplate)?;
        if reports.is_empty() {
            return Err(ValidationError::NoReports);
        }
        Ok(Self { template, reports })
    }

    pub fn template(&self) -> &SelectedFile {
        &self.template
    }

    /// Reports in selection order.
    pub fn reports(&self) -> &[SelectedFile] {
        &self.reports
    }
}

// ── Pipeline result ──────────────────────────────────────────────────────

/// The pipeline's success payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub extracted_fields: Map<String, Value>,
    pub filled_values: Map<String, Value>,
    pub report_excerpt: String,
    pub run_id: String,
    /// DOCX download link.
    pub download_url: String,
    /// PDF download link; absent when the server could not convert.
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub diagnostics_url: String,
}

impl PipelineResult {
    /// The preview format a fresh result opens on.
    pub fn preferred_format(&self) -> PreviewFormat {
        if self.pdf_url.is_some() {
            PreviewFormat::Pdf
        } else {
            PreviewFormat::Docx
        }
    }
}

/// Health endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

// ── Preview format ───────────────────────────────────────────────────────

/// The two alternate renderings of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    /// Source document format (format A).
    #[default]
    Docx,
    /// Portable paginated format (format B).
    Pdf,
}

impl PreviewFormat {
    pub const ALL: [PreviewFormat; 2] = [PreviewFormat::Docx, PreviewFormat::Pdf];

    pub fn extension(self) -> &'static str {
        match self {
            PreviewFormat::Docx => "docx",
            PreviewFormat::Pdf => "pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PreviewFormat::Docx => "DOCX",
            PreviewFormat::Pdf => "PDF",
        }
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for PreviewFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" | "a" => Ok(PreviewFormat::Docx),
            "pdf" | "b" => Ok(PreviewFormat::Pdf),
            other => Err(format!("unknown preview format '{other}' (expected docx or pdf)")),
        }
    }
}

// ── Rasterised preview ───────────────────────────────────────────────────

/// One rendered page, PNG-encoded.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PageSurface {
    /// 1-indexed.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl fmt::Debug for PageSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSurface")
            .field("page_num", &self.page_num)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// The first pages of a document plus a count of what was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPageSet {
    surfaces: Vec<PageSurface>,
    total_pages: usize,
}

impl RenderedPageSet {
    pub fn new(total_pages: usize) -> Self {
        Self {
            surfaces: Vec::with_capacity(total_pages.min(MAX_PREVIEW_PAGES)),
            total_pages,
        }
    }

    /// Append the next page. Returns `false` (and drops the surface) once
    /// [`MAX_PREVIEW_PAGES`] surfaces are held.
    pub fn push(&mut self, surface: PageSurface) -> bool {
        if self.surfaces.len() >= MAX_PREVIEW_PAGES {
            return false;
        }
        self.surfaces.push(surface);
        true
    }

    pub fn surfaces(&self) -> &[PageSurface] {
        &self.surfaces
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Pages beyond the preview limit, if any.
    pub fn remaining_pages(&self) -> Option<usize> {
        (self.total_pages > MAX_PREVIEW_PAGES).then(|| self.total_pages - MAX_PREVIEW_PAGES)
    }

    /// The "more pages" line shown under the preview.
    pub fn marker(&self) -> Option<String> {
        self.remaining_pages()
            .map(|n| format!("... and {n} more page(s). Download to view all."))
    }
}
