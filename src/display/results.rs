//! Text panels and download actions derived from a [`PipelineResult`].

use crate::config::resolve_link;
use crate::error::GlrError;
use crate::model::{PipelineResult, PreviewFormat};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

/// A configured download control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadAction {
    pub format: PreviewFormat,
    pub url: Url,
    /// Suggested file name, `filled_template_<run_id>.<ext>`.
    pub filename: String,
}

impl DownloadAction {
    /// [`Self::filename`] made safe to join onto a local directory.
    pub fn local_file_name(&self) -> String {
        local_file_name(&self.filename)
    }
}

/// Everything the results region shows apart from the page preview.
///
/// Each field replaces the corresponding panel wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPanels {
    pub run_id: String,
    /// `extracted_fields`, pretty-printed JSON.
    pub fields: String,
    /// `filled_values`, pretty-printed JSON.
    pub values: String,
    pub excerpt: String,
    pub docx_download: DownloadAction,
    /// `None` hides the PDF download control.
    pub pdf_download: Option<DownloadAction>,
    pub diagnostics_url: Url,
}

impl ResultPanels {
    pub fn download(&self, format: PreviewFormat) -> Option<&DownloadAction> {
        match format {
            PreviewFormat::Docx => Some(&self.docx_download),
            PreviewFormat::Pdf => self.pdf_download.as_ref(),
        }
    }
}

/// Canonical download name for a run.
pub fn download_filename(run_id: &str, format: PreviewFormat) -> String {
    format!("filled_template_{run_id}.{}", format.extension())
}

/// A single path component for `name`.
///
/// Server-supplied run ids end up in file names. Separators become `_` and
/// a bare `.` or `..` is replaced, so the result never leaves the directory
/// it is joined onto.
pub fn local_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

/// Maps results to panels; links are resolved against the server URL.
#[derive(Debug, Clone)]
pub struct ResultRenderer {
    server_url: Url,
}

impl ResultRenderer {
    pub fn new(server_url: Url) -> Self {
        Self { server_url }
    }

    pub fn render(&self, result: &PipelineResult) -> Result<ResultPanels, GlrError> {
        let docx_download = DownloadAction {
            format: PreviewFormat::Docx,
            url: self.resolve(&result.download_url)?,
            filename: download_filename(&result.run_id, PreviewFormat::Docx),
        };
        let pdf_download = result
            .pdf_url
            .as_deref()
            .map(|link| {
                Ok::<_, GlrError>(DownloadAction {
                    format: PreviewFormat::Pdf,
                    url: self.resolve(link)?,
                    filename: download_filename(&result.run_id, PreviewFormat::Pdf),
                })
            })
            .transpose()?;

        Ok(ResultPanels {
            run_id: result.run_id.clone(),
            fields: pretty(&result.extracted_fields),
            values: pretty(&result.filled_values),
            excerpt: result.report_excerpt.clone(),
            docx_download,
            pdf_download,
            diagnostics_url: self.resolve(&result.diagnostics_url)?,
        })
    }

    fn resolve(&self, link: &str) -> Result<Url, GlrError> {
        resolve_link(&self.server_url, link)
    }
}

/// Two-space indented JSON.
fn pretty(map: &Map<String, Value>) -> String {
    // A `Map` of `Value`s always serialises.
    serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string())
}
