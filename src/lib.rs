//! # glr-client
//!
//! Client-side controller for a document-generation pipeline: pick a Word
//! template and one or more PDF reports, send them to the pipeline service,
//! and present what comes back.
//!
//! ## Cycle Overview
//!
//! ```text
//! selection
//!  │
//!  ├─ 0. Preview   local file previews, no network        (FilePreviewer)
//!  ├─ 1. Submit    validate, one multipart POST            (PipelineSubmissionController)
//!  ├─ 2. Panels    pretty JSON, excerpt, download actions  (ResultRenderer)
//!  ├─ 3. Tabs      PDF tab if a PDF was produced, else DOCX (TabViewState)
//!  └─ 4. Pages     first 3 PDF pages at 1.5×, via PDFium   (PageRasterizer)
//! ```
//!
//! The controller draws nothing itself. It talks to three injected
//! capabilities: a [`PipelineTransport`] for the request, a
//! [`DocumentRenderer`] for page previews, and a [`UiSurface`] that shows
//! status text and display state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glr_client::{ClientConfig, PipelineSubmissionController, SelectedFile, UiSurface};
//! use std::sync::Arc;
//!
//! # fn surface() -> Arc<dyn UiSurface> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .server_url("http://127.0.0.1:8000")
//!         .build()?;
//!     let controller = PipelineSubmissionController::connect(config, surface())?;
//!
//!     let template = SelectedFile::from_path("template.docx").await?;
//!     let report = SelectedFile::from_path("inspection.pdf").await?;
//!     let outcome = controller.submit(Some(template), vec![report]).await?;
//!     println!("{}", outcome.display.panels.values);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `glr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Page Previews
//!
//! PDFium is located at run time by `pdfium-probe` (config override,
//! `PDFIUM_LIB_PATH`, the per-user cache, then the system loader path). Without
//! it, previews degrade to a "download to view" message and everything else
//! works as usual. `glr engine --fetch` populates the cache.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod model;
pub mod preview;
pub mod report;
pub mod surface;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{Capabilities, PipelineSubmissionController, SubmissionOutcome};
pub use display::{
    download_filename, local_file_name, DisplayState, DownloadAction, ResultPanels,
    ResultRenderer, TabInstructions, TabViewState,
};
pub use error::{GlrError, RenderError, ValidationError};
pub use model::{
    HealthStatus, PageSurface, PipelineResult, PreviewFormat, RenderedPageSet, SelectedFile,
    UploadSession,
};
pub use preview::{
    DocumentRenderer, FilePreviewState, FilePreviewer, ObjectStore, PageRasterizer,
    PdfiumRenderer, PreviewArea, RenderSession, TempObjectStore,
};
pub use report::{render_html, write_html};
pub use surface::UiSurface;
pub use transport::{HttpPipeline, PipelineTransport};
