//! Page preview: rasterise the first pages of the generated PDF.
//!
//! [`PageRasterizer`] drives a [`DocumentRenderer`] one page at a time, in
//! page order, and never fails: any error becomes a fallback
//! [`PreviewArea`] carrying a user-facing message. The rest of the result
//! display does not depend on the preview.
//!
//! [`PdfiumRenderer`] is the production engine. The pdfium-render bindings
//! are blocking and hold thread-local state, so every call into PDFium runs
//! inside `tokio::task::spawn_blocking`.

use crate::config::ClientConfig;
use crate::error::RenderError;
use crate::model::{PageSurface, RenderedPageSet, MAX_PREVIEW_PAGES};
use crate::preview::encode::surface_from_image;
use crate::transport::{cache_busted, HttpPipeline};
use async_trait::async_trait;
use pdfium_probe::{Availability, LibrarySource};
use pdfium_render::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Shown when no rendering engine is available.
pub const UNAVAILABLE_MESSAGE: &str = "PDF viewer not available. Download the file to view it.";

/// Shown when loading or rendering failed.
pub const FAILED_MESSAGE: &str = "Unable to preview PDF. Download the file to view it.";

/// Content of the page preview area.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum PreviewArea {
    /// Nothing rendered (no PDF for this run).
    #[default]
    Empty,
    Pages(RenderedPageSet),
    Unavailable(String),
    Failed(String),
}

impl PreviewArea {
    pub fn pages(&self) -> Option<&RenderedPageSet> {
        match self {
            PreviewArea::Pages(set) => Some(set),
            _ => None,
        }
    }

    /// The fallback message, for the two fallback states.
    pub fn message(&self) -> Option<&str> {
        match self {
            PreviewArea::Unavailable(m) | PreviewArea::Failed(m) => Some(m),
            _ => None,
        }
    }
}

// ── Engine seam ──────────────────────────────────────────────────────────

/// A paginated-document rendering engine.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Load the document at `url`.
    async fn open(&self, url: &Url) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One loaded document.
#[async_trait]
pub trait RenderSession: Send {
    fn page_count(&self) -> usize;

    /// Render the page at 0-based `index` at magnification `scale`.
    async fn render_page(&mut self, index: usize, scale: f32) -> Result<PageSurface, RenderError>;
}

// ── PageRasterizer ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PageRasterizer {
    renderer: Arc<dyn DocumentRenderer>,
    scale: f32,
    max_pages: usize,
}

impl PageRasterizer {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, config: &ClientConfig) -> Self {
        Self {
            renderer,
            scale: config.preview_scale,
            max_pages: config.max_preview_pages.clamp(1, MAX_PREVIEW_PAGES),
        }
    }

    /// Produce the preview for the document at `url`.
    pub async fn rasterize(&self, url: &Url) -> PreviewArea {
        if !self.renderer.is_available() {
            warn!("No PDF engine; skipping preview of {}", url);
            return PreviewArea::Unavailable(UNAVAILABLE_MESSAGE.to_string());
        }
        match self.render_pages(url).await {
            Ok(set) => {
                info!(
                    "Preview ready: {} of {} page(s)",
                    set.surfaces().len(),
                    set.total_pages()
                );
                PreviewArea::Pages(set)
            }
            Err(e) => {
                warn!("Preview failed: {}", e);
                PreviewArea::Failed(FAILED_MESSAGE.to_string())
            }
        }
    }

    async fn render_pages(&self, url: &Url) -> Result<RenderedPageSet, RenderError> {
        let mut session = self.renderer.open(url).await?;
        let total = session.page_count();
        let mut set = RenderedPageSet::new(total);

        // Strictly sequential: page n+1 starts after page n is finished.
        for index in 0..total.min(self.max_pages) {
            let surface = session.render_page(index, self.scale).await?;
            debug!(
                "Page {} → {}x{} px",
                surface.page_num, surface.width, surface.height
            );
            set.push(surface);
        }
        Ok(set)
    }
}

// ── PDFium engine ────────────────────────────────────────────────────────

/// PDFium-backed renderer. Fetches the document over HTTP.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    library: Option<LibrarySource>,
    http: HttpPipeline,
    cache_bust: bool,
}

impl PdfiumRenderer {
    pub fn new(http: HttpPipeline, library: Option<LibrarySource>) -> Self {
        let cache_bust = http.config().cache_bust;
        Self {
            library,
            http,
            cache_bust,
        }
    }

    /// Locate PDFium (config override, `PDFIUM_LIB_PATH`, cache, system).
    /// A missing library yields an unavailable renderer, not an error.
    pub fn detect(http: HttpPipeline) -> Self {
        let explicit = http.config().pdfium_library.clone();
        let library = match pdfium_probe::probe_with(explicit.as_deref()) {
            Availability::Ready(source) => {
                info!("PDF engine: PDFium from {}", source);
                Some(source)
            }
            Availability::Missing { searched } => {
                warn!(
                    "PDFium not found (searched {} location(s)); page previews disabled",
                    searched.len()
                );
                None
            }
        };
        Self::new(http, library)
    }
}

#[async_trait]
impl DocumentRenderer for PdfiumRenderer {
    fn is_available(&self) -> bool {
        self.library.is_some()
    }

    async fn open(&self, url: &Url) -> Result<Box<dyn RenderSession>, RenderError> {
        let library = self
            .library
            .clone()
            .ok_or_else(|| RenderError::EngineUnavailable {
                reason: "PDFium library not located".into(),
            })?;

        let target = if self.cache_bust {
            cache_busted(url)
        } else {
            url.clone()
        };
        let bytes = self
            .http
            .fetch_url(&target)
            .await
            .map_err(|e| RenderError::LoadFailed {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        let bytes = Arc::new(bytes);

        let page_count = {
            let library = library.clone();
            let bytes = Arc::clone(&bytes);
            let url = url.to_string();
            tokio::task::spawn_blocking(move || count_pages_blocking(&library, &bytes, &url))
                .await
                .map_err(|e| RenderError::LoadFailed {
                    url: target.to_string(),
                    detail: format!("load task panicked: {e}"),
                })??
        };
        info!("Preview document loaded: {} page(s)", page_count);

        Ok(Box::new(PdfiumSession {
            library,
            bytes,
            page_count,
        }))
    }
}

/// A fetched document. Each page render re-opens it on a blocking thread;
/// PDFium document handles cannot cross threads.
struct PdfiumSession {
    library: LibrarySource,
    bytes: Arc<Vec<u8>>,
    page_count: usize,
}

#[async_trait]
impl RenderSession for PdfiumSession {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn render_page(&mut self, index: usize, scale: f32) -> Result<PageSurface, RenderError> {
        let library = self.library.clone();
        let bytes = Arc::clone(&self.bytes);
        tokio::task::spawn_blocking(move || render_page_blocking(&library, &bytes, index, scale))
            .await
            .map_err(|e| RenderError::PageFailed {
                page: index + 1,
                detail: format!("render task panicked: {e}"),
            })?
    }
}

fn bind(library: &LibrarySource) -> Result<Pdfium, RenderError> {
    library.bind().map_err(|e| RenderError::EngineUnavailable {
        reason: e.to_string(),
    })
}

fn count_pages_blocking(
    library: &LibrarySource,
    bytes: &[u8],
    url: &str,
) -> Result<usize, RenderError> {
    let pdfium = bind(library)?;
    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RenderError::LoadFailed {
                url: url.to_string(),
                detail: format!("{:?}", e),
            })?;
    Ok(document.pages().len() as usize)
}

fn render_page_blocking(
    library: &LibrarySource,
    bytes: &[u8],
    index: usize,
    scale: f32,
) -> Result<PageSurface, RenderError> {
    let page_failed = |e: PdfiumError| RenderError::PageFailed {
        page: index + 1,
        detail: format!("{:?}", e),
    };

    let pdfium = bind(library)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(page_failed)?;
    let pages = document.pages();
    let page = pages.get(index as u16).map_err(page_failed)?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page.render_with_config(&render_config).map_err(page_failed)?;
    let image = bitmap.as_image();

    surface_from_image(index + 1, &image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Engine stand-in: a fixed page count, optional failure on one page.
    struct FakeRenderer {
        available: bool,
        pages: usize,
        fail_on: Option<usize>,
        rendered: Arc<Mutex<Vec<(usize, f32)>>>,
    }

    struct FakeSession {
        pages: usize,
        fail_on: Option<usize>,
        rendered: Arc<Mutex<Vec<(usize, f32)>>>,
    }

    #[async_trait]
    impl DocumentRenderer for FakeRenderer {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn open(&self, _url: &Url) -> Result<Box<dyn RenderSession>, RenderError> {
            Ok(Box::new(FakeSession {
                pages: self.pages,
                fail_on: self.fail_on,
                rendered: Arc::clone(&self.rendered),
            }))
        }
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        fn page_count(&self) -> usize {
            self.pages
        }

        async fn render_page(&mut self, index: usize, scale: f32) -> Result<PageSurface, RenderError> {
            self.rendered.lock().unwrap().push((index, scale));
            if self.fail_on == Some(index) {
                return Err(RenderError::PageFailed {
                    page: index + 1,
                    detail: "boom".into(),
                });
            }
            Ok(PageSurface {
                page_num: index + 1,
                width: 100,
                height: 140,
                png: vec![],
            })
        }
    }

    fn rasterizer(available: bool, pages: usize, fail_on: Option<usize>) -> (PageRasterizer, Arc<Mutex<Vec<(usize, f32)>>>) {
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let renderer = FakeRenderer {
            available,
            pages,
            fail_on,
            rendered: Arc::clone(&rendered),
        };
        (
            PageRasterizer::new(Arc::new(renderer), &ClientConfig::default()),
            rendered,
        )
    }

    fn url() -> Url {
        Url::parse("http://h/api/download-pdf/r1").unwrap()
    }

    #[tokio::test]
    async fn seven_pages_render_three_in_order() {
        let (r, rendered) = rasterizer(true, 7, None);
        let area = r.rasterize(&url()).await;
        let set = area.pages().expect("pages");
        assert_eq!(set.surfaces().len(), 3);
        assert_eq!(
            set.marker().as_deref(),
            Some("... and 4 more page(s). Download to view all.")
        );
        assert_eq!(*rendered.lock().unwrap(), vec![(0, 1.5), (1, 1.5), (2, 1.5)]);
    }

    #[tokio::test]
    async fn short_document_has_no_marker() {
        let (r, _) = rasterizer(true, 2, None);
        let area = r.rasterize(&url()).await;
        let set = area.pages().unwrap();
        assert_eq!(set.surfaces().len(), 2);
        assert!(set.marker().is_none());
    }

    #[tokio::test]
    async fn unavailable_engine_renders_nothing() {
        let (r, rendered) = rasterizer(false, 7, None);
        let area = r.rasterize(&url()).await;
        assert_eq!(area, PreviewArea::Unavailable(UNAVAILABLE_MESSAGE.into()));
        assert!(rendered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_aborts_remaining_pages() {
        let (r, rendered) = rasterizer(true, 7, Some(1));
        let area = r.rasterize(&url()).await;
        assert_eq!(area.message(), Some(FAILED_MESSAGE));
        let indices: Vec<_> = rendered.lock().unwrap().iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, [0, 1]);
    }

    #[tokio::test]
    async fn pdfium_renderer_without_library_is_unavailable() {
        let http = HttpPipeline::new(&ClientConfig::default()).unwrap();
        let renderer = PdfiumRenderer::new(http, None);
        assert!(!renderer.is_available());
        let err = renderer.open(&url()).await.err().unwrap();
        assert!(matches!(err, RenderError::EngineUnavailable { .. }));
    }
}
