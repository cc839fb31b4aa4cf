//! The submission cycle.
//!
//! ## Flow
//!
//! ```text
//! submit(template, reports)
//!  │
//!  ├─ 1. Validate     template present, ≥ 1 report        (no request on failure)
//!  ├─ 2. Busy         disable submit, hide results, forget the last run,
//!  │                  status "Running pipeline…"
//!  ├─ 3. Request      one multipart POST through PipelineTransport
//!  ├─ 4. Display      panels → tab auto-transition → page preview (if PDF)
//!  ├─ 5. Done         status "Success!…", reveal results
//!  └─ *  Always       re-enable submit (guard drop)
//! ```
//!
//! Everything after the request runs in order; the preview is awaited before
//! the success status is set. A second `submit` while one is in flight is
//! rejected with [`GlrError::Busy`] and leaves the running cycle alone.

use crate::config::ClientConfig;
use crate::display::{DisplayState, TabInstructions, TabViewState};
use crate::error::GlrError;
use crate::model::{PipelineResult, PreviewFormat, SelectedFile, UploadSession};
use crate::preview::{DocumentRenderer, PageRasterizer, PdfiumRenderer, PreviewArea};
use crate::surface::UiSurface;
use crate::transport::{HttpPipeline, PipelineTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{error, info, warn};

pub const RUNNING_STATUS: &str = "Running pipeline. This can take ~30s depending on the LLM.";

pub const SUCCESS_STATUS: &str = "Success! Review the extracted values below.";

/// The capabilities a controller drives.
#[derive(Clone)]
pub struct Capabilities {
    pub transport: Arc<dyn PipelineTransport>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub surface: Arc<dyn UiSurface>,
}

/// A completed cycle: the parsed result and what was displayed for it.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub result: PipelineResult,
    pub display: DisplayState,
}

#[derive(Default)]
struct LastRun {
    tabs: Option<TabViewState>,
    display: Option<DisplayState>,
}

pub struct PipelineSubmissionController {
    config: ClientConfig,
    transport: Arc<dyn PipelineTransport>,
    rasterizer: PageRasterizer,
    surface: Arc<dyn UiSurface>,
    in_flight: AtomicBool,
    last: Mutex<LastRun>,
}

impl PipelineSubmissionController {
    pub fn new(config: ClientConfig, caps: Capabilities) -> Self {
        let rasterizer = PageRasterizer::new(caps.renderer, &config);
        Self {
            config,
            transport: caps.transport,
            rasterizer,
            surface: caps.surface,
            in_flight: AtomicBool::new(false),
            last: Mutex::new(LastRun::default()),
        }
    }

    /// Controller over HTTP with PDFium located on this machine.
    pub fn connect(config: ClientConfig, surface: Arc<dyn UiSurface>) -> Result<Self, GlrError> {
        let http = HttpPipeline::new(&config)?;
        let renderer = PdfiumRenderer::detect(http.clone());
        let caps = Capabilities {
            transport: Arc::new(http),
            renderer: Arc::new(renderer),
            surface,
        };
        Ok(Self::new(config, caps))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one submission cycle.
    ///
    /// # Errors
    /// Every error has already been shown as the status line when it is
    /// returned.
    pub async fn submit(
        &self,
        template: Option<SelectedFile>,
        reports: Vec<SelectedFile>,
    ) -> Result<SubmissionOutcome, GlrError> {
        let session = match UploadSession::new(template, reports) {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e.into())),
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Submit ignored: a run is already in flight");
            return Err(self.fail(GlrError::Busy));
        }
        let _guard = SubmitGuard {
            surface: self.surface.as_ref(),
            in_flight: &self.in_flight,
        };

        self.surface.set_submit_enabled(false);
        self.surface.set_results_visible(false);
        self.surface.set_status(RUNNING_STATUS);
        *self.lock_last() = LastRun::default();

        let start = Instant::now();
        let result = match self.transport.submit(&session).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        info!(
            "Run {} returned in {}ms (pdf: {})",
            result.run_id,
            start.elapsed().as_millis(),
            result.pdf_url.is_some()
        );

        match self.display(&result).await {
            Ok(display) => {
                self.surface.set_status(SUCCESS_STATUS);
                self.surface.set_results_visible(true);
                Ok(SubmissionOutcome { result, display })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Render panels, tabs and the preview, in that order.
    async fn display(&self, result: &PipelineResult) -> Result<DisplayState, GlrError> {
        if !self.surface.has_result_panels() {
            error!("Result panels missing from the surface; cannot show run {}", result.run_id);
            return Err(GlrError::Integrity {
                missing: "result panels".into(),
            });
        }

        let display = DisplayState::compose(result, &self.config.server_url)?;
        self.surface.show_panels(&display.panels);

        let tabs = TabViewState::for_result(result);
        self.surface.show_tabs(&tabs.instructions());
        self.lock_last().tabs = Some(tabs);

        let preview = match &display.panels.pdf_download {
            Some(pdf) => self.rasterizer.rasterize(&pdf.url).await,
            None => PreviewArea::Empty,
        };
        self.surface.show_preview(&preview);

        let display = display.with_preview(preview);
        self.lock_last().display = Some(display.clone());
        Ok(display)
    }

    /// User tab selection. `None` until a result has been displayed.
    pub fn select_format(&self, format: PreviewFormat) -> Option<TabInstructions> {
        let mut last = self.lock_last();
        let tabs = last.tabs.as_mut()?;
        tabs.select(format);
        let instructions = tabs.instructions();
        if let Some(display) = last.display.take() {
            last.display = Some(display.with_tabs(instructions));
        }
        drop(last);

        self.surface.show_tabs(&instructions);
        Some(instructions)
    }

    pub fn active_format(&self) -> Option<PreviewFormat> {
        self.lock_last().tabs.map(|t| t.active())
    }

    /// The current cycle's display, including later tab switches. Cleared as
    /// soon as a new cycle starts, so a failed cycle leaves nothing here.
    pub fn last_display(&self) -> Option<DisplayState> {
        self.lock_last().display.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn fail(&self, e: GlrError) -> GlrError {
        self.surface.set_status(&e.to_string());
        e
    }

    fn lock_last(&self) -> MutexGuard<'_, LastRun> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Re-enables submission when the cycle ends, however it ends.
struct SubmitGuard<'a> {
    surface: &'a dyn UiSurface,
    in_flight: &'a AtomicBool,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
        self.surface.set_submit_enabled(true);
    }
}
