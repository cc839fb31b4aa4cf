//! Result display: text panels, download actions, and preview tabs.
//!
//! [`DisplayState`] is the full snapshot of the results region for one run.
//! The controller composes it on success; the CLI and the HTML report read
//! it back.

pub mod results;
pub mod tabs;

pub use results::{
    download_filename, local_file_name, DownloadAction, ResultPanels, ResultRenderer,
};
pub use tabs::{PaneInstruction, TabInstructions, TabViewState};

use crate::error::GlrError;
use crate::model::PipelineResult;
use crate::preview::PreviewArea;
use serde::Serialize;
use url::Url;

/// Snapshot of the results region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub panels: ResultPanels,
    pub tabs: TabInstructions,
    pub preview: PreviewArea,
}

impl DisplayState {
    /// Panels and tabs for a fresh result. The preview starts empty.
    pub fn compose(result: &PipelineResult, server_url: &Url) -> Result<Self, GlrError> {
        let panels = ResultRenderer::new(server_url.clone()).render(result)?;
        let tabs = TabViewState::for_result(result).instructions();
        Ok(Self {
            panels,
            tabs,
            preview: PreviewArea::Empty,
        })
    }

    pub fn with_preview(mut self, preview: PreviewArea) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_tabs(mut self, tabs: TabInstructions) -> Self {
        self.tabs = tabs;
        self
    }
}
