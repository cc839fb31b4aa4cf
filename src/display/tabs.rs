//! Preview-format tab selector.
//!
//! Two states, no terminal state. A fresh result picks the PDF tab when the
//! server produced a PDF and the DOCX tab otherwise; the user may switch at
//! any time afterwards. Switching only flips visibility; the hidden pane
//! keeps its content.

use crate::model::{PipelineResult, PreviewFormat};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TabViewState {
    active: PreviewFormat,
}

impl TabViewState {
    /// Initial state for a newly arrived result.
    pub fn for_result(result: &PipelineResult) -> Self {
        Self {
            active: result.preferred_format(),
        }
    }

    pub fn active(&self) -> PreviewFormat {
        self.active
    }

    /// User selection. Returns `true` if the active tab changed.
    pub fn select(&mut self, format: PreviewFormat) -> bool {
        let changed = self.active != format;
        self.active = format;
        changed
    }

    pub fn instructions(&self) -> TabInstructions {
        let pane = |format| PaneInstruction {
            format,
            visible: format == self.active,
            tab_active: format == self.active,
        };
        TabInstructions {
            active: self.active,
            panes: PreviewFormat::ALL.map(pane),
        }
    }
}

/// Visibility of one preview pane and its tab control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaneInstruction {
    pub format: PreviewFormat,
    pub visible: bool,
    pub tab_active: bool,
}

/// Visibility of both panes; exactly one is visible and active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TabInstructions {
    pub active: PreviewFormat,
    pub panes: [PaneInstruction; 2],
}

impl TabInstructions {
    pub fn pane(&self, format: PreviewFormat) -> &PaneInstruction {
        // `panes` is built from `PreviewFormat::ALL`, so both formats exist.
        match format {
            PreviewFormat::Docx => &self.panes[0],
            PreviewFormat::Pdf => &self.panes[1],
        }
    }
}
