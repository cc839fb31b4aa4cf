//! The display seam.
//!
//! The controller never draws anything itself. It pushes status text,
//! control state, and finished display pieces through [`UiSurface`], which a
//! terminal front end, an HTML writer, or a test recorder implements.

use crate::display::{ResultPanels, TabInstructions};
use crate::preview::{FilePreviewState, PreviewArea};

pub trait UiSurface: Send + Sync {
    /// Replace the single status line.
    fn set_status(&self, message: &str);

    fn set_submit_enabled(&self, enabled: bool);

    fn set_results_visible(&self, visible: bool);

    /// Whether the surface has the panels a result is written into.
    /// A surface without them fails the success path with an integrity error.
    fn has_result_panels(&self) -> bool {
        true
    }

    fn show_panels(&self, panels: &ResultPanels);

    fn show_tabs(&self, tabs: &TabInstructions);

    fn show_preview(&self, preview: &PreviewArea);

    /// Selection feedback before submission.
    fn show_file_preview(&self, _state: &FilePreviewState) {}
}
