//! Error types for the glr-client library.
//!
//! Three error types, one per place an error can be acted on:
//!
//! * [`ValidationError`]: the selection is incomplete. Raised before any
//!   request is built; its `Display` text is exactly the status message the
//!   user sees.
//!
//! * [`GlrError`]: **Fatal to one submission cycle**: the request failed, the
//!   response was unusable, or the surface is missing a required panel. The
//!   controller surfaces it as the status message and returns it.
//!
//! * [`RenderError`]: **Non-fatal**: the preview document could not be
//!   rasterised. The rasteriser converts it into a fallback preview; text
//!   panels and downloads are unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// The selection is not submittable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a template.")]
    MissingTemplate,

    #[error("Please add at least one PDF report.")]
    NoReports,
}

/// All errors that end a submission cycle.
#[derive(Debug, Error)]
pub enum GlrError {
    // ── Local errors ──────────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A second submit arrived while one was still in flight.
    #[error("A pipeline run is already in progress.")]
    Busy,

    // ── Request errors ────────────────────────────────────────────────────
    /// The pipeline answered with a non-success status. `message` is the
    /// server's `detail` text when it sent one, else a generic message.
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    /// The request never produced a response.
    #[error("Could not reach the pipeline at '{url}': {reason}")]
    Transport { url: String, reason: String },

    /// No response within the configured request timeout.
    #[error("Pipeline request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A success status with a body that is not a pipeline result.
    #[error("Pipeline returned an unreadable response: {detail}")]
    MalformedResponse { detail: String },

    // ── Integrity errors ──────────────────────────────────────────────────
    /// The surface lacks a panel the success path must write to.
    #[error("UI elements not found")]
    Integrity { missing: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GlrError {
    /// `true` for failures of the network round trip (status, transport,
    /// timeout, unreadable body).
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            GlrError::RequestFailed { .. }
                | GlrError::Transport { .. }
                | GlrError::Timeout { .. }
                | GlrError::MalformedResponse { .. }
        )
    }
}

/// A non-fatal failure to rasterise the preview document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    #[error("PDF rendering engine is not available: {reason}")]
    EngineUnavailable { reason: String },

    #[error("Failed to load preview document '{url}': {detail}")]
    LoadFailed { url: String, detail: String },

    #[error("Page {page}: rasterisation failed: {detail}")]
    PageFailed { page: usize, detail: String },

    #[error("Page {page}: PNG encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ValidationError::MissingTemplate.to_string(),
            "Please select a template."
        );
        assert_eq!(
            ValidationError::NoReports.to_string(),
            "Please add at least one PDF report."
        );
    }

    #[test]
    fn validation_converts_transparently() {
        let e: GlrError = ValidationError::NoReports.into();
        assert_eq!(e.to_string(), "Please add at least one PDF report.");
        assert!(!e.is_request_error());
    }

    #[test]
    fn request_failed_shows_detail_verbatim() {
        let e = GlrError::RequestFailed {
            status: 400,
            message: "Template must be a .docx file".into(),
        };
        assert_eq!(e.to_string(), "Template must be a .docx file");
        assert!(e.is_request_error());
    }

    #[test]
    fn integrity_display_is_generic() {
        let e = GlrError::Integrity {
            missing: "fields panel".into(),
        };
        assert_eq!(e.to_string(), "UI elements not found");
    }

    #[test]
    fn page_failure_names_the_page() {
        let e = RenderError::PageFailed {
            page: 2,
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("Page 2"));
    }
}
