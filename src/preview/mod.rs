//! Previews: local file selections, and rasterised pages of the generated PDF.

pub mod encode;
pub mod files;
pub mod rasterize;

pub use files::{
    FilePreviewState, FilePreviewer, ObjectHandle, ObjectStore, ReportPreview, TempObjectStore,
    TemplateDescription,
};
pub use rasterize::{
    DocumentRenderer, PageRasterizer, PdfiumRenderer, PreviewArea, RenderSession,
    FAILED_MESSAGE, UNAVAILABLE_MESSAGE,
};
