//! Local previews of the files the user has picked, before any submission.
//!
//! Nothing here touches the network. Report previews are backed by object
//! references from an [`ObjectStore`]; each new selection revokes every
//! reference the previous one created before creating its own.

use crate::error::GlrError;
use crate::model::{SelectedFile, DOCX_MIME};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::{debug, warn};
use url::Url;

/// A transient, locally addressable copy of a selected file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectHandle {
    pub id: u64,
    pub url: Url,
}

/// Creates and revokes object references.
pub trait ObjectStore: Send + Sync {
    fn create(&self, file: &SelectedFile) -> Result<ObjectHandle, GlrError>;

    /// Release a reference. Revoking an unknown handle is a no-op.
    fn revoke(&self, handle: &ObjectHandle);

    /// Number of references currently alive.
    fn live(&self) -> usize;
}

/// Object store backed by a private temporary directory.
///
/// Each reference is one file addressed by a `file://` URL. Revoking deletes
/// the file; dropping the store removes the directory.
#[derive(Debug)]
pub struct TempObjectStore {
    dir: TempDir,
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl TempObjectStore {
    pub fn new() -> Result<Self, GlrError> {
        let dir = tempfile::Builder::new()
            .prefix("glr-preview-")
            .tempdir()
            .map_err(|e| GlrError::Internal(format!("preview directory: {e}")))?;
        Ok(Self {
            dir,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
        })
    }

    fn path_for(&self, id: u64, name: &str) -> PathBuf {
        // Keep the extension so viewers pick the right handler.
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        self.dir.path().join(format!("{id}.{ext}"))
    }

    fn live_set(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        self.live.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ObjectStore for TempObjectStore {
    fn create(&self, file: &SelectedFile) -> Result<ObjectHandle, GlrError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(id, &file.name);
        std::fs::write(&path, &file.bytes).map_err(|source| GlrError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
        let url = Url::from_file_path(&path)
            .map_err(|_| GlrError::Internal(format!("no file URL for '{}'", path.display())))?;
        self.live_set().insert(id);
        debug!("Object {} -> {}", id, url);
        Ok(ObjectHandle { id, url })
    }

    fn revoke(&self, handle: &ObjectHandle) {
        if !self.live_set().remove(&handle.id) {
            return;
        }
        if let Ok(path) = handle.url.to_file_path() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Could not remove preview object {}: {}", path.display(), e);
            }
        }
        debug!("Revoked object {}", handle.id);
    }

    fn live(&self) -> usize {
        self.live_set().len()
    }
}

// ── Preview values ───────────────────────────────────────────────────────

/// Name, size and declared type of the selected template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateDescription {
    pub name: String,
    /// Size in KiB with two decimals, e.g. `"12.50 KB"`.
    pub size_label: String,
    pub declared_type: String,
}

impl TemplateDescription {
    pub fn describe(file: &SelectedFile) -> Self {
        Self {
            name: file.name.clone(),
            size_label: format!("{:.2} KB", file.size() as f64 / 1024.0),
            declared_type: file
                .declared_type
                .clone()
                .unwrap_or_else(|| DOCX_MIME.to_string()),
        }
    }
}

/// One inline report preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPreview {
    /// 1-based position in the selection.
    pub index: usize,
    /// `"Report i: <name>"`.
    pub label: String,
    pub object: ObjectHandle,
}

/// What the selection area shows. `None` hides the corresponding container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilePreviewState {
    pub template: Option<TemplateDescription>,
    pub reports: Option<Vec<ReportPreview>>,
}

// ── FilePreviewer ────────────────────────────────────────────────────────

/// Tracks the current selection previews and owns their object references.
pub struct FilePreviewer<S: ObjectStore> {
    store: S,
    state: FilePreviewState,
}

impl<S: ObjectStore> FilePreviewer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: FilePreviewState::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> &FilePreviewState {
        &self.state
    }

    /// Replace the template description. `None` hides it.
    pub fn select_template(&mut self, file: Option<&SelectedFile>) -> &FilePreviewState {
        self.state.template = file.map(TemplateDescription::describe);
        &self.state
    }

    /// Replace the whole report preview set.
    ///
    /// Existing references are revoked first. An empty selection hides the
    /// container. If creating a reference fails, the references created so
    /// far in this call are revoked too and the container is hidden.
    pub fn select_reports(&mut self, files: &[SelectedFile]) -> Result<&FilePreviewState, GlrError> {
        self.revoke_reports();
        if files.is_empty() {
            return Ok(&self.state);
        }

        let mut previews = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            match self.store.create(file) {
                Ok(object) => previews.push(ReportPreview {
                    index: i + 1,
                    label: format!("Report {}: {}", i + 1, file.name),
                    object,
                }),
                Err(e) => {
                    for p in &previews {
                        self.store.revoke(&p.object);
                    }
                    return Err(e);
                }
            }
        }
        self.state.reports = Some(previews);
        Ok(&self.state)
    }

    fn revoke_reports(&mut self) {
        if let Some(previews) = self.state.reports.take() {
            for p in &previews {
                self.store.revoke(&p.object);
            }
        }
    }
}

impl<S: ObjectStore> Drop for FilePreviewer<S> {
    fn drop(&mut self) {
        self.revoke_reports();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, b"%PDF-1.4 test".to_vec())
    }

    #[test]
    fn template_description_formats_size() {
        let file = SelectedFile::new("t.docx", vec![0u8; 12_800]);
        let d = TemplateDescription::describe(&file);
        assert_eq!(d.size_label, "12.50 KB");
        assert_eq!(d.declared_type, DOCX_MIME);
    }

    #[test]
    fn template_type_defaults_to_docx() {
        let file = SelectedFile::new("template", vec![1, 2, 3]);
        assert_eq!(file.declared_type, None);
        let d = TemplateDescription::describe(&file);
        assert_eq!(d.declared_type, DOCX_MIME);
        assert_eq!(d.size_label, "0.00 KB");
    }

    #[test]
    fn no_template_hides_description() {
        let mut p = FilePreviewer::new(TempObjectStore::new().unwrap());
        p.select_template(Some(&SelectedFile::new("t.docx", vec![])));
        assert!(p.state().template.is_some());
        p.select_template(None);
        assert!(p.state().template.is_none());
    }

    #[test]
    fn reports_labelled_in_order() {
        let mut p = FilePreviewer::new(TempObjectStore::new().unwrap());
        let state = p.select_reports(&[pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        let labels: Vec<_> = state
            .reports
            .as_ref()
            .unwrap()
            .iter()
            .map(|r| r.label.clone())
            .collect();
        assert_eq!(labels, ["Report 1: a.pdf", "Report 2: b.pdf"]);
    }

    #[test]
    fn reselection_revokes_previous_references() {
        let mut p = FilePreviewer::new(TempObjectStore::new().unwrap());
        p.select_reports(&[pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        let old: Vec<_> = p.state().reports.clone().unwrap();
        assert_eq!(p.store().live(), 2);

        p.select_reports(&[pdf("c.pdf")]).unwrap();
        assert_eq!(p.store().live(), 1);
        for r in &old {
            assert!(!r.object.url.to_file_path().unwrap().exists());
        }
    }

    #[test]
    fn empty_selection_hides_and_revokes() {
        let mut p = FilePreviewer::new(TempObjectStore::new().unwrap());
        p.select_reports(&[pdf("a.pdf")]).unwrap();
        p.select_reports(&[]).unwrap();
        assert!(p.state().reports.is_none());
        assert_eq!(p.store().live(), 0);
    }

    #[test]
    fn object_file_holds_selection_bytes() {
        let store = TempObjectStore::new().unwrap();
        let h = store.create(&pdf("a.pdf")).unwrap();
        let path = h.url.to_file_path().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 test");
        assert_eq!(path.extension().unwrap(), "pdf");
        store.revoke(&h);
        store.revoke(&h);
        assert_eq!(store.live(), 0);
    }
}
