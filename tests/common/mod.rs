//! Shared fixtures: an in-process pipeline server, a recording surface, and
//! a scripted page renderer.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use glr_client::{
    Capabilities, ClientConfig, DocumentRenderer, FilePreviewState, HttpPipeline, PageSurface,
    PipelineSubmissionController, PreviewArea, RenderError, RenderSession, ResultPanels,
    TabInstructions, UiSurface,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use url::Url;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("glr_client=debug"))
        .with_test_writer()
        .try_init();
}

// ── Pipeline server ──────────────────────────────────────────────────────────

/// One multipart part as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub requests: Arc<Mutex<Vec<Vec<RecordedPart>>>>,
    pub reply: Arc<Mutex<Reply>>,
    /// Signalled once a submission body has been read.
    pub received: Arc<Notify>,
    /// When set, the handler waits for a notification before replying.
    pub gate: Option<Arc<Notify>>,
}

impl ServerState {
    pub fn replying(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(Mutex::new(Reply {
                status,
                body: body.into(),
            })),
            received: Arc::new(Notify::new()),
            gate: None,
        }
    }

    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn set_reply(&self, status: StatusCode, body: impl Into<String>) {
        *self.reply.lock().unwrap() = Reply {
            status,
            body: body.into(),
        };
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<RecordedPart> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

async fn submit_handler(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes");
        parts.push(RecordedPart {
            field: field_name,
            file_name,
            content_type,
            len: bytes.len(),
        });
    }
    state.requests.lock().unwrap().push(parts);
    state.received.notify_one();

    if let Some(gate) = &state.gate {
        gate.notified().await;
    }

    let reply = state.reply.lock().unwrap().clone();
    (
        reply.status,
        [("content-type", "application/json")],
        reply.body,
    )
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "version": "1.0.0"}))
}

async fn docx_handler(Path(run_id): Path<String>) -> Vec<u8> {
    format!("PK docx {run_id}").into_bytes()
}

async fn pdf_handler(Path(run_id): Path<String>) -> Vec<u8> {
    format!("%PDF-1.4 {run_id}").into_bytes()
}

/// Start the stand-in pipeline on an ephemeral port; returns its base URL.
pub async fn spawn_pipeline(state: ServerState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let app = Router::new()
        .route("/api/glr", post(submit_handler))
        .route("/health", get(health_handler))
        .route("/api/download/:run_id", get(docx_handler))
        .route("/api/download-pdf/:run_id", get(pdf_handler))
        .with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}")
}

/// A success body in the pipeline's wire format.
pub fn result_body(run_id: &str, with_pdf: bool) -> String {
    let mut body = serde_json::json!({
        "extracted_fields": {"insured_name": "[INSURED_NAME]", "date_of_loss": "[DATE_OF_LOSS]"},
        "filled_values": {"insured_name": "Jane Roe", "date_of_loss": "2024-09-28"},
        "report_excerpt": "Inspection performed on 10/02/2024.",
        "run_id": run_id,
        "download_url": format!("/api/download/{run_id}"),
        "diagnostics_url": format!("/api/diagnostics/{run_id}"),
    });
    if with_pdf {
        body["pdf_url"] = format!("/api/download-pdf/{run_id}").into();
    }
    body.to_string()
}

// ── Recording surface ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Event {
    Status(String),
    SubmitEnabled(bool),
    ResultsVisible(bool),
    Panels(ResultPanels),
    Tabs(TabInstructions),
    Preview(PreviewArea),
    Files(FilePreviewState),
}

pub struct RecordingSurface {
    events: Mutex<Vec<Event>>,
    has_panels: bool,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            has_panels: true,
        })
    }

    /// A surface missing its result panels.
    pub fn without_panels() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            has_panels: false,
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses().pop()
    }

    pub fn submit_toggles(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::SubmitEnabled(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn results_visible(&self) -> Option<bool> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::ResultsVisible(b) => Some(b),
            _ => None,
        })
    }

    pub fn panels(&self) -> Vec<ResultPanels> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Panels(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn last_tabs(&self) -> Option<TabInstructions> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Tabs(t) => Some(t),
            _ => None,
        })
    }

    pub fn last_preview(&self) -> Option<PreviewArea> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Preview(p) => Some(p),
            _ => None,
        })
    }
}

impl UiSurface for RecordingSurface {
    fn set_status(&self, message: &str) {
        self.push(Event::Status(message.to_string()));
    }

    fn set_submit_enabled(&self, enabled: bool) {
        self.push(Event::SubmitEnabled(enabled));
    }

    fn set_results_visible(&self, visible: bool) {
        self.push(Event::ResultsVisible(visible));
    }

    fn has_result_panels(&self) -> bool {
        self.has_panels
    }

    fn show_panels(&self, panels: &ResultPanels) {
        self.push(Event::Panels(panels.clone()));
    }

    fn show_tabs(&self, tabs: &TabInstructions) {
        self.push(Event::Tabs(*tabs));
    }

    fn show_preview(&self, preview: &PreviewArea) {
        self.push(Event::Preview(preview.clone()));
    }

    fn show_file_preview(&self, state: &FilePreviewState) {
        self.push(Event::Files(state.clone()));
    }
}

// ── Scripted renderer ────────────────────────────────────────────────────────

/// Pretends every document has `pages` pages.
pub struct ScriptedRenderer {
    pub available: bool,
    pub pages: usize,
    pub fail_on: Option<usize>,
    pub opened: Arc<Mutex<Vec<Url>>>,
    pub rendered: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedRenderer {
    pub fn with_pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            pages,
            fail_on: None,
            opened: Arc::new(Mutex::new(Vec::new())),
            rendered: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            pages: 0,
            fail_on: None,
            opened: Arc::new(Mutex::new(Vec::new())),
            rendered: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn failing_on(pages: usize, index: usize) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            pages,
            fail_on: Some(index),
            opened: Arc::new(Mutex::new(Vec::new())),
            rendered: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<usize> {
        self.rendered.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    pages: usize,
    fail_on: Option<usize>,
    rendered: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl DocumentRenderer for ScriptedRenderer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self, url: &Url) -> Result<Box<dyn RenderSession>, RenderError> {
        self.opened.lock().unwrap().push(url.clone());
        Ok(Box::new(ScriptedSession {
            pages: self.pages,
            fail_on: self.fail_on,
            rendered: Arc::clone(&self.rendered),
        }))
    }
}

#[async_trait]
impl RenderSession for ScriptedSession {
    fn page_count(&self) -> usize {
        self.pages
    }

    async fn render_page(&mut self, index: usize, _scale: f32) -> Result<PageSurface, RenderError> {
        self.rendered.lock().unwrap().push(index);
        if self.fail_on == Some(index) {
            return Err(RenderError::PageFailed {
                page: index + 1,
                detail: "scripted failure".into(),
            });
        }
        Ok(PageSurface {
            page_num: index + 1,
            width: 918,
            height: 1188,
            png: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

// ── Controller wiring ────────────────────────────────────────────────────────

pub fn config_for(server_url: &str) -> ClientConfig {
    ClientConfig::builder()
        .server_url(server_url)
        .build()
        .expect("test config")
}

pub fn controller(
    server_url: &str,
    renderer: Arc<dyn DocumentRenderer>,
    surface: Arc<dyn UiSurface>,
) -> PipelineSubmissionController {
    let config = config_for(server_url);
    let http = HttpPipeline::new(&config).expect("http client");
    PipelineSubmissionController::new(
        config,
        Capabilities {
            transport: Arc::new(http),
            renderer,
            surface,
        },
    )
}
