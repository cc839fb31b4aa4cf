//! Network access to the pipeline service.
//!
//! [`PipelineTransport`] is the seam the controller calls through; tests
//! substitute their own implementation or point [`HttpPipeline`] at an
//! in-process server. Besides submission, [`HttpPipeline`] probes the health
//! endpoint and fetches generated artefacts.

use crate::config::ClientConfig;
use crate::error::GlrError;
use crate::model::{HealthStatus, PipelineResult, SelectedFile, UploadSession, DOCX_MIME, PDF_MIME};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use url::Url;

/// Generic status text when the server gives no `detail`.
pub const GENERIC_FAILURE: &str = "Pipeline failed";

/// Performs one pipeline run per call.
#[async_trait]
pub trait PipelineTransport: Send + Sync {
    async fn submit(&self, session: &UploadSession) -> Result<PipelineResult, GlrError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpPipeline {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpPipeline {
    pub fn new(config: &ClientConfig) -> Result<Self, GlrError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("glr-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GlrError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus, GlrError> {
        let url = self.config.health_url()?;
        let response = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .send()
            .await
            .map_err(|e| self.classify(&url, e, self.config.download_timeout_secs))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(&url, e, self.config.download_timeout_secs))?;
        if !status.is_success() {
            return Err(request_failed(status, &body));
        }
        serde_json::from_slice(&body).map_err(|e| GlrError::MalformedResponse {
            detail: format!("health payload: {e}"),
        })
    }

    /// Fetch a generated artefact. `link` may be server-relative.
    pub async fn fetch(&self, link: &str) -> Result<Vec<u8>, GlrError> {
        let url = self.config.resolve(link)?;
        self.fetch_url(&url).await
    }

    /// Fetch an absolute URL.
    pub async fn fetch_url(&self, url: &Url) -> Result<Vec<u8>, GlrError> {
        let secs = self.config.download_timeout_secs;
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(secs))
            .send()
            .await
            .map_err(|e| self.classify(url, e, secs))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(url, e, secs))?;
        if !status.is_success() {
            return Err(request_failed(status, &body));
        }
        Ok(body.to_vec())
    }

    /// Download an artefact to `dest`, writing atomically (temp + rename).
    /// Returns the byte count.
    pub async fn download_to(&self, link: &str, dest: &Path) -> Result<u64, GlrError> {
        let bytes = self.fetch(link).await?;
        let write_err = |source: std::io::Error| GlrError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp = part_path(dest);
        tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, dest).await.map_err(write_err)?;

        info!("Saved {} ({} bytes)", dest.display(), bytes.len());
        Ok(bytes.len() as u64)
    }

    fn classify(&self, url: &Url, e: reqwest::Error, secs: u64) -> GlrError {
        if e.is_timeout() {
            GlrError::Timeout { secs }
        } else {
            GlrError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl PipelineTransport for HttpPipeline {
    async fn submit(&self, session: &UploadSession) -> Result<PipelineResult, GlrError> {
        let url = self.config.submit_url()?;
        let form = build_form(session)?;

        info!(
            "Submitting template '{}' with {} report(s) to {}",
            session.template().name,
            session.reports().len(),
            url
        );

        let mut request = self.client.post(url.clone()).multipart(form);
        if let Some(secs) = self.config.request_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = request.send().await.map_err(|e| {
            self.classify(&url, e, self.config.request_timeout_secs.unwrap_or_default())
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            self.classify(&url, e, self.config.request_timeout_secs.unwrap_or_default())
        })?;

        interpret_response(status, &body)
    }
}

/// Build the multipart body: one `template` part, then one `reports` part
/// per report in selection order.
pub fn build_form(session: &UploadSession) -> Result<Form, GlrError> {
    let mut form = Form::new().part("template", file_part(session.template(), DOCX_MIME)?);
    for report in session.reports() {
        form = form.part("reports", file_part(report, PDF_MIME)?);
    }
    Ok(form)
}

fn file_part(file: &SelectedFile, fallback_mime: &str) -> Result<Part, GlrError> {
    let mime = file.declared_type.as_deref().unwrap_or(fallback_mime);
    debug!("Part '{}' ({}, {} bytes)", file.name, mime, file.size());
    Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(mime)
        .map_err(|e| GlrError::Internal(format!("invalid MIME type '{mime}': {e}")))
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// The server's `detail` text, if the body carries one.
///
/// FastAPI validation errors put a list under `detail`; it is rendered as
/// compact JSON rather than dropped.
fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Null | serde_json::Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

fn request_failed(status: StatusCode, body: &[u8]) -> GlrError {
    let message = error_detail(body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
    warn!("Pipeline answered {}: {}", status, message);
    GlrError::RequestFailed {
        status: status.as_u16(),
        message,
    }
}

/// Map a status and body to a result or a request error.
pub fn interpret_response(status: StatusCode, body: &[u8]) -> Result<PipelineResult, GlrError> {
    if !status.is_success() {
        return Err(request_failed(status, body));
    }
    serde_json::from_slice(body).map_err(|e| GlrError::MalformedResponse {
        detail: e.to_string(),
    })
}

/// Append `t=<unix millis>` so intermediaries never serve a stale copy.
pub fn cache_busted(url: &Url) -> Url {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut busted = url.clone();
    busted.query_pairs_mut().append_pair("t", &millis.to_string());
    busted
}

/// In-progress name for `dest`: the whole file name plus `.part`.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str = r#"{
        "extracted_fields": {},
        "filled_values": {},
        "report_excerpt": "",
        "run_id": "r1",
        "download_url": "/api/download/r1",
        "diagnostics_url": "/api/diagnostics/r1"
    }"#;

    #[test]
    fn detail_is_surfaced() {
        let err = interpret_response(
            StatusCode::BAD_REQUEST,
            br#"{"detail": "Template must be a .docx file"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Template must be a .docx file");
        assert!(matches!(err, GlrError::RequestFailed { status: 400, .. }));
    }

    #[test]
    fn missing_detail_is_generic() {
        let err = interpret_response(StatusCode::INTERNAL_SERVER_ERROR, b"{}").unwrap_err();
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn non_json_error_body_is_generic() {
        let err = interpret_response(StatusCode::BAD_GATEWAY, b"<html>502</html>").unwrap_err();
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn structured_detail_is_rendered() {
        let err = interpret_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail": [{"loc": ["body", "reports"], "msg": "field required"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("field required"));
    }

    #[test]
    fn success_parses_result() {
        let r = interpret_response(StatusCode::OK, OK_BODY.as_bytes()).unwrap();
        assert_eq!(r.run_id, "r1");
        assert!(r.pdf_url.is_none());
    }

    #[test]
    fn part_files_keep_the_extension() {
        let dir = Path::new("/tmp/out");
        let docx = part_path(&dir.join("filled_template_r1.docx"));
        let pdf = part_path(&dir.join("filled_template_r1.pdf"));
        assert_eq!(docx, dir.join("filled_template_r1.docx.part"));
        assert_eq!(pdf, dir.join("filled_template_r1.pdf.part"));
    }

    #[test]
    fn success_with_garbage_is_malformed() {
        let err = interpret_response(StatusCode::OK, b"not json").unwrap_err();
        assert!(matches!(err, GlrError::MalformedResponse { .. }));
    }

    #[test]
    fn cache_bust_keeps_existing_query() {
        let url = Url::parse("http://h/api/download-pdf/r1?x=1").unwrap();
        let busted = cache_busted(&url);
        let keys: Vec<_> = busted.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["x", "t"]);
    }
}
