//! Configuration for the pipeline client.
//!
//! Every tunable lives in [`ClientConfig`], built via
//! [`ClientConfigBuilder`]. Setters clamp to sane ranges; [`build`] parses the
//! server URL and rejects what cannot be clamped.
//!
//! [`build`]: ClientConfigBuilder::build

use crate::error::GlrError;
use crate::model::MAX_PREVIEW_PAGES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Default pipeline location: the development server's bind address.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Configuration for one client instance.
///
/// # Example
/// ```rust
/// use glr_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .server_url("https://glr.example.com")
///     .request_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.request_timeout_secs, Some(90));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the pipeline service. Relative links in responses are
    /// resolved against it.
    pub server_url: Url,

    /// Path of the submission endpoint. Default: `/api/glr`.
    pub submit_path: String,

    /// Path of the health endpoint. Default: `/health`.
    pub health_path: String,

    /// Magnification applied when rasterising preview pages. Default: 1.5.
    pub preview_scale: f32,

    /// Pages rendered in the preview. Range: 1–3. Default: 3.
    pub max_preview_pages: usize,

    /// Upper bound on the submission request. Default: none.
    ///
    /// Pipeline runs include an LLM round trip and routinely take tens of
    /// seconds, so no limit is applied unless one is asked for.
    pub request_timeout_secs: Option<u64>,

    /// Timeout for fetching generated artefacts (preview PDF, downloads).
    /// Default: 120.
    pub download_timeout_secs: u64,

    /// Append `?t=<unix millis>` when fetching the preview document so a
    /// caching proxy never serves the previous run's file. Default: true.
    pub cache_bust: bool,

    /// Explicit libpdfium path, checked ahead of `PDFIUM_LIB_PATH`.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server URL is valid"),
            submit_path: "/api/glr".to_string(),
            health_path: "/health".to_string(),
            preview_scale: 1.5,
            max_preview_pages: MAX_PREVIEW_PAGES,
            request_timeout_secs: None,
            download_timeout_secs: 120,
            cache_bust: true,
            pdfium_library: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            server_url: None,
        }
    }

    /// Resolve a server-relative path or link (e.g. `/api/download/abc`)
    /// against [`Self::server_url`]. Absolute URLs pass through unchanged.
    pub fn resolve(&self, link: &str) -> Result<Url, GlrError> {
        resolve_link(&self.server_url, link)
    }

    /// Full URL of the submission endpoint.
    pub fn submit_url(&self) -> Result<Url, GlrError> {
        self.endpoint(&self.submit_path)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> Result<Url, GlrError> {
        self.endpoint(&self.health_path)
    }

    fn endpoint(&self, path: &str) -> Result<Url, GlrError> {
        self.server_url
            .join(path)
            .map_err(|e| GlrError::InvalidConfig(format!("endpoint path '{path}': {e}")))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    server_url: Option<String>,
}

impl ClientConfigBuilder {
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn submit_path(mut self, path: impl Into<String>) -> Self {
        self.config.submit_path = path.into();
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn max_preview_pages(mut self, n: usize) -> Self {
        self.config.max_preview_pages = n.clamp(1, MAX_PREVIEW_PAGES);
        self
    }

    /// `0` means no timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = (secs > 0).then_some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn cache_bust(mut self, v: bool) -> Self {
        self.config.cache_bust = v;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, GlrError> {
        if let Some(raw) = self.server_url.take() {
            self.config.server_url = parse_server_url(&raw)?;
        }
        if !self.config.preview_scale.is_finite() {
            return Err(GlrError::InvalidConfig(
                "preview scale must be a finite number".into(),
            ));
        }
        // Fail here rather than on the first submit.
        self.config.submit_url()?;
        self.config.health_url()?;
        Ok(self.config)
    }
}

/// Parse the server URL, accepting only http(s).
///
/// A trailing slash is enforced so that `Url::join` keeps any path prefix
/// (`https://host/glr` + `api/glr` must not drop `glr`).
/// Join a link from a pipeline response onto `base`.
pub(crate) fn resolve_link(base: &Url, link: &str) -> Result<Url, GlrError> {
    base.join(link).map_err(|e| GlrError::MalformedResponse {
        detail: format!("unusable link '{link}': {e}"),
    })
}

fn parse_server_url(raw: &str) -> Result<Url, GlrError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| GlrError::InvalidConfig(format!("server URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GlrError::InvalidConfig(format!(
            "server URL '{raw}' must use http or https, not '{other}'"
        ))),
    }
}
