//! # pdfium-probe
//!
//! Answer one question before any PDF gets rasterised: *is a PDFium library
//! available, and where?* Then bind to it.
//!
//! [`probe`] never panics and never touches the network. It walks the
//! candidate locations in a fixed order and reports the first hit:
//!
//! 1. `PDFIUM_LIB_PATH`: an explicit library path.
//! 2. The per-version cache directory (see [`cache_dir`]), populated by
//!    [`fetch`].
//! 3. The platform's system library search path.
//!
//! [`fetch`] downloads the platform archive from
//! [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//! and extracts the shared library into the cache directory. It is blocking;
//! async callers should wrap it in `spawn_blocking` or `block_in_place`.
//!
//! ```rust,no_run
//! use pdfium_probe::{probe, Availability};
//!
//! match probe() {
//!     Availability::Ready(source) => {
//!         let pdfium = source.bind().expect("bind");
//!         let _ = pdfium;
//!     }
//!     Availability::Missing { searched } => {
//!         eprintln!("no PDFium found, looked in {searched:?}");
//!     }
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH`: path to an existing pdfium library.
//! - `GLR_PDFIUM_CACHE_DIR`: override the base cache directory.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASES_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Environment variable naming an explicit library path.
pub const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Environment variable overriding the base cache directory.
pub const CACHE_DIR_ENV: &str = "GLR_PDFIUM_CACHE_DIR";

/// Errors from locating, fetching or binding PDFium.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("No PDFium build is published for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory '{path}' is unusable: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from {source_desc}: {reason}")]
    Bind { source_desc: String, reason: String },
}

// ── Platform table ───────────────────────────────────────────────────────────

/// Where the library lives in a release archive and what it is called on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAsset {
    pub archive: &'static str,
    pub member: &'static str,
    pub file_name: &'static str,
}

//                 os         arch       archive                    member
const ASSETS: &[(&str, &str, &str, &str)] = &[
    ("macos", "aarch64", "pdfium-mac-arm64.tgz", "lib/libpdfium.dylib"),
    ("macos", "x86_64", "pdfium-mac-x64.tgz", "lib/libpdfium.dylib"),
    ("linux", "x86_64", "pdfium-linux-x64.tgz", "lib/libpdfium.so"),
    ("linux", "aarch64", "pdfium-linux-arm64.tgz", "lib/libpdfium.so"),
    ("windows", "x86_64", "pdfium-win-x64.tgz", "bin/pdfium.dll"),
    ("windows", "aarch64", "pdfium-win-arm64.tgz", "bin/pdfium.dll"),
    ("windows", "x86", "pdfium-win-x86.tgz", "bin/pdfium.dll"),
];

/// Look up the release asset for an `(os, arch)` pair.
pub fn asset_for(os: &str, arch: &str) -> Result<PlatformAsset, ProbeError> {
    ASSETS
        .iter()
        .find(|(o, a, _, _)| *o == os && *a == arch)
        .map(|&(_, _, archive, member)| PlatformAsset {
            archive,
            member,
            file_name: member.rsplit('/').next().unwrap_or(member),
        })
        .ok_or_else(|| ProbeError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

/// The release asset for the running platform.
pub fn current_asset() -> Result<PlatformAsset, ProbeError> {
    asset_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Locations ────────────────────────────────────────────────────────────────

/// Per-version cache directory for the PDFium library.
///
/// `$GLR_PDFIUM_CACHE_DIR/pdfium-{VERSION}` when the override is set,
/// otherwise `{platform cache dir}/glr/pdfium-{VERSION}`.
pub fn cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Ok(base) = std::env::var(CACHE_DIR_ENV) {
        if !base.is_empty() {
            return PathBuf::from(base).join(versioned);
        }
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("glr")
        .join(versioned)
}

/// Where a usable library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// An explicit path (from `PDFIUM_LIB_PATH` or a caller override).
    Explicit(PathBuf),
    /// The cache directory populated by [`fetch`].
    Cached(PathBuf),
    /// The dynamic loader's default search path.
    System,
}

impl LibrarySource {
    /// Bind to the library this source points at.
    pub fn bind(&self) -> Result<Pdfium, ProbeError> {
        let bindings = match self {
            LibrarySource::Explicit(path) | LibrarySource::Cached(path) => {
                Pdfium::bind_to_library(path)
            }
            LibrarySource::System => Pdfium::bind_to_system_library(),
        };
        bindings.map(Pdfium::new).map_err(|e| ProbeError::Bind {
            source_desc: self.to_string(),
            reason: e.to_string(),
        })
    }

    /// The on-disk path, when the source has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LibrarySource::Explicit(p) | LibrarySource::Cached(p) => Some(p),
            LibrarySource::System => None,
        }
    }
}

impl fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibrarySource::Explicit(p) => write!(f, "'{}'", p.display()),
            LibrarySource::Cached(p) => write!(f, "cache '{}'", p.display()),
            LibrarySource::System => f.write_str("system library path"),
        }
    }
}

/// Result of the availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready(LibrarySource),
    Missing { searched: Vec<PathBuf> },
}

impl Availability {
    pub fn source(&self) -> Option<&LibrarySource> {
        match self {
            Availability::Ready(s) => Some(s),
            Availability::Missing { .. } => None,
        }
    }
}

/// Check the candidate locations in order and report the first usable one.
///
/// The system-path candidate is verified by actually loading the library,
/// since there is no file to stat.
pub fn probe() -> Availability {
    probe_with(None)
}

/// Like [`probe`], but an `explicit` path (e.g. from a config file) is
/// checked ahead of `PDFIUM_LIB_PATH`.
pub fn probe_with(explicit: Option<&Path>) -> Availability {
    let mut searched = Vec::new();

    let env_path = std::env::var(LIB_PATH_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    for candidate in explicit.map(Path::to_path_buf).into_iter().chain(env_path) {
        if candidate.is_file() {
            debug!("PDFium found at explicit path {}", candidate.display());
            return Availability::Ready(LibrarySource::Explicit(candidate));
        }
        warn!("PDFium path '{}' does not exist", candidate.display());
        searched.push(candidate);
    }

    if let Ok(asset) = current_asset() {
        let cached = cache_dir().join(asset.file_name);
        if cached.is_file() {
            debug!("PDFium found in cache {}", cached.display());
            return Availability::Ready(LibrarySource::Cached(cached));
        }
        searched.push(cached);
    }

    if Pdfium::bind_to_system_library().is_ok() {
        debug!("PDFium found on the system library path");
        return Availability::Ready(LibrarySource::System);
    }

    Availability::Missing { searched }
}

// ── Fetch ────────────────────────────────────────────────────────────────────

/// Download the platform library into [`cache_dir`] unless it is already
/// there. Returns the library path.
///
/// `on_progress` receives `(bytes_so_far, content_length)`.
pub fn fetch(on_progress: Option<&dyn Fn(u64, Option<u64>)>) -> Result<PathBuf, ProbeError> {
    let asset = current_asset()?;
    let dir = cache_dir();
    let target = dir.join(asset.file_name);
    if target.is_file() {
        return Ok(target);
    }

    std::fs::create_dir_all(&dir).map_err(|source| ProbeError::CacheDir {
        path: dir.clone(),
        source,
    })?;

    let url = format!(
        "{RELEASES_URL}/chromium%2F{PDFIUM_VERSION}/{}",
        asset.archive
    );
    info!("Fetching PDFium from {url}");

    let archive = download(&url, on_progress)?;
    unpack_member(&archive, asset.member, &target)?;

    info!("PDFium cached at {}", target.display());
    Ok(target)
}

fn download(url: &str, on_progress: Option<&dyn Fn(u64, Option<u64>)>) -> Result<Vec<u8>, ProbeError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-probe/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ProbeError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ProbeError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ProbeError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = [0u8; 64 * 1024];

    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProbeError::Download(format!("read error: {e}"))),
        };
        body.extend_from_slice(&chunk[..n]);
        if let Some(cb) = on_progress {
            cb(body.len() as u64, total);
        }
    }

    Ok(body)
}

/// Extract one member of a `.tgz` archive to `dest`.
///
/// The member is unpacked next to `dest` first and renamed into place, so a
/// crash mid-extraction never leaves a truncated library that [`probe`]
/// would report as ready.
pub fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), ProbeError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let partial = dest.with_extension("partial");
    let mut tar = Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| ProbeError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ProbeError::Extract(e.to_string()))?;
        let is_member = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(|e| ProbeError::Extract(e.to_string()))?;
        if !is_member {
            continue;
        }
        entry
            .unpack(&partial)
            .map_err(|e| ProbeError::Extract(format!("unpack {member}: {e}")))?;
        return std::fs::rename(&partial, dest)
            .map_err(|e| ProbeError::Extract(format!("rename into place: {e}")));
    }

    Err(ProbeError::Extract(format!("'{member}' not found in archive")))
}
