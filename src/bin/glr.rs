//! CLI binary for glr-client.
//!
//! A thin shim over the library crate: flags map onto `ClientConfig`, the
//! terminal is the `UiSurface`, and results can be saved as files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glr_client::{
    local_file_name, write_html, ClientConfig, DisplayState, FilePreviewState, FilePreviewer,
    HttpPipeline, PipelineSubmissionController, PreviewArea, PreviewFormat, ResultPanels,
    SelectedFile, TabInstructions, TempObjectStore, UiSurface,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal surface ─────────────────────────────────────────────────────────

/// Renders the results region to the terminal.
///
/// While submit is disabled a spinner carries the status line; once it is
/// re-enabled the spinner is cleared and later statuses print as lines.
struct TerminalSurface {
    spinner: Mutex<Option<ProgressBar>>,
    /// Last status shown on the spinner, reprinted when it clears.
    status: Mutex<String>,
    /// Print panels and preview as they arrive (off for `--json`).
    echo: bool,
    quiet: bool,
}

impl TerminalSurface {
    fn new(echo: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            status: Mutex::new(String::new()),
            echo,
            quiet,
        })
    }

    fn spinner(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, text: String) {
        match self.spinner().as_ref() {
            Some(bar) => bar.println(text),
            None => println!("{text}"),
        }
    }
}

impl UiSurface for TerminalSurface {
    fn set_status(&self, message: &str) {
        if let Some(bar) = self.spinner().as_ref() {
            bar.set_message(message.to_string());
            *self.status.lock().unwrap_or_else(PoisonError::into_inner) = message.to_string();
            return;
        }
        if !self.quiet {
            eprintln!("{} {}", cyan("◆"), message);
        }
    }

    fn set_submit_enabled(&self, enabled: bool) {
        let mut slot = self.spinner();
        if enabled {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
                let status = std::mem::take(
                    &mut *self.status.lock().unwrap_or_else(PoisonError::into_inner),
                );
                if !status.is_empty() {
                    eprintln!("{} {}", cyan("◆"), status);
                }
            }
        } else if !self.quiet && slot.is_none() {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(TICKS),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            *slot = Some(bar);
        }
    }

    fn set_results_visible(&self, visible: bool) {
        if visible && self.echo {
            self.line(dim("──────────────────────────────────────────"));
        }
    }

    fn show_panels(&self, panels: &ResultPanels) {
        if !self.echo {
            return;
        }
        self.line(format!("{} {}", bold("Run"), panels.run_id));
        self.line(bold("Extracted fields"));
        self.line(panels.fields.clone());
        self.line(bold("Filled values"));
        self.line(panels.values.clone());
        self.line(bold("Report excerpt"));
        self.line(panels.excerpt.clone());
        for format in PreviewFormat::ALL {
            match panels.download(format) {
                Some(a) => self.line(format!(
                    "{} {:<4} {}  {}",
                    green("↓"),
                    format.label(),
                    a.filename,
                    dim(a.url.as_str())
                )),
                None => self.line(dim(&format!("  {} not available", format.label()))),
            }
        }
        self.line(format!("  Diagnostics  {}", dim(panels.diagnostics_url.as_str())));
    }

    fn show_tabs(&self, tabs: &TabInstructions) {
        if !self.echo {
            return;
        }
        let labels: Vec<String> = tabs
            .panes
            .iter()
            .map(|p| {
                if p.tab_active {
                    bold(&format!("[{}]", p.format.label()))
                } else {
                    dim(p.format.label())
                }
            })
            .collect();
        self.line(format!("Preview  {}", labels.join("  ")));
    }

    fn show_preview(&self, preview: &PreviewArea) {
        if !self.echo {
            return;
        }
        match preview {
            PreviewArea::Empty => {}
            PreviewArea::Pages(set) => {
                for s in set.surfaces() {
                    self.line(format!(
                        "  {} Page {}  {}",
                        green("✓"),
                        s.page_num,
                        dim(&format!("{}x{} px", s.width, s.height))
                    ));
                }
                if let Some(marker) = set.marker() {
                    self.line(dim(&marker));
                }
            }
            PreviewArea::Unavailable(msg) | PreviewArea::Failed(msg) => {
                self.line(format!("  {} {}", red("✗"), msg));
            }
        }
    }

    fn show_file_preview(&self, state: &FilePreviewState) {
        if self.quiet {
            return;
        }
        if let Some(t) = &state.template {
            eprintln!(
                "{} {}  {}",
                bold("Template"),
                t.name,
                dim(&format!("({}, {})", t.size_label, t.declared_type))
            );
        }
        for r in state.reports.iter().flatten() {
            eprintln!("  {}  {}", r.label, dim(r.object.url.as_str()));
        }
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill a template from two inspection reports
  glr run --template glr_template.docx report1.pdf report2.pdf

  # Save downloads and preview pages, plus an HTML summary
  glr run -t template.docx report.pdf --out-dir out/ --html out/run.html

  # Against a remote server, JSON to stdout
  glr --server https://glr.example.com run -t template.docx report.pdf --json

  # Check the selection without contacting the server
  glr preview -t template.docx report1.pdf report2.pdf

  # Is the pipeline up? Is PDFium installed?
  glr health
  glr engine --fetch

ENVIRONMENT VARIABLES:
  GLR_SERVER              Pipeline base URL (default http://127.0.0.1:8000)
  GLR_REQUEST_TIMEOUT     Submission timeout in seconds (0 = none)
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  GLR_PDFIUM_CACHE_DIR    Override the PDFium cache directory
  RUST_LOG                Tracing filter; overrides --verbose / --quiet
"#;

/// Client for the GLR document-generation pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "glr",
    version,
    about = "Submit a template and PDF reports to the GLR pipeline and review the result",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Pipeline base URL.
    #[arg(long, global = true, env = "GLR_SERVER", default_value = glr_client::config::DEFAULT_SERVER_URL)]
    server: String,

    /// Submission timeout in seconds; 0 waits indefinitely.
    #[arg(long, global = true, env = "GLR_REQUEST_TIMEOUT", default_value_t = 0)]
    request_timeout: u64,

    /// Timeout for fetching generated files, in seconds.
    #[arg(long, global = true, env = "GLR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to libpdfium, checked before PDFIUM_LIB_PATH.
    #[arg(long, global = true, env = "GLR_PDFIUM_LIBRARY")]
    pdfium: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "GLR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "GLR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a template and reports, then show the result.
    Run(RunArgs),
    /// Show local previews of the selection; nothing is sent.
    Preview(SelectionArgs),
    /// Query the pipeline's health endpoint.
    Health,
    /// Check for the PDFium engine used for page previews.
    Engine {
        /// Download PDFium into the cache if it is missing.
        #[arg(long)]
        fetch: bool,
    },
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// Word template (.docx).
    #[arg(short, long, env = "GLR_TEMPLATE")]
    template: Option<PathBuf>,

    /// PDF reports, in submission order.
    reports: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Preview tab to switch to after the result arrives (docx or pdf).
    #[arg(long, env = "GLR_FORMAT")]
    format: Option<PreviewFormat>,

    /// Save the DOCX/PDF downloads and preview pages (PNG) here.
    #[arg(short, long, env = "GLR_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Write a self-contained HTML view of the result.
    #[arg(long, env = "GLR_HTML")]
    html: Option<PathBuf>,

    /// Print the result and display state as JSON on stdout.
    #[arg(long, env = "GLR_JSON")]
    json: bool,

    /// Fetch the preview PDF without the cache-busting query.
    #[arg(long)]
    no_cache_bust: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries progress during `run`; INFO logs would tear it.
    let spinner = matches!(&cli.command, Command::Run(r) if !r.json) && !cli.global.quiet;
    let filter = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(ref args) => run(&cli.global, args).await,
        Command::Preview(ref args) => preview(&cli.global, args).await,
        Command::Health => health(&cli.global).await,
        Command::Engine { fetch } => engine(&cli.global, fetch),
    }
}

/// Map global flags to `ClientConfig`.
fn build_config(global: &GlobalArgs, cache_bust: bool) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .server_url(global.server.clone())
        .request_timeout_secs(global.request_timeout)
        .download_timeout_secs(global.download_timeout)
        .cache_bust(cache_bust);
    if let Some(ref path) = global.pdfium {
        builder = builder.pdfium_library(path.clone());
    }
    builder.build().context("Invalid configuration")
}

async fn load_selection(args: &SelectionArgs) -> Result<(Option<SelectedFile>, Vec<SelectedFile>)> {
    let template = match args.template {
        Some(ref path) => Some(
            SelectedFile::from_path(path)
                .await
                .with_context(|| format!("Failed to read template {:?}", path))?,
        ),
        None => None,
    };
    let mut reports = Vec::with_capacity(args.reports.len());
    for path in &args.reports {
        reports.push(
            SelectedFile::from_path(path)
                .await
                .with_context(|| format!("Failed to read report {:?}", path))?,
        );
    }
    Ok((template, reports))
}

/// Build the local previews and hand them to the surface.
fn show_selection(
    surface: &dyn UiSurface,
    template: Option<&SelectedFile>,
    reports: &[SelectedFile],
) -> Result<FilePreviewer<TempObjectStore>> {
    let store = TempObjectStore::new().context("Failed to create preview store")?;
    let mut previewer = FilePreviewer::new(store);
    previewer.select_template(template);
    let state = previewer
        .select_reports(reports)
        .context("Failed to prepare report previews")?;
    surface.show_file_preview(state);
    Ok(previewer)
}

// ── run ──────────────────────────────────────────────────────────────────────

async fn run(global: &GlobalArgs, args: &RunArgs) -> Result<()> {
    let config = build_config(global, !args.no_cache_bust)?;
    let surface = TerminalSurface::new(!args.json, global.quiet);

    let (template, reports) = load_selection(&args.selection).await?;
    let _previews = show_selection(surface.as_ref(), template.as_ref(), &reports)?;

    let controller = PipelineSubmissionController::connect(config.clone(), surface.clone())
        .context("Failed to set up the pipeline client")?;
    let outcome = controller
        .submit(template, reports)
        .await
        .context("Pipeline run failed")?;

    if let Some(format) = args.format {
        if controller.select_format(format).is_none() {
            anyhow::bail!("No result to switch preview tabs on");
        }
    }
    let display = controller.last_display().unwrap_or(outcome.display);

    if let Some(ref dir) = args.out_dir {
        save_outputs(&config, &display, dir, global.quiet).await?;
    }

    if let Some(ref path) = args.html {
        write_html(&display, path)
            .await
            .with_context(|| format!("Failed to write HTML report {:?}", path))?;
        if !global.quiet {
            eprintln!("{} HTML  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "result": outcome.result,
            "display": display,
        }))
        .context("Failed to serialise output")?;
        println!("{json}");
    }

    Ok(())
}

/// Download every offered format and write preview pages as PNG.
async fn save_outputs(
    config: &ClientConfig,
    display: &DisplayState,
    dir: &Path,
    quiet: bool,
) -> Result<()> {
    let http = HttpPipeline::new(config).context("Failed to build HTTP client")?;

    for format in PreviewFormat::ALL {
        let Some(action) = display.panels.download(format) else {
            continue;
        };
        let dest = dir.join(action.local_file_name());
        let bytes = http
            .download_to(action.url.as_str(), &dest)
            .await
            .with_context(|| format!("Failed to download {}", action.filename))?;
        if !quiet {
            eprintln!(
                "{} {}  {}",
                green("↓"),
                bold(&dest.display().to_string()),
                dim(&format!("{bytes} bytes"))
            );
        }
    }

    if let Some(set) = display.preview.pages() {
        for surface in set.surfaces() {
            let dest = dir.join(local_file_name(&format!(
                "preview_{}_page{}.png",
                display.panels.run_id, surface.page_num
            )));
            tokio::fs::write(&dest, &surface.png)
                .await
                .with_context(|| format!("Failed to write {:?}", dest))?;
        }
        if !quiet && !set.surfaces().is_empty() {
            eprintln!(
                "{} {} preview page(s)  →  {}",
                green("✔"),
                set.surfaces().len(),
                bold(&dir.display().to_string())
            );
        }
    }
    Ok(())
}

// ── preview ──────────────────────────────────────────────────────────────────

async fn preview(global: &GlobalArgs, args: &SelectionArgs) -> Result<()> {
    let surface = TerminalSurface::new(true, global.quiet);
    let (template, reports) = load_selection(args).await?;
    let _previews = show_selection(surface.as_ref(), template.as_ref(), &reports)?;

    if template.is_none() {
        eprintln!("{} {}", red("✗"), glr_client::ValidationError::MissingTemplate);
    } else if reports.is_empty() {
        eprintln!("{} {}", red("✗"), glr_client::ValidationError::NoReports);
    }
    Ok(())
}

// ── health ───────────────────────────────────────────────────────────────────

async fn health(global: &GlobalArgs) -> Result<()> {
    let config = build_config(global, true)?;
    let http = HttpPipeline::new(&config).context("Failed to build HTTP client")?;
    let status = http
        .health()
        .await
        .with_context(|| format!("Health check against {} failed", config.server_url))?;
    println!(
        "{} {}  status={}  version={}",
        green("✔"),
        config.server_url,
        bold(&status.status),
        status.version
    );
    Ok(())
}

// ── engine ───────────────────────────────────────────────────────────────────

fn engine(global: &GlobalArgs, fetch: bool) -> Result<()> {
    let availability = pdfium_probe::probe_with(global.pdfium.as_deref());
    if let Some(source) = availability.source() {
        println!("{} PDFium ready ({})", green("✔"), source);
        return Ok(());
    }
    if let pdfium_probe::Availability::Missing { ref searched } = availability {
        for path in searched {
            eprintln!("  {} {}", dim("searched"), path.display());
        }
    }
    if !fetch {
        println!(
            "{} PDFium not found; page previews will fall back to download links. \
             Run `glr engine --fetch` to install it.",
            red("✗")
        );
        return Ok(());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));

    let progress = bar.clone();
    let path = tokio::task::block_in_place(|| {
        pdfium_probe::fetch(Some(&|downloaded, total| {
            if let Some(t) = total {
                if progress.length().unwrap_or(0) != t {
                    progress.set_length(t);
                }
            }
            progress.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;
    bar.finish_and_clear();

    println!("{} PDFium installed at {}", green("✔"), bold(&path.display().to_string()));
    Ok(())
}
