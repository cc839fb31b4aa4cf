//! Self-contained HTML rendering of a [`DisplayState`].
//!
//! The page mirrors the results region: extracted fields, filled values,
//! report excerpt, download links, the two preview tabs, and the rasterised
//! pages inlined as PNG data URIs. No scripts and no external assets, so the
//! file opens anywhere.

use crate::display::DisplayState;
use crate::error::GlrError;
use crate::model::PreviewFormat;
use crate::preview::encode::data_uri;
use crate::preview::PreviewArea;
use std::fmt::Write as _;
use std::path::Path;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem}\
pre{background:#f5f5f5;padding:1rem;overflow:auto}\
.tabs a{margin-right:1rem}.tabs a.active{font-weight:bold}\
.pane.hidden{display:none}.page{max-width:100%;border:1px solid #ccc;margin:.5rem 0}\
.marker,.fallback{color:#666;font-style:italic}";

/// Render the page.
pub fn render_html(display: &DisplayState) -> String {
    let panels = &display.panels;
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    let _ = write!(html, "<title>Run {}</title>", escape(&panels.run_id));
    let _ = write!(html, "<style>{STYLE}</style></head><body>\n");
    let _ = writeln!(html, "<h1>Run {}</h1>", escape(&panels.run_id));

    section(&mut html, "Extracted fields", &panels.fields);
    section(&mut html, "Filled values", &panels.values);
    section(&mut html, "Report excerpt", &panels.excerpt);

    html.push_str("<h2>Downloads</h2><ul>\n");
    for format in PreviewFormat::ALL {
        if let Some(action) = panels.download(format) {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\" download=\"{}\">Download {}</a></li>",
                escape(action.url.as_str()),
                escape(&action.filename),
                format.label()
            );
        }
    }
    let _ = writeln!(
        html,
        "<li><a href=\"{}\">Diagnostics</a></li></ul>",
        escape(panels.diagnostics_url.as_str())
    );

    html.push_str("<h2>Preview</h2><div class=\"tabs\">");
    for pane in &display.tabs.panes {
        // The PDF tab only exists when a PDF was produced.
        if pane.format == PreviewFormat::Pdf && panels.pdf_download.is_none() {
            continue;
        }
        let _ = write!(
            html,
            "<a href=\"#pane-{}\" class=\"{}\">{}</a>",
            pane.format,
            if pane.tab_active { "active" } else { "" },
            pane.format.label()
        );
    }
    html.push_str("</div>\n");

    for pane in &display.tabs.panes {
        let _ = write!(
            html,
            "<div id=\"pane-{}\" class=\"pane{}\">",
            pane.format,
            if pane.visible { "" } else { " hidden" }
        );
        match pane.format {
            PreviewFormat::Docx => {
                html.push_str("<p>Download the DOCX file to view it in a word processor.</p>");
            }
            PreviewFormat::Pdf => preview(&mut html, &display.preview),
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body></html>\n");
    html
}

fn section(html: &mut String, title: &str, body: &str) {
    let _ = writeln!(html, "<h2>{}</h2><pre>{}</pre>", escape(title), escape(body));
}

fn preview(html: &mut String, area: &PreviewArea) {
    match area {
        PreviewArea::Empty => {}
        PreviewArea::Pages(set) => {
            for surface in set.surfaces() {
                let _ = write!(
                    html,
                    "<img class=\"page\" alt=\"Page {}\" width=\"{}\" height=\"{}\" src=\"{}\">",
                    surface.page_num,
                    surface.width,
                    surface.height,
                    data_uri(&surface.png)
                );
            }
            if let Some(marker) = set.marker() {
                let _ = write!(html, "<p class=\"marker\">{}</p>", escape(&marker));
            }
        }
        PreviewArea::Unavailable(msg) | PreviewArea::Failed(msg) => {
            let _ = write!(html, "<p class=\"fallback\">{}</p>", escape(msg));
        }
    }
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write the page to `path` atomically (temp file, then rename).
pub async fn write_html(display: &DisplayState, path: impl AsRef<Path>) -> Result<(), GlrError> {
    let path = path.as_ref();
    let html = render_html(display);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GlrError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, html)
        .await
        .map_err(|e| GlrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| GlrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
