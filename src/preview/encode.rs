//! Page encoding: `DynamicImage` → PNG bytes, and PNG → data URI.
//!
//! PNG keeps rendered text crisp; the preview is a reading aid, so lossy
//! artefacts on small print are worse than a larger file.

use crate::error::RenderError;
use crate::model::PageSurface;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} page → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Build the surface for 1-indexed page `page_num` from its bitmap.
pub fn surface_from_image(page_num: usize, img: &DynamicImage) -> Result<PageSurface, RenderError> {
    let png = encode_png(img).map_err(|e| RenderError::EncodeFailed {
        page: page_num,
        detail: e.to_string(),
    })?;
    Ok(PageSurface {
        page_num,
        width: img.width(),
        height: img.height(),
        png,
    })
}

/// `data:image/png;base64,…` for inline display.
pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let png = encode_png(&red(10, 10)).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn surface_keeps_dimensions() {
        let s = surface_from_image(2, &red(12, 7)).unwrap();
        assert_eq!((s.page_num, s.width, s.height), (2, 12, 7));
        let decoded = image::load_from_memory(&s.png).unwrap();
        assert_eq!(decoded.width(), 12);
    }

    #[test]
    fn data_uri_is_base64_png() {
        let png = encode_png(&red(2, 2)).unwrap();
        let uri = data_uri(&png);
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), png);
    }
}
