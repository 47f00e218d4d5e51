//! PDF assembly (stage C) – slices one full-height raster into pages using
//! `printpdf` (v0.8 ops-based API).
//!
//! The raster is registered once as an XObject; every page places the same
//! image scaled to the page width and shifted up by a whole number of page
//! heights, so each page windows into a different band of the capture.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use log::{debug, info};
use printpdf::*;

use crate::error::PipelineError;
use crate::layout::decode_data_uri;
use crate::style_config::{PaperSize, MM_PER_INCH, PT_PER_INCH};

/// Tolerance used when rounding the page count up.
const PAGE_COUNT_EPSILON: f32 = 1e-4;

/// A finished PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPdf {
    pub data_url: String,
    pub page_count: usize,
}

/// Number of pages a raster of the given pixel size covers at the paper's
/// width. Always at least 1.
pub fn pages_needed(raster_width: u32, raster_height: u32, paper: PaperSize) -> usize {
    if raster_width == 0 || raster_height == 0 {
        return 1;
    }
    let image_height_pt = raster_height as f32 * paper.width_pt() / raster_width as f32;
    let ratio = image_height_pt / paper.height_pt();
    ((ratio - PAGE_COUNT_EPSILON).ceil() as usize).max(1)
}

/// Build a PDF from a PNG data URL.
///
/// `on_page` is called after each page is placed with `(page_index, total)`.
pub fn assemble_pdf(
    title: &str,
    raster_data_url: &str,
    raster_width: u32,
    raster_height: u32,
    paper: PaperSize,
    mut on_page: impl FnMut(usize, usize),
) -> Result<AssembledPdf, PipelineError> {
    if raster_width == 0 || raster_height == 0 {
        return Err(PipelineError::Assembly(format!(
            "raster has no area ({raster_width}x{raster_height})"
        )));
    }
    let bytes = decode_data_uri(raster_data_url)
        .ok_or_else(|| PipelineError::Assembly("raster is not a base64 data URL".into()))?;

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let raw = RawImage::decode_from_bytes(&bytes, &mut warnings)
        .map_err(|e| PipelineError::Assembly(format!("raster decode: {e}")))?;
    let xobj_id = doc.add_image(&raw);

    let page_w_pt = paper.width_pt();
    let page_h_pt = paper.height_pt();
    let scale = page_w_pt / raster_width as f32;
    let image_h_pt = raster_height as f32 * scale;
    let total = pages_needed(raster_width, raster_height, paper);
    debug!(
        "assembling {total} page(s) from {raster_width}x{raster_height} raster ({image_h_pt:.1}pt tall)"
    );

    let (w_mm, h_mm) = (
        Mm(page_w_pt * MM_PER_INCH / PT_PER_INCH),
        Mm(page_h_pt * MM_PER_INCH / PT_PER_INCH),
    );
    let mut pages = Vec::with_capacity(total);
    for i in 0..total {
        // PDF origin is bottom-left: the image's bottom edge sits below the
        // page by everything not yet shown.
        let translate_y = page_h_pt - image_h_pt + i as f32 * page_h_pt;
        let ops = vec![Op::UseXobject {
            id: xobj_id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(translate_y)),
                dpi: Some(72.0),
                scale_x: Some(scale),
                scale_y: Some(scale),
                rotate: None,
            },
        }];
        pages.push(PdfPage::new(w_mm, h_mm, ops));
        on_page(i, total);
    }

    doc.with_pages(pages);
    let pdf = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    info!("assembled PDF: {} page(s), {} bytes", total, pdf.len());

    Ok(AssembledPdf {
        data_url: format!("data:application/pdf;base64,{}", BASE64_STD.encode(&pdf)),
        page_count: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_data_url(w: u32, h: u32) -> String {
        let img = ::image::RgbaImage::from_pixel(w, h, ::image::Rgba([255, 255, 255, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ::image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64_STD.encode(&buf))
    }

    #[test]
    fn page_count_rounds_up() {
        let paper = PaperSize::A4;
        let w = 100;
        let one_page = (w as f32 * paper.height_pt() / paper.width_pt()).round() as u32;
        assert_eq!(pages_needed(w, one_page, paper), 1);
        assert_eq!(pages_needed(w, one_page * 12 / 5, paper), 3);
        assert_eq!(pages_needed(w, one_page * 2, paper), 2);
        assert_eq!(pages_needed(0, 10, paper), 1);
    }

    #[test]
    fn assembles_a_multi_page_pdf() {
        let mut seen = Vec::new();
        let out = assemble_pdf("t", &png_data_url(50, 200), 50, 200, PaperSize::Letter, |i, n| {
            seen.push((i, n))
        })
        .unwrap();
        assert_eq!(out.page_count, 4);
        assert_eq!(seen.len(), 4);
        assert!(out.data_url.starts_with("data:application/pdf;base64,"));
        let pdf = BASE64_STD
            .decode(out.data_url.trim_start_matches("data:application/pdf;base64,"))
            .unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
    }

    #[test]
    fn rejects_non_data_urls() {
        let err = assemble_pdf("t", "https://x/y.png", 10, 10, PaperSize::A4, |_, _| {})
            .unwrap_err();
        assert!(matches!(err, PipelineError::Assembly(_)));
    }
}
