//! Raster capture (stage B) – renders a print document into one tall PNG.
//!
//! [`Rasterizer`] is the seam to whatever engine paints HTML. It has two
//! steps: `load` returns when the frame's document and resources are ready
//! (the load event), and `capture` paints it. The built-in
//! [`BoxRasterizer`] reuses the style and layout engine: it lays the document
//! out at paper width, pushes `break-before/after: page` content to the next
//! page boundary, and paints boxes, borders, list markers, data-URI images
//! and text onto an RGBA canvas.
//!
//! [`FrameHost`] tracks the offscreen frames that exist while a capture is in
//! flight; each frame is removed when its guard drops.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use log::{debug, warn};
use ttf_parser::OutlineBuilder;

use crate::css::{Media, Stylesheet};
use crate::dom::{self, body_children, collect_style_text};
use crate::fonts::{FontKey, FontManager};
use crate::layout::{self, decode_data_uri, BoxContent, PositionedBox, TextLine, TextRun};
use crate::style::{Border, Color, StyleResolver, TextAlign, TextDecoration};

/// Canvases larger than this many pixels are refused.
const MAX_CANVAS_PIXELS: u64 = 200_000_000;

/// Size of the offscreen frame in CSS px, and the device pixel ratio used for
/// the capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width_px: u32,
    pub height_px: u32,
    pub scale: f32,
}

/// A captured PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Raster {
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", BASE64_STD.encode(&self.png))
    }
}

/// Paints a full HTML document into a raster.
pub trait Rasterizer: Send + Sync {
    /// Load `html` into a frame of the viewport's size. Returning is the
    /// load event; an error is reported but does not stop the capture.
    fn load(&self, html: &str, viewport: &Viewport) -> Result<(), String> {
        let _ = (html, viewport);
        Ok(())
    }

    /// Paint `html` at the viewport's width. The result is at least one
    /// viewport tall and grows to fit the content.
    fn capture(&self, html: &str, viewport: &Viewport) -> Result<Raster, String>;
}

// ---------------------------------------------------------------------------
// Offscreen frames
// ---------------------------------------------------------------------------

/// Registry of live offscreen frames.
#[derive(Clone, Default)]
pub struct FrameHost {
    frames: Arc<Mutex<HashMap<u64, Viewport>>>,
    next_id: Arc<AtomicU64>,
}

impl FrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new frame. It stays attached until the guard is dropped.
    pub fn create(&self, viewport: Viewport) -> OffscreenFrame {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, viewport);
        debug!(
            "frame {id} attached ({}x{} css px)",
            viewport.width_px, viewport.height_px
        );
        OffscreenFrame {
            id,
            viewport,
            host: self.clone(),
        }
    }

    pub fn live_frames(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Guard for one attached frame.
pub struct OffscreenFrame {
    id: u64,
    viewport: Viewport,
    host: FrameHost,
}

impl OffscreenFrame {
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl Drop for OffscreenFrame {
    fn drop(&mut self) {
        self.host
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        debug!("frame {} removed", self.id);
    }
}

// ---------------------------------------------------------------------------
// Built-in rasterizer
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct BoxRasterizer {
    fonts: FontManager,
}

impl BoxRasterizer {
    pub fn new(fonts: FontManager) -> Self {
        Self { fonts }
    }
}

impl Rasterizer for BoxRasterizer {
    /// Decode every data-URI image up front; broken ones are logged and
    /// later painted as nothing.
    fn load(&self, html: &str, viewport: &Viewport) -> Result<(), String> {
        if viewport.width_px == 0 || viewport.height_px == 0 {
            return Err("viewport has no area".into());
        }
        let nodes = dom::parse_html(html);
        let mut sources = Vec::new();
        collect_image_sources(&nodes, &mut sources);
        let broken = sources
            .iter()
            .filter(|src| {
                decode_data_uri(src)
                    .and_then(|bytes| image::guess_format(&bytes).ok())
                    .is_none()
            })
            .count();
        if broken > 0 {
            warn!("{broken} of {} image(s) could not be loaded", sources.len());
        }
        debug!("frame loaded ({} image(s))", sources.len());
        Ok(())
    }

    fn capture(&self, html: &str, viewport: &Viewport) -> Result<Raster, String> {
        if viewport.width_px == 0 || viewport.height_px == 0 {
            return Err("viewport has no area".into());
        }
        let scale = if viewport.scale.is_finite() && viewport.scale > 0.0 {
            viewport.scale
        } else {
            1.0
        };
        let page_w = viewport.width_px as f32;
        let page_h = viewport.height_px as f32;

        let nodes = dom::parse_html(html);
        let sheet = Stylesheet::parse(&collect_style_text(&nodes), Media::Print);
        let body = body_children(&nodes);
        let styled = StyleResolver::new(&sheet).build_styled_tree(&body, None);
        let mut root = layout::compute_layout(&styled, page_w, &self.fonts)
            .map_err(|e| e.to_string())?;

        let mut shift = 0.0;
        for child in &mut root.children {
            apply_page_breaks(child, page_h, &mut shift);
        }
        let content_h = root.height + shift;
        let doc_h = content_h.max(page_h);

        let width = (page_w * scale).ceil() as u32;
        let height = (doc_h * scale).ceil() as u32;
        if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
            return Err(format!("canvas {width}x{height} is too large"));
        }

        let mut canvas = Canvas::new(width, height, scale);
        for child in &root.children {
            paint_box(&mut canvas, child, &self.fonts);
        }

        let mut png = Vec::new();
        canvas
            .image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| format!("PNG encode: {e}"))?;
        debug!(
            "rasterised {:.0}px of content into {width}x{height} ({} bytes)",
            content_h,
            png.len()
        );
        Ok(Raster { png, width, height })
    }
}

fn collect_image_sources(nodes: &[dom::DomNode], out: &mut Vec<String>) {
    for node in nodes {
        if let dom::DomNode::Element(e) = node {
            if e.tag == dom::Tag::Img {
                out.extend(e.src().map(str::to_string));
            }
            collect_image_sources(&e.children, out);
        }
    }
}

/// Push boxes down so forced breaks start on a fresh page.
///
/// `shift` is the space inserted so far, in document order; containers grow
/// by whatever their descendants inserted.
fn apply_page_breaks(b: &mut PositionedBox, page_h: f32, shift: &mut f32) {
    b.y += *shift;
    if b.page_break_before {
        let top = b.y - b.style.margin_top;
        let gap = gap_to_boundary(top, page_h);
        if gap > 0.0 {
            b.y += gap;
            *shift += gap;
        }
    }
    let start = *shift;
    for child in &mut b.children {
        apply_page_breaks(child, page_h, shift);
    }
    b.height += *shift - start;

    if b.page_break_after {
        let bottom = b.y + b.height + b.style.margin_bottom;
        let gap = gap_to_boundary(bottom, page_h);
        if gap > 0.0 {
            *shift += gap;
        }
    }
}

/// Distance from `y` to the next page boundary; zero on a boundary.
fn gap_to_boundary(y: f32, page_h: f32) -> f32 {
    if y <= 0.0 {
        return 0.0;
    }
    let pages = y / page_h;
    let rem = pages - pages.floor();
    if rem < 1e-4 || rem > 1.0 - 1e-4 {
        0.0
    } else {
        (pages.ceil() * page_h) - y
    }
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

struct Canvas {
    image: RgbaImage,
    scale: f32,
}

impl Canvas {
    fn new(width: u32, height: u32, scale: f32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            scale,
        }
    }

    /// Fill a rectangle given in CSS px.
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        if color.is_transparent() || w <= 0.0 || h <= 0.0 {
            return;
        }
        let s = self.scale;
        let x0 = (x * s).round().max(0.0) as u32;
        let y0 = (y * s).round().max(0.0) as u32;
        let x1 = (((x + w) * s).round().max(0.0) as u32).min(self.image.width());
        let y1 = (((y + h) * s).round().max(0.0) as u32).min(self.image.height());
        // Hairlines stay visible.
        let x1 = if x1 == x0 && x0 < self.image.width() { x0 + 1 } else { x1 };
        let y1 = if y1 == y0 && y0 < self.image.height() { y0 + 1 } else { y1 };
        let rgba = color.to_rgba8();
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, rgba);
            }
        }
    }

    /// Blend one device pixel.
    fn blend(&mut self, px: u32, py: u32, src: [u8; 4]) {
        if px >= self.image.width() || py >= self.image.height() {
            return;
        }
        let a = src[3] as f32 / 255.0;
        let dst = self.image.get_pixel_mut(px, py);
        for i in 0..3 {
            dst.0[i] = (src[i] as f32 * a + dst.0[i] as f32 * (1.0 - a)).round() as u8;
        }
        dst.0[3] = 255;
    }
}

fn paint_box(canvas: &mut Canvas, b: &PositionedBox, fonts: &FontManager) {
    let s = &b.style;
    canvas.fill_rect(b.x, b.y, b.width, b.height, s.background_color);
    paint_borders(canvas, b);

    if let Some(marker) = &b.marker {
        paint_marker(canvas, b, marker, fonts);
    }

    match &b.content {
        BoxContent::Text {
            lines, line_height, ..
        } => paint_text(canvas, b, lines, *line_height, fonts),
        BoxContent::Image { src } => paint_image(canvas, b, src),
        BoxContent::None => {}
    }

    for child in &b.children {
        paint_box(canvas, child, fonts);
    }
}

fn paint_borders(canvas: &mut Canvas, b: &PositionedBox) {
    let s = &b.style;
    let side = |border: &Border| border.width > 0.0 && !border.color.is_transparent();
    if side(&s.border_top) {
        canvas.fill_rect(b.x, b.y, b.width, s.border_top.width, s.border_top.color);
    }
    if side(&s.border_bottom) {
        let w = s.border_bottom.width;
        canvas.fill_rect(b.x, b.y + b.height - w, b.width, w, s.border_bottom.color);
    }
    if side(&s.border_left) {
        canvas.fill_rect(b.x, b.y, s.border_left.width, b.height, s.border_left.color);
    }
    if side(&s.border_right) {
        let w = s.border_right.width;
        canvas.fill_rect(b.x + b.width - w, b.y, w, b.height, s.border_right.color);
    }
}

fn paint_marker(canvas: &mut Canvas, b: &PositionedBox, marker: &str, fonts: &FontManager) {
    let s = &b.style;
    let run = TextRun {
        text: marker.to_string(),
        family: s.font_family.clone(),
        font_size: s.font_size,
        bold: false,
        italic: false,
        color: s.color,
        decoration: TextDecoration::None,
        width: fonts.measure_text_width(marker, s.font_size, false, false, &s.font_family),
    };
    let line_h = fonts.line_height_px(s.font_size, s.line_height);
    let x = b.x - run.width - s.font_size * 0.5;
    let top = b.y + s.padding_top + s.border_top.width;
    let baseline = baseline_for(top, line_h, &run, fonts);
    paint_run(canvas, &run, x, baseline, fonts);
}

fn paint_text(
    canvas: &mut Canvas,
    b: &PositionedBox,
    lines: &[TextLine],
    line_height: f32,
    fonts: &FontManager,
) {
    let s = &b.style;
    let content_x = b.x + s.padding_left + s.border_left.width;
    let content_w =
        b.width - s.padding_left - s.padding_right - s.border_left.width - s.border_right.width;
    let mut top = b.y + s.padding_top + s.border_top.width;

    for line in lines {
        let slack = (content_w - line.width).max(0.0);
        let mut x = match s.text_align {
            TextAlign::Left => content_x,
            TextAlign::Center => content_x + slack / 2.0,
            TextAlign::Right => content_x + slack,
        };
        let tallest = line
            .runs
            .iter()
            .max_by(|a, c| a.font_size.total_cmp(&c.font_size));
        if let Some(reference) = tallest {
            let baseline = baseline_for(top, line_height, reference, fonts);
            for run in &line.runs {
                paint_run(canvas, run, x, baseline, fonts);
                x += run.width;
            }
        }
        top += line_height;
    }
}

/// Baseline of a line box whose top is `top`, centring the font's em box.
fn baseline_for(top: f32, line_height: f32, run: &TextRun, fonts: &FontManager) -> f32 {
    let half_leading = (line_height - run.font_size) / 2.0;
    top + half_leading + fonts.ascender_px(run.font_size, run.bold, run.italic, &run.family)
}

fn paint_run(canvas: &mut Canvas, run: &TextRun, x: f32, baseline: f32, fonts: &FontManager) {
    let key = FontKey::new(&run.family, run.bold, run.italic);
    let drawn = fonts
        .font_bytes(&key)
        .and_then(|bytes| ttf_parser::Face::parse(bytes, 0).ok())
        .map(|face| draw_glyphs(canvas, &face, run, x, baseline))
        .is_some();
    if !drawn {
        draw_word_blocks(canvas, run, x, baseline, fonts);
    }

    let thickness = (run.font_size / 14.0).max(1.0);
    match run.decoration {
        TextDecoration::Underline => {
            canvas.fill_rect(x, baseline + thickness, run.width, thickness, run.color)
        }
        TextDecoration::LineThrough => canvas.fill_rect(
            x,
            baseline - run.font_size * 0.3,
            run.width,
            thickness,
            run.color,
        ),
        TextDecoration::None => {}
    }
}

/// Fill each glyph outline of `run` starting at `(x, baseline)`.
fn draw_glyphs(canvas: &mut Canvas, face: &ttf_parser::Face<'_>, run: &TextRun, x: f32, baseline: f32) {
    let units = face.units_per_em() as f32;
    let em_scale = run.font_size / units;
    let mut pen = x;
    for ch in run.text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            pen += run.font_size * 0.5;
            continue;
        };
        let mut path = PathFlattener::new(pen, baseline, em_scale, canvas.scale);
        if face.outline_glyph(gid, &mut path).is_some() {
            fill_path(canvas, &path.edges, run.color.to_rgba8());
        }
        pen += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * em_scale;
    }
}

/// Placeholder glyphs: one x-height block per word.
fn draw_word_blocks(canvas: &mut Canvas, run: &TextRun, x: f32, baseline: f32, fonts: &FontManager) {
    let x_height = run.font_size * 0.5;
    let mut pen = x;
    for (i, word) in run.text.split(' ').enumerate() {
        if i > 0 {
            pen += fonts.measure_text_width(" ", run.font_size, run.bold, run.italic, &run.family);
        }
        if word.is_empty() {
            continue;
        }
        let w = fonts.measure_text_width(word, run.font_size, run.bold, run.italic, &run.family);
        canvas.fill_rect(pen, baseline - x_height, w, x_height, run.color);
        pen += w;
    }
}

fn paint_image(canvas: &mut Canvas, b: &PositionedBox, src: &str) {
    let Some(bytes) = decode_data_uri(src) else {
        warn!("skipping image that is not a data URI");
        return;
    };
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!("skipping image: {e}");
            return;
        }
    };
    let s = canvas.scale;
    let w = (b.width * s).round().max(1.0) as u32;
    let h = (b.height * s).round().max(1.0) as u32;
    let resized = imageops::resize(&decoded, w, h, imageops::FilterType::Triangle);
    imageops::overlay(
        &mut canvas.image,
        &resized,
        (b.x * s).round() as i64,
        (b.y * s).round() as i64,
    );
}

// ---------------------------------------------------------------------------
// Glyph outlines
// ---------------------------------------------------------------------------

/// Flattens a glyph outline into line segments in device pixels.
struct PathFlattener {
    origin_x: f32,
    baseline: f32,
    em_scale: f32,
    device_scale: f32,
    start: (f32, f32),
    current: (f32, f32),
    edges: Vec<[f32; 4]>,
}

impl PathFlattener {
    const CURVE_STEPS: usize = 8;

    fn new(origin_x: f32, baseline: f32, em_scale: f32, device_scale: f32) -> Self {
        Self {
            origin_x,
            baseline,
            em_scale,
            device_scale,
            start: (0.0, 0.0),
            current: (0.0, 0.0),
            edges: Vec::new(),
        }
    }

    /// Font units (y up) to device pixels (y down).
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (self.origin_x + x * self.em_scale) * self.device_scale,
            (self.baseline - y * self.em_scale) * self.device_scale,
        )
    }

    fn push_to(&mut self, p: (f32, f32)) {
        self.edges.push([self.current.0, self.current.1, p.0, p.1]);
        self.current = p;
    }
}

impl OutlineBuilder for PathFlattener {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.start = p;
        self.current = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.push_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.current;
        let c = self.map(x1, y1);
        let p = self.map(x, y);
        for i in 1..=Self::CURVE_STEPS {
            let t = i as f32 / Self::CURVE_STEPS as f32;
            let mt = 1.0 - t;
            self.push_to((
                mt * mt * p0.0 + 2.0 * mt * t * c.0 + t * t * p.0,
                mt * mt * p0.1 + 2.0 * mt * t * c.1 + t * t * p.1,
            ));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.current;
        let c1 = self.map(x1, y1);
        let c2 = self.map(x2, y2);
        let p = self.map(x, y);
        for i in 1..=Self::CURVE_STEPS {
            let t = i as f32 / Self::CURVE_STEPS as f32;
            let mt = 1.0 - t;
            let (a, b, c, d) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
            self.push_to((
                a * p0.0 + b * c1.0 + c * c2.0 + d * p.0,
                a * p0.1 + b * c1.1 + c * c2.1 + d * p.1,
            ));
        }
    }

    fn close(&mut self) {
        if self.current != self.start {
            let start = self.start;
            self.push_to(start);
        }
    }
}

/// Non-zero winding scanline fill, sampled at pixel centres.
fn fill_path(canvas: &mut Canvas, edges: &[[f32; 4]], color: [u8; 4]) {
    if edges.is_empty() {
        return;
    }
    let (min_y, max_y) = edges.iter().fold((f32::MAX, f32::MIN), |(lo, hi), e| {
        (lo.min(e[1]).min(e[3]), hi.max(e[1]).max(e[3]))
    });
    let y_start = min_y.floor().max(0.0) as u32;
    let y_end = (max_y.ceil().max(0.0) as u32).min(canvas.image.height());

    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for py in y_start..y_end {
        let yc = py as f32 + 0.5;
        crossings.clear();
        for &[x0, y0, x1, y1] in edges {
            let (lo, hi, dir) = if y0 < y1 { (y0, y1, 1) } else { (y1, y0, -1) };
            if yc < lo || yc >= hi {
                continue;
            }
            let t = (yc - y0) / (y1 - y0);
            crossings.push((x0 + t * (x1 - x0), dir));
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            if winding == 0 {
                continue;
            }
            let from = (pair[0].0 - 0.5).ceil().max(0.0) as u32;
            let to = (pair[1].0 - 0.5).ceil().max(0.0) as u32;
            for px in from..to {
                canvas.blend(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width_px: 200,
            height_px: 100,
            scale: 1.0,
        }
    }

    fn render(html: &str) -> RgbaImage {
        let raster = BoxRasterizer::default().capture(html, &viewport()).unwrap();
        image::load_from_memory(&raster.png).unwrap().to_rgba8()
    }

    #[test]
    fn load_tolerates_broken_images() {
        let r = BoxRasterizer::default();
        let html = r#"<img src="data:image/png;base64,AAAA"><img src="https://x/y.png">"#;
        assert!(r.load(html, &viewport()).is_ok());
        let flat = Viewport { height_px: 0, ..viewport() };
        assert!(r.load("", &flat).is_err());
    }

    #[test]
    fn frames_are_removed_when_dropped() {
        let host = FrameHost::new();
        let frame = host.create(viewport());
        assert_eq!(host.live_frames(), 1);
        assert_eq!(frame.viewport().width_px, 200);
        drop(frame);
        assert_eq!(host.live_frames(), 0);
    }

    #[test]
    fn empty_document_is_one_page_tall() {
        let raster = BoxRasterizer::default().capture("", &viewport()).unwrap();
        assert_eq!((raster.width, raster.height), (200, 100));
        assert!(raster.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn scale_multiplies_device_pixels() {
        let vp = Viewport { scale: 2.0, ..viewport() };
        let raster = BoxRasterizer::default().capture("", &vp).unwrap();
        assert_eq!((raster.width, raster.height), (400, 200));
    }

    #[test]
    fn backgrounds_are_painted() {
        let img = render(r#"<div style="background-color: #ff0000; height: 20px"></div>"#);
        assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 50).0, [255, 255, 255, 255]);
    }

    #[test]
    fn break_after_moves_content_to_the_next_page() {
        let html = r#"<div style="height: 10px; break-after: page"></div><div style="background-color: #0000ff; height: 10px"></div>"#;
        let img = render(html);
        assert_eq!(img.height(), 110);
        assert_eq!(img.get_pixel(5, 105).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(5, 15).0, [255, 255, 255, 255]);
    }

    #[test]
    fn tall_content_grows_the_canvas() {
        let img = render(r#"<div style="height: 250px"></div>"#);
        assert_eq!(img.height(), 250);
    }

    #[test]
    fn boundary_gap() {
        assert_eq!(gap_to_boundary(0.0, 100.0), 0.0);
        assert_eq!(gap_to_boundary(100.0, 100.0), 0.0);
        assert!((gap_to_boundary(130.0, 100.0) - 70.0).abs() < 1e-3);
    }

    #[test]
    fn filled_square_path() {
        let mut canvas = Canvas::new(10, 10, 1.0);
        let edges = [
            [2.0, 2.0, 8.0, 2.0],
            [8.0, 2.0, 8.0, 8.0],
            [8.0, 8.0, 2.0, 8.0],
            [2.0, 8.0, 2.0, 2.0],
        ];
        fill_path(&mut canvas, &edges, [0, 0, 0, 255]);
        assert_eq!(canvas.image.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(canvas.image.get_pixel(1, 5).0, [255, 255, 255, 255]);
        assert_eq!(canvas.image.get_pixel(8, 5).0, [255, 255, 255, 255]);
    }
}
