//! Integration tests for pagepress.
//!
//! These tests validate:
//! - Scoped CSS and the print document contract
//! - Pagination: available height, manual breaks, idempotence, empty input
//! - The three-stage PDF pipeline: page counts, cancellation, caching
//! - Worker message shapes
//! - Orchestrator debounce and single-flight behaviour

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pagepress::cache::{MemoryCache, PdfCache};
use pagepress::cancel::CancelToken;
use pagepress::dom::{parse_html, DomNode, Tag};
use pagepress::markdown::markdown_to_html;
use pagepress::measure::{ReadinessPolicy, TaffyMeasurer};
use pagepress::orchestrator::{GenerationOrchestrator, OrchestratorConfig, OrchestratorEvent};
use pagepress::pagination::{PageMetrics, Pager, PRINT_BUFFER_PX};
use pagepress::pipeline::{PdfPipeline, PdfRequest, PipelineConfig};
use pagepress::raster::{FrameHost, Raster, Rasterizer, Viewport};
use pagepress::scope::{render_print_document_for_pages, ScopedStyleContext, StyleRegistry};
use pagepress::style_config::{PaperSize, StyleConfig};
use pagepress::templates;
use pagepress::worker::{PdfWorker, WorkerRequest, WorkerResponse};
use pagepress::PipelineError;

// =====================================================================
// Helpers
// =====================================================================

fn pager() -> Pager {
    Pager::new(TaffyMeasurer::default(), StyleRegistry::new())
        .with_readiness(ReadinessPolicy::immediate())
}

fn context(css: &str) -> ScopedStyleContext {
    ScopedStyleContext::create(&StyleConfig::default(), css)
}

fn white_png(width: u32, height: u32) -> Raster {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    Raster { png, width, height }
}

/// Returns a fixed-size raster and counts captures.
struct FixedRasterizer {
    width: u32,
    height: u32,
    calls: Arc<AtomicUsize>,
    load_delay: Duration,
    delay: Duration,
}

impl FixedRasterizer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Arc::new(AtomicUsize::new(0)),
            load_delay: Duration::ZERO,
            delay: Duration::ZERO,
        }
    }
}

impl Rasterizer for FixedRasterizer {
    fn load(&self, _html: &str, _viewport: &Viewport) -> Result<(), String> {
        thread::sleep(self.load_delay);
        Ok(())
    }

    fn capture(&self, _html: &str, _viewport: &Viewport) -> Result<Raster, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(white_png(self.width, self.height))
    }
}

/// Cancels the job as soon as stage B starts, then takes its time.
struct CancellingRasterizer {
    cancel: CancelToken,
}

impl Rasterizer for CancellingRasterizer {
    fn capture(&self, _html: &str, _viewport: &Viewport) -> Result<Raster, String> {
        self.cancel.cancel();
        thread::sleep(Duration::from_millis(300));
        Ok(white_png(10, 10))
    }
}

/// Loads fine but cannot paint.
struct BrokenCapture;

impl Rasterizer for BrokenCapture {
    fn capture(&self, _html: &str, _viewport: &Viewport) -> Result<Raster, String> {
        Err("out of video memory".into())
    }
}

fn pipeline_with(rasterizer: Arc<dyn Rasterizer>) -> PdfPipeline {
    PdfPipeline::new(
        Arc::new(PdfWorker::spawn()),
        rasterizer,
        FrameHost::new(),
        PipelineConfig::default(),
    )
}

fn request(markdown: &str) -> PdfRequest {
    PdfRequest::new(markdown, "", StyleConfig::default())
}

/// Tick until a terminal event arrives or the deadline passes.
fn run_until_done(o: &mut GenerationOrchestrator, clock: Instant) -> Vec<OrchestratorEvent> {
    let mut all = Vec::new();
    let give_up = Instant::now() + Duration::from_secs(20);
    while Instant::now() < give_up {
        let events = o.tick(clock);
        let done = events.iter().any(|e| {
            matches!(
                e,
                OrchestratorEvent::Completed { .. } | OrchestratorEvent::Failed { .. }
            )
        });
        all.extend(events);
        if done {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    all
}

// =====================================================================
// DOM parsing tests
// =====================================================================

#[test]
fn parse_heading_elements() {
    for (name, tag) in [("h1", Tag::H1), ("h2", Tag::H2), ("h3", Tag::H3)] {
        let html = format!("<{0}>Title</{0}>", name);
        let dom = parse_html(&html);
        assert_eq!(dom.len(), 1);
        match &dom[0] {
            DomNode::Element(e) => assert_eq!(e.tag, tag),
            DomNode::Text(_) => panic!("Expected element for <{name}>"),
        }
    }
}

#[test]
fn markdown_output_keeps_outer_markup_spans() {
    let html = markdown_to_html("# Jane\n\nHello *there*\n");
    let dom = parse_html(&html);
    let blocks: Vec<&DomNode> = dom.iter().filter(|n| !n.is_whitespace()).collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(&html[blocks[1].span()], "<p>Hello <em>there</em></p>");
}

// =====================================================================
// Scoped CSS
// =====================================================================

#[test]
fn user_css_is_namespaced_to_the_scope() {
    let ctx = context("h1 { color: red } @media print { p { margin: 0 } }");
    assert!(ctx.scope_class.starts_with("pp-scope-"));
    assert!(ctx.scoped_css.contains(&format!(".{} h1", ctx.scope_class)));
    assert!(ctx.scoped_css.contains("@media print"));
    assert!(ctx.scoped_css.contains("--paper-width"));
}

#[test]
fn scopes_are_unique_and_registry_tracks_them() {
    let a = context("");
    let b = context("");
    assert_ne!(a.scope_class, b.scope_class);

    let registry = StyleRegistry::new();
    registry.inject(&a);
    registry.inject(&b);
    assert_eq!(registry.len(), 2);
    registry.dispose(&a);
    assert!(!registry.is_applied(&a.scope_class));
    assert!(registry.is_applied(&b.scope_class));
}

// =====================================================================
// Pagination
// =====================================================================

#[test]
fn available_height_matches_paper_minus_margins_and_buffer() {
    for paper in [PaperSize::A4, PaperSize::Letter, PaperSize::Legal] {
        let styles = StyleConfig {
            paper_size: paper,
            margin_v: 36.0,
            ..StyleConfig::default()
        };
        let m = PageMetrics::from_styles(&styles);
        let expected = paper.height_px() - 72.0 - PRINT_BUFFER_PX;
        assert!((m.available_height - expected).abs() < 0.01);
    }
}

#[test]
fn break_marker_splits_short_content() {
    let pages = pager().paginate("<p>A</p><break/><p>B</p>", &context(""));
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].content, "<p>A</p>");
    assert_eq!(pages[1].content, "<p>B</p>");
    assert_eq!(pages[1].page_number, 2);
}

#[test]
fn short_content_stays_on_one_page() {
    let html = "<h1>Name</h1>\n<p>Summary</p>\n";
    let pages = pager().paginate(html, &context(""));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].content, html);
    assert!(pages[0].content_height > 0.0);
}

#[test]
fn long_content_fills_pages_in_order() {
    let html: String = (0..150).map(|i| format!("<p>Line {i}</p>\n")).collect();
    let pages = pager().paginate(&html, &context(""));
    assert!(pages.len() > 1, "expected several pages, got {}", pages.len());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_number, i + 1);
        assert!(page.content_height <= page.available_height);
    }
    let joined: String = pages.iter().map(|p| p.content.as_str()).collect();
    assert!(joined.starts_with("<p>Line 0</p><p>Line 1</p>"));
    assert!(joined.ends_with("<p>Line 149</p>"));
}

#[test]
fn pagination_is_idempotent() {
    let html = markdown_to_html(templates::two_page_resume());
    let ctx = context(templates::modern_css());
    let p = pager();
    assert_eq!(p.paginate(&html, &ctx), p.paginate(&html, &ctx));
}

#[test]
fn empty_markdown_is_one_empty_page() {
    let html = markdown_to_html("");
    let pages = pager().paginate(&html, &context(""));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].content_height, 0.0);
}

#[test]
fn injected_sheet_drives_measurement() {
    let ctx = context("p { height: 700px; margin: 0 }");
    let registry = StyleRegistry::new();
    registry.inject(&ctx);
    let pager = Pager::new(TaffyMeasurer::default(), registry)
        .with_readiness(ReadinessPolicy::immediate());
    let pages = pager.paginate("<p>a</p><p>b</p>", &ctx);
    assert_eq!(pages.len(), 2);
}

#[test]
fn print_document_has_one_container_per_page() {
    let ctx = context("");
    let pages = pager().paginate("<p>A</p><break/><p>B</p>", &ctx);
    let doc = render_print_document_for_pages(&ctx, &pages);
    assert_eq!(doc.matches("<div class=\"page\"").count(), 2);
    assert!(doc.contains("break-after: page"));
    assert!(doc.contains("@page { size: A4; margin: 0; }"));
}

// =====================================================================
// PDF pipeline
// =====================================================================

#[test]
fn empty_markdown_yields_a_one_page_pdf() {
    let pipeline = PdfPipeline::with_defaults();
    let artifact = pipeline
        .generate(&request(""), &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert_eq!(artifact.page_count, 1);
    assert_eq!(&artifact.pdf_bytes().unwrap()[0..5], b"%PDF-");
}

#[test]
fn manual_break_yields_two_pdf_pages() {
    let pipeline = PdfPipeline::with_defaults();
    let artifact = pipeline
        .generate(&request("First\n\n<break/>\n\nSecond\n"), &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert_eq!(artifact.page_count, 2);
}

#[test]
fn tall_raster_is_sliced_into_pages() {
    let paper = PaperSize::A4;
    let width = 100;
    let height = (2.4 * width as f32 * paper.height_pt() / paper.width_pt()).round() as u32;
    let pipeline = pipeline_with(Arc::new(FixedRasterizer::new(width, height)));
    let artifact = pipeline
        .generate(&request("# Tall"), &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert_eq!(artifact.page_count, 3);
}

#[test]
fn cancelling_during_capture_stops_the_job_and_removes_the_frame() {
    let cancel = CancelToken::new();
    let pipeline = pipeline_with(Arc::new(CancellingRasterizer {
        cancel: cancel.clone(),
    }));
    let mut last_percent = 0;
    let result = pipeline.generate(&request("# Jane"), &cancel, &mut |p| last_percent = p.percent);
    assert_eq!(result, Err(PipelineError::Cancelled));
    assert!(last_percent < 60, "no stage C progress expected");
    assert_eq!(pipeline.frames().live_frames(), 0);
}

#[test]
fn missing_load_event_still_captures_after_the_timeout() {
    let mut slow = FixedRasterizer::new(10, 10);
    slow.load_delay = Duration::from_millis(2000);
    let calls = Arc::clone(&slow.calls);
    let pipeline = PdfPipeline::new(
        Arc::new(PdfWorker::spawn()),
        Arc::new(slow),
        FrameHost::new(),
        PipelineConfig {
            load_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        },
    );
    let started = Instant::now();
    let artifact = pipeline
        .generate(&request("x"), &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(artifact.page_count, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.frames().live_frames(), 0);
}

#[test]
fn failing_capture_is_a_raster_error() {
    let pipeline = pipeline_with(Arc::new(BrokenCapture));
    let err = pipeline
        .generate(&request("x"), &CancelToken::new(), &mut |_| {})
        .unwrap_err();
    assert_eq!(err, PipelineError::Raster("out of video memory".into()));
    assert_eq!(pipeline.frames().live_frames(), 0);
}

#[test]
fn multibyte_text_after_ampersand_exports() {
    let pipeline = PdfPipeline::with_defaults();
    let artifact = pipeline
        .generate(
            &request("<p>Q&äääääää</p>\n\nR&D — Zürich"),
            &CancelToken::new(),
            &mut |_| {},
        )
        .unwrap();
    assert_eq!(artifact.page_count, 1);
}

#[test]
fn cache_hit_skips_rendering() {
    let rasterizer = FixedRasterizer::new(50, 60);
    let calls = Arc::clone(&rasterizer.calls);
    let pipeline = pipeline_with(Arc::new(rasterizer));
    let cache = MemoryCache::new();
    let req = PdfRequest::new("# Jane", "h1 { color: navy }", StyleConfig::default());

    let first = pipeline
        .generate_cached(&req, Some(&cache), &CancelToken::new(), &mut |_| {})
        .unwrap();
    let second = pipeline
        .generate_cached(&req, Some(&cache), &CancelToken::new(), &mut |_| {})
        .unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.artifact.pdf_base64, second.artifact.pdf_base64);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get(&req.cache_key()).is_some());
}

#[test]
fn template_resume_renders() {
    let pipeline = PdfPipeline::with_defaults();
    let req = PdfRequest::new(
        templates::classic_resume(),
        templates::modern_css(),
        StyleConfig::letter(),
    );
    let artifact = pipeline
        .generate(&req, &CancelToken::new(), &mut |_| {})
        .unwrap();
    assert!(artifact.page_count >= 1);
    assert!(artifact.data_url().starts_with("data:application/pdf;base64,"));
}

// =====================================================================
// Worker protocol
// =====================================================================

#[test]
fn worker_messages_have_the_documented_shape() {
    let req = WorkerRequest::CreatePdf {
        request_id: "req-7".into(),
        raster_data_url: "data:image/png;base64,AAAA".into(),
        raster_width: 10,
        raster_height: 20,
        paper_size: PaperSize::Letter,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["type"], "create-pdf");
    assert_eq!(json["requestId"], "req-7");
    assert_eq!(json["rasterWidth"], 10);
    assert_eq!(json["paperSize"], "letter");

    let resp: WorkerResponse = serde_json::from_str(
        r#"{"type":"success","requestId":"req-7","pdfDataUrl":"data:application/pdf;base64,","pageCount":2}"#,
    )
    .unwrap();
    assert_eq!(resp.request_id(), "req-7");
    assert!(resp.is_terminal());

    let progress: WorkerResponse =
        serde_json::from_str(r#"{"type":"progress","requestId":"r","stage":"assemble","progress":50}"#)
            .unwrap();
    assert!(!progress.is_terminal());
}

// =====================================================================
// Orchestrator
// =====================================================================

#[test]
fn orchestrator_debounces_then_serves_from_cache() {
    let rasterizer = FixedRasterizer::new(40, 40);
    let calls = Arc::clone(&rasterizer.calls);
    let cache: Arc<dyn PdfCache> = Arc::new(MemoryCache::new());
    let mut o = GenerationOrchestrator::new(
        pipeline_with(Arc::new(rasterizer)),
        Some(cache),
        OrchestratorConfig {
            idle_delay: Duration::from_millis(100),
        },
    );

    let t0 = Instant::now();
    o.content_changed(request("# Jane"), t0);
    assert!(o.tick(t0 + Duration::from_millis(50)).is_empty());

    let events = run_until_done(&mut o, t0 + Duration::from_millis(150));
    assert!(matches!(events[0], OrchestratorEvent::Started { generation: 1 }));
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::Completed { from_cache: false, .. }
    )));

    let t1 = t0 + Duration::from_secs(1);
    o.content_changed(request("# Jane"), t1);
    let events = run_until_done(&mut o, t1 + Duration::from_millis(150));
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::Completed { from_cache: true, .. }
    )));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn newest_generation_wins() {
    let mut rasterizer = FixedRasterizer::new(40, 40);
    rasterizer.delay = Duration::from_millis(200);
    let mut o = GenerationOrchestrator::new(
        pipeline_with(Arc::new(rasterizer)),
        None,
        OrchestratorConfig::default(),
    );
    let now = Instant::now();
    o.content_changed(request("# One"), now);
    let first = o.generate_now();
    o.content_changed(request("# Two"), now);
    let second = o.generate_now();
    assert!(matches!(first[..], [OrchestratorEvent::Started { generation: 1 }]));
    assert!(matches!(second[..], [OrchestratorEvent::Started { generation: 2 }]));

    let events = run_until_done(&mut o, now);
    let completed: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::Completed { generation, .. } => Some(*generation),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![2]);
    assert!(!events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::Failed { .. })));
}

#[test]
fn hiding_the_preview_aborts_the_running_job() {
    let mut rasterizer = FixedRasterizer::new(40, 40);
    rasterizer.delay = Duration::from_millis(300);
    let mut o = GenerationOrchestrator::new(
        pipeline_with(Arc::new(rasterizer)),
        None,
        OrchestratorConfig::default(),
    );
    let now = Instant::now();
    o.content_changed(request("# Jane"), now);
    let started = o.generate_now();
    assert!(matches!(started[..], [OrchestratorEvent::Started { generation: 1 }]));

    o.set_visible(false);
    assert!(!o.is_running());
    assert!(o.should_generate());

    // Long enough for the aborted job to have finished had it kept going.
    thread::sleep(Duration::from_millis(700));
    let events = o.tick(now);
    assert!(!events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::Completed { .. } | OrchestratorEvent::Failed { .. }
    )));
    assert!(!o.is_running());
    assert!(o.should_generate());

    o.set_visible(true);
    let events = run_until_done(&mut o, now);
    assert!(matches!(events[0], OrchestratorEvent::Started { generation: 2 }));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::Completed { generation: 2, .. })));
}
