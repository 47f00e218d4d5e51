//! Pipeline – ties together Markdown conversion, raster capture and PDF
//! assembly into a single cancellable call.
//!
//! Stage A (Markdown → print document) and stage C (raster → PDF) run on the
//! [`PdfWorker`]; stage B renders the print document in an offscreen frame
//! through a [`Rasterizer`] on helper threads; the wait for the frame to load
//! is bounded by a timeout, after which the frame is captured as it is.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::{content_key, PdfCache};
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::fonts::FontManager;
use crate::raster::{BoxRasterizer, FrameHost, Raster, Rasterizer, Viewport};
use crate::style_config::{StyleConfig, MM_PER_INCH};
use crate::worker::{panic_message, PdfWorker, WorkerRequest, WorkerResponse};

const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata (default: "Resume").
    pub title: String,
    /// How long stage B waits for the frame's load event before capturing
    /// anyway (default: 10 s).
    pub load_timeout: Duration,
    /// Device pixel ratio of the raster capture (default: 2).
    pub raster_scale: f32,
    /// CSS px per inch used to size the offscreen frame (default: 96).
    pub pixels_per_inch: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Resume".to_string(),
            load_timeout: Duration::from_secs(10),
            raster_scale: 2.0,
            pixels_per_inch: 96.0,
        }
    }
}

/// Inputs of one PDF generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfRequest {
    pub markdown: String,
    pub css: String,
    pub styles: StyleConfig,
}

impl PdfRequest {
    pub fn new(markdown: impl Into<String>, css: impl Into<String>, styles: StyleConfig) -> Self {
        Self {
            markdown: markdown.into(),
            css: css.into(),
            styles,
        }
    }

    /// Cache key of these inputs.
    pub fn cache_key(&self) -> String {
        content_key(&self.markdown, &self.css, &self.styles)
    }
}

/// A finished PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfArtifact {
    /// Base64 of the PDF bytes, without a data-URL prefix.
    pub pdf_base64: String,
    pub page_count: usize,
}

impl PdfArtifact {
    pub fn pdf_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STD.decode(&self.pdf_base64)
    }

    pub fn data_url(&self) -> String {
        format!("{PDF_DATA_URL_PREFIX}{}", self.pdf_base64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Markdown,
    Raster,
    Assemble,
}

/// Overall progress of a job: stage A covers 0–20, B 20–60, C 60–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub percent: u8,
}

impl Progress {
    fn within(stage: Stage, stage_percent: u8) -> Self {
        let (lo, hi) = match stage {
            Stage::Markdown => (0u32, 20u32),
            Stage::Raster => (20, 60),
            Stage::Assemble => (60, 100),
        };
        let p = u32::from(stage_percent.min(100));
        Self {
            stage,
            percent: (lo + (hi - lo) * p / 100) as u8,
        }
    }
}

/// Result of [`PdfPipeline::generate_cached`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub artifact: PdfArtifact,
    pub from_cache: bool,
}

enum CaptureEvent {
    Loaded(Result<(), String>),
    Done(Result<Raster, String>),
    Cancelled,
}

/// The three-stage Markdown → PDF pipeline with injected resources.
#[derive(Clone)]
pub struct PdfPipeline {
    worker: Arc<PdfWorker>,
    rasterizer: Arc<dyn Rasterizer>,
    frames: FrameHost,
    config: PipelineConfig,
}

impl PdfPipeline {
    pub fn new(
        worker: Arc<PdfWorker>,
        rasterizer: Arc<dyn Rasterizer>,
        frames: FrameHost,
        config: PipelineConfig,
    ) -> Self {
        Self {
            worker,
            rasterizer,
            frames,
            config,
        }
    }

    /// Built-in worker and rasterizer with synthetic font metrics.
    pub fn with_defaults() -> Self {
        Self::with_fonts(FontManager::default(), PipelineConfig::default())
    }

    /// Built-in worker and rasterizer drawing with the given fonts.
    pub fn with_fonts(fonts: FontManager, config: PipelineConfig) -> Self {
        Self::new(
            Arc::new(PdfWorker::spawn_titled(config.title.clone())),
            Arc::new(BoxRasterizer::new(fonts)),
            FrameHost::new(),
            config,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameHost {
        &self.frames
    }

    /// Run stages A → B → C.
    ///
    /// Cancellation is checked at every stage boundary and interrupts the
    /// worker round-trips and the raster wait.
    pub fn generate(
        &self,
        request: &PdfRequest,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<PdfArtifact, PipelineError> {
        let start = Instant::now();
        cancel.check()?;

        // Stage A
        progress(Progress::within(Stage::Markdown, 0));
        let reply = self.worker.dispatch(
            WorkerRequest::ConvertMarkdown {
                request_id: self.worker.next_request_id(),
                markdown: request.markdown.clone(),
                css: request.css.clone(),
                styles: request.styles.clone(),
            },
            cancel,
            &mut |_, p| progress(Progress::within(Stage::Markdown, p)),
        )?;
        let html = match reply {
            WorkerResponse::HtmlReady { html_content, .. } => html_content,
            WorkerResponse::Error { error, .. } => return Err(PipelineError::Markdown(error)),
            other => return Err(unexpected(&other)),
        };
        cancel.check()?;
        debug!("stage A done: {} bytes of print document", html.len());

        // Stage B
        progress(Progress::within(Stage::Raster, 0));
        let raster = self.capture(&html, &request.styles, cancel)?;
        cancel.check()?;
        progress(Progress::within(Stage::Raster, 100));
        debug!("stage B done: {}x{} raster", raster.width, raster.height);

        // Stage C
        let reply = self.worker.dispatch(
            WorkerRequest::CreatePdf {
                request_id: self.worker.next_request_id(),
                raster_data_url: raster.to_data_url(),
                raster_width: raster.width,
                raster_height: raster.height,
                paper_size: request.styles.paper_size,
            },
            cancel,
            &mut |_, p| progress(Progress::within(Stage::Assemble, p)),
        )?;
        let artifact = match reply {
            WorkerResponse::Success {
                pdf_data_url,
                page_count,
                ..
            } => PdfArtifact {
                pdf_base64: pdf_data_url
                    .strip_prefix(PDF_DATA_URL_PREFIX)
                    .unwrap_or(&pdf_data_url)
                    .to_string(),
                page_count,
            },
            WorkerResponse::Error { error, .. } => return Err(PipelineError::Assembly(error)),
            other => return Err(unexpected(&other)),
        };
        cancel.check()?;
        progress(Progress::within(Stage::Assemble, 100));

        info!(
            "generated {}-page PDF in {:.0}ms",
            artifact.page_count,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(artifact)
    }

    /// Like [`generate`](Self::generate), serving from and filling `cache`.
    /// A hit does no rendering work at all.
    pub fn generate_cached(
        &self,
        request: &PdfRequest,
        cache: Option<&dyn PdfCache>,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<Generated, PipelineError> {
        let Some(cache) = cache else {
            let artifact = self.generate(request, cancel, progress)?;
            return Ok(Generated {
                artifact,
                from_cache: false,
            });
        };
        let key = request.cache_key();
        if let Some(artifact) = cache.get(&key) {
            debug!("cache hit for {}", &key[..key.len().min(12)]);
            return Ok(Generated {
                artifact,
                from_cache: true,
            });
        }
        let artifact = self.generate(request, cancel, progress)?;
        cache.set(&key, artifact.clone());
        Ok(Generated {
            artifact,
            from_cache: false,
        })
    }

    /// Stage B: load `html` into an offscreen frame one page in size, then
    /// capture it.
    ///
    /// The load wait is bounded by `load_timeout`; when it expires the frame
    /// is captured anyway. Only a failing capture is an error.
    fn capture(
        &self,
        html: &str,
        styles: &StyleConfig,
        cancel: &CancelToken,
    ) -> Result<Raster, PipelineError> {
        let (w_mm, h_mm) = styles.paper_size.dimensions_mm();
        let ppi = self.config.pixels_per_inch;
        let viewport = Viewport {
            width_px: (w_mm / MM_PER_INCH * ppi).round().max(1.0) as u32,
            height_px: (h_mm / MM_PER_INCH * ppi).round().max(1.0) as u32,
            scale: self.config.raster_scale,
        };
        let _frame = self.frames.create(viewport);

        let (tx, rx) = mpsc::channel();
        {
            let tx = tx.clone();
            cancel.on_cancel(move || {
                let _ = tx.send(CaptureEvent::Cancelled);
            });
        }
        let html: Arc<str> = Arc::from(html);

        let load_deadline = Instant::now() + self.config.load_timeout;
        {
            let rasterizer = Arc::clone(&self.rasterizer);
            let html = Arc::clone(&html);
            spawn_raster_step(&tx, "pagepress-load", move || {
                CaptureEvent::Loaded(guarded(|| rasterizer.load(&html, &viewport)))
            })?;
        }
        loop {
            let left = load_deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(left) {
                Ok(CaptureEvent::Loaded(Ok(()))) => break,
                Ok(CaptureEvent::Loaded(Err(e))) => {
                    warn!("frame load failed, capturing anyway: {e}");
                    break;
                }
                Ok(CaptureEvent::Cancelled) => return Err(PipelineError::Cancelled),
                Ok(CaptureEvent::Done(_)) => {}
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "frame did not finish loading within {:?}, capturing anyway",
                        self.config.load_timeout
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        cancel.check()?;

        {
            let rasterizer = Arc::clone(&self.rasterizer);
            let html = Arc::clone(&html);
            spawn_raster_step(&tx, "pagepress-capture", move || {
                CaptureEvent::Done(guarded(|| rasterizer.capture(&html, &viewport)))
            })?;
        }
        drop(tx);
        loop {
            match rx.recv() {
                Ok(CaptureEvent::Done(Ok(raster))) => return Ok(raster),
                Ok(CaptureEvent::Done(Err(e))) => return Err(PipelineError::Raster(e)),
                Ok(CaptureEvent::Cancelled) => return Err(PipelineError::Cancelled),
                // A load that outlived its timeout.
                Ok(CaptureEvent::Loaded(_)) => {}
                Err(_) => return Err(PipelineError::Raster("raster thread vanished".into())),
            }
        }
    }
}

/// Run one raster step on its own thread and post its event to `tx`.
fn spawn_raster_step(
    tx: &mpsc::Sender<CaptureEvent>,
    name: &str,
    step: impl FnOnce() -> CaptureEvent + Send + 'static,
) -> Result<(), PipelineError> {
    let tx = tx.clone();
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let _ = tx.send(step());
        })
        .map(|_| ())
        .map_err(|e| PipelineError::Raster(format!("cannot start {name} thread: {e}")))
}

/// Turn a rasterizer panic into an error string.
fn guarded<T>(f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|p| Err(format!("rasterizer panicked: {}", panic_message(p.as_ref()))))
}

fn unexpected(reply: &WorkerResponse) -> PipelineError {
    PipelineError::Worker(format!("unexpected worker reply: {reply:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_mapped_into_stage_bands() {
        assert_eq!(Progress::within(Stage::Markdown, 100).percent, 20);
        assert_eq!(Progress::within(Stage::Raster, 50).percent, 40);
        assert_eq!(Progress::within(Stage::Assemble, 0).percent, 60);
        assert_eq!(Progress::within(Stage::Assemble, 250).percent, 100);
    }

    #[test]
    fn pipeline_basic() {
        let pipeline = PdfPipeline::with_defaults();
        let mut seen = Vec::new();
        let artifact = pipeline
            .generate(
                &PdfRequest::new("# Hello\n\nWorld", "", StyleConfig::default()),
                &CancelToken::new(),
                &mut |p| seen.push(p.percent),
            )
            .unwrap();
        assert_eq!(artifact.page_count, 1);
        assert_eq!(&artifact.pdf_bytes().unwrap()[0..5], b"%PDF-");
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(pipeline.frames().live_frames(), 0);
    }

    #[test]
    fn cancelled_before_start() {
        let pipeline = PdfPipeline::with_defaults();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pipeline
            .generate(&PdfRequest::default(), &cancel, &mut |_| {})
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn artifact_data_url() {
        let a = PdfArtifact {
            pdf_base64: "QUJD".into(),
            page_count: 1,
        };
        assert_eq!(a.data_url(), "data:application/pdf;base64,QUJD");
        assert_eq!(a.pdf_bytes().unwrap(), b"ABC");
    }
}
