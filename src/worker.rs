//! Background PDF worker – one long-lived thread that performs stage A
//! (Markdown → print document) and stage C (raster → PDF) off the calling
//! thread.
//!
//! Requests and responses are plain serde enums correlated by `request_id`.
//! Callers block in [`PdfWorker::dispatch`] on a private reply channel; a
//! cancelled dispatch leaves the pending map immediately and any later
//! message for that id is dropped.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::assemble::assemble_pdf;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::markdown::markdown_to_html;
use crate::scope::{render_print_document, ScopedStyleContext};
use crate::style_config::{PaperSize, StyleConfig};

pub const STAGE_MARKDOWN: &str = "markdown";
pub const STAGE_ASSEMBLE: &str = "assemble";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerRequest {
    #[serde(rename_all = "camelCase")]
    ConvertMarkdown {
        request_id: String,
        markdown: String,
        css: String,
        styles: StyleConfig,
    },
    #[serde(rename_all = "camelCase")]
    CreatePdf {
        request_id: String,
        raster_data_url: String,
        raster_width: u32,
        raster_height: u32,
        paper_size: PaperSize,
    },
}

impl WorkerRequest {
    pub fn request_id(&self) -> &str {
        match self {
            WorkerRequest::ConvertMarkdown { request_id, .. }
            | WorkerRequest::CreatePdf { request_id, .. } => request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerResponse {
    #[serde(rename_all = "camelCase")]
    Progress {
        request_id: String,
        stage: String,
        progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    HtmlReady {
        request_id: String,
        html_content: String,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        request_id: String,
        pdf_data_url: String,
        page_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Error { request_id: String, error: String },
}

impl WorkerResponse {
    pub fn request_id(&self) -> &str {
        match self {
            WorkerResponse::Progress { request_id, .. }
            | WorkerResponse::HtmlReady { request_id, .. }
            | WorkerResponse::Success { request_id, .. }
            | WorkerResponse::Error { request_id, .. } => request_id,
        }
    }

    /// Whether this message ends its request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerResponse::Progress { .. })
    }
}

/// Handles one request, emitting zero or more progress messages and exactly
/// one terminal message through `emit`.
pub type RequestHandler = dyn Fn(&WorkerRequest, &mut dyn FnMut(WorkerResponse)) + Send + Sync;

enum Delivery {
    Message(WorkerResponse),
    Cancelled,
}

type PendingMap = Arc<Mutex<HashMap<String, Sender<Delivery>>>>;

pub struct PdfWorker {
    sender: Option<Sender<WorkerRequest>>,
    pending: PendingMap,
    handle: Option<JoinHandle<()>>,
    next_id: AtomicU64,
}

impl PdfWorker {
    /// Start the worker with the built-in stage A / stage C handler.
    pub fn spawn() -> Self {
        Self::spawn_titled("Resume".to_string())
    }

    /// Like [`spawn`](Self::spawn), with the given PDF document title.
    pub fn spawn_titled(title: String) -> Self {
        Self::spawn_with_handler(move |req, emit| handle_request(&title, req, emit))
    }

    /// Start the worker with a custom request handler.
    pub fn spawn_with_handler(
        handler: impl Fn(&WorkerRequest, &mut dyn FnMut(WorkerResponse)) + Send + Sync + 'static,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let thread_pending = Arc::clone(&pending);
        let handle = thread::Builder::new()
            .name("pagepress-worker".into())
            .spawn(move || worker_loop(receiver, thread_pending, Box::new(handler)))
            .map_err(|e| error!("failed to start PDF worker thread: {e}"))
            .ok();

        Self {
            sender: handle.as_ref().map(|_| sender),
            pending,
            handle,
            next_id: AtomicU64::new(1),
        }
    }

    /// A fresh id, unique for this worker.
    pub fn next_request_id(&self) -> String {
        format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of requests still awaiting a terminal message.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Send a request and block until its terminal message arrives.
    ///
    /// Progress messages go to `progress` as `(stage, percent)`. The terminal
    /// message is returned as-is, including `Error`. Cancellation returns
    /// `Err(PipelineError::Cancelled)` and forgets the request.
    pub fn dispatch(
        &self,
        request: WorkerRequest,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(&str, u8),
    ) -> Result<WorkerResponse, PipelineError> {
        let Some(sender) = &self.sender else {
            return Err(PipelineError::Worker("worker is not running".into()));
        };
        let id = request.request_id().to_string();
        let (tx, rx) = mpsc::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), tx.clone());

        {
            let pending = Arc::clone(&self.pending);
            let id = id.clone();
            cancel.on_cancel(move || {
                let removed = pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
                if removed.is_some() {
                    debug!("request {id} cancelled");
                }
                let _ = tx.send(Delivery::Cancelled);
            });
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        if sender.send(request).is_err() {
            self.forget(&id);
            return Err(PipelineError::Worker("worker channel closed".into()));
        }

        loop {
            match rx.recv() {
                Ok(Delivery::Cancelled) => return Err(PipelineError::Cancelled),
                Ok(Delivery::Message(WorkerResponse::Progress {
                    stage, progress: p, ..
                })) => progress(&stage, p),
                Ok(Delivery::Message(terminal)) => return Ok(terminal),
                Err(_) => {
                    self.forget(&id);
                    return Err(PipelineError::Worker("worker stopped".into()));
                }
            }
        }
    }

    fn forget(&self, id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }
}

impl Drop for PdfWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("PDF worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<WorkerRequest>, pending: PendingMap, handler: Box<RequestHandler>) {
    for request in receiver {
        let id = request.request_id().to_string();
        debug!("worker: handling {id}");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(&request, &mut |response| route(&pending, response));
        }));
        if let Err(payload) = outcome {
            let reason = panic_message(payload.as_ref());
            error!("worker: handler panicked on {id}: {reason}");
            let drained: Vec<(String, Sender<Delivery>)> = pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .drain()
                .collect();
            for (request_id, tx) in drained {
                let _ = tx.send(Delivery::Message(WorkerResponse::Error {
                    request_id,
                    error: format!("worker crashed: {reason}"),
                }));
            }
        }
    }
    debug!("worker: channel closed, exiting");
}

/// Deliver a message to whoever is waiting on its request id.
fn route(pending: &PendingMap, response: WorkerResponse) {
    let mut map = pending.lock().unwrap_or_else(|e| e.into_inner());
    let target = if response.is_terminal() {
        map.remove(response.request_id())
    } else {
        map.get(response.request_id()).cloned()
    };
    drop(map);
    match target {
        Some(tx) => {
            let _ = tx.send(Delivery::Message(response));
        }
        None => debug!(
            "worker: discarding message for unknown request {}",
            response.request_id()
        ),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The built-in handler.
fn handle_request(title: &str, request: &WorkerRequest, emit: &mut dyn FnMut(WorkerResponse)) {
    match request {
        WorkerRequest::ConvertMarkdown {
            request_id,
            markdown,
            css,
            styles,
        } => {
            emit(progress(request_id, STAGE_MARKDOWN, 10));
            let html = markdown_to_html(markdown);
            emit(progress(request_id, STAGE_MARKDOWN, 60));
            let ctx = ScopedStyleContext::create(styles, css);
            let document = render_print_document(&ctx, &html);
            emit(progress(request_id, STAGE_MARKDOWN, 100));
            emit(WorkerResponse::HtmlReady {
                request_id: request_id.clone(),
                html_content: document,
            });
        }
        WorkerRequest::CreatePdf {
            request_id,
            raster_data_url,
            raster_width,
            raster_height,
            paper_size,
        } => {
            emit(progress(request_id, STAGE_ASSEMBLE, 0));
            let result = assemble_pdf(
                title,
                raster_data_url,
                *raster_width,
                *raster_height,
                *paper_size,
                |i, total| {
                    let pct = ((i + 1) * 100 / total.max(1)).min(100) as u8;
                    emit(progress(request_id, STAGE_ASSEMBLE, pct));
                },
            );
            emit(match result {
                Ok(pdf) => WorkerResponse::Success {
                    request_id: request_id.clone(),
                    pdf_data_url: pdf.data_url,
                    page_count: pdf.page_count,
                },
                Err(e) => WorkerResponse::Error {
                    request_id: request_id.clone(),
                    error: e.to_string(),
                },
            });
        }
    }
}

fn progress(request_id: &str, stage: &str, progress: u8) -> WorkerResponse {
    WorkerResponse::Progress {
        request_id: request_id.to_string(),
        stage: stage.to_string(),
        progress,
    }
}
