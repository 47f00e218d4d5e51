//! Generation orchestrator – decides *when* a PDF is generated.
//!
//! Content changes re-arm an idle debounce; once the author has been idle,
//! visible and unpaused, one job runs on its own thread. A newer trigger
//! cancels the running job, and results from superseded jobs are dropped by
//! generation number. The orchestrator is driven by [`tick`] with an
//! explicit clock so hosts can call it from their own event loop.
//!
//! [`tick`]: GenerationOrchestrator::tick

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::cache::PdfCache;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::pipeline::{Generated, PdfArtifact, PdfPipeline, PdfRequest, Progress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Quiet period after the last content change (default: 1500 ms).
    pub idle_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    Started { generation: u64 },
    Progress { generation: u64, progress: Progress },
    Completed {
        generation: u64,
        artifact: PdfArtifact,
        from_cache: bool,
    },
    Failed { generation: u64, message: String },
}

enum JobMessage {
    Progress(Progress),
    Finished(Result<Generated, PipelineError>),
}

struct RunningJob {
    generation: u64,
    cancel: CancelToken,
}

pub struct GenerationOrchestrator {
    pipeline: PdfPipeline,
    cache: Option<Arc<dyn PdfCache>>,
    config: OrchestratorConfig,

    latest: Option<PdfRequest>,
    deadline: Option<Instant>,
    should_generate: bool,
    active: bool,
    paused: bool,
    visible: bool,

    generation: u64,
    running: Option<RunningJob>,
    sender: Sender<(u64, JobMessage)>,
    receiver: Receiver<(u64, JobMessage)>,
}

impl GenerationOrchestrator {
    pub fn new(
        pipeline: PdfPipeline,
        cache: Option<Arc<dyn PdfCache>>,
        config: OrchestratorConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            pipeline,
            cache,
            config,
            latest: None,
            deadline: None,
            should_generate: false,
            active: false,
            paused: false,
            visible: true,
            generation: 0,
            running: None,
            sender,
            receiver,
        }
    }

    /// Record new content and restart the idle timer.
    pub fn content_changed(&mut self, request: PdfRequest, now: Instant) {
        self.latest = Some(request);
        self.active = true;
        self.deadline = Some(now + self.config.idle_delay);
    }

    /// Advance timers, collect finished work and start a job if due.
    pub fn tick(&mut self, now: Instant) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();

        if self.deadline.is_some_and(|d| now >= d) {
            self.deadline = None;
            self.active = false;
            self.should_generate = true;
            debug!("author idle, generation requested");
        }

        self.drain(&mut events);

        if self.visible && !self.paused && self.running.is_none() && self.should_generate {
            self.start(&mut events);
        }
        events
    }

    /// Explicit trigger: the newest request wins over anything in flight.
    pub fn generate_now(&mut self) -> Vec<OrchestratorEvent> {
        self.cancel_running();
        self.deadline = None;
        self.active = false;
        self.should_generate = true;
        let mut events = Vec::new();
        self.drain(&mut events);
        if self.visible {
            self.start(&mut events);
        }
        events
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Hidden hosts abort the in-flight job; intent survives until visible.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible && self.cancel_running() {
            self.should_generate = true;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn should_generate(&self) -> bool {
        self.should_generate
    }

    /// Cancel the running job, if any. Returns whether one was running.
    fn cancel_running(&mut self) -> bool {
        match self.running.take() {
            Some(job) => {
                debug!("cancelling generation {}", job.generation);
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn start(&mut self, events: &mut Vec<OrchestratorEvent>) {
        let Some(request) = self.latest.clone() else {
            self.should_generate = false;
            return;
        };
        self.should_generate = false;
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancelToken::new();

        let pipeline = self.pipeline.clone();
        let cache = self.cache.clone();
        let sender = self.sender.clone();
        let job_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name(format!("pagepress-job-{generation}"))
            .spawn(move || {
                let progress_tx = sender.clone();
                let result = pipeline.generate_cached(
                    &request,
                    cache.as_deref(),
                    &job_cancel,
                    &mut |p| {
                        let _ = progress_tx.send((generation, JobMessage::Progress(p)));
                    },
                );
                let _ = sender.send((generation, JobMessage::Finished(result)));
            });

        match spawned {
            Ok(_) => {
                debug!("generation {generation} started");
                self.running = Some(RunningJob { generation, cancel });
                events.push(OrchestratorEvent::Started { generation });
            }
            Err(e) => {
                warn!("could not start generation {generation}: {e}");
                events.push(OrchestratorEvent::Failed {
                    generation,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Turn job messages into events, dropping anything from stale jobs.
    fn drain(&mut self, events: &mut Vec<OrchestratorEvent>) {
        while let Ok((generation, message)) = self.receiver.try_recv() {
            let current = self
                .running
                .as_ref()
                .is_some_and(|job| job.generation == generation);
            if !current {
                debug!("dropping message from stale generation {generation}");
                continue;
            }
            match message {
                JobMessage::Progress(progress) => {
                    events.push(OrchestratorEvent::Progress {
                        generation,
                        progress,
                    });
                }
                JobMessage::Finished(result) => {
                    self.running = None;
                    match result {
                        Ok(generated) => {
                            info!(
                                "generation {generation} completed ({} pages{})",
                                generated.artifact.page_count,
                                if generated.from_cache { ", cached" } else { "" }
                            );
                            events.push(OrchestratorEvent::Completed {
                                generation,
                                artifact: generated.artifact,
                                from_cache: generated.from_cache,
                            });
                        }
                        Err(e) if e.is_cancelled() => {
                            debug!("generation {generation} cancelled");
                        }
                        Err(e) => {
                            warn!("generation {generation} failed: {e}");
                            events.push(OrchestratorEvent::Failed {
                                generation,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

impl Drop for GenerationOrchestrator {
    fn drop(&mut self) {
        self.cancel_running();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style_config::StyleConfig;

    fn orchestrator() -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            PdfPipeline::with_defaults(),
            None,
            OrchestratorConfig::default(),
        )
    }

    fn request() -> PdfRequest {
        PdfRequest::new("# A", "", StyleConfig::default())
    }

    #[test]
    fn debounce_waits_for_idle() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        o.content_changed(request(), t0);
        assert!(o.is_active());
        assert!(o.tick(t0 + Duration::from_millis(1000)).is_empty());

        // Another keystroke re-arms the timer.
        o.content_changed(request(), t0 + Duration::from_millis(1200));
        assert!(o.tick(t0 + Duration::from_millis(2000)).is_empty());

        let events = o.tick(t0 + Duration::from_millis(2800));
        assert!(matches!(events[..], [OrchestratorEvent::Started { generation: 1 }]));
        assert!(o.is_running());
        assert!(!o.is_active());
    }

    #[test]
    fn paused_keeps_intent() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        o.pause();
        o.content_changed(request(), t0);
        assert!(o.tick(t0 + Duration::from_secs(2)).is_empty());
        assert!(o.should_generate());
        o.resume();
        let events = o.tick(t0 + Duration::from_secs(3));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn hidden_host_defers_generation() {
        let mut o = orchestrator();
        let t0 = Instant::now();
        o.set_visible(false);
        o.content_changed(request(), t0);
        assert!(o.tick(t0 + Duration::from_secs(2)).is_empty());
        o.set_visible(true);
        assert!(!o.tick(t0 + Duration::from_secs(3)).is_empty());
    }

    #[test]
    fn nothing_to_generate_without_content() {
        let mut o = orchestrator();
        assert!(o.generate_now().is_empty());
        assert!(!o.is_running());
    }
}
