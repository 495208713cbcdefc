//! Thread boundary between the pipeline machine (UI side) and a backend
//! session.
//!
//! [`ChannelSession`] is the UI-side [`SessionChannel`]: requests go out over
//! one bounded crossbeam channel, events come back over another. The other
//! ends belong to a [`SessionWorker`] thread that drives a
//! [`SessionBackend`] one request at a time, so backend work never blocks
//! the event loop.

use crate::config::SessionConfig;
use crate::error::{Result, ViewBarError};
use crate::session::channel::SessionChannel;
use crate::session::protocol::{SerializedStage, SessionEvent, SessionRequest};
use crate::stage::SyncToken;
use crate::types::{DatasetId, PipelineSummary};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the worker re-checks its running flag while idle
const WORKER_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Why a backend refused to evaluate a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluateError {
    /// The pipeline is wrong; `stage_index` is the position in the request
    Rejected { stage_index: usize, reason: String },
    /// The backend itself failed
    Fault(String),
}

/// Something that can evaluate pipelines against a dataset.
pub trait SessionBackend: Send {
    /// Open `dataset`, returning the summary of the unfiltered view
    fn attach(&mut self, dataset: &DatasetId) -> std::result::Result<PipelineSummary, String>;

    /// Evaluate an ordered stage sequence
    fn evaluate(
        &mut self,
        stages: &[SerializedStage],
    ) -> std::result::Result<PipelineSummary, EvaluateError>;

    fn detach(&mut self) {}

    /// Name shown as the transport endpoint
    fn name(&self) -> String;
}

/// Worker loop that owns a backend.
pub struct SessionWorker {
    backend: Box<dyn SessionBackend>,
    request_rx: Receiver<SessionRequest>,
    event_tx: Sender<SessionEvent>,
    running: Arc<AtomicBool>,
    attached: Option<DatasetId>,
}

impl SessionWorker {
    pub fn new(
        backend: Box<dyn SessionBackend>,
        request_rx: Receiver<SessionRequest>,
        event_tx: Sender<SessionEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            request_rx,
            event_tx,
            running,
            attached: None,
        }
    }

    /// Run until shutdown or until the UI side hangs up
    pub fn run(&mut self) {
        tracing::info!("Session worker started ({})", self.backend.name());

        while self.running.load(Ordering::SeqCst) {
            match self.request_rx.recv_timeout(WORKER_IDLE_WAIT) {
                Ok(request) => self.handle_request(request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }

        if self.attached.take().is_some() {
            self.backend.detach();
        }
        tracing::info!("Session worker stopped");
    }

    fn handle_request(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::AttachSession { dataset } => self.handle_attach(dataset),
            SessionRequest::CommitPipeline { token, stages } => self.handle_commit(token, &stages),
            SessionRequest::DetachSession => {
                if self.attached.take().is_some() {
                    self.backend.detach();
                }
                self.send(SessionEvent::Detached);
            }
            SessionRequest::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn handle_attach(&mut self, dataset: DatasetId) {
        match self.backend.attach(&dataset) {
            Ok(summary) => {
                tracing::info!("Attached to dataset '{}' ({})", dataset, summary);
                self.attached = Some(dataset);
                self.send(SessionEvent::Attached { summary });
            }
            Err(e) => {
                let message = format!("Failed to attach '{}': {}", dataset, e);
                tracing::error!("{}", message);
                self.send(SessionEvent::Fault { message });
            }
        }
    }

    fn handle_commit(&mut self, token: SyncToken, stages: &[SerializedStage]) {
        if self.attached.is_none() {
            self.send(SessionEvent::Fault {
                message: "Commit without an attached session".to_string(),
            });
            return;
        }
        let event = match self.backend.evaluate(stages) {
            Ok(summary) => SessionEvent::PipelineAccepted { token, summary },
            Err(EvaluateError::Rejected {
                stage_index,
                reason,
            }) => SessionEvent::PipelineRejected {
                token,
                stage_index,
                reason,
            },
            Err(EvaluateError::Fault(message)) => SessionEvent::Fault { message },
        };
        self.send(event);
    }

    /// Blocks while the event queue is full, but never past shutdown.
    fn send(&self, mut event: SessionEvent) {
        loop {
            match self.event_tx.send_timeout(event, WORKER_IDLE_WAIT) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(back)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        tracing::debug!("Dropped {:?}: worker stopping", back);
                        return;
                    }
                    event = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.running.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
    }
}

/// UI-side session handle backed by a [`SessionWorker`] thread.
pub struct ChannelSession {
    request_tx: Sender<SessionRequest>,
    event_rx: Receiver<SessionEvent>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    endpoint: String,
    /// Disconnect already reported as a fault
    lost: bool,
    /// Detaches sent whose `Detached` has not come back yet
    detaching: usize,
}

impl ChannelSession {
    /// Spawn a worker for `backend` and connect to it
    pub fn spawn(backend: Box<dyn SessionBackend>, config: &SessionConfig) -> Result<Self> {
        let (request_tx, request_rx) = bounded(config.request_capacity.max(1));
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let endpoint = backend.name();

        let mut worker = SessionWorker::new(backend, request_rx, event_tx, running.clone());
        let handle = std::thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            request_tx,
            event_rx,
            running,
            worker: Some(handle),
            endpoint,
            lost: false,
            detaching: 0,
        })
    }

    /// Wrap existing channel ends (the worker is driven elsewhere)
    pub fn from_parts(
        request_tx: Sender<SessionRequest>,
        event_rx: Receiver<SessionEvent>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            request_tx,
            event_rx,
            running: Arc::new(AtomicBool::new(true)),
            worker: None,
            endpoint: endpoint.into(),
            lost: false,
            detaching: 0,
        }
    }

    fn send(&self, request: SessionRequest) -> Result<()> {
        self.request_tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => ViewBarError::Channel("session request queue full".to_string()),
            TrySendError::Disconnected(_) => {
                ViewBarError::Channel("session worker disconnected".to_string())
            }
        })
    }

    /// Stop the worker and wait for it
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.request_tx.try_send(SessionRequest::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!("Session worker panicked");
            }
        }
    }
}

impl SessionChannel for ChannelSession {
    fn attach(&mut self, dataset: &DatasetId) -> Result<()> {
        self.send(SessionRequest::AttachSession {
            dataset: dataset.clone(),
        })
    }

    fn commit(&mut self, token: SyncToken, stages: &[SerializedStage]) -> Result<()> {
        self.send(SessionRequest::CommitPipeline {
            token,
            stages: stages.to_vec(),
        })
    }

    fn detach(&mut self) -> Result<()> {
        self.send(SessionRequest::DetachSession)?;
        self.detaching += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        // Everything up to a detach's `Detached` belongs to the old session
        for event in self.event_rx.try_iter() {
            if self.detaching == 0 {
                events.push(event);
            } else if matches!(event, SessionEvent::Detached) {
                self.detaching -= 1;
            } else {
                tracing::trace!("Dropped event from detached session: {:?}", event);
            }
        }
        // A dead worker shows up as one fault, after anything it sent
        if !self.lost && events.is_empty() && self.worker.as_ref().is_some_and(|h| h.is_finished())
        {
            self.lost = true;
            events.push(SessionEvent::Fault {
                message: "session worker disconnected".to_string(),
            });
        }
        events
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
