//! Mock construction helpers

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};
use viewbar::error::{Result, ViewBarError};
use viewbar::session::{SerializedStage, SessionChannel, SessionEvent, SessionRequest};
use viewbar::stage::SyncToken;
use viewbar::types::{DatasetId, PipelineSummary};

#[cfg(feature = "mock-session")]
use viewbar::session::{ChannelSession, MockBackend};

/// Create test channels with default size
pub fn create_test_channels<T, U>() -> (Sender<T>, Receiver<T>, Sender<U>, Receiver<U>) {
    let (tx1, rx1) = bounded(16);
    let (tx2, rx2) = bounded(16);
    (tx1, rx1, tx2, rx2)
}

#[derive(Default)]
struct Script {
    requests: Vec<SessionRequest>,
    inbox: Vec<SessionEvent>,
    failing: bool,
}

/// In-process [`SessionChannel`] whose responses are scripted by the test.
pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

/// Test-side handle to a [`ScriptedChannel`]
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

pub fn scripted_channel() -> (ScriptedChannel, ScriptHandle) {
    let script = Arc::new(Mutex::new(Script::default()));
    (
        ScriptedChannel {
            script: script.clone(),
        },
        ScriptHandle { script },
    )
}

impl ScriptedChannel {
    fn record(&self, request: SessionRequest) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.failing {
            return Err(ViewBarError::Channel("scripted disconnect".to_string()));
        }
        script.requests.push(request);
        Ok(())
    }
}

impl SessionChannel for ScriptedChannel {
    fn attach(&mut self, dataset: &DatasetId) -> Result<()> {
        self.record(SessionRequest::AttachSession {
            dataset: dataset.clone(),
        })
    }

    fn commit(&mut self, token: SyncToken, stages: &[SerializedStage]) -> Result<()> {
        self.record(SessionRequest::CommitPipeline {
            token,
            stages: stages.to_vec(),
        })
    }

    fn detach(&mut self) -> Result<()> {
        self.record(SessionRequest::DetachSession)
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.script.lock().unwrap().inbox)
    }

    fn endpoint(&self) -> String {
        "scripted://test".to_string()
    }
}

impl ScriptHandle {
    pub fn push(&self, event: SessionEvent) {
        self.script.lock().unwrap().inbox.push(event);
    }

    pub fn set_failing(&self, failing: bool) {
        self.script.lock().unwrap().failing = failing;
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    /// Every `CommitPipeline` sent so far, oldest first
    pub fn commits(&self) -> Vec<(SyncToken, Vec<SerializedStage>)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                SessionRequest::CommitPipeline { token, stages } => Some((token, stages)),
                _ => None,
            })
            .collect()
    }

    pub fn last_commit(&self) -> Option<(SyncToken, Vec<SerializedStage>)> {
        self.commits().pop()
    }

    pub fn attach_ok(&self, sample_count: u64) {
        self.push(SessionEvent::Attached {
            summary: PipelineSummary::new(sample_count, sample_count, vec![]),
        });
    }

    /// Accept the most recent commit with `sample_count` samples
    pub fn accept_last(&self, sample_count: u64) -> SyncToken {
        let (token, _) = self.last_commit().expect("no commit sent");
        self.push(SessionEvent::PipelineAccepted {
            token,
            summary: PipelineSummary::new(sample_count, 12, vec![]),
        });
        token
    }
}

#[cfg(feature = "mock-session")]
pub fn create_test_mock_session(backend: MockBackend) -> ChannelSession {
    ChannelSession::spawn(Box::new(backend), &Default::default()).unwrap()
}
