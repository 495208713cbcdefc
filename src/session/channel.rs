//! Capability interface to the backend session.
//!
//! The pipeline machine only needs to attach, commit, detach and drain an
//! event stream. Any transport that can do that (an in-process worker
//! thread, a socket, an RPC client) plugs in here.

use crate::error::Result;
use crate::session::protocol::{SerializedStage, SessionEvent};
use crate::stage::SyncToken;
use crate::types::DatasetId;

/// Backend session as seen by the pipeline machine.
///
/// All calls are non-blocking: results arrive later through
/// [`SessionChannel::poll_events`]. An `Err` from a send means the transport
/// is gone and is treated as a channel fault.
#[cfg_attr(test, mockall::automock)]
pub trait SessionChannel: Send {
    /// Send `AttachSession(dataset)`
    fn attach(&mut self, dataset: &DatasetId) -> Result<()>;

    /// Send `CommitPipeline(stages, token)`
    fn commit(&mut self, token: SyncToken, stages: &[SerializedStage]) -> Result<()>;

    /// Send `DetachSession()`
    fn detach(&mut self) -> Result<()>;

    /// Drain everything received since the last call
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    /// Human-readable transport address
    fn endpoint(&self) -> String;
}
