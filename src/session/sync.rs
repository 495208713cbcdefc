//! Sync token minting and staleness tracking.
//!
//! At most one sync is live at a time. Every dispatch mints a fresh token;
//! superseding the live sync just forgets it, so when its response shows up
//! the token no longer matches and the response is dropped. Arrival order
//! never matters, only token equality with the live request.

use crate::stage::{StageId, SyncToken};
use crate::types::{CommittedStage, PipelineSummary};
use std::time::{Duration, Instant};

/// The sync currently awaiting a response.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub token: SyncToken,
    /// Exactly what was sent, in order
    pub stages: Vec<CommittedStage>,
    pub dispatched_at: Instant,
}

impl InFlight {
    /// Stage that sat at `index` of the sent sequence
    pub fn stage_at(&self, index: usize) -> Option<StageId> {
        self.stages.get(index).map(|s| s.id)
    }
}

/// What became of a sync response.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Matched the live token and was applied
    Applied,
    /// Matched no live sync; ignored
    Stale,
}

/// Whether two committed sequences describe the same view.
///
/// Stage identity does not matter to the backend, only kind and parameters.
pub fn same_view(a: &[CommittedStage], b: &[CommittedStage]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.kind == y.kind && x.parameters == y.parameters)
}

/// Sync bookkeeping owned by the pipeline machine.
#[derive(Debug, Clone, Default)]
pub struct SyncTracker {
    last_token: SyncToken,
    live: Option<InFlight>,
    /// Last sequence the backend accepted; `None` until attached
    acknowledged: Option<Vec<CommittedStage>>,
    summary: Option<PipelineSummary>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_token(&self) -> SyncToken {
        self.last_token
    }

    pub fn live(&self) -> Option<&InFlight> {
        self.live.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn acknowledged(&self) -> Option<&[CommittedStage]> {
        self.acknowledged.as_deref()
    }

    /// Latest summary from the backend
    pub fn summary(&self) -> Option<&PipelineSummary> {
        self.summary.as_ref()
    }

    /// Attach acknowledged: the empty pipeline is in effect.
    pub fn attached(&mut self, summary: PipelineSummary) {
        self.live = None;
        self.acknowledged = Some(Vec::new());
        self.summary = Some(summary);
    }

    /// Whether `desired` needs to be sent.
    ///
    /// False if it is already live, or nothing is live and it matches what
    /// the backend last accepted.
    pub fn needs_dispatch(&self, desired: &[CommittedStage]) -> bool {
        match (&self.live, &self.acknowledged) {
            (Some(live), _) => !same_view(&live.stages, desired),
            (None, Some(acked)) => !same_view(acked, desired),
            (None, None) => true,
        }
    }

    /// Mint a token for `stages`, superseding any live sync.
    pub fn begin(&mut self, stages: Vec<CommittedStage>, now: Instant) -> SyncToken {
        if let Some(old) = self.supersede() {
            tracing::trace!("Sync {} superseded by a newer dispatch", old);
        }
        self.last_token = self.last_token.next();
        self.live = Some(InFlight {
            token: self.last_token,
            stages,
            dispatched_at: now,
        });
        self.last_token
    }

    /// Mark the live sync stale; returns its token.
    pub fn supersede(&mut self) -> Option<SyncToken> {
        self.live.take().map(|f| f.token)
    }

    /// Apply an acceptance if `token` is the live one.
    pub fn accept(&mut self, token: SyncToken, summary: PipelineSummary) -> Resolution {
        match self.live.take() {
            Some(live) if live.token == token => {
                self.acknowledged = Some(live.stages);
                self.summary = Some(summary);
                Resolution::Applied
            }
            other => {
                self.live = other;
                Resolution::Stale
            }
        }
    }

    /// Resolve a rejection if `token` is the live one.
    ///
    /// Returns the rejected request so the caller can map the stage index.
    /// The acknowledged sequence is untouched.
    pub fn reject(&mut self, token: SyncToken) -> Option<InFlight> {
        match self.live.take() {
            Some(live) if live.token == token => Some(live),
            other => {
                self.live = other;
                None
            }
        }
    }

    /// Live sync older than `timeout` at `now`
    pub fn timed_out(&self, now: Instant, timeout: Duration) -> Option<SyncToken> {
        self.live
            .as_ref()
            .filter(|f| now.saturating_duration_since(f.dispatched_at) >= timeout)
            .map(|f| f.token)
    }

    /// Forget session state. The token counter keeps counting so responses
    /// from a previous session can never match.
    pub fn reset(&mut self) {
        self.live = None;
        self.acknowledged = None;
    }

    /// Drop the summary too (detach)
    pub fn clear(&mut self) {
        self.reset();
        self.summary = None;
    }
}
