//! The pipeline machine: top-level state chart of the view bar.
//!
//! Owns the stage list, the focus cursor, the session handle and the sync
//! tracker, and is the only place where backend responses are applied. All
//! mutations run to completion inside [`PipelineMachine::handle`] or
//! [`PipelineMachine::poll`]; the session channel is the only source of
//! asynchrony.
//!
//! ```text
//!   idle ──attach──▶ connecting ──attached──▶ running ◀──settle── syncing
//!    ▲                   │                      │ └──dispatch──────▲ │
//!    └──────detach───────┴──────────────────────┴────── fault ──▶ error
//!                                         error ──attach (retry)──▶ connecting
//! ```

use crate::config::{EditorConfig, Keymap, SessionConfig, ViewBarConfig};
use crate::error::{Result, ViewBarError};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::event::{KeyChord, Notice, PipelineEvent};
use crate::pipeline::focus::{Cursor, Direction, Focus};
use crate::pipeline::list::StageList;
use crate::pipeline::snapshot::PipelineSnapshot;
use crate::session::channel::SessionChannel;
use crate::session::protocol::{serialize_pipeline, SerializedStage, SessionEvent};
use crate::session::sync::{Resolution, SyncTracker};
use crate::stage::{render_text, CommitOutcome, GrammarRegistry, StageId, StageKind, Validity};
use crate::types::{CommittedStage, DatasetId, SessionHandle, SessionStatus};
use std::time::Instant;

/// Global mode of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// No session attached
    Idle,
    /// Attach sent, waiting for the acknowledgement
    Connecting { since: Instant },
    /// Interactive editing, nothing in flight
    Running,
    /// A sync is in flight
    Syncing,
    /// Session fault; only a new attach leaves this state
    Error(String),
}

impl PipelineState {
    pub fn status(&self) -> SessionStatus {
        match self {
            PipelineState::Idle => SessionStatus::Idle,
            PipelineState::Connecting { .. } => SessionStatus::Connecting,
            PipelineState::Running => SessionStatus::Running,
            PipelineState::Syncing => SessionStatus::Syncing,
            PipelineState::Error(_) => SessionStatus::Error,
        }
    }

    /// Transition table. `None` means the signal does not apply here.
    fn on(&self, signal: &Signal, now: Instant) -> Option<PipelineState> {
        use PipelineState as S;
        match (self, signal) {
            (_, Signal::Detach) => Some(S::Idle),
            (S::Idle | S::Error(_), Signal::Attach) => Some(S::Connecting { since: now }),
            (S::Connecting { .. }, Signal::Attached) => Some(S::Running),
            (S::Running | S::Syncing, Signal::Dispatch) => Some(S::Syncing),
            (S::Syncing, Signal::Settle) => Some(S::Running),
            (S::Connecting { .. } | S::Running | S::Syncing, Signal::Fault(message)) => {
                Some(S::Error(message.clone()))
            }
            _ => None,
        }
    }
}

/// Internal inputs of the state table.
#[derive(Debug, Clone, PartialEq)]
enum Signal {
    Attach,
    Attached,
    Dispatch,
    Settle,
    Fault(String),
    Detach,
}

/// What happened to the focused stage when focus tried to leave it.
enum Release {
    /// Dirty edit; focus must stay
    Blocked,
    Kept,
    /// The stage was empty and has been dropped from this index
    Removed(usize),
}

/// Contract violations are not user errors: log and carry on.
fn guarded<T>(op: &str, result: PipelineResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignored {}: {}", op, e);
            None
        }
    }
}

/// Pipeline state chart driving a [`StageList`] and a [`SessionChannel`].
pub struct PipelineMachine {
    channel: Box<dyn SessionChannel>,
    grammar: GrammarRegistry,
    editor: EditorConfig,
    session_config: SessionConfig,
    keymap: Keymap,

    state: PipelineState,
    session: Option<SessionHandle>,
    list: StageList,
    focus: Focus,
    sync: SyncTracker,
    /// Error banner shown (cleared by `dismiss_error`)
    error_visible: bool,
}

impl PipelineMachine {
    pub fn new(channel: Box<dyn SessionChannel>, config: &ViewBarConfig) -> Self {
        Self {
            channel,
            grammar: GrammarRegistry::new(),
            editor: config.editor.clone(),
            session_config: config.session.clone(),
            keymap: config.keymap.clone(),
            state: PipelineState::Idle,
            session: None,
            list: StageList::new(),
            focus: Focus::new(config.editor.bar_focused_on_start),
            sync: SyncTracker::new(),
            error_visible: false,
        }
    }

    /// Replace the built-in grammars
    pub fn with_grammar(mut self, grammar: GrammarRegistry) -> Self {
        self.grammar = grammar;
        self
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn list(&self) -> &StageList {
        &self.list
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn sync(&self) -> &SyncTracker {
        &self.sync
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn grammar(&self) -> &GrammarRegistry {
        &self.grammar
    }

    /// Valid stages in order, as the next sync would send them
    pub fn committed_pipeline(&self) -> Vec<CommittedStage> {
        self.list.committed_pipeline()
    }

    /// The message of the current fault, while the banner is shown
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Error(message) if self.error_visible => Some(message),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            status: self.status(),
            dataset: self.session.as_ref().map(|s| s.dataset.clone()),
            bar_focused: self.focus.bar_focused(),
            cursor: self.focus.cursor(),
            slots: PipelineSnapshot::slots_of(&self.list, &self.focus),
            summary: self.sync.summary().cloned(),
            error: self.error_message().map(String::from),
            live_token: self.sync.live().map(|f| f.token),
            revision: self.list.revision(),
        }
    }

    // ==================== Session lifecycle ====================

    /// Attach to `dataset` with a fresh, empty pipeline.
    ///
    /// Any current session is detached first.
    pub fn attach(&mut self, dataset: DatasetId) -> Result<()> {
        self.attach_at(dataset, Instant::now())
    }

    pub fn attach_at(&mut self, dataset: DatasetId, now: Instant) -> Result<()> {
        if self.session.is_some() {
            self.detach();
        }
        self.list.clear();
        self.focus = Focus::new(self.editor.bar_focused_on_start);
        self.focus.set(Cursor::Tail);
        self.sync.clear();
        self.connect(dataset, now)
    }

    /// Recover from `error` by re-attaching the same dataset.
    ///
    /// The local pipeline is kept and re-sent once the attach is
    /// acknowledged.
    pub fn retry(&mut self) -> Result<()> {
        self.retry_at(Instant::now())
    }

    pub fn retry_at(&mut self, now: Instant) -> Result<()> {
        if !matches!(self.state, PipelineState::Error(_)) {
            return Err(ViewBarError::Session(format!(
                "Nothing to retry while {}",
                self.status()
            )));
        }
        let dataset = self
            .session
            .as_ref()
            .map(|s| s.dataset.clone())
            .ok_or(PipelineError::NotActive)?;
        tracing::info!("Retrying session for '{}'", dataset);
        self.connect(dataset, now)
    }

    fn connect(&mut self, dataset: DatasetId, now: Instant) -> Result<()> {
        self.session = Some(SessionHandle::new(dataset.clone(), self.channel.endpoint()));
        self.error_visible = false;
        self.transition(Signal::Attach, now);
        tracing::info!("Attaching to '{}' via {}", dataset, self.channel.endpoint());

        if let Err(e) = self.channel.attach(&dataset) {
            self.fault(format!("Failed to send attach: {}", e), now, &mut Vec::new());
            return Err(e);
        }
        Ok(())
    }

    /// Detach and drop the pipeline. No-op while idle.
    pub fn detach(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = self.channel.detach() {
            tracing::warn!("Failed to send detach: {}", e);
        }
        tracing::info!("Detached from '{}'", session.dataset);
        self.list.clear();
        self.focus = Focus::new(self.focus.bar_focused());
        self.sync.clear();
        self.error_visible = false;
        self.transition(Signal::Detach, Instant::now());
    }

    /// Hide the error banner. The machine stays in `error`.
    pub fn dismiss_error(&mut self) {
        self.error_visible = false;
    }

    // ==================== Input ====================

    pub fn handle(&mut self, event: PipelineEvent) -> Vec<Notice> {
        self.handle_at(event, Instant::now())
    }

    /// Apply one input event and run any sync it makes necessary.
    pub fn handle_at(&mut self, event: PipelineEvent, now: Instant) -> Vec<Notice> {
        let mut notices = Vec::new();
        if self.state == PipelineState::Idle {
            tracing::trace!("Ignored {} while idle", event.name());
            return notices;
        }
        if event.is_shortcut() && !self.focus.bar_focused() {
            tracing::trace!("Ignored {}: bar not focused", event.name());
            return notices;
        }
        tracing::debug!("Event {}", event.name());

        match event {
            PipelineEvent::ToggleBarFocus => {
                let focused = self.focus.toggle_bar();
                tracing::debug!("Bar focus {}", if focused { "on" } else { "off" });
            }
            PipelineEvent::DeleteActive => self.delete_active(),
            PipelineEvent::DeleteSelection => self.delete_selection(),
            PipelineEvent::CommitFocused => self.commit_focused(&mut notices),
            PipelineEvent::Discard => self.discard_focused(),
            PipelineEvent::NavigateLeft => self.navigate(Direction::Left, false, &mut notices),
            PipelineEvent::NavigateRight => self.navigate(Direction::Right, false, &mut notices),
            PipelineEvent::ExtendLeft => self.navigate(Direction::Left, true, &mut notices),
            PipelineEvent::ExtendRight => self.navigate(Direction::Right, true, &mut notices),
            PipelineEvent::FocusStage(id) => {
                if self.list.stage(id).is_some() {
                    self.move_focus(Cursor::Stage(id), &mut notices);
                }
            }
            PipelineEvent::FocusTail => self.move_focus(Cursor::Tail, &mut notices),
            PipelineEvent::Blur => self.move_focus(Cursor::None, &mut notices),
            PipelineEvent::BeginEdit => self.begin_edit(),
            PipelineEvent::Input(text) => self.input(text),
            PipelineEvent::InsertStage { index, kind } => {
                self.insert_stage(index, kind, &mut notices)
            }
            PipelineEvent::MoveStage { from, to } => {
                self.focus.clear_range();
                guarded("move", self.list.move_stage(from, to));
            }
        }

        self.reconcile(now, &mut notices);
        notices
    }

    /// Resolve `chord` through the key map and handle the bound event.
    pub fn key(&mut self, chord: &KeyChord) -> Vec<Notice> {
        match self.keymap.resolve(chord) {
            Some(action) => self.handle(action.to_event()),
            None => {
                tracing::trace!("Unbound key {}", chord);
                Vec::new()
            }
        }
    }

    /// Try to take focus away from the focused stage.
    fn release(&mut self, notices: &mut Vec<Notice>) -> Release {
        let Some(id) = self.focus.cursor().stage() else {
            return Release::Kept;
        };
        let Some(stage) = self.list.stage_mut(id) else {
            return Release::Kept;
        };
        if stage.is_dirty() {
            tracing::debug!("Stage {} has unsaved text; focus stays", id);
            notices.push(Notice::FocusBlocked { stage: id });
            return Release::Blocked;
        }
        if stage.is_editing() {
            guarded("discard", stage.discard());
        }
        if !stage.is_empty() {
            return Release::Kept;
        }
        match self.list.index_of(id) {
            Some(index) => {
                guarded("remove", self.list.remove_at(index));
                Release::Removed(index)
            }
            None => Release::Kept,
        }
    }

    fn move_focus(&mut self, target: Cursor, notices: &mut Vec<Notice>) {
        if target == self.focus.cursor() {
            return;
        }
        if !matches!(self.release(notices), Release::Blocked) {
            self.focus.set(target);
        }
    }

    fn navigate(&mut self, direction: Direction, extend: bool, notices: &mut Vec<Notice>) {
        let Some(target) = self.focus.neighbour(&self.list, direction) else {
            return;
        };
        match self.release(notices) {
            Release::Blocked => {}
            Release::Kept if extend => self.focus.extend_to(target),
            Release::Kept | Release::Removed(_) => self.focus.set(target),
        }
    }

    fn delete_active(&mut self) {
        let Some(id) = self.focus.cursor().stage() else {
            return;
        };
        let Some(index) = self.list.index_of(id) else {
            return;
        };
        if self.list.get(index).is_some_and(|s| s.is_editing()) {
            tracing::trace!("Stage {} is being edited; not deleting", id);
            return;
        }
        if guarded("delete", self.list.remove_at(index)).is_some() {
            tracing::debug!("Deleted stage {} at {}", id, index);
            let next = Cursor::at_slot(&self.list, index.saturating_sub(1));
            self.focus.set(next);
        }
    }

    fn delete_selection(&mut self) {
        let Some(range) = self.focus.selection(&self.list) else {
            return;
        };
        let start = *range.start();
        if self.list.stages()[range.clone()].iter().any(|s| s.is_editing()) {
            tracing::trace!("Selection contains an edit in progress; not deleting");
            return;
        }
        if let Some(removed) = guarded("delete selection", self.list.remove_range(range)) {
            tracing::debug!("Deleted {} stages from {}", removed.len(), start);
            let next = Cursor::at_slot(&self.list, start.saturating_sub(1));
            self.focus.set(next);
        }
    }

    fn commit_focused(&mut self, notices: &mut Vec<Notice>) {
        self.focus.clear_range();
        let Some(id) = self.focus.cursor().stage() else {
            return;
        };
        let Some(index) = self.list.index_of(id) else {
            return;
        };
        let is_last = index + 1 == self.list.len();
        let Some(stage) = self.list.get(index) else {
            return;
        };

        if !stage.is_editing() {
            match stage.validity() {
                Validity::Empty => self.drop_empty(index),
                Validity::Valid if is_last => self.focus.set(Cursor::Tail),
                // Focus stays until the stage is fixed
                Validity::Invalid(reason) => {
                    notices.push(Notice::StageInvalid { stage: id, reason })
                }
                Validity::Valid | Validity::Editing => {}
            }
            return;
        }

        match guarded("commit", self.list.commit(id, &self.grammar)) {
            Some(CommitOutcome::Valid { changed }) => {
                tracing::debug!("Committed stage {} (changed: {})", id, changed);
                if is_last {
                    self.focus.set(Cursor::Tail);
                }
            }
            Some(CommitOutcome::Invalid(reason)) => {
                tracing::debug!("Stage {} invalid: {}", id, reason);
                notices.push(Notice::StageInvalid { stage: id, reason });
            }
            Some(CommitOutcome::Cleared) => self.drop_empty(index),
            None => {}
        }
    }

    fn discard_focused(&mut self) {
        self.focus.clear_range();
        let Some(id) = self.focus.cursor().stage() else {
            return;
        };
        let Some(stage) = self.list.stage_mut(id) else {
            return;
        };
        if !stage.is_editing() {
            return;
        }
        guarded("discard", stage.discard());
        if stage.is_empty() {
            if let Some(index) = self.list.index_of(id) {
                self.drop_empty(index);
            }
        }
    }

    /// Remove an empty stage and put focus on whatever now sits there.
    fn drop_empty(&mut self, index: usize) {
        if guarded("remove", self.list.remove_at(index)).is_some() {
            self.focus.set(Cursor::at_slot(&self.list, index));
        }
    }

    fn begin_edit(&mut self) {
        self.focus.clear_range();
        match self.focus.cursor() {
            Cursor::Stage(id) => {
                if let Some(stage) = self.list.stage_mut(id) {
                    if !stage.is_editing() && guarded("begin edit", stage.begin_edit()).is_some() {
                        self.edit_started(id);
                    }
                }
            }
            Cursor::Tail => {
                self.materialize(self.editor.default_kind);
            }
            Cursor::None => {}
        }
    }

    fn input(&mut self, text: String) {
        self.focus.clear_range();
        let id = match self.focus.cursor() {
            Cursor::Stage(id) => {
                let Some(stage) = self.list.stage_mut(id) else {
                    return;
                };
                if !stage.is_editing() {
                    if guarded("begin edit", stage.begin_edit()).is_none() {
                        return;
                    }
                    self.edit_started(id);
                }
                id
            }
            Cursor::Tail if text.trim().is_empty() => return,
            Cursor::Tail => {
                let kind =
                    GrammarRegistry::prefix_kind(&text).unwrap_or(self.editor.default_kind);
                match self.materialize(kind) {
                    Some(id) => id,
                    None => return,
                }
            }
            Cursor::None => {
                tracing::trace!("Input with nothing focused");
                return;
            }
        };
        if let Some(stage) = self.list.stage_mut(id) {
            guarded("update text", stage.update_text(text, &self.grammar));
        }
    }

    /// Turn the tail into an editing stage and focus it.
    fn materialize(&mut self, kind: StageKind) -> Option<StageId> {
        let id = self.list.materialize_tail(kind);
        let stage = self.list.stage_mut(id)?;
        guarded("begin edit", stage.begin_edit())?;
        self.focus.set(Cursor::Stage(id));
        self.edit_started(id);
        Some(id)
    }

    /// A new edit makes any in-flight sync stale.
    fn edit_started(&mut self, id: StageId) {
        if let Some(token) = self.sync.supersede() {
            tracing::debug!("Edit of stage {} supersedes sync {}", id, token);
        }
    }

    fn insert_stage(&mut self, index: usize, kind: StageKind, notices: &mut Vec<Notice>) {
        self.focus.clear_range();
        if index > self.list.len() {
            tracing::debug!("Ignored insert at {} of {}", index, self.list.len());
            return;
        }
        let index = match self.release(notices) {
            Release::Blocked => return,
            Release::Removed(removed) if removed < index => index - 1,
            Release::Removed(_) | Release::Kept => index,
        };
        if let Some(id) = guarded("insert", self.list.insert_at(index, kind)) {
            self.focus.set(Cursor::Stage(id));
        }
    }

    /// Replace the pipeline with previously serialized stages.
    ///
    /// Every stage is decoded before anything changes, so a bad entry leaves
    /// the current pipeline untouched.
    pub fn load_serialized(&mut self, stages: &[SerializedStage]) -> Result<Vec<Notice>> {
        self.load_serialized_at(stages, Instant::now())
    }

    pub fn load_serialized_at(
        &mut self,
        stages: &[SerializedStage],
        now: Instant,
    ) -> Result<Vec<Notice>> {
        if self.state == PipelineState::Idle {
            return Err(PipelineError::NotActive.into());
        }
        let decoded = stages
            .iter()
            .map(SerializedStage::decode)
            .collect::<Result<Vec<_>>>()?;

        let mut notices = Vec::new();
        self.list.clear();
        self.sync.supersede();
        for (kind, parameters) in decoded {
            let id = self.list.materialize_tail(kind);
            let text = render_text(kind, &parameters);
            if let Some(stage) = self.list.stage_mut(id) {
                guarded("begin edit", stage.begin_edit());
                guarded("update text", stage.update_text(text, &self.grammar));
            }
            if let Some(CommitOutcome::Invalid(reason)) =
                guarded("commit", self.list.commit(id, &self.grammar))
            {
                notices.push(Notice::StageInvalid { stage: id, reason });
            }
        }
        self.focus.set(Cursor::Tail);
        tracing::info!("Loaded {} stages", self.list.len());

        self.reconcile(now, &mut notices);
        Ok(notices)
    }

    /// The committed pipeline in wire form
    pub fn export_serialized(&self) -> Vec<SerializedStage> {
        serialize_pipeline(&self.list.committed_pipeline())
    }

    // ==================== Session events ====================

    pub fn poll(&mut self) -> Vec<Notice> {
        self.poll_at(Instant::now())
    }

    /// Drain session events, check timeouts and sync if needed.
    ///
    /// Call once per frame.
    pub fn poll_at(&mut self, now: Instant) -> Vec<Notice> {
        let mut notices = Vec::new();
        for event in self.channel.poll_events() {
            self.apply_session_event(event, now, &mut notices);
        }
        self.check_timeouts(now, &mut notices);
        self.reconcile(now, &mut notices);
        notices
    }

    fn apply_session_event(&mut self, event: SessionEvent, now: Instant, notices: &mut Vec<Notice>) {
        if self.state == PipelineState::Idle {
            tracing::trace!("Dropped session event while idle: {:?}", event);
            return;
        }
        match event {
            SessionEvent::Attached { summary } => {
                if !matches!(self.state, PipelineState::Connecting { .. }) {
                    tracing::trace!("Unexpected attach acknowledgement in {}", self.status());
                    return;
                }
                tracing::info!("Session attached: {}", summary);
                self.sync.attached(summary);
                self.transition(Signal::Attached, now);
            }
            SessionEvent::PipelineAccepted { token, summary } => {
                match self.sync.accept(token, summary) {
                    Resolution::Applied => tracing::debug!("Sync {} accepted", token),
                    Resolution::Stale => tracing::trace!("Dropped stale acceptance {}", token),
                }
            }
            SessionEvent::PipelineRejected {
                token,
                stage_index,
                reason,
            } => {
                let Some(rejected) = self.sync.reject(token) else {
                    tracing::trace!("Dropped stale rejection {}", token);
                    return;
                };
                let Some(id) = rejected.stage_at(stage_index) else {
                    self.fault(
                        format!("Backend rejected unknown stage index {}", stage_index),
                        now,
                        notices,
                    );
                    return;
                };
                tracing::warn!("Backend rejected stage {} ({}): {}", stage_index, id, reason);
                if let Some(stage) = self.list.stage_mut(id) {
                    stage.reject(reason.clone());
                }
                notices.push(Notice::SyncRejected { stage: id, reason });
            }
            SessionEvent::Fault { message } => self.fault(message, now, notices),
            SessionEvent::Detached => tracing::trace!("Backend confirmed detach"),
        }
    }

    fn check_timeouts(&mut self, now: Instant, notices: &mut Vec<Notice>) {
        if let PipelineState::Connecting { since } = self.state {
            let timeout = self.session_config.attach_timeout();
            if now.saturating_duration_since(since) >= timeout {
                let err = ViewBarError::Timeout(format!("attach timed out after {:?}", timeout));
                self.fault(err.to_string(), now, notices);
                return;
            }
        }
        let timeout = self.session_config.sync_timeout();
        if let Some(token) = self.sync.timed_out(now, timeout) {
            let err = ViewBarError::Timeout(format!("sync {} timed out after {:?}", token, timeout));
            self.fault(err.to_string(), now, notices);
        }
    }

    /// Send the committed pipeline if it differs from what the backend has.
    fn reconcile(&mut self, now: Instant, notices: &mut Vec<Notice>) {
        if matches!(self.state, PipelineState::Running | PipelineState::Syncing)
            && !self.list.has_editing()
        {
            let desired = self.list.committed_pipeline();
            if self.sync.needs_dispatch(&desired) {
                let payload = serialize_pipeline(&desired);
                let token = self.sync.begin(desired, now);
                tracing::debug!("Dispatching sync {} ({} stages)", token, payload.len());
                if let Err(e) = self.channel.commit(token, &payload) {
                    self.fault(format!("Failed to send pipeline: {}", e), now, notices);
                    return;
                }
                self.transition(Signal::Dispatch, now);
            }
        }
        if self.state == PipelineState::Syncing && !self.sync.is_live() {
            self.transition(Signal::Settle, now);
        }
    }

    /// Channel fault: enter `error`, keep the local pipeline.
    fn fault(&mut self, message: String, now: Instant, notices: &mut Vec<Notice>) {
        if !matches!(
            self.state,
            PipelineState::Connecting { .. } | PipelineState::Running | PipelineState::Syncing
        ) {
            tracing::trace!("Fault ignored in {}: {}", self.status(), message);
            return;
        }
        tracing::warn!("Session fault: {}", message);
        self.sync.reset();
        self.error_visible = true;
        notices.push(Notice::Fault {
            message: message.clone(),
        });
        self.transition(Signal::Fault(message), now);
    }

    fn transition(&mut self, signal: Signal, now: Instant) {
        match self.state.on(&signal, now) {
            Some(next) => {
                if next.status() != self.state.status() {
                    tracing::info!("Pipeline {} -> {}", self.state.status(), next.status());
                }
                self.state = next;
            }
            None => tracing::trace!("Signal {:?} ignored in {}", signal, self.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::channel::MockSessionChannel;
    use crate::stage::SyncToken;
    use crate::types::PipelineSummary;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Sent = Arc<Mutex<Vec<(SyncToken, Vec<SerializedStage>)>>>;

    struct Harness {
        machine: PipelineMachine,
        sent: Sent,
        attaches: Arc<Mutex<Vec<DatasetId>>>,
        inbox: Arc<Mutex<Vec<SessionEvent>>>,
        now: Instant,
    }

    fn recording_channel(
        sent: &Sent,
        attaches: &Arc<Mutex<Vec<DatasetId>>>,
        inbox: &Arc<Mutex<Vec<SessionEvent>>>,
    ) -> MockSessionChannel {
        let mut channel = MockSessionChannel::new();
        let s = sent.clone();
        channel.expect_commit().returning(move |token, stages| {
            s.lock().unwrap().push((token, stages.to_vec()));
            Ok(())
        });
        let a = attaches.clone();
        channel.expect_attach().returning(move |dataset| {
            a.lock().unwrap().push(dataset.clone());
            Ok(())
        });
        channel.expect_detach().returning(|| Ok(()));
        let i = inbox.clone();
        channel
            .expect_poll_events()
            .returning(move || std::mem::take(&mut *i.lock().unwrap()));
        channel
            .expect_endpoint()
            .return_const("mock://test".to_string());
        channel
    }

    impl Harness {
        fn new() -> Self {
            let sent: Sent = Arc::default();
            let attaches = Arc::default();
            let inbox = Arc::default();
            let channel = recording_channel(&sent, &attaches, &inbox);
            Self {
                machine: PipelineMachine::new(Box::new(channel), &ViewBarConfig::default()),
                sent,
                attaches,
                inbox,
                now: Instant::now(),
            }
        }

        /// Attached and running with an empty pipeline
        fn running() -> Self {
            let mut h = Self::new();
            h.machine
                .attach_at(DatasetId::new("quickstart"), h.now)
                .unwrap();
            h.deliver(SessionEvent::Attached {
                summary: PipelineSummary::new(12, 12, vec![]),
            });
            assert_eq!(h.machine.status(), SessionStatus::Running);
            h
        }

        fn event(&mut self, event: PipelineEvent) -> Vec<Notice> {
            self.machine.handle_at(event, self.now)
        }

        fn deliver(&mut self, event: SessionEvent) -> Vec<Notice> {
            self.inbox.lock().unwrap().push(event);
            self.machine.poll_at(self.now)
        }

        /// Type into the focused slot and commit
        fn enter(&mut self, text: &str) -> Vec<Notice> {
            let mut notices = self.event(PipelineEvent::Input(text.to_string()));
            notices.extend(self.event(PipelineEvent::CommitFocused));
            notices
        }

        fn last_sent(&self) -> (SyncToken, Vec<SerializedStage>) {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn accept_latest(&mut self, count: u64) {
            let (token, _) = self.last_sent();
            self.deliver(SessionEvent::PipelineAccepted {
                token,
                summary: PipelineSummary::new(count, 12, vec![]),
            });
        }

        /// Build a settled pipeline from `texts`, acknowledged by the backend
        fn with_stages(texts: &[&str]) -> Self {
            let mut h = Self::running();
            for text in texts {
                h.enter(text);
                h.accept_latest(texts.len() as u64);
            }
            h
        }

        fn ids(&self) -> Vec<StageId> {
            self.machine.list().stages().iter().map(|s| s.id()).collect()
        }
    }

    #[test]
    fn test_attach_starts_connecting_then_running() {
        let mut h = Harness::new();
        assert_eq!(h.machine.status(), SessionStatus::Idle);
        h.machine
            .attach_at(DatasetId::new("quickstart"), h.now)
            .unwrap();
        assert_eq!(h.machine.status(), SessionStatus::Connecting);
        assert_eq!(h.attaches.lock().unwrap().len(), 1);

        h.deliver(SessionEvent::Attached {
            summary: PipelineSummary::new(12, 12, vec![]),
        });
        assert_eq!(h.machine.status(), SessionStatus::Running);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
        assert_eq!(h.sent_count(), 0);
        assert_eq!(h.machine.snapshot().summary.unwrap().sample_count, 12);
    }

    #[test]
    fn test_typing_into_tail_and_committing_syncs_one_stage() {
        let mut h = Harness::running();
        h.event(PipelineEvent::Input("match: label == \"cat\"".into()));
        assert_eq!(h.machine.list().len(), 1);
        assert_eq!(h.sent_count(), 0, "no sync while editing");

        let notices = h.event(PipelineEvent::CommitFocused);
        assert!(notices.is_empty());
        let list = h.machine.list();
        assert_eq!(list.len(), 1);
        assert!(list.get(0).unwrap().is_valid());
        assert_eq!(list.get(0).unwrap().kind(), StageKind::Match);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);

        let (token, stages) = h.last_sent();
        assert_eq!(h.sent_count(), 1);
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].class, "fiftyone.core.stages.Match");
        assert_eq!(h.machine.status(), SessionStatus::Syncing);

        h.accept_latest(4);
        assert_eq!(h.machine.status(), SessionStatus::Running);
        assert_eq!(h.machine.snapshot().summary.unwrap().sample_count, 4);
        assert!(h.machine.sync().live().is_none());
        assert!(token > SyncToken::NONE);
    }

    #[test]
    fn test_navigate_right_then_delete_focuses_previous() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[0]));
        h.event(PipelineEvent::NavigateRight);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[1]));

        h.event(PipelineEvent::DeleteActive);
        assert_eq!(h.ids(), vec![ids[0]]);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[0]));

        let (_, stages) = h.last_sent();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].class, "fiftyone.core.stages.Limit");
    }

    #[test]
    fn test_delete_first_stage_focuses_new_first() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[0]));
        h.event(PipelineEvent::DeleteActive);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[1]));

        h.event(PipelineEvent::DeleteActive);
        assert!(h.machine.list().is_empty());
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
    }

    #[test]
    fn test_delete_with_nothing_focused_or_editing_is_noop() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        h.event(PipelineEvent::Blur);
        h.event(PipelineEvent::DeleteActive);
        assert_eq!(h.machine.list().len(), 1);

        let id = h.ids()[0];
        h.event(PipelineEvent::FocusStage(id));
        h.event(PipelineEvent::Input("limit: 6".into()));
        h.event(PipelineEvent::DeleteActive);
        assert_eq!(h.machine.list().len(), 1);
    }

    #[test]
    fn test_backend_rejection_marks_only_that_stage() {
        let mut h = Harness::running();
        h.enter("limit: 5");
        h.accept_latest(5);
        h.enter("exists: nonexistent");
        let (token, stages) = h.last_sent();
        assert_eq!(stages.len(), 2);

        let notices = h.deliver(SessionEvent::PipelineRejected {
            token,
            stage_index: 1,
            reason: "unknown field".into(),
        });
        let list = h.machine.list();
        assert!(list.get(0).unwrap().is_valid());
        assert_eq!(
            list.get(1).unwrap().validity(),
            Validity::Invalid("unknown field".into())
        );
        assert!(matches!(&notices[0], Notice::SyncRejected { reason, .. } if reason == "unknown field"));
        // The remaining valid pipeline already matches what the backend has
        assert_eq!(h.sent_count(), 2);
        assert_eq!(h.machine.status(), SessionStatus::Running);
    }

    #[test]
    fn test_edit_during_sync_makes_acceptance_stale() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1", "take: 2"]);
        h.event(PipelineEvent::FocusStage(h.ids()[0]));
        h.event(PipelineEvent::Input("limit: 9".into()));
        h.event(PipelineEvent::CommitFocused);
        let (in_flight, stages) = h.last_sent();
        assert_eq!(stages.len(), 3);

        // New edit on stage 0 while that sync is out
        h.event(PipelineEvent::Input("limit: 7".into()));
        assert!(h.machine.sync().live().is_none());
        let before = h.machine.snapshot().summary;

        h.deliver(SessionEvent::PipelineAccepted {
            token: in_flight,
            summary: PipelineSummary::new(1, 12, vec![]),
        });
        assert_eq!(h.machine.snapshot().summary, before);

        h.event(PipelineEvent::CommitFocused);
        let (fresh, _) = h.last_sent();
        assert!(fresh > in_flight);
    }

    #[test]
    fn test_invalid_commit_is_excluded_from_sync() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        let sent = h.sent_count();
        let notices = h.enter("limit: ten");
        assert!(matches!(notices[0], Notice::StageInvalid { .. }));
        assert_eq!(h.machine.list().len(), 2);
        // Focus stays on the invalid stage
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(h.ids()[1]));
        // The valid sequence did not change, so nothing new goes out
        assert_eq!(h.sent_count(), sent);
    }

    #[test]
    fn test_dirty_edit_blocks_focus_change() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[1]));
        h.event(PipelineEvent::Input("skip: 3".into()));

        let notices = h.event(PipelineEvent::NavigateLeft);
        assert_eq!(notices, vec![Notice::FocusBlocked { stage: ids[1] }]);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[1]));

        h.event(PipelineEvent::Discard);
        h.event(PipelineEvent::NavigateLeft);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[0]));
        assert_eq!(h.machine.list().get(1).unwrap().raw_text(), "skip: 1");
    }

    #[test]
    fn test_navigation_bounds_are_noops() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        let id = h.ids()[0];
        h.event(PipelineEvent::NavigateRight);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
        h.event(PipelineEvent::NavigateLeft);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(id));
        h.event(PipelineEvent::NavigateLeft);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(id));
    }

    #[test]
    fn test_shortcuts_ignored_while_bar_unfocused() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        h.event(PipelineEvent::NavigateLeft);
        h.event(PipelineEvent::ToggleBarFocus);
        assert!(!h.machine.focus().bar_focused());

        h.event(PipelineEvent::DeleteActive);
        assert_eq!(h.machine.list().len(), 1);

        h.event(PipelineEvent::ToggleBarFocus);
        h.event(PipelineEvent::DeleteActive);
        assert!(h.machine.list().is_empty());
    }

    #[test]
    fn test_unchanged_commit_advances_without_sync() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        let sent = h.sent_count();
        h.event(PipelineEvent::NavigateLeft);
        h.event(PipelineEvent::BeginEdit);
        h.event(PipelineEvent::CommitFocused);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
        assert_eq!(h.sent_count(), sent);

        h.event(PipelineEvent::NavigateLeft);
        h.event(PipelineEvent::CommitFocused);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
    }

    #[test]
    fn test_commit_in_middle_keeps_focus() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[0]));
        h.enter("limit: 6");
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[0]));
    }

    #[test]
    fn test_discard_new_stage_returns_to_tail() {
        let mut h = Harness::running();
        h.event(PipelineEvent::Input("limit: 5".into()));
        assert_eq!(h.machine.list().len(), 1);
        h.event(PipelineEvent::Discard);
        assert!(h.machine.list().is_empty());
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
    }

    #[test]
    fn test_blank_commit_on_new_stage_removes_it() {
        let mut h = Harness::running();
        h.event(PipelineEvent::BeginEdit);
        assert_eq!(h.machine.list().len(), 1);
        h.event(PipelineEvent::CommitFocused);
        assert!(h.machine.list().is_empty());
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
    }

    #[test]
    fn test_extend_and_delete_selection() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1", "take: 2"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[0]));
        h.event(PipelineEvent::ExtendRight);
        assert_eq!(h.machine.focus().selection(h.machine.list()), Some(0..=1));
        assert!(h.machine.snapshot().slots[1].selected);

        h.event(PipelineEvent::DeleteSelection);
        assert_eq!(h.ids(), vec![ids[2]]);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[2]));
        let (_, stages) = h.last_sent();
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn test_plain_navigation_clears_range() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1", "take: 2"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[0]));
        h.event(PipelineEvent::ExtendRight);
        h.event(PipelineEvent::NavigateRight);
        assert_eq!(h.machine.focus().selection(h.machine.list()), None);
    }

    #[test]
    fn test_insert_and_move() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        h.event(PipelineEvent::InsertStage {
            index: 0,
            kind: StageKind::Take,
        });
        assert_eq!(h.machine.list().len(), 3);
        let inserted = h.ids()[0];
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(inserted));

        h.enter("take: 3");
        assert!(h.machine.list().get(0).unwrap().is_valid());
        h.accept_latest(3);

        h.event(PipelineEvent::MoveStage { from: 0, to: 2 });
        assert_eq!(h.ids()[2], inserted);
        let (_, stages) = h.last_sent();
        assert_eq!(stages[2].class, "fiftyone.core.stages.Take");
    }

    #[test]
    fn test_leaving_empty_inserted_stage_removes_it() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::InsertStage {
            index: 1,
            kind: StageKind::Take,
        });
        assert_eq!(h.machine.list().len(), 3);
        h.event(PipelineEvent::NavigateRight);
        assert_eq!(h.ids(), ids);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(ids[1]));
    }

    #[test]
    fn test_delete_racing_in_flight_sync_goes_stale() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let ids = h.ids();
        h.event(PipelineEvent::FocusStage(ids[1]));
        h.enter("skip: 2");
        let (in_flight, _) = h.last_sent();

        h.event(PipelineEvent::FocusStage(ids[1]));
        h.event(PipelineEvent::DeleteActive);
        let (after_delete, stages) = h.last_sent();
        assert!(after_delete > in_flight);
        assert_eq!(stages.len(), 1);

        let notices = h.deliver(SessionEvent::PipelineRejected {
            token: in_flight,
            stage_index: 1,
            reason: "late".into(),
        });
        assert!(notices.is_empty());
        assert_eq!(h.machine.list().len(), 1);
        assert!(h.machine.list().get(0).unwrap().is_valid());
    }

    #[test]
    fn test_fault_keeps_pipeline_and_retry_resends() {
        let mut h = Harness::with_stages(&["limit: 5", "skip: 1"]);
        let notices = h.deliver(SessionEvent::Fault {
            message: "connection reset".into(),
        });
        assert!(matches!(&notices[0], Notice::Fault { message } if message == "connection reset"));
        assert_eq!(h.machine.status(), SessionStatus::Error);
        assert_eq!(h.machine.error_message(), Some("connection reset"));
        assert_eq!(h.machine.list().len(), 2);

        // Local edits still work while in error; nothing is sent
        let sent = h.sent_count();
        h.enter("take: 1");
        assert_eq!(h.machine.list().len(), 3);
        assert_eq!(h.sent_count(), sent);

        h.machine.dismiss_error();
        assert_eq!(h.machine.error_message(), None);
        assert_eq!(h.machine.status(), SessionStatus::Error);

        h.machine.retry_at(h.now).unwrap();
        assert_eq!(h.machine.status(), SessionStatus::Connecting);
        assert_eq!(h.attaches.lock().unwrap().len(), 2);
        h.deliver(SessionEvent::Attached {
            summary: PipelineSummary::new(12, 12, vec![]),
        });
        let (_, stages) = h.last_sent();
        assert_eq!(stages.len(), 3);
        assert_eq!(h.machine.status(), SessionStatus::Syncing);
    }

    #[test]
    fn test_retry_outside_error_is_rejected() {
        let mut h = Harness::running();
        assert!(matches!(h.machine.retry(), Err(ViewBarError::Session(_))));
    }

    #[test]
    fn test_sync_timeout_is_fault() {
        let mut h = Harness::running();
        h.enter("limit: 5");
        assert_eq!(h.machine.status(), SessionStatus::Syncing);

        let timeout = SessionConfig::default().sync_timeout();
        h.machine.poll_at(h.now + timeout / 2);
        assert_eq!(h.machine.status(), SessionStatus::Syncing);
        let notices = h.machine.poll_at(h.now + timeout);
        assert!(matches!(notices[0], Notice::Fault { .. }));
        assert_eq!(h.machine.status(), SessionStatus::Error);
        assert_eq!(h.machine.list().len(), 1);
    }

    #[test]
    fn test_attach_timeout_is_fault() {
        let mut h = Harness::new();
        h.machine
            .attach_at(DatasetId::new("quickstart"), h.now)
            .unwrap();
        let timeout = SessionConfig::default().attach_timeout();
        h.machine.poll_at(h.now + timeout);
        assert_eq!(h.machine.status(), SessionStatus::Error);
    }

    #[test]
    fn test_send_failure_is_fault() {
        let mut channel = MockSessionChannel::new();
        channel.expect_attach().returning(|_| Ok(()));
        channel
            .expect_commit()
            .returning(|_, _| Err(ViewBarError::Channel("session worker disconnected".into())));
        channel.expect_poll_events().returning(Vec::new);
        channel.expect_endpoint().return_const("mock://broken".to_string());

        let mut machine = PipelineMachine::new(Box::new(channel), &ViewBarConfig::default());
        let now = Instant::now();
        machine.attach_at(DatasetId::new("quickstart"), now).unwrap();
        machine.apply_session_event(
            SessionEvent::Attached {
                summary: PipelineSummary::new(1, 1, vec![]),
            },
            now,
            &mut Vec::new(),
        );
        machine.handle_at(PipelineEvent::Input("limit: 1".into()), now);
        let notices = machine.handle_at(PipelineEvent::CommitFocused, now);
        assert!(matches!(&notices[0], Notice::Fault { message } if message.contains("disconnected")));
        assert_eq!(machine.status(), SessionStatus::Error);
    }

    #[test]
    fn test_idle_ignores_events() {
        let mut h = Harness::new();
        let notices = h.event(PipelineEvent::Input("limit: 5".into()));
        assert!(notices.is_empty());
        assert!(h.machine.list().is_empty());
        assert!(h
            .machine
            .load_serialized(&[])
            .is_err());
    }

    #[test]
    fn test_load_and_export_serialized() {
        let mut h = Harness::running();
        let json = r#"[
            {"_cls": "fiftyone.core.stages.Limit", "kwargs": [["limit", 3]]},
            {"_cls": "SortBy", "kwargs": [["field_or_expr", "confidence"], ["reverse", true]]}
        ]"#;
        let stages: Vec<SerializedStage> = serde_json::from_str(json).unwrap();
        let notices = h.machine.load_serialized_at(&stages, h.now).unwrap();
        assert!(notices.is_empty());

        let list = h.machine.list();
        assert_eq!(list.len(), 2);
        assert!(list.stages().iter().all(|s| s.is_valid()));
        assert_eq!(list.get(1).unwrap().kind(), StageKind::SortBy);
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);

        let exported = h.machine.export_serialized();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].class, "fiftyone.core.stages.Limit");
        let (_, sent) = h.last_sent();
        assert_eq!(sent, exported);
    }

    #[test]
    fn test_load_bad_entry_leaves_pipeline() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        let bad = SerializedStage {
            class: "GroupBy".into(),
            kwargs: vec![],
        };
        assert!(h.machine.load_serialized(&[bad]).is_err());
        assert_eq!(h.machine.list().len(), 1);
    }

    #[test]
    fn test_detach_clears_everything() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        h.machine.detach();
        assert_eq!(h.machine.status(), SessionStatus::Idle);
        assert!(h.machine.list().is_empty());
        assert!(h.machine.session().is_none());
        assert!(h.machine.snapshot().summary.is_none());

        // Late events from the old session are dropped
        let notices = h.deliver(SessionEvent::Fault {
            message: "late".into(),
        });
        assert!(notices.is_empty());
        assert_eq!(h.machine.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_key_chords_resolve_through_keymap() {
        let mut h = Harness::running();
        h.event(PipelineEvent::Input("limit: 5".into()));
        h.machine.key(&KeyChord::new("Enter"));
        assert!(h.machine.list().get(0).unwrap().is_valid());
        h.machine.key(&KeyChord::new("ArrowLeft"));
        h.machine.key(&KeyChord::new("Backspace"));
        assert!(h.machine.list().is_empty());
        assert!(h.machine.key(&KeyChord::new("F13")).is_empty());
    }

    #[test]
    fn test_recommitting_invalid_last_stage_keeps_focus() {
        let mut h = Harness::running();
        let notices = h.enter("limit: lots");
        let id = h.ids()[0];
        assert!(matches!(&notices[..], [Notice::StageInvalid { stage, .. }] if *stage == id));
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(id));

        let notices = h.event(PipelineEvent::CommitFocused);
        assert_eq!(h.machine.focus().cursor(), Cursor::Stage(id));
        assert!(matches!(&notices[..], [Notice::StageInvalid { stage, .. }] if *stage == id));
        assert!(!h.machine.list().get(0).unwrap().is_valid());
        assert_eq!(h.sent_count(), 0);
    }

    #[test]
    fn test_recommitting_valid_last_stage_advances_to_tail() {
        let mut h = Harness::with_stages(&["limit: 5"]);
        let id = h.ids()[0];
        h.event(PipelineEvent::FocusStage(id));
        let sent = h.sent_count();
        assert!(h.event(PipelineEvent::CommitFocused).is_empty());
        assert_eq!(h.machine.focus().cursor(), Cursor::Tail);
        assert_eq!(h.sent_count(), sent);
    }

    #[test]
    fn test_acceptance_before_timeout_settles() {
        let mut h = Harness::running();
        h.enter("limit: 5");
        h.now += Duration::from_millis(10);
        h.accept_latest(5);
        assert_eq!(h.machine.status(), SessionStatus::Running);
    }
}
