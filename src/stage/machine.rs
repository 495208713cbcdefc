//! Per-stage state machine
//!
//! ```text
//!            begin_edit              commit (parses)
//!   Empty ─────────────► Editing ─────────────────► Valid
//!     ▲                  │  ▲  ▲                      │
//!     │     discard      │  │  └──── begin_edit ──────┘
//!     └──────────────────┘  │
//!                           │ begin_edit
//!                        Invalid ◄── commit (parse error) / backend reject
//! ```
//!
//! `Editing` remembers the settled state it came from so `discard` can
//! restore text, kind and parameters exactly.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::stage::grammar::GrammarRegistry;
use crate::stage::id::StageId;
use crate::stage::kind::StageKind;
use crate::stage::value::Parameters;
use serde::Serialize;

/// Externally visible validity of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Validity {
    Empty,
    Editing,
    Valid,
    Invalid(String),
}

impl Validity {
    pub fn display_name(&self) -> &'static str {
        match self {
            Validity::Empty => "empty",
            Validity::Editing => "editing",
            Validity::Valid => "valid",
            Validity::Invalid(_) => "invalid",
        }
    }
}

/// A state the stage can rest in outside of an edit.
#[derive(Debug, Clone, PartialEq)]
enum Settled {
    Empty,
    Valid,
    Invalid(String),
}

impl Settled {
    fn name(&self) -> &'static str {
        match self {
            Settled::Empty => "empty",
            Settled::Valid => "valid",
            Settled::Invalid(_) => "invalid",
        }
    }
}

/// Everything `discard` needs to put back.
#[derive(Debug, Clone, PartialEq)]
struct Baseline {
    text: String,
    kind: StageKind,
    parameters: Parameters,
    settled: Settled,
}

#[derive(Debug, Clone, PartialEq)]
enum StageState {
    Settled(Settled),
    Editing {
        baseline: Baseline,
        /// Latest keystroke-time syntax error, if any
        hint: Option<String>,
    },
}

/// Result of committing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Parsed; `changed` is false when kind and parameters match the baseline
    Valid { changed: bool },
    /// Parse failed; the stage is now `invalid(reason)`
    Invalid(String),
    /// Blank text on a stage that had never been committed
    Cleared,
}

impl CommitOutcome {
    /// Whether the committed pipeline may differ from before
    pub fn needs_sync(&self) -> bool {
        match self {
            CommitOutcome::Valid { changed } => *changed,
            CommitOutcome::Invalid(_) | CommitOutcome::Cleared => true,
        }
    }
}

/// One pipeline stage and its edit lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    id: StageId,
    kind: StageKind,
    raw_text: String,
    parameters: Parameters,
    state: StageState,
}

impl Stage {
    /// A fresh, empty stage
    pub fn new(id: StageId, kind: StageKind) -> Self {
        Self {
            id,
            kind,
            raw_text: String::new(),
            parameters: Parameters::new(),
            state: StageState::Settled(Settled::Empty),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Parameters of the last successful commit (empty unless valid)
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn validity(&self) -> Validity {
        match &self.state {
            StageState::Settled(Settled::Empty) => Validity::Empty,
            StageState::Settled(Settled::Valid) => Validity::Valid,
            StageState::Settled(Settled::Invalid(reason)) => Validity::Invalid(reason.clone()),
            StageState::Editing { .. } => Validity::Editing,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, StageState::Settled(Settled::Valid))
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, StageState::Editing { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, StageState::Settled(Settled::Empty))
    }

    /// Keystroke-time syntax error while editing
    pub fn syntax_hint(&self) -> Option<&str> {
        match &self.state {
            StageState::Editing { hint, .. } => hint.as_deref(),
            StageState::Settled(_) => None,
        }
    }

    /// Editing with text that differs from the pre-edit text
    pub fn is_dirty(&self) -> bool {
        match &self.state {
            StageState::Editing { baseline, .. } => baseline.text != self.raw_text,
            StageState::Settled(_) => false,
        }
    }

    /// Focus may leave this stage without losing data
    pub fn can_release_focus(&self) -> bool {
        !self.is_dirty()
    }

    fn state_name(&self) -> &'static str {
        match &self.state {
            StageState::Settled(s) => s.name(),
            StageState::Editing { .. } => "editing",
        }
    }

    /// Empty | Valid | Invalid → Editing, capturing the undo baseline.
    pub fn begin_edit(&mut self) -> PipelineResult<()> {
        let settled = match &self.state {
            StageState::Settled(s) => s.clone(),
            StageState::Editing { .. } => {
                return Err(PipelineError::InvalidTransition {
                    from: "editing",
                    op: "begin editing",
                })
            }
        };
        self.state = StageState::Editing {
            baseline: Baseline {
                text: self.raw_text.clone(),
                kind: self.kind,
                parameters: self.parameters.clone(),
                settled,
            },
            hint: None,
        };
        Ok(())
    }

    /// Replace the edited text and re-run the syntax check.
    pub fn update_text(
        &mut self,
        text: impl Into<String>,
        grammar: &GrammarRegistry,
    ) -> PipelineResult<()> {
        if !self.is_editing() {
            return Err(PipelineError::InvalidTransition {
                from: self.state_name(),
                op: "update text of",
            });
        }
        self.raw_text = text.into();
        let check = if self.raw_text.trim().is_empty() {
            None
        } else {
            grammar.check(&self.raw_text, self.kind).map(|e| e.message)
        };
        if let StageState::Editing { hint, .. } = &mut self.state {
            *hint = check;
        }
        Ok(())
    }

    /// Editing → Valid | Invalid (or back to Empty for blank new stages).
    pub fn commit(&mut self, grammar: &GrammarRegistry) -> PipelineResult<CommitOutcome> {
        let baseline = match &self.state {
            StageState::Editing { baseline, .. } => baseline.clone(),
            StageState::Settled(s) => {
                return Err(PipelineError::InvalidTransition {
                    from: s.name(),
                    op: "commit",
                })
            }
        };

        if self.raw_text.trim().is_empty() && baseline.settled == Settled::Empty {
            self.raw_text.clear();
            self.parameters = Parameters::new();
            self.state = StageState::Settled(Settled::Empty);
            return Ok(CommitOutcome::Cleared);
        }

        match grammar.parse(&self.raw_text, self.kind) {
            Ok((kind, parameters)) => {
                let changed = !(baseline.settled == Settled::Valid
                    && baseline.kind == kind
                    && baseline.parameters == parameters);
                self.kind = kind;
                self.parameters = parameters;
                self.state = StageState::Settled(Settled::Valid);
                Ok(CommitOutcome::Valid { changed })
            }
            Err(e) => {
                tracing::debug!("Stage {} failed to parse: {}", self.id, e);
                if let Some(kind) = GrammarRegistry::prefix_kind(&self.raw_text) {
                    self.kind = kind;
                }
                self.parameters = Parameters::new();
                self.state = StageState::Settled(Settled::Invalid(e.message.clone()));
                Ok(CommitOutcome::Invalid(e.message))
            }
        }
    }

    /// Editing → the settled state it came from, text restored exactly.
    pub fn discard(&mut self) -> PipelineResult<()> {
        let StageState::Editing { baseline, .. } = &self.state else {
            return Err(PipelineError::InvalidTransition {
                from: self.state_name(),
                op: "discard",
            });
        };
        let baseline = baseline.clone();
        self.raw_text = baseline.text;
        self.kind = baseline.kind;
        self.parameters = baseline.parameters;
        self.state = StageState::Settled(baseline.settled);
        Ok(())
    }

    /// Backend rejection: force `invalid(reason)`.
    ///
    /// While editing, the rejection lands in the baseline so a later
    /// `discard` comes back invalid instead of valid.
    pub fn reject(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        match &mut self.state {
            StageState::Editing { baseline, .. } => {
                baseline.parameters = Parameters::new();
                baseline.settled = Settled::Invalid(reason);
            }
            StageState::Settled(_) => {
                self.parameters = Parameters::new();
                self.state = StageState::Settled(Settled::Invalid(reason));
            }
        }
    }
}
