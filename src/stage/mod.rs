//! View stages: identity, kinds, parameters, grammars and the per-stage
//! edit lifecycle.
//!
//! A stage is one step of the view pipeline (`match`, `sort_by`, `take`, ...).
//! Its text is parsed by a pluggable [`StageGrammar`] into typed
//! [`Parameters`]; the [`Stage`] state machine tracks whether the text is
//! being edited, committed valid, or committed invalid.

pub mod grammar;
pub mod id;
pub mod kind;
pub mod machine;
pub mod value;

pub use grammar::{render_text, ArgumentGrammar, GrammarRegistry, ParseError, StageGrammar};
pub use id::{IdAllocator, StageId, SyncToken};
pub use kind::{ParamDefault, ParamSpec, ParamType, StageKind};
pub use machine::{CommitOutcome, Stage, Validity};
pub use value::{ParamValue, Parameters};
