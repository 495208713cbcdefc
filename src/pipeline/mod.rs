//! Pipeline editing: the stage list, focus, input protocol and the
//! top-level state chart.
//!
//! # Architecture
//!
//! ```text
//! PipelineEvent ──► [PipelineMachine] ──► StageList ──► Stage (per-stage machine)
//!                        │    ▲
//!              commit    ▼    │  SessionEvent (accepted / rejected / fault)
//!                   [SessionChannel]
//! ```
//!
//! # Design
//!
//! - **State tables**: the machine's global mode and each stage's lifecycle
//!   are enums with explicit transition functions.
//! - **Tail placeholder**: never stored; the list renders it after the last
//!   stage, so there is always exactly one and it is always last.
//! - **Single writer**: only the machine applies backend responses, and only
//!   for the latest dispatched token.
//! - **Read-only boundary**: renderers consume a [`PipelineSnapshot`].

pub mod error;
pub mod event;
pub mod focus;
pub mod list;
pub mod machine;
pub mod snapshot;

pub use error::{PipelineError, PipelineResult};
pub use event::{KeyAction, KeyChord, Notice, PipelineEvent};
pub use focus::{Cursor, Direction, Focus};
pub use list::{Slot, StageList};
pub use machine::{PipelineMachine, PipelineState};
pub use snapshot::{PipelineSnapshot, SlotSnapshot};
