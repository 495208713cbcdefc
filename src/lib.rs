//! # viewbar: view-pipeline construction engine
//!
//! Interactive authoring of an ordered pipeline of query stages (`match`,
//! `sort_by`, `take`, ...) kept in sync with a backend session that
//! evaluates it against a dataset.
//!
//! ## Architecture
//!
//! - **Stage**: one step's text, parsed parameters and edit lifecycle
//! - **Pipeline**: the ordered stage list with its tail placeholder, focus
//!   and the keyboard-driven state chart
//! - **Session**: wire protocol, sync tokens and the worker-thread transport
//! - **Config**: TOML settings and the key map
//!
//! ## Configuration
//!
//! Settings live in the platform config directory under `dev.viewbar`:
//!
//! - **Linux**: `~/.config/dev.viewbar/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.viewbar/config.toml`
//! - **Windows**: `%APPDATA%\dev.viewbar\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use viewbar::{
//!     config::ViewBarConfig,
//!     pipeline::{PipelineEvent, PipelineMachine},
//!     session::{ChannelSession, MockBackend},
//!     types::DatasetId,
//! };
//!
//! fn main() -> viewbar::Result<()> {
//!     let config = ViewBarConfig::load_or_default();
//!     let session = ChannelSession::spawn(Box::new(MockBackend::new()), &config.session)?;
//!
//!     let mut machine = PipelineMachine::new(Box::new(session), &config);
//!     machine.attach(DatasetId::new("quickstart"))?;
//!
//!     machine.handle(PipelineEvent::Input("match: label == \"cat\"".into()));
//!     machine.handle(PipelineEvent::CommitFocused);
//!
//!     // Once per frame
//!     machine.poll();
//!     println!("{}", machine.snapshot());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod stage;
pub mod types;

// Re-export commonly used types
pub use config::ViewBarConfig;
pub use error::{Result, ResultExt, ViewBarError};
pub use pipeline::{Notice, PipelineEvent, PipelineMachine, PipelineSnapshot};
pub use session::{ChannelSession, SessionBackend, SessionChannel};
pub use stage::{GrammarRegistry, Stage, StageId, StageKind, SyncToken};
pub use types::{DatasetId, PipelineSummary, SessionStatus};
