//! Pipeline-specific error types.
//!
//! These are contract violations of the stage list and stage machines. The
//! pipeline machine guards its calls so none of them reach the user.

use crate::stage::id::StageId;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Cannot {op} a stage that is {from}")]
    InvalidTransition { from: &'static str, op: &'static str },

    #[error("Index {index} out of range for {len} stages")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown stage {0}")]
    UnknownStage(StageId),

    #[error("Pipeline not active")]
    NotActive,
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
