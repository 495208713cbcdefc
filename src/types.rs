//! Core data types shared across the engine
//!
//! # Main Types
//!
//! - [`DatasetId`] - Name of the dataset a session is attached to
//! - [`SessionHandle`] - Identity of the live backend session
//! - [`CommittedStage`] - A valid stage as it takes part in a sync
//! - [`PipelineSummary`] - Backend-evaluated statistics of the current view
//! - [`SessionStatus`] - Coarse pipeline-machine mode for display

use crate::stage::{render_text, Parameters, StageId, StageKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset a session is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live connection identity, owned by the pipeline machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub dataset: DatasetId,
    /// Transport endpoint (`host:port` or equivalent)
    pub endpoint: String,
    pub attached_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn new(dataset: DatasetId, endpoint: impl Into<String>) -> Self {
        Self {
            dataset,
            endpoint: endpoint.into(),
            attached_at: Utc::now(),
        }
    }
}

/// A valid stage as it is sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedStage {
    pub id: StageId,
    pub kind: StageKind,
    pub parameters: Parameters,
}

impl CommittedStage {
    /// Canonical text form, e.g. `take: 10, seed=0.5`
    pub fn text(&self) -> String {
        render_text(self.kind, &self.parameters)
    }
}

/// Statistics of the evaluated view, as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Samples passing the pipeline
    pub sample_count: u64,
    /// Samples in the whole dataset
    pub dataset_count: u64,
    /// Fields visible in the view
    #[serde(default)]
    pub fields: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl PipelineSummary {
    pub fn new(sample_count: u64, dataset_count: u64, fields: Vec<String>) -> Self {
        Self {
            sample_count,
            dataset_count,
            fields,
            evaluated_at: Utc::now(),
        }
    }

    /// Fraction of the dataset in view (1.0 for empty datasets)
    pub fn coverage(&self) -> f64 {
        if self.dataset_count == 0 {
            1.0
        } else {
            self.sample_count as f64 / self.dataset_count as f64
        }
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} samples", self.sample_count, self.dataset_count)
    }
}

/// Session status of the pipeline machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No backend session attached
    #[default]
    Idle,
    /// Waiting for the attach acknowledgement
    Connecting,
    /// Interactive editing, backend in sync
    Running,
    /// A sync is in flight
    Syncing,
    /// Channel fault; pipeline kept for retry
    Error,
}

impl SessionStatus {
    /// Whether the pipeline is owned by a session (everything but idle)
    pub fn has_pipeline(&self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Connecting => write!(f, "Connecting"),
            SessionStatus::Running => write!(f, "Running"),
            SessionStatus::Syncing => write!(f, "Syncing"),
            SessionStatus::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ParamValue;

    #[test]
    fn test_summary_coverage() {
        let summary = PipelineSummary::new(25, 100, vec![]);
        assert!((summary.coverage() - 0.25).abs() < f64::EPSILON);
        assert_eq!(summary.to_string(), "25 of 100 samples");
        assert_eq!(PipelineSummary::new(0, 0, vec![]).coverage(), 1.0);
    }

    #[test]
    fn test_committed_stage_text() {
        let mut parameters = Parameters::new();
        parameters.insert("limit", ParamValue::Int(3));
        let stage = CommittedStage {
            id: StageId(0),
            kind: StageKind::Limit,
            parameters,
        };
        assert_eq!(stage.text(), "limit: 3");
    }
}
