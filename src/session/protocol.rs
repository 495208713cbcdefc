//! Session wire messages and the serialized stage format.
//!
//! A committed stage goes over the wire as
//!
//! ```json
//! {"_cls": "fiftyone.core.stages.Take", "kwargs": [["size", 10], ["seed", null]]}
//! ```
//!
//! with kwargs in descriptor order and expressions tagged as
//! `{"$expr": "<source>"}`.

use crate::error::{Result, ViewBarError};
use crate::stage::{ParamDefault, ParamValue, Parameters, StageKind, SyncToken};
use crate::types::{CommittedStage, DatasetId, PipelineSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module path the backend resolves `_cls` against
pub const STAGE_CLASS_PREFIX: &str = "fiftyone.core.stages.";

/// One stage in its wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedStage {
    #[serde(rename = "_cls")]
    pub class: String,
    pub kwargs: Vec<(String, Value)>,
}

impl SerializedStage {
    pub fn new(kind: StageKind, parameters: &Parameters) -> Self {
        let kwargs = kind
            .params()
            .iter()
            .map(|spec| {
                let value = parameters
                    .get(spec.name)
                    .map(|v| v.to_json())
                    .unwrap_or_else(|| default_json(spec.default));
                (spec.name.to_string(), value)
            })
            .collect();
        Self {
            class: format!("{}{}", STAGE_CLASS_PREFIX, kind.class_name()),
            kwargs,
        }
    }

    pub fn from_committed(stage: &CommittedStage) -> Self {
        Self::new(stage.kind, &stage.parameters)
    }

    /// Kind named by `_cls`; the module prefix is optional.
    pub fn kind(&self) -> Result<StageKind> {
        let short = self
            .class
            .strip_prefix(STAGE_CLASS_PREFIX)
            .unwrap_or(&self.class);
        StageKind::from_class_name(short).ok_or_else(|| {
            ViewBarError::Serialization(format!("unknown stage class '{}'", self.class))
        })
    }

    /// Decode kwargs into parameters in descriptor order.
    ///
    /// Unknown kwargs and missing required ones are errors; missing optional
    /// ones take their default.
    pub fn decode(&self) -> Result<(StageKind, Parameters)> {
        let kind = self.kind()?;
        if let Some((name, _)) = self.kwargs.iter().find(|(n, _)| kind.param(n).is_none()) {
            return Err(ViewBarError::Serialization(format!(
                "unknown parameter '{}' for {}",
                name, kind
            )));
        }

        let mut parameters = Parameters::new();
        for spec in kind.params() {
            let value = match self.kwargs.iter().find(|(n, _)| n == spec.name) {
                Some((_, json)) => {
                    ParamValue::from_json(json).map_err(ViewBarError::Serialization)?
                }
                None => match spec.default {
                    Some(ParamDefault::Null) => ParamValue::Null,
                    Some(ParamDefault::Bool(b)) => ParamValue::Bool(b),
                    None => {
                        return Err(ViewBarError::Serialization(format!(
                            "missing required parameter '{}' for {}",
                            spec.name, kind
                        )))
                    }
                },
            };
            parameters.insert(spec.name, value);
        }
        Ok((kind, parameters))
    }
}

fn default_json(default: Option<ParamDefault>) -> Value {
    match default {
        Some(ParamDefault::Bool(b)) => Value::Bool(b),
        Some(ParamDefault::Null) | None => Value::Null,
    }
}

/// Serialize an ordered valid-stage sequence.
pub fn serialize_pipeline(stages: &[CommittedStage]) -> Vec<SerializedStage> {
    stages.iter().map(SerializedStage::from_committed).collect()
}

/// Parse a JSON array of serialized stages.
pub fn parse_pipeline_json(json: &str) -> Result<Vec<SerializedStage>> {
    Ok(serde_json::from_str(json)?)
}

/// Messages from the pipeline machine to the backend session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionRequest {
    AttachSession {
        dataset: DatasetId,
    },
    CommitPipeline {
        token: SyncToken,
        stages: Vec<SerializedStage>,
    },
    DetachSession,
    /// Stop the transport worker
    Shutdown,
}

/// Messages from the backend session to the pipeline machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Attach acknowledged; `summary` describes the unfiltered dataset
    Attached { summary: PipelineSummary },
    PipelineAccepted {
        token: SyncToken,
        summary: PipelineSummary,
    },
    /// `stage_index` is the position in the sent sequence
    PipelineRejected {
        token: SyncToken,
        stage_index: usize,
        reason: String,
    },
    /// Transport loss or backend failure
    Fault { message: String },
    Detached,
}

impl SessionEvent {
    /// Token echoed by sync responses
    pub fn token(&self) -> Option<SyncToken> {
        match self {
            SessionEvent::PipelineAccepted { token, .. }
            | SessionEvent::PipelineRejected { token, .. } => Some(*token),
            _ => None,
        }
    }
}
