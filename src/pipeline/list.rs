//! Ordered stage list with its trailing "add stage" slot.
//!
//! The tail placeholder is not stored: it is the slot after the last stage,
//! so there is always exactly one and it is always last. Every mutation runs
//! to completion on `&mut self`, so no caller observes a half-applied change.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::stage::{CommitOutcome, GrammarRegistry, IdAllocator, Stage, StageId, StageKind};
use crate::types::CommittedStage;

/// One position of the visual sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    Stage(&'a Stage),
    Tail,
}

impl Slot<'_> {
    pub fn is_tail(&self) -> bool {
        matches!(self, Slot::Tail)
    }
}

/// Stages in application order, plus the implicit tail.
#[derive(Debug, Clone, Default)]
pub struct StageList {
    stages: Vec<Stage>,
    ids: IdAllocator,
    /// Bumped whenever a commit may have changed the committed pipeline
    revision: u64,
}

impl StageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id() == id)
    }

    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id() == id)
    }

    pub fn index_of(&self, id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id() == id)
    }

    /// The visual sequence: every stage, then the tail.
    pub fn slots(&self) -> impl Iterator<Item = Slot<'_>> {
        self.stages
            .iter()
            .map(Slot::Stage)
            .chain(std::iter::once(Slot::Tail))
    }

    /// Whether any stage is mid-edit
    pub fn has_editing(&self) -> bool {
        self.stages.iter().any(|s| s.is_editing())
    }

    /// Create an empty stage at `index` (0..=len), shifting later stages right.
    pub fn insert_at(&mut self, index: usize, kind: StageKind) -> PipelineResult<StageId> {
        if index > self.stages.len() {
            return Err(PipelineError::IndexOutOfRange {
                index,
                len: self.stages.len(),
            });
        }
        let id = self.ids.allocate();
        self.stages.insert(index, Stage::new(id, kind));
        tracing::trace!("Inserted stage {} ({}) at {}", id, kind, index);
        Ok(id)
    }

    /// Turn the tail into a real empty stage; a new tail follows it.
    pub fn materialize_tail(&mut self, kind: StageKind) -> StageId {
        let id = self.ids.allocate();
        self.stages.push(Stage::new(id, kind));
        tracing::trace!("Materialized tail as stage {} ({})", id, kind);
        id
    }

    /// Drop every stage. IDs keep counting from where they were.
    pub fn clear(&mut self) {
        if self.stages.iter().any(|s| s.is_valid()) {
            self.revision += 1;
        }
        self.stages.clear();
    }

    /// Remove the stage at `index`. Out of range is an error and a no-op.
    pub fn remove_at(&mut self, index: usize) -> PipelineResult<Stage> {
        if index >= self.stages.len() {
            return Err(PipelineError::IndexOutOfRange {
                index,
                len: self.stages.len(),
            });
        }
        let stage = self.stages.remove(index);
        if stage.is_valid() {
            self.revision += 1;
        }
        Ok(stage)
    }

    /// Remove a contiguous range of stages in one step.
    pub fn remove_range(&mut self, range: std::ops::RangeInclusive<usize>) -> PipelineResult<Vec<Stage>> {
        if *range.end() >= self.stages.len() || range.start() > range.end() {
            return Err(PipelineError::IndexOutOfRange {
                index: *range.end(),
                len: self.stages.len(),
            });
        }
        let removed: Vec<Stage> = self.stages.drain(range).collect();
        if removed.iter().any(|s| s.is_valid()) {
            self.revision += 1;
        }
        Ok(removed)
    }

    /// Relocate the stage at `from` so it ends up at `to`.
    pub fn move_stage(&mut self, from: usize, to: usize) -> PipelineResult<()> {
        let len = self.stages.len();
        for index in [from, to] {
            if index >= len {
                return Err(PipelineError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let stage = self.stages.remove(from);
        self.stages.insert(to, stage);
        self.revision += 1;
        Ok(())
    }

    /// Commit the stage with `id`, noting that a re-sync may be needed.
    pub fn commit(&mut self, id: StageId, grammar: &GrammarRegistry) -> PipelineResult<CommitOutcome> {
        let stage = self
            .stage_mut(id)
            .ok_or(PipelineError::UnknownStage(id))?;
        let outcome = stage.commit(grammar)?;
        if outcome.needs_sync() {
            self.revision += 1;
        }
        Ok(outcome)
    }

    /// The ordered valid stages; empty, editing and invalid ones are left out.
    pub fn committed_pipeline(&self) -> Vec<CommittedStage> {
        self.stages
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| CommittedStage {
                id: s.id(),
                kind: s.kind(),
                parameters: s.parameters().clone(),
            })
            .collect()
    }
}
